use crc::{CRC_32_ISCSI, Crc};

/// CRC-32C (Castagnoli) as used by the SCTP common header.
pub(crate) static ISCSI_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

/// Computes the checksum of a packet whose checksum field is already zeroed.
pub(crate) fn generate_packet_checksum(raw: &[u8]) -> u32 {
    ISCSI_CRC.checksum(raw)
}

/// Total length of a chunk value padded to a 4 byte boundary.
pub(crate) fn get_padding_size(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

// Serial number arithmetic (RFC 1982).

const SERIAL_32_HALF: u32 = 1 << 31;
const SERIAL_16_HALF: u16 = 1 << 15;

pub(crate) fn sna32lt(i1: u32, i2: u32) -> bool {
    (i1 < i2 && i2 - i1 < SERIAL_32_HALF) || (i1 > i2 && i1 - i2 > SERIAL_32_HALF)
}

pub(crate) fn sna32lte(i1: u32, i2: u32) -> bool {
    i1 == i2 || sna32lt(i1, i2)
}

pub(crate) fn sna32gt(i1: u32, i2: u32) -> bool {
    (i1 < i2 && (i2 - i1) > SERIAL_32_HALF) || (i1 > i2 && (i1 - i2) < SERIAL_32_HALF)
}

pub(crate) fn sna32gte(i1: u32, i2: u32) -> bool {
    i1 == i2 || sna32gt(i1, i2)
}

pub(crate) fn sna16lt(i1: u16, i2: u16) -> bool {
    (i1 < i2 && (i2 - i1) < SERIAL_16_HALF) || (i1 > i2 && (i1 - i2) > SERIAL_16_HALF)
}

pub(crate) fn sna16lte(i1: u16, i2: u16) -> bool {
    i1 == i2 || sna16lt(i1, i2)
}
