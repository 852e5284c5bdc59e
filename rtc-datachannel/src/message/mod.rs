#[cfg(test)]
mod message_test;

pub mod message_channel_open;

use bytes::{Buf, BufMut};
use message_channel_open::*;
use shared::error::{Error, Result};
use shared::marshal::*;

pub(crate) const MESSAGE_TYPE_ACK: u8 = 0x02;
pub(crate) const MESSAGE_TYPE_OPEN: u8 = 0x03;
pub(crate) const MESSAGE_TYPE_LEN: usize = 1;

/// Leading byte of every DCEP message (RFC 8832 section 8.2.1).
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum MessageType {
    Ack,
    Open,
}

impl TryFrom<u8> for MessageType {
    type Error = Error;

    fn try_from(b: u8) -> Result<Self> {
        match b {
            MESSAGE_TYPE_ACK => Ok(Self::Ack),
            MESSAGE_TYPE_OPEN => Ok(Self::Open),
            _ => Err(Error::InvalidMessageType(b)),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(t: MessageType) -> u8 {
        match t {
            MessageType::Ack => MESSAGE_TYPE_ACK,
            MessageType::Open => MESSAGE_TYPE_OPEN,
        }
    }
}

/// A DCEP message, sent with PPID 50 on the stream it opens.
///
/// DATA_CHANNEL_ACK is the type byte alone, DATA_CHANNEL_OPEN carries the
/// channel parameters after it.
#[derive(Eq, PartialEq, Clone, Debug)]
pub enum Message {
    Open(DataChannelOpen),
    Ack,
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Open(_) => MessageType::Open,
            Self::Ack => MessageType::Ack,
        }
    }
}

impl MarshalSize for Message {
    fn marshal_size(&self) -> usize {
        MESSAGE_TYPE_LEN
            + match self {
                Self::Open(open) => open.marshal_size(),
                Self::Ack => 0,
            }
    }
}

impl Marshal for Message {
    fn marshal_to(&self, mut buf: &mut [u8]) -> Result<usize> {
        if buf.remaining_mut() < MESSAGE_TYPE_LEN {
            return Err(Error::UnexpectedEndOfBuffer {
                expected: MESSAGE_TYPE_LEN,
                actual: buf.remaining_mut(),
            });
        }
        buf.put_u8(self.message_type().into());

        let body = match self {
            Self::Open(open) => open.marshal_to(buf)?,
            Self::Ack => 0,
        };
        Ok(MESSAGE_TYPE_LEN + body)
    }
}

impl Unmarshal for Message {
    fn unmarshal<B>(buf: &mut B) -> Result<Self>
    where
        Self: Sized,
        B: Buf,
    {
        if !buf.has_remaining() {
            return Err(Error::UnexpectedEndOfBuffer {
                expected: MESSAGE_TYPE_LEN,
                actual: 0,
            });
        }

        match MessageType::try_from(buf.get_u8())? {
            MessageType::Ack => Ok(Self::Ack),
            MessageType::Open => Ok(Self::Open(DataChannelOpen::unmarshal(buf)?)),
        }
    }
}
