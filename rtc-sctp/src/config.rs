use std::time::Duration;

pub(crate) const COMMON_HEADER_SIZE: usize = 12;
pub(crate) const DATA_CHUNK_HEADER_SIZE: usize = 16;
pub(crate) const DEFAULT_SCTP_PORT: u16 = 5000;
/// Largest user data carried by a single DATA chunk.
pub(crate) const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1200;
pub(crate) const INITIAL_RECV_BUF_SIZE: u32 = 1024 * 1024;
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 262144;
pub(crate) const DEFAULT_MAX_STREAM_BUFFERED_AMOUNT: usize = 1024 * 1024;
pub(crate) const DEFAULT_MAX_ASSOCIATION_BUFFERED_AMOUNT: usize = 4 * 1024 * 1024;
pub(crate) const DEFAULT_MAX_INIT_RETRANSMITS: usize = 8;

pub(crate) const DEFAULT_RTO_INITIAL: Duration = Duration::from_secs(1);
pub(crate) const DEFAULT_RTO_MIN: Duration = Duration::from_millis(200);
pub(crate) const DEFAULT_RTO_MAX: Duration = Duration::from_secs(60);

/// AssociationConfig collects the arguments to association construction into
/// a single structure
#[derive(Debug, Clone)]
pub struct AssociationConfig {
    sctp_port: u16,
    max_receive_buffer_size: u32,
    max_message_size: u32,
    max_payload_size: usize,
    max_stream_buffered_amount: usize,
    max_association_buffered_amount: usize,
    max_init_retransmits: usize,
    rto_initial: Option<Duration>,
    rto_min: Option<Duration>,
    rto_max: Option<Duration>,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        AssociationConfig {
            sctp_port: DEFAULT_SCTP_PORT,
            max_receive_buffer_size: INITIAL_RECV_BUF_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            max_stream_buffered_amount: DEFAULT_MAX_STREAM_BUFFERED_AMOUNT,
            max_association_buffered_amount: DEFAULT_MAX_ASSOCIATION_BUFFERED_AMOUNT,
            max_init_retransmits: DEFAULT_MAX_INIT_RETRANSMITS,
            rto_initial: None,
            rto_min: None,
            rto_max: None,
        }
    }
}

impl AssociationConfig {
    pub fn with_sctp_port(mut self, value: u16) -> Self {
        self.sctp_port = value;
        self
    }

    pub fn with_max_receive_buffer_size(mut self, value: u32) -> Self {
        self.max_receive_buffer_size = value;
        self
    }

    pub fn with_max_message_size(mut self, value: u32) -> Self {
        self.max_message_size = value;
        self
    }

    pub fn with_max_payload_size(mut self, value: usize) -> Self {
        self.max_payload_size = value.max(1);
        self
    }

    pub fn with_max_stream_buffered_amount(mut self, value: usize) -> Self {
        self.max_stream_buffered_amount = value;
        self
    }

    pub fn with_max_association_buffered_amount(mut self, value: usize) -> Self {
        self.max_association_buffered_amount = value;
        self
    }

    pub fn with_max_init_retransmits(mut self, value: usize) -> Self {
        self.max_init_retransmits = value;
        self
    }

    pub fn with_rto_initial(mut self, value: Option<Duration>) -> Self {
        self.rto_initial = value;
        self
    }

    pub fn with_rto_min(mut self, value: Option<Duration>) -> Self {
        self.rto_min = value;
        self
    }

    pub fn with_rto_max(mut self, value: Option<Duration>) -> Self {
        self.rto_max = value;
        self
    }

    pub fn sctp_port(&self) -> u16 {
        self.sctp_port
    }

    pub fn max_receive_buffer_size(&self) -> u32 {
        self.max_receive_buffer_size
    }

    pub fn max_message_size(&self) -> u32 {
        self.max_message_size
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    pub fn max_stream_buffered_amount(&self) -> usize {
        self.max_stream_buffered_amount
    }

    pub fn max_association_buffered_amount(&self) -> usize {
        self.max_association_buffered_amount
    }

    pub fn max_init_retransmits(&self) -> usize {
        self.max_init_retransmits
    }

    pub fn rto_initial(&self) -> Duration {
        self.rto_initial.unwrap_or(DEFAULT_RTO_INITIAL)
    }

    pub fn rto_min(&self) -> Duration {
        self.rto_min.unwrap_or(DEFAULT_RTO_MIN)
    }

    pub fn rto_max(&self) -> Duration {
        self.rto_max.unwrap_or(DEFAULT_RTO_MAX)
    }

    /// Largest packet produced when a full DATA chunk is sent.
    pub(crate) fn max_packet_size(&self) -> usize {
        COMMON_HEADER_SIZE + DATA_CHUNK_HEADER_SIZE + self.max_payload_size
    }
}
