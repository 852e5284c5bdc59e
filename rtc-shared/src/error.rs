use std::io;
use std::net;
use std::num::ParseIntError;
use std::string::FromUtf8Error;
use std::time::SystemTimeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of [Error], used by callers that only care about
/// which part of session establishment failed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed SDP, STUN, DTLS record or SCTP packet
    Parse,
    /// Illegal signaling-state transition or incompatible offer/answer
    Negotiation,
    /// Description type incompatible with the current role (a TypeError)
    Type,
    /// All candidate pairs exhausted or timed out
    Connectivity,
    /// Fingerprint mismatch, handshake failure or decryption failure
    Security,
    /// Send on a closed or unopened channel, or message too large
    Channel,
    /// Buffer full under a non-backpressured policy
    ResourceExhausted,
    /// Operation issued after close
    Closed,
    /// Anything else
    Internal,
}

#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer: full")]
    ErrBufferFull,
    #[error("buffer: short")]
    ErrBufferShort,
    #[error("buffer too small")]
    ErrBufferTooSmall,
    #[error("i/o timeout")]
    ErrTimeout,
    #[error("no interface is available")]
    ErrNoInterface,
    #[error(
        "DataChannel message is not long enough to determine type: (expected: {expected}, actual: {actual})"
    )]
    UnexpectedEndOfBuffer { expected: usize, actual: usize },

    //STUN errors
    #[error("attribute not found")]
    ErrAttributeNotFound,
    #[error("transaction exists with same id")]
    ErrTransactionExists,
    #[error("transaction not exists")]
    ErrTransactionNotExists,
    #[error("agent is closed")]
    ErrAgentClosed,
    #[error("transaction is timed out")]
    ErrTransactionTimeOut,
    #[error("unexpected EOF")]
    ErrUnexpectedEof,
    #[error("attribute size is invalid")]
    ErrAttributeSizeInvalid,
    #[error("attribute size overflow")]
    ErrAttributeSizeOverflow,
    #[error("unexpected EOF: not enough bytes to read header")]
    ErrUnexpectedHeaderEof,
    #[error("invalid magic cookie")]
    ErrInvalidMagicCookie,
    #[error("integrity check failed")]
    ErrIntegrityMismatch,
    #[error("fingerprint check failed")]
    ErrFingerprintMismatch,
    #[error("FINGERPRINT before MESSAGE-INTEGRITY attribute")]
    ErrFingerprintBeforeIntegrity,
    #[error("bad UNKNOWN-ATTRIBUTES size")]
    ErrBadUnknownAttrsSize,
    #[error("invalid length of IP value")]
    ErrBadIpLength,
    #[error("unexpected response type")]
    ErrUnexpectedResponse,
    #[error("error response received: {0}")]
    ErrErrorResponse(u16),
    #[error("STUN client closed")]
    ErrClientClosed,

    //ICE errors
    #[error("local username fragment is less than 24 bits long")]
    ErrLocalUfragInsufficientBits,
    #[error("local password is less than 128 bits long")]
    ErrLocalPwdInsufficientBits,
    #[error("remote ufrag is empty")]
    ErrRemoteUfragEmpty,
    #[error("remote pwd is empty")]
    ErrRemotePwdEmpty,
    #[error("no candidate pairs available")]
    ErrNoCandidatePairs,
    #[error("all candidate pairs failed or timed out")]
    ErrIceConnectivityFailed,
    #[error("the agent is closed")]
    ErrClosed,
    #[error("failed to parse address")]
    ErrAddressParseFailed,
    #[error("attribute not long enough to be ICE candidate")]
    ErrAttributeTooShortIceCandidate,
    #[error("could not parse component")]
    ErrParseComponent,
    #[error("could not parse priority")]
    ErrParsePriority,
    #[error("could not parse port")]
    ErrParsePort,
    #[error("could not parse related addresses")]
    ErrParseRelatedAddr,
    #[error("could not parse type")]
    ErrParseType,
    #[error("unknown candidate type")]
    ErrUnknownCandidateType,
    #[error("username mismatch")]
    ErrMismatchUsername,
    #[error("role conflict")]
    ErrRoleConflict,
    #[error("gathering is already in progress")]
    ErrMultipleGatherAttempted,
    #[error("failed to determine networkType")]
    ErrDetermineNetworkType,
    #[error("discard message from unknown local address")]
    ErrUnhandledStunpacket,
    #[error("invalid binding request")]
    ErrInvalidBindingRequest,

    //DTLS errors
    #[error("conn is closed")]
    ErrConnClosed,
    #[error("handshake timed out")]
    ErrHandshakeTimeout,
    #[error("dtls protocol error: {0}")]
    ErrDtlsProtocol(String),
    #[error("invalid content type")]
    ErrInvalidContentType,
    #[error("invalid handshake type")]
    ErrInvalidHandshakeType,
    #[error("invalid mac")]
    ErrInvalidMac,
    #[error("replayed or too old record")]
    ErrReplayedRecord,
    #[error("dtls transport has not started yet")]
    ErrDtlsTransportNotStarted,
    #[error("client sent certificate verify but we have no certificate to verify")]
    ErrCertificateVerifyNoCertificate,
    #[error("no certificate provided")]
    ErrInvalidCertificate,
    #[error("expected and actual key signature do not match")]
    ErrKeySignatureMismatch,
    #[error("no certificates configured")]
    ErrNoCertificates,
    #[error("unsupported protocol version")]
    ErrUnsupportedProtocolVersion,
    #[error("client+server do not support any shared cipher suites")]
    ErrCipherSuiteNoIntersection,
    #[error("expected and actual verify data does not match")]
    ErrVerifyDataMismatch,
    #[error("data length and declared length do not match")]
    ErrLengthMismatch,
    #[error("buffer not long enough to contain nonce")]
    ErrNotEnoughRoomForNonce,
    #[error("sequence number overflow")]
    ErrSequenceNumberOverflow,
    #[error("invalid state machine transition")]
    ErrInvalidFsmTransition,
    #[error("Alert is Fatal or Close Notify")]
    ErrAlertFatalOrClose,
    #[error("remote certificate does not match any fingerprint")]
    ErrNoMatchingCertificateFingerprint,
    #[error("unsupported fingerprint algorithm")]
    ErrUnsupportedFingerprintAlgorithm,
    #[error("failed to generate certificate fingerprint")]
    ErrFailedToGenerateCertificateFingerprint,

    //SCTP errors
    #[error("raw is too small for a SCTP chunk")]
    ErrChunkHeaderTooSmall,
    #[error("not enough data left in SCTP packet to satisfy requested length")]
    ErrChunkHeaderNotEnoughSpace,
    #[error("chunk has invalid length")]
    ErrChunkHeaderInvalidLength,
    #[error("raw is smaller than the minimum length for a SCTP packet")]
    ErrPacketRawTooSmall,
    #[error("failed to unmarshal, contains unknown chunk type")]
    ErrUnmarshalUnknownChunkType,
    #[error("checksum mismatch theirs")]
    ErrChecksumMismatch,
    #[error("chunk type is not of the expected type")]
    ErrChunkTypeMismatch,
    #[error("association is not established")]
    ErrAssociationNotEstablished,
    #[error("handshake failed (INIT ACK)")]
    ErrHandshakeInitAck,
    #[error("handshake failed (COOKIE ECHO)")]
    ErrHandshakeCookieEcho,
    #[error("association aborted by peer")]
    ErrAssociationAborted,
    #[error("outbound packet larger than maximum message size")]
    ErrOutboundPacketTooLarge,
    #[error("Stream closed")]
    ErrStreamClosed,
    #[error("Stream not existed")]
    ErrStreamNotExisted,
    #[error("Stream already exists")]
    ErrStreamAlreadyExist,
    #[error("Unknown PayloadProtocolIdentifier {0}")]
    InvalidPayloadProtocolIdentifier(u32),
    #[error("Invalid Message Type {0}")]
    InvalidMessageType(u8),
    #[error("Invalid Channel Type {0}")]
    InvalidChannelType(u8),

    //RTC errors
    /// ErrConnectionClosed indicates an operation executed after connection
    /// has already been closed.
    #[error("connection closed")]
    ErrConnectionClosed,
    /// ErrDataChannelNotOpen indicates a send was attempted on a data channel
    /// that is not (yet) open.
    #[error("data channel is not open")]
    ErrDataChannelNotOpen,
    #[error("data channel {0} does not exist")]
    ErrDataChannelNotExisted(u16),
    #[error("data channel id {0} is already in use")]
    ErrDataChannelIdInUse(u16),
    /// ErrRetransmitsOrPacketLifeTime indicates that an attempt to create a data
    /// channel was made with both options max_packet_life_time and max_retransmits
    /// set together. Such configuration is mutually exclusive.
    #[error("both max_packet_life_time and max_retransmits was set")]
    ErrRetransmitsOrPacketLifeTime,
    /// ErrProtocolTooLarge indicates that value given for a DataChannelInit protocol is
    /// longer then 65535 bytes
    #[error("protocol is larger then 65535 bytes")]
    ErrProtocolTooLarge,
    #[error("negotiated set without channel id")]
    ErrNegotiatedWithoutID,
    #[error("label is larger then 65535 bytes")]
    ErrStringSizeLimit,
    /// ErrNoRemoteDescription indicates that an operation was rejected because
    /// the remote description is not set
    #[error("remote description is not set")]
    ErrNoRemoteDescription,
    /// ErrIncorrectSignalingState indicates that the signaling state of PeerConnection is not correct
    #[error("operation can not be run in current signaling state")]
    ErrIncorrectSignalingState,
    /// ErrIncorrectSdpType indicates a description whose type does not fit the
    /// current offer/answer role.
    #[error("session description type {0} is invalid in the current signaling state")]
    ErrIncorrectSdpType(String),
    #[error("invalid proposed signaling state transition: {0}")]
    ErrSignalingStateProposedTransitionInvalid(String),
    #[error("remote offer does not contain a data channel section")]
    ErrNoCommonMedia,
    #[error("invalid session description: {0}")]
    ErrInvalidSessionDescription(String),
    #[error("set_remote_description called with no fingerprint")]
    ErrSessionDescriptionNoFingerprint,
    #[error("set_remote_description called with an invalid fingerprint")]
    ErrSessionDescriptionInvalidFingerprint,
    #[error("set_remote_description called with no ice-ufrag")]
    ErrSessionDescriptionMissingIceUfrag,
    #[error("set_remote_description called with no ice-pwd")]
    ErrSessionDescriptionMissingIcePwd,
    #[error("unknown ICE candidate for mid {0}")]
    ErrIceCandidateUnknownMid(String),
    #[error("session description type {0} is not supported")]
    ErrUnsupportedSdpType(String),
    #[error("new sdp does not match previous offer")]
    ErrSdpDoesNotMatchOffer,
    #[error("new sdp does not match previous answer")]
    ErrSdpDoesNotMatchAnswer,
    #[error("x509Cert expired")]
    ErrCertificateExpired,
    #[error("maximum number ID for datachannel specified")]
    ErrMaxDataChannelId,
    #[error("invalid ICE server url: {0}")]
    ErrInvalidIceServerUrl(String),

    //SDP errors
    #[error("SdpInvalidSyntax: {0}")]
    SdpInvalidSyntax(String),
    #[error("SdpInvalidValue: {0}")]
    SdpInvalidValue(String),
    #[error("sdp: empty time_descriptions")]
    SdpEmptyTimeDescription,

    //Third Party Errors
    #[error("{0}")]
    RcGen(String),
    #[error("aes gcm: {0}")]
    AesGcm(String),
    #[error("parse ip: {0}")]
    ParseIp(#[from] net::AddrParseError),
    #[error("parse int: {0}")]
    ParseInt(#[from] ParseIntError),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("utf8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("json: {0}")]
    Json(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SdpInvalidSyntax(_)
            | Error::SdpInvalidValue(_)
            | Error::SdpEmptyTimeDescription
            | Error::UnexpectedEndOfBuffer { .. }
            | Error::ErrBufferShort
            | Error::ErrBufferTooSmall
            | Error::ErrAttributeNotFound
            | Error::ErrUnexpectedEof
            | Error::ErrAttributeSizeInvalid
            | Error::ErrAttributeSizeOverflow
            | Error::ErrUnexpectedHeaderEof
            | Error::ErrInvalidMagicCookie
            | Error::ErrFingerprintBeforeIntegrity
            | Error::ErrBadUnknownAttrsSize
            | Error::ErrBadIpLength
            | Error::ErrAttributeTooShortIceCandidate
            | Error::ErrParseComponent
            | Error::ErrParsePriority
            | Error::ErrParsePort
            | Error::ErrParseRelatedAddr
            | Error::ErrParseType
            | Error::ErrUnknownCandidateType
            | Error::ErrAddressParseFailed
            | Error::ErrDetermineNetworkType
            | Error::ErrInvalidContentType
            | Error::ErrInvalidHandshakeType
            | Error::ErrLengthMismatch
            | Error::ErrChunkHeaderTooSmall
            | Error::ErrChunkHeaderNotEnoughSpace
            | Error::ErrChunkHeaderInvalidLength
            | Error::ErrPacketRawTooSmall
            | Error::ErrUnmarshalUnknownChunkType
            | Error::ErrChecksumMismatch
            | Error::ErrChunkTypeMismatch
            | Error::InvalidPayloadProtocolIdentifier(_)
            | Error::InvalidMessageType(_)
            | Error::InvalidChannelType(_)
            | Error::ParseIp(_)
            | Error::ParseInt(_)
            | Error::Utf8(_)
            | Error::Json(_)
            | Error::ErrInvalidIceServerUrl(_) => ErrorKind::Parse,

            Error::ErrIncorrectSignalingState
            | Error::ErrSignalingStateProposedTransitionInvalid(_)
            | Error::ErrNoRemoteDescription
            | Error::ErrNoCommonMedia
            | Error::ErrInvalidSessionDescription(_)
            | Error::ErrSessionDescriptionNoFingerprint
            | Error::ErrSessionDescriptionInvalidFingerprint
            | Error::ErrSessionDescriptionMissingIceUfrag
            | Error::ErrSessionDescriptionMissingIcePwd
            | Error::ErrIceCandidateUnknownMid(_)
            | Error::ErrUnsupportedSdpType(_)
            | Error::ErrSdpDoesNotMatchOffer
            | Error::ErrSdpDoesNotMatchAnswer
            | Error::ErrRetransmitsOrPacketLifeTime
            | Error::ErrProtocolTooLarge
            | Error::ErrNegotiatedWithoutID
            | Error::ErrStringSizeLimit
            | Error::ErrRemoteUfragEmpty
            | Error::ErrRemotePwdEmpty => ErrorKind::Negotiation,

            Error::ErrIncorrectSdpType(_) => ErrorKind::Type,

            Error::ErrNoCandidatePairs | Error::ErrIceConnectivityFailed | Error::ErrTimeout => {
                ErrorKind::Connectivity
            }

            Error::ErrHandshakeTimeout
            | Error::ErrCertificateExpired
            | Error::ErrFingerprintMismatch
            | Error::ErrIntegrityMismatch
            | Error::ErrDtlsProtocol(_)
            | Error::ErrInvalidMac
            | Error::ErrCertificateVerifyNoCertificate
            | Error::ErrInvalidCertificate
            | Error::ErrKeySignatureMismatch
            | Error::ErrNoCertificates
            | Error::ErrUnsupportedProtocolVersion
            | Error::ErrCipherSuiteNoIntersection
            | Error::ErrVerifyDataMismatch
            | Error::ErrAlertFatalOrClose
            | Error::ErrNoMatchingCertificateFingerprint
            | Error::ErrUnsupportedFingerprintAlgorithm
            | Error::ErrFailedToGenerateCertificateFingerprint
            | Error::ErrReplayedRecord => ErrorKind::Security,

            Error::ErrDataChannelNotOpen
            | Error::ErrDataChannelNotExisted(_)
            | Error::ErrDataChannelIdInUse(_)
            | Error::ErrOutboundPacketTooLarge
            | Error::ErrStreamClosed
            | Error::ErrStreamNotExisted
            | Error::ErrStreamAlreadyExist
            | Error::ErrAssociationNotEstablished => ErrorKind::Channel,

            Error::ErrBufferFull | Error::ErrMaxDataChannelId => ErrorKind::ResourceExhausted,

            Error::ErrConnectionClosed
            | Error::ErrConnClosed
            | Error::ErrClosed
            | Error::ErrClientClosed
            | Error::ErrAgentClosed
            | Error::ErrAssociationAborted => ErrorKind::Closed,

            _ => ErrorKind::Internal,
        }
    }
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

// io::Error is not Clone, keep its kind and message.
impl Clone for IoError {
    fn clone(&self) -> Self {
        IoError(io::Error::new(self.0.kind(), self.0.to_string()))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

impl From<SystemTimeError> for Error {
    fn from(e: SystemTimeError) -> Self {
        Error::Other(e.to_string())
    }
}

/// flatten_errs flattens multiple errors into one
pub fn flatten_errs(errs: Vec<impl Into<Error>>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        let errs_strs: Vec<String> = errs.into_iter().map(|e| e.into().to_string()).collect();
        Err(Error::Other(errs_strs.join("\n")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_kind() {
        assert_eq!(
            Error::ErrIncorrectSdpType("answer".to_owned()).kind(),
            ErrorKind::Type
        );
        assert_eq!(
            Error::ErrIncorrectSignalingState.kind(),
            ErrorKind::Negotiation
        );
        assert_eq!(
            Error::ErrNoMatchingCertificateFingerprint.kind(),
            ErrorKind::Security
        );
        assert_eq!(Error::ErrHandshakeTimeout.kind(), ErrorKind::Security);
        assert_eq!(Error::ErrDataChannelNotOpen.kind(), ErrorKind::Channel);
        assert_eq!(Error::ErrOutboundPacketTooLarge.kind(), ErrorKind::Channel);
        assert_eq!(Error::ErrBufferFull.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(Error::ErrConnectionClosed.kind(), ErrorKind::Closed);
        assert_eq!(
            Error::ErrIceConnectivityFailed.kind(),
            ErrorKind::Connectivity
        );
    }

    #[test]
    fn test_flatten_errs() {
        assert_eq!(flatten_errs(Vec::<Error>::new()), Ok(()));
        assert_eq!(
            flatten_errs(vec![Error::ErrStreamClosed, Error::ErrConnClosed]),
            Err(Error::Other("Stream closed\nconn is closed".to_owned()))
        );
    }
}
