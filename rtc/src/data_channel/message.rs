use bytes::Bytes;

/// One message sent or received on a data channel. `is_string` tells text
/// (PPI 51) from binary (PPI 53) payloads.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCDataChannelMessage {
    pub is_string: bool,
    pub data: Bytes,
}

impl RTCDataChannelMessage {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            is_string: true,
            data: Bytes::from(s.into()),
        }
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self {
            is_string: false,
            data: data.into(),
        }
    }

    /// The payload as text, None for binary messages or invalid UTF-8.
    pub fn as_text(&self) -> Option<&str> {
        if !self.is_string {
            return None;
        }
        std::str::from_utf8(&self.data).ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_data_channel_message_as_text() {
        assert_eq!(RTCDataChannelMessage::text("hi").as_text(), Some("hi"));
        assert_eq!(RTCDataChannelMessage::binary(&b"hi"[..]).as_text(), None);
        let invalid = RTCDataChannelMessage {
            is_string: true,
            data: Bytes::from_static(&[0xff, 0xfe]),
        };
        assert_eq!(invalid.as_text(), None);
    }
}
