//! Logical messages carried inside frame payloads.
//!
//! Each message is encoded as a tag byte, a big-endian u16 length, and the
//! message payload. A frame body may carry zero or more concatenated
//! messages; the session engine mostly treats them as opaque bytes and only
//! decodes where dispatch needs to (sync parameter exchange).

use thiserror::Error;

use crate::core::{DEVICE_ID_SIZE, MESSAGE_HEADER_SIZE};

/// Message tag: empty marker.
const TAG_EMPTY: u8 = 0x00;
/// Message tag: device identification.
const TAG_IDENTIFICATION: u8 = 0x10;
/// Message tag: sync parameter exchange.
const TAG_SYNC: u8 = 0x20;
/// Message tag: opaque application payload.
const TAG_DATA: u8 = 0x30;

/// Device identifier carried by identification messages (48-bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId([u8; DEVICE_ID_SIZE]);

impl DeviceId {
    /// Create a device id from raw bytes.
    pub fn from_bytes(bytes: [u8; DEVICE_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; DEVICE_ID_SIZE] {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// One logical message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Empty marker, used for bare keepalive frames.
    Empty,
    /// Device identification, always the first message of a poll answer.
    Identification(DeviceId),
    /// Sync parameter exchange carrying the declared key-length parameter.
    Sync {
        /// Declared key length of the sending side.
        key_length: u8,
    },
    /// Opaque application payload (alarm/telemetry content).
    Data(Vec<u8>),
}

impl Message {
    /// Whether the message carries no content.
    ///
    /// Empty messages are rejected at the queueing boundary; a queued
    /// payload must have something to say.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Data(bytes) => bytes.is_empty(),
            _ => false,
        }
    }

    /// Encoded size in bytes, header included.
    pub fn encoded_len(&self) -> usize {
        let payload = match self {
            Self::Empty => 0,
            Self::Identification(_) => DEVICE_ID_SIZE,
            Self::Sync { .. } => 1,
            Self::Data(bytes) => bytes.len(),
        };
        MESSAGE_HEADER_SIZE + payload
    }

    /// Append the encoded message to `buf`.
    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            Self::Empty => {
                buf.push(TAG_EMPTY);
                buf.extend_from_slice(&0u16.to_be_bytes());
            }
            Self::Identification(id) => {
                buf.push(TAG_IDENTIFICATION);
                buf.extend_from_slice(&(DEVICE_ID_SIZE as u16).to_be_bytes());
                buf.extend_from_slice(id.as_bytes());
            }
            Self::Sync { key_length } => {
                buf.push(TAG_SYNC);
                buf.extend_from_slice(&1u16.to_be_bytes());
                buf.push(*key_length);
            }
            Self::Data(bytes) => {
                buf.push(TAG_DATA);
                buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                buf.extend_from_slice(bytes);
            }
        }
    }

    /// Encode a message set into a frame payload.
    pub fn encode_all(messages: &[Message]) -> Vec<u8> {
        let len = messages.iter().map(Message::encoded_len).sum();
        let mut buf = Vec::with_capacity(len);
        for message in messages {
            message.encode_into(&mut buf);
        }
        buf
    }

    /// Decode the concatenated messages of a frame payload.
    pub fn decode_all(mut data: &[u8]) -> Result<Vec<Message>, MessageError> {
        let total = data.len();
        let mut messages = Vec::new();

        while !data.is_empty() {
            let offset = total - data.len();
            if data.len() < MESSAGE_HEADER_SIZE {
                return Err(MessageError::Truncated { offset });
            }

            let tag = data[0];
            let len = u16::from_be_bytes([data[1], data[2]]) as usize;
            let rest = &data[MESSAGE_HEADER_SIZE..];
            if rest.len() < len {
                return Err(MessageError::Truncated { offset });
            }
            let (payload, tail) = rest.split_at(len);

            let message = match tag {
                TAG_EMPTY => Message::Empty,
                TAG_IDENTIFICATION => {
                    let bytes: [u8; DEVICE_ID_SIZE] = payload
                        .try_into()
                        .map_err(|_| MessageError::BadLength { tag, len })?;
                    Message::Identification(DeviceId::from_bytes(bytes))
                }
                TAG_SYNC => {
                    let [key_length] = payload else {
                        return Err(MessageError::BadLength { tag, len });
                    };
                    Message::Sync {
                        key_length: *key_length,
                    }
                }
                TAG_DATA => Message::Data(payload.to_vec()),
                other => return Err(MessageError::UnknownTag(other)),
            };

            messages.push(message);
            data = tail;
        }

        Ok(messages)
    }
}

/// Errors that can occur while decoding logical messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessageError {
    /// Message block cut short inside a header or payload.
    #[error("truncated message block at offset {offset}")]
    Truncated {
        /// Byte offset of the offending block within the frame payload.
        offset: usize,
    },

    /// Unrecognized message tag.
    #[error("unknown message tag: 0x{0:02x}")]
    UnknownTag(u8),

    /// Declared length does not fit the tag's fixed-size payload.
    #[error("bad payload length {len} for tag 0x{tag:02x}")]
    BadLength {
        /// Message tag.
        tag: u8,
        /// Declared payload length.
        len: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_id() -> DeviceId {
        DeviceId::from_bytes([0x01, 0x23, 0x45, 0x67, 0x89, 0xAB])
    }

    #[test]
    fn test_message_set_roundtrip() {
        let messages = vec![
            Message::Identification(device_id()),
            Message::Sync { key_length: 160 },
            Message::Data(vec![0xCA, 0xFE]),
            Message::Empty,
        ];

        let encoded = Message::encode_all(&messages);
        assert_eq!(
            encoded.len(),
            messages.iter().map(Message::encoded_len).sum::<usize>()
        );

        let decoded = Message::decode_all(&encoded).unwrap();
        assert_eq!(decoded, messages);
    }

    #[test]
    fn test_empty_payload_decodes_to_no_messages() {
        assert_eq!(Message::decode_all(&[]).unwrap(), vec![]);
    }

    #[test]
    fn test_truncated_header() {
        let err = Message::decode_all(&[TAG_DATA, 0x00]).unwrap_err();
        assert_eq!(err, MessageError::Truncated { offset: 0 });
    }

    #[test]
    fn test_truncated_payload() {
        let mut encoded = Message::encode_all(&[Message::Data(vec![1, 2, 3, 4])]);
        encoded.truncate(encoded.len() - 2);
        assert!(matches!(
            Message::decode_all(&encoded),
            Err(MessageError::Truncated { offset: 0 })
        ));
    }

    #[test]
    fn test_truncation_offset_points_at_second_message() {
        let mut encoded = Message::encode_all(&[Message::Empty, Message::Data(vec![9; 8])]);
        encoded.truncate(encoded.len() - 1);

        let err = Message::decode_all(&encoded).unwrap_err();
        assert_eq!(
            err,
            MessageError::Truncated {
                offset: Message::Empty.encoded_len()
            }
        );
    }

    #[test]
    fn test_unknown_tag() {
        let err = Message::decode_all(&[0x7F, 0x00, 0x00]).unwrap_err();
        assert_eq!(err, MessageError::UnknownTag(0x7F));
    }

    #[test]
    fn test_bad_sync_length() {
        let err = Message::decode_all(&[TAG_SYNC, 0x00, 0x02, 0xA0, 0xA0]).unwrap_err();
        assert_eq!(err, MessageError::BadLength { tag: TAG_SYNC, len: 2 });
    }

    #[test]
    fn test_is_empty() {
        assert!(Message::Empty.is_empty());
        assert!(Message::Data(vec![]).is_empty());
        assert!(!Message::Data(vec![0]).is_empty());
        assert!(!Message::Identification(device_id()).is_empty());
        assert!(!Message::Sync { key_length: 128 }.is_empty());
    }
}
