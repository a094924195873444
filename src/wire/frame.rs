//! Frame encoding and decoding.
//!
//! Wire format (all multi-byte integers big-endian):
//!
//! ```text
//! offset  size  field
//! 0       2     key_id          (header-level identifier, echoes key_number)
//! 2       2     body_length     (bytes following this field)
//! 4       4     send_counter
//! 8       4     ack_counter
//! 12      2     key_number
//! 14      1     information_id
//! 15      N     logical message payload(s)
//! ```
//!
//! Total frame length on the wire is `body_length + 4`.

use thiserror::Error;

use crate::core::{
    FRAME_FIXED_BODY_SIZE, FRAME_HEADER_SIZE, INFO_ID_ERROR_UNKNOWN_INFORMATION_ID,
    INFO_ID_ERROR_UNKNOWN_PROTOCOL_ID, INFO_ID_PAYLOAD, INFO_ID_POLL_REQUEST_RESPONSE,
    INFO_ID_SYNC_REQUEST, INFO_ID_SYNC_RESPONSE, MIN_FRAME_SIZE,
};

/// Frame purpose tag.
///
/// This enumeration is closed; any wire value outside it is reported as
/// invalid by [`Frame::kind`], never silently coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum InformationId {
    /// Synchronization request (initiator-originated).
    SyncRequest = INFO_ID_SYNC_REQUEST,
    /// Synchronization response carrying the responder's key number.
    SyncResponse = INFO_ID_SYNC_RESPONSE,
    /// Poll request/response (responder-originated heartbeat).
    PollRequestResponse = INFO_ID_POLL_REQUEST_RESPONSE,
    /// Payload frame.
    Payload = INFO_ID_PAYLOAD,
    /// Peer-reported error: it did not recognize an information id we sent.
    ErrorUnknownInformationId = INFO_ID_ERROR_UNKNOWN_INFORMATION_ID,
    /// Peer-reported error: it did not recognize the protocol id.
    ErrorUnknownProtocolId = INFO_ID_ERROR_UNKNOWN_PROTOCOL_ID,
}

impl InformationId {
    /// Parse an information id from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            INFO_ID_SYNC_REQUEST => Some(Self::SyncRequest),
            INFO_ID_SYNC_RESPONSE => Some(Self::SyncResponse),
            INFO_ID_POLL_REQUEST_RESPONSE => Some(Self::PollRequestResponse),
            INFO_ID_PAYLOAD => Some(Self::Payload),
            INFO_ID_ERROR_UNKNOWN_INFORMATION_ID => Some(Self::ErrorUnknownInformationId),
            INFO_ID_ERROR_UNKNOWN_PROTOCOL_ID => Some(Self::ErrorUnknownProtocolId),
            _ => None,
        }
    }

    /// Convert to the wire byte.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for InformationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::SyncRequest => "sync-request",
            Self::SyncResponse => "sync-response",
            Self::PollRequestResponse => "poll-request-response",
            Self::Payload => "payload",
            Self::ErrorUnknownInformationId => "error-unknown-information-id",
            Self::ErrorUnknownProtocolId => "error-unknown-protocol-id",
        };
        f.write_str(name)
    }
}

/// One complete length-delimited unit on the wire.
///
/// The information id is kept as a raw byte: a frame with an unrecognized id
/// still advances the receive counter, so parsing must not reject it.
/// Note that `key_id` and `key_number` travel independently on the wire; the
/// protocol never reconciles them and neither does this codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Header-level key identifier.
    pub key_id: u16,
    /// Sender's send counter (TC) at the time of transmission.
    pub send_counter: u32,
    /// Sender's view of our send counter.
    pub ack_counter: u32,
    /// Key number securing the payload; 0 means unsecured.
    pub key_number: u16,
    /// Raw information id byte.
    pub information_id: u8,
    /// Encoded logical messages, opaque at this layer.
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a frame with the header key id echoing the body key number.
    pub fn new(
        send_counter: u32,
        ack_counter: u32,
        key_number: u16,
        information_id: InformationId,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            key_id: key_number,
            send_counter,
            ack_counter,
            key_number,
            information_id: information_id.as_byte(),
            payload,
        }
    }

    /// The frame's purpose tag, or `None` for an out-of-enumeration id.
    pub fn kind(&self) -> Option<InformationId> {
        InformationId::from_byte(self.information_id)
    }

    /// Number of body bytes following the 4-byte header.
    pub fn body_length(&self) -> usize {
        FRAME_FIXED_BODY_SIZE + self.payload.len()
    }

    /// Serialize to the exact wire layout.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FRAME_HEADER_SIZE + self.body_length());
        buf.extend_from_slice(&self.key_id.to_be_bytes());
        buf.extend_from_slice(&(self.body_length() as u16).to_be_bytes());
        buf.extend_from_slice(&self.send_counter.to_be_bytes());
        buf.extend_from_slice(&self.ack_counter.to_be_bytes());
        buf.extend_from_slice(&self.key_number.to_be_bytes());
        buf.push(self.information_id);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse exactly one complete frame.
    ///
    /// `data` must hold the full frame, header included, as delivered by
    /// [`super::FrameAssembler`].
    pub fn parse(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < MIN_FRAME_SIZE {
            return Err(FrameError::TooShort {
                expected: MIN_FRAME_SIZE,
                actual: data.len(),
            });
        }

        let key_id = u16::from_be_bytes([data[0], data[1]]);
        let body_length = u16::from_be_bytes([data[2], data[3]]) as usize;
        if data.len() != FRAME_HEADER_SIZE + body_length {
            return Err(FrameError::LengthMismatch {
                declared: body_length,
                actual: data.len() - FRAME_HEADER_SIZE,
            });
        }

        let send_counter = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ack_counter = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let key_number = u16::from_be_bytes([data[12], data[13]]);
        let information_id = data[14];

        Ok(Self {
            key_id,
            send_counter,
            ack_counter,
            key_number,
            information_id,
            payload: data[MIN_FRAME_SIZE..].to_vec(),
        })
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            Some(id) => write!(
                f,
                "{} tc={} ack={} key={} ({}B)",
                id,
                self.send_counter,
                self.ack_counter,
                self.key_number,
                self.payload.len()
            ),
            None => write!(
                f,
                "invalid-0x{:02x} tc={} ack={} key={} ({}B)",
                self.information_id,
                self.send_counter,
                self.ack_counter,
                self.key_number,
                self.payload.len()
            ),
        }
    }
}

/// Errors that can occur during frame parsing and reassembly.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Frame is too short to hold the fixed fields.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// Header declares a body length that can never be satisfied.
    #[error("declared body length {declared} exceeds maximum {max}")]
    BodyTooLarge {
        /// Declared body length.
        declared: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Header declares a body shorter than the fixed body fields.
    #[error("declared body length {declared} below minimum {min}")]
    BodyTooShort {
        /// Declared body length.
        declared: usize,
        /// Structural minimum.
        min: usize,
    },

    /// Slice length does not match the declared body length.
    #[error("body length mismatch: header says {declared}, got {actual}")]
    LengthMismatch {
        /// Declared body length.
        declared: usize,
        /// Actual body bytes present.
        actual: usize,
    },
}
