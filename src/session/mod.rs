//! VIGIL Protocol - Session Engine
//!
//! Drives one connection's protocol lifecycle:
//!
//! - **Receive loop**: reassembles frames off the transport and dispatches
//!   them ([`Session`])
//! - **Counter state machine**: per-direction send counters with the
//!   protocol's wrap rule, one lock around "compose, write, advance"
//! - **Transmit queue**: [`TransmitQueue`], drained one message per poll
//!   cycle
//!
//! # Architecture
//!
//! One worker task per session owns all transport reads and every send that
//! reacts to an incoming frame. Caller-initiated sends (`request`) and the
//! reactive sends serialize on the same write lock, so two sends can never
//! interleave header fields or clobber the send counter.
//!
//! ```text
//! ┌───────────────────────────────────────┐
//! │           Application                 │
//! │   enqueue / request / observers       │
//! ├───────────────────────────────────────┤
//! │          Session Engine               │  ← this module
//! │   counters, dispatch, transmit queue  │
//! ├───────────────────────────────────────┤
//! │           Wire Layer                  │
//! ├───────────────────────────────────────┤
//! │        Byte stream (TCP)              │
//! └───────────────────────────────────────┘
//! ```

mod engine;
mod queue;

pub use engine::Session;
pub use queue::TransmitQueue;

use std::time::Duration;

use thiserror::Error;

use crate::core::{
    DEFAULT_KEY_LENGTH, EMPTY_READ_DELAY, MAX_BODY_LENGTH, RECV_BUFFER_SIZE, UNSECURED_KEY_NUMBER,
};
use crate::keys::KeyError;
use crate::wire::{DeviceId, InformationId};

/// Which side of the connection this session plays.
///
/// The role is fixed at construction. Only the responder answers sync
/// requests, and only the initiator attaches queued payload to polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The field device side: originates sync requests, learns the key
    /// number from the sync response, transmits queued payload on polls.
    Initiator,
    /// The monitoring side: configured with the key number, answers sync
    /// requests, originates the poll heartbeat.
    Responder,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Initiator => "initiator",
            Self::Responder => "responder",
        })
    }
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// This side's role.
    pub role: Role,

    /// Device identifier sent in identification messages.
    pub device_id: DeviceId,

    /// Preshared key number; applied only on the responder (the initiator
    /// learns its key number through the sync handshake).
    pub key_number: u16,

    /// Locally declared key-length parameter.
    pub local_key_length: u8,

    /// Maximum accepted declared body length.
    pub max_body_length: usize,

    /// Transport read scratch buffer size.
    pub recv_buffer_size: usize,

    /// Bounded wait after an empty transport read.
    pub empty_read_delay: Duration,
}

impl SessionConfig {
    /// Create a configuration with protocol defaults.
    pub fn new(role: Role, device_id: DeviceId) -> Self {
        Self {
            role,
            device_id,
            key_number: UNSECURED_KEY_NUMBER,
            local_key_length: DEFAULT_KEY_LENGTH,
            max_body_length: MAX_BODY_LENGTH,
            recv_buffer_size: RECV_BUFFER_SIZE,
            empty_read_delay: EMPTY_READ_DELAY,
        }
    }

    /// Set the preshared key number.
    pub fn key_number(mut self, key_number: u16) -> Self {
        self.key_number = key_number;
        self
    }

    /// Set the locally declared key-length parameter.
    pub fn local_key_length(mut self, key_length: u8) -> Self {
        self.local_key_length = key_length;
        self
    }

    /// Set the maximum accepted declared body length.
    pub fn max_body_length(mut self, max: usize) -> Self {
        self.max_body_length = max;
        self
    }

    /// Set the empty-read retry delay.
    pub fn empty_read_delay(mut self, delay: Duration) -> Self {
        self.empty_read_delay = delay;
        self
    }
}

/// Errors surfaced to session callers.
///
/// Protocol-level anomalies (malformed peer frames) never show up here;
/// they are logged and handled inside dispatch. Transport failures surface
/// as the `is_active` transition, not as errors to unrelated callers.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Caller misuse reported synchronously.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A queued message would not fit inside one frame.
    #[error("encoded message of {size} bytes exceeds the {max}-byte frame budget")]
    MessageTooLarge {
        /// Encoded size of the rejected message.
        size: usize,
        /// Largest encodable message under the configured body limit.
        max: usize,
    },

    /// `request` was asked to originate a frame the engine cannot.
    #[error("unsupported request: {0}")]
    UnsupportedRequest(InformationId),

    /// Configured key number has no table entry.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The session is no longer active.
    #[error("session closed")]
    Closed,

    /// Transport I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::new(Role::Responder, DeviceId::from_bytes([0; 6]));

        assert_eq!(config.key_number, UNSECURED_KEY_NUMBER);
        assert_eq!(config.local_key_length, DEFAULT_KEY_LENGTH);
        assert_eq!(config.max_body_length, MAX_BODY_LENGTH);
        assert_eq!(config.empty_read_delay, EMPTY_READ_DELAY);
    }

    #[test]
    fn test_config_setters() {
        let config = SessionConfig::new(Role::Responder, DeviceId::from_bytes([0; 6]))
            .key_number(12)
            .local_key_length(128)
            .max_body_length(512)
            .empty_read_delay(Duration::from_millis(50));

        assert_eq!(config.key_number, 12);
        assert_eq!(config.local_key_length, 128);
        assert_eq!(config.max_body_length, 512);
        assert_eq!(config.empty_read_delay, Duration::from_millis(50));
    }
}
