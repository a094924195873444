//! Protocol constants.
//!
//! Wire-level values are fixed by the protocol and MUST NOT be changed.
//! Tunables (buffer sizes, delays) are defaults that `SessionConfig` can
//! override.

use std::time::Duration;

// =============================================================================
// FRAME LAYOUT
// =============================================================================

/// Frame header size (key id + body length, both big-endian u16).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Fixed body prefix size (send counter + ack counter + key number + info id).
pub const FRAME_FIXED_BODY_SIZE: usize = 4 + 4 + 2 + 1;

/// Minimum size of a complete frame on the wire.
pub const MIN_FRAME_SIZE: usize = FRAME_HEADER_SIZE + FRAME_FIXED_BODY_SIZE;

/// Maximum declared body length accepted from a peer.
///
/// A header claiming more than this can never be satisfied by a conforming
/// peer; it is treated as a fatal framing violation rather than buffered.
pub const MAX_BODY_LENGTH: usize = 1024;

// =============================================================================
// INFORMATION IDS
// =============================================================================

/// Synchronization request.
pub const INFO_ID_SYNC_REQUEST: u8 = 0x01;

/// Synchronization response.
pub const INFO_ID_SYNC_RESPONSE: u8 = 0x02;

/// Poll request/response (heartbeat).
pub const INFO_ID_POLL_REQUEST_RESPONSE: u8 = 0x03;

/// Payload frame.
pub const INFO_ID_PAYLOAD: u8 = 0x04;

/// Peer-reported: unknown information id.
pub const INFO_ID_ERROR_UNKNOWN_INFORMATION_ID: u8 = 0xFE;

/// Peer-reported: unknown protocol id.
pub const INFO_ID_ERROR_UNKNOWN_PROTOCOL_ID: u8 = 0xFF;

// =============================================================================
// LOGICAL MESSAGES
// =============================================================================

/// Logical message header size (tag + big-endian u16 length).
pub const MESSAGE_HEADER_SIZE: usize = 3;

/// Device identifier size carried by identification messages.
pub const DEVICE_ID_SIZE: usize = 6;

// =============================================================================
// COUNTERS
// =============================================================================

/// Send counters roll over to 0 at this value; `u32::MAX` is never emitted.
pub const COUNTER_WRAP_POINT: u32 = u32::MAX - 1;

/// Initial counter seed range.
///
/// Counters start at a small unpredictable value rather than zero so a
/// restarted session does not reuse a guessable initial counter.
pub const INITIAL_COUNTER_RANGE: std::ops::Range<u32> = 1..100;

// =============================================================================
// KEYS
// =============================================================================

/// Preshared symmetric key size (128-bit).
pub const KEY_SIZE: usize = 16;

/// Key number denoting unsecured communication.
pub const UNSECURED_KEY_NUMBER: u16 = 0;

/// Default locally declared key-length parameter.
pub const DEFAULT_KEY_LENGTH: u8 = 160;

// =============================================================================
// SESSION ENGINE DEFAULTS
// =============================================================================

/// Default transport read scratch buffer size.
pub const RECV_BUFFER_SIZE: usize = 256;

/// Bounded wait after an empty transport read before retrying.
pub const EMPTY_READ_DELAY: Duration = Duration::from_millis(500);
