//! # Vigil Protocol
//!
//! A session layer for point-to-point alarm and telemetry links over
//! reliable byte streams. It provides:
//!
//! - **Framing**: Incremental reassembly of length-prefixed frames from an
//!   arbitrarily fragmented byte stream
//! - **Sessions**: Counter accounting, key-number synchronization and
//!   poll-driven payload exchange between an initiator and a responder
//! - **Concurrency**: A single cloneable handle, safe to share across tasks,
//!   with a strict one-writer send discipline underneath
//! - **Simplicity**: Fixed wire layout, no negotiation beyond the key sync
//!   handshake
//!
//! ## Feature Flags
//!
//! - `engine` (default): The async session engine (requires tokio)
//!
//! ## Modules
//!
//! - [`core`]: Protocol constants and counter arithmetic (always included)
//! - [`wire`]: Frame and logical-message codecs (always included)
//! - [`keys`]: Preshared key table (always included)
//! - [`telemetry`]: Register-image telemetry decoding (always included)
//! - [`session`]: The async session engine (requires `engine` feature)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vigil_protocol::prelude::*;
//!
//! # async fn demo(transport: tokio::io::DuplexStream) -> Result<(), SessionError> {
//! let keys: Arc<KeyTable> = Arc::new(
//!     [(7u16, SymmetricKey::from_bytes([0x42; 16]))].into_iter().collect(),
//! );
//!
//! let config = SessionConfig::new(Role::Initiator, DeviceId::from_bytes([0x01; 6]));
//! let session = Session::open(transport, config, keys)?;
//!
//! // Ask the responder for our key number, then hand off a payload. It is
//! // transmitted on the next poll cycle.
//! session.request(InformationId::SyncRequest).await?;
//! session.enqueue(Message::Data(vec![0xAA, 0xBB]))?;
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Wire codecs (always included)
pub mod wire;

// Key table (always included)
pub mod keys;

// Telemetry decoding (always included)
pub mod telemetry;

// Session engine (feature-gated)
#[cfg(feature = "engine")]
#[cfg_attr(docsrs, doc(cfg(feature = "engine")))]
pub mod session;

/// Prelude module for convenient imports.
pub mod prelude {
    // Constants and counter arithmetic
    pub use crate::core::*;

    // Wire types
    pub use crate::wire::{
        DeviceId, Frame, FrameAssembler, FrameError, InformationId, Message, MessageError,
    };

    // Keys
    pub use crate::keys::{KeyError, KeyTable, SymmetricKey};

    // Telemetry
    pub use crate::telemetry::{TelemetryError, TelemetryFrame};

    // Session engine (when enabled)
    #[cfg(feature = "engine")]
    pub use crate::session::{Role, Session, SessionConfig, SessionError, TransmitQueue};
}

pub use keys::{KeyError, KeyTable, SymmetricKey};
pub use wire::{DeviceId, Frame, FrameAssembler, FrameError, InformationId, Message, MessageError};

#[cfg(feature = "engine")]
pub use session::{Role, Session, SessionConfig, SessionError};
