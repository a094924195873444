//! VIGIL Protocol - Wire Layer
//!
//! Converts between logical frames and their exact byte encoding, and
//! reassembles discrete frames out of a fragmented byte stream:
//!
//! - **Frame codec**: [`Frame`], [`InformationId`] and the length-delimited
//!   wire format
//! - **Stream reassembly**: [`FrameAssembler`] with a maximum-frame-size
//!   guard against corrupt or adversarial streams
//! - **Logical messages**: [`Message`] bodies carried inside frames
//!
//! The wire layer is pure: it owns no I/O and no session state beyond the
//! unconsumed tail bytes retained by the assembler between calls.

mod assembler;
mod frame;
mod message;

pub use assembler::*;
pub use frame::*;
pub use message::*;
