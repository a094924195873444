//! Incremental frame reassembly from a streaming byte source.

use crate::core::{FRAME_FIXED_BODY_SIZE, FRAME_HEADER_SIZE, MAX_BODY_LENGTH};

use super::frame::{Frame, FrameError};

/// Reassembles complete frames out of arbitrarily fragmented reads.
///
/// The only state between calls is the retained tail of unconsumed bytes.
/// Feeding bytes produces every frame completed so far and never emits a
/// partial frame; a frame split at any byte boundary is delivered exactly
/// once, after its last byte arrives.
///
/// A header whose declared body length exceeds the configured maximum (or
/// falls below the structural minimum) fails fast instead of buffering
/// unboundedly; after such an error the stream has no safe
/// resynchronization point and the session must end.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
    max_body_length: usize,
}

impl FrameAssembler {
    /// Create an assembler with the default maximum body length.
    pub fn new() -> Self {
        Self::with_max_body_length(MAX_BODY_LENGTH)
    }

    /// Create an assembler with a custom maximum body length.
    pub fn with_max_body_length(max_body_length: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_body_length,
        }
    }

    /// Append received bytes and extract every frame completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Frame>, FrameError> {
        self.buffer.extend_from_slice(bytes);

        let mut frames = Vec::new();
        loop {
            if self.buffer.len() < FRAME_HEADER_SIZE {
                break;
            }

            let body_length = u16::from_be_bytes([self.buffer[2], self.buffer[3]]) as usize;
            if body_length > self.max_body_length {
                return Err(FrameError::BodyTooLarge {
                    declared: body_length,
                    max: self.max_body_length,
                });
            }
            if body_length < FRAME_FIXED_BODY_SIZE {
                return Err(FrameError::BodyTooShort {
                    declared: body_length,
                    min: FRAME_FIXED_BODY_SIZE,
                });
            }

            let total = FRAME_HEADER_SIZE + body_length;
            if self.buffer.len() < total {
                // Partial frame; wait for more bytes.
                break;
            }

            let raw: Vec<u8> = self.buffer.drain(..total).collect();
            frames.push(Frame::parse(&raw)?);
        }

        Ok(frames)
    }

    /// Number of buffered bytes not yet forming a complete frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MIN_FRAME_SIZE;
    use crate::wire::InformationId;

    fn sample_frame(payload: Vec<u8>) -> Frame {
        Frame::new(10, 20, 1, InformationId::Payload, payload)
    }

    #[test]
    fn test_single_frame_one_feed() {
        let mut assembler = FrameAssembler::new();
        let frame = sample_frame(vec![1, 2, 3]);

        let frames = assembler.feed(&frame.serialize()).unwrap();
        assert_eq!(frames, vec![frame]);
        assert_eq!(assembler.pending(), 0);
    }

    #[test]
    fn test_partial_frame_stability() {
        // Splitting the byte stream at every boundary yields exactly one
        // frame, and only once the final byte has been delivered.
        let frame = sample_frame(vec![0xAA; 7]);
        let bytes = frame.serialize();

        for split in 1..bytes.len() {
            let mut assembler = FrameAssembler::new();
            let first = assembler.feed(&bytes[..split]).unwrap();
            assert!(first.is_empty(), "split at {split} emitted early");
            assert_eq!(assembler.pending(), split);

            let second = assembler.feed(&bytes[split..]).unwrap();
            assert_eq!(second, vec![frame.clone()], "split at {split}");
            assert_eq!(assembler.pending(), 0);
        }
    }

    #[test]
    fn test_multiple_frames_one_feed() {
        let a = sample_frame(vec![1]);
        let b = Frame::new(11, 21, 1, InformationId::PollRequestResponse, vec![]);
        let c = sample_frame(vec![2, 3]);

        let mut bytes = a.serialize();
        bytes.extend(b.serialize());
        bytes.extend(c.serialize());

        let mut assembler = FrameAssembler::new();
        let frames = assembler.feed(&bytes).unwrap();
        assert_eq!(frames, vec![a, b, c]);
    }

    #[test]
    fn test_frames_preserve_order_across_feeds() {
        let a = sample_frame(vec![1]);
        let b = sample_frame(vec![2]);

        let mut bytes = a.serialize();
        bytes.extend(b.serialize());

        // Second frame arrives one byte short, then completes.
        let mut assembler = FrameAssembler::new();
        let first = assembler.feed(&bytes[..bytes.len() - 1]).unwrap();
        assert_eq!(first, vec![a]);

        let second = assembler.feed(&bytes[bytes.len() - 1..]).unwrap();
        assert_eq!(second, vec![b]);
    }

    #[test]
    fn test_oversized_body_fails_fast() {
        let mut assembler = FrameAssembler::with_max_body_length(64);

        let mut header = [0u8; FRAME_HEADER_SIZE];
        header[2..4].copy_from_slice(&1000u16.to_be_bytes());

        assert_eq!(
            assembler.feed(&header),
            Err(FrameError::BodyTooLarge {
                declared: 1000,
                max: 64
            })
        );
    }

    #[test]
    fn test_undersized_body_fails_fast() {
        let mut assembler = FrameAssembler::new();

        let mut header = [0u8; FRAME_HEADER_SIZE];
        header[2..4].copy_from_slice(&3u16.to_be_bytes());

        assert!(matches!(
            assembler.feed(&header),
            Err(FrameError::BodyTooShort { declared: 3, .. })
        ));
    }

    #[test]
    fn test_header_alone_is_retained() {
        let mut assembler = FrameAssembler::new();
        let frame = sample_frame(vec![]);
        let bytes = frame.serialize();
        assert_eq!(bytes.len(), MIN_FRAME_SIZE);

        let frames = assembler.feed(&bytes[..FRAME_HEADER_SIZE]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(assembler.pending(), FRAME_HEADER_SIZE);
    }
}
