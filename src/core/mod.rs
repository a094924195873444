//! Core protocol constants and counter arithmetic.
//!
//! Everything in this module is dependency-free and shared by all layers.

mod constants;

pub use constants::*;

/// Advance a send counter by one, applying the protocol's wrap rule.
///
/// Counters roll over to 0 upon reaching `u32::MAX - 1`, so the top value
/// `u32::MAX` is never produced locally. This rule is fixed by the protocol
/// and both directions must replicate it exactly for interoperability.
///
/// A peer-supplied `u32::MAX` (which a conforming peer never sends) advances
/// with wrapping arithmetic rather than aborting the session.
pub const fn next_counter(value: u32) -> u32 {
    if value == COUNTER_WRAP_POINT {
        0
    } else {
        value.wrapping_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_advances_by_one() {
        assert_eq!(next_counter(0), 1);
        assert_eq!(next_counter(41), 42);
        assert_eq!(next_counter(COUNTER_WRAP_POINT - 1), COUNTER_WRAP_POINT);
    }

    #[test]
    fn test_counter_wraps_before_max() {
        assert_eq!(next_counter(COUNTER_WRAP_POINT), 0);
        // The true maximum is reserved; it is never produced by advancing.
        for v in [0u32, 1, 1000, COUNTER_WRAP_POINT - 1, COUNTER_WRAP_POINT] {
            assert_ne!(next_counter(v), u32::MAX);
        }
    }

    #[test]
    fn test_counter_tolerates_reserved_value() {
        // A nonconforming peer may still hand us u32::MAX; advancing must
        // not panic in debug builds.
        assert_eq!(next_counter(u32::MAX), 0);
    }
}
