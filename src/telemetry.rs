//! Telemetry register-image decoding.
//!
//! Field devices expose their state as a fixed-width array of unsigned
//! 16-bit words (a register image read over a fieldbus). This module maps
//! that image onto named fields. It is a pure, stateless decode with no
//! protocol behavior; the session engine carries the raw words as opaque
//! payload and consumers decode them here.

use thiserror::Error;

/// Number of 16-bit words in a telemetry image.
pub const TELEMETRY_WORDS: usize = 13;

/// Word indices of the fixed layout.
mod layout {
    pub const CONNECTION_REQUEST: usize = 0;
    pub const PERSISTENT_MODE: usize = 1;
    pub const TEST_CYCLE: usize = 2;
    pub const GENERAL_ALARM: usize = 3;
    pub const BATTERY_FAULT: usize = 4;
    pub const EARTH_FAULT: usize = 5;
    pub const SYSTEM_FAULT: usize = 6;
    pub const BREAKER_TRIP_COMMAND: usize = 7;
    pub const BREAKER_POSITION: usize = 8;
    pub const VOLTAGE: usize = 9;
    pub const CURRENT: usize = 10;
    pub const POWER: usize = 11;
    pub const HEARTBEAT: usize = 12;
}

/// A decoded telemetry image.
///
/// Boolean fields treat any nonzero word as true.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryFrame {
    words: [u16; TELEMETRY_WORDS],
}

impl TelemetryFrame {
    /// Decode a register image.
    ///
    /// Accepts at least [`TELEMETRY_WORDS`] words; trailing registers are
    /// ignored.
    pub fn from_registers(words: &[u16]) -> Result<Self, TelemetryError> {
        if words.len() < TELEMETRY_WORDS {
            return Err(TelemetryError::TooFewWords {
                expected: TELEMETRY_WORDS,
                actual: words.len(),
            });
        }

        let mut fixed = [0u16; TELEMETRY_WORDS];
        fixed.copy_from_slice(&words[..TELEMETRY_WORDS]);
        Ok(Self { words: fixed })
    }

    /// Device requests a monitored connection to be established.
    pub fn connection_request(&self) -> bool {
        self.words[layout::CONNECTION_REQUEST] != 0
    }

    /// Transmission mode flag (persistent vs. on-demand connection).
    pub fn persistent_mode(&self) -> bool {
        self.words[layout::PERSISTENT_MODE] != 0
    }

    /// Test-message cycle interval in minutes.
    pub fn test_cycle_minutes(&self) -> u16 {
        self.words[layout::TEST_CYCLE]
    }

    /// General alarm flag.
    pub fn general_alarm(&self) -> bool {
        self.words[layout::GENERAL_ALARM] != 0
    }

    /// Battery fault flag.
    pub fn battery_fault(&self) -> bool {
        self.words[layout::BATTERY_FAULT] != 0
    }

    /// Earth fault flag.
    pub fn earth_fault(&self) -> bool {
        self.words[layout::EARTH_FAULT] != 0
    }

    /// System fault flag.
    pub fn system_fault(&self) -> bool {
        self.words[layout::SYSTEM_FAULT] != 0
    }

    /// Remote breaker trip command flag.
    pub fn breaker_trip_command(&self) -> bool {
        self.words[layout::BREAKER_TRIP_COMMAND] != 0
    }

    /// Breaker position feedback flag.
    pub fn breaker_position(&self) -> bool {
        self.words[layout::BREAKER_POSITION] != 0
    }

    /// Measured voltage.
    pub fn voltage(&self) -> f64 {
        f64::from(self.words[layout::VOLTAGE])
    }

    /// Measured current.
    pub fn current(&self) -> f64 {
        f64::from(self.words[layout::CURRENT])
    }

    /// Measured power.
    pub fn power(&self) -> f64 {
        f64::from(self.words[layout::POWER])
    }

    /// Free-running heartbeat counter incremented by the device.
    pub fn heartbeat(&self) -> u16 {
        self.words[layout::HEARTBEAT]
    }

    /// The raw register words.
    pub fn as_words(&self) -> &[u16; TELEMETRY_WORDS] {
        &self.words
    }
}

impl std::fmt::Display for TelemetryFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "conn_req={} persistent={} test_cycle={}min alarm={} battery_fault={} \
             earth_fault={} system_fault={} trip_cmd={} breaker={} \
             voltage={} current={} power={} heartbeat={}",
            self.connection_request(),
            self.persistent_mode(),
            self.test_cycle_minutes(),
            self.general_alarm(),
            self.battery_fault(),
            self.earth_fault(),
            self.system_fault(),
            self.breaker_trip_command(),
            self.breaker_position(),
            self.voltage(),
            self.current(),
            self.power(),
            self.heartbeat(),
        )
    }
}

/// Errors from telemetry decoding.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryError {
    /// The register image is shorter than the fixed layout.
    #[error("telemetry image too short: expected {expected} words, got {actual}")]
    TooFewWords {
        /// Words required by the layout.
        expected: usize,
        /// Words supplied.
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> [u16; TELEMETRY_WORDS] {
        [1, 0, 15, 1, 0, 0, 1, 0, 1, 230, 16, 3680, 42]
    }

    #[test]
    fn test_decode_named_fields() {
        let frame = TelemetryFrame::from_registers(&sample()).unwrap();

        assert!(frame.connection_request());
        assert!(!frame.persistent_mode());
        assert_eq!(frame.test_cycle_minutes(), 15);
        assert!(frame.general_alarm());
        assert!(!frame.battery_fault());
        assert!(!frame.earth_fault());
        assert!(frame.system_fault());
        assert!(!frame.breaker_trip_command());
        assert!(frame.breaker_position());
        assert_eq!(frame.voltage(), 230.0);
        assert_eq!(frame.current(), 16.0);
        assert_eq!(frame.power(), 3680.0);
        assert_eq!(frame.heartbeat(), 42);
    }

    #[test]
    fn test_nonzero_words_are_true() {
        let mut words = sample();
        words[3] = 0xFFFF;
        let frame = TelemetryFrame::from_registers(&words).unwrap();
        assert!(frame.general_alarm());
    }

    #[test]
    fn test_trailing_registers_ignored() {
        let mut words = sample().to_vec();
        words.extend([9, 9, 9]);
        let frame = TelemetryFrame::from_registers(&words).unwrap();
        assert_eq!(frame.as_words(), &sample());
    }

    #[test]
    fn test_short_image_rejected() {
        let err = TelemetryFrame::from_registers(&[0u16; 12]).unwrap_err();
        assert_eq!(
            err,
            TelemetryError::TooFewWords {
                expected: TELEMETRY_WORDS,
                actual: 12
            }
        );
    }
}
