//! Shared primitive types and field tags.

use std::fmt;

use sha2::{Digest, Sha256};

/// Log date tag, `YYYYMMDD`.
pub const QSO_DATE: &str = "QSO_DATE";
/// Start time tag, `HHMM[SS]`.
pub const TIME_ON: &str = "TIME_ON";
/// Worked station callsign tag.
pub const CALL: &str = "CALL";
/// Frequency tag, MHz.
pub const FREQ: &str = "FREQ";
/// Emission mode tag.
pub const MODE: &str = "MODE";
/// Transmit power tag.
pub const TX_PWR: &str = "TX_PWR";

/// Tags a record must carry to be accepted.
pub const REQUIRED_TAGS: [&str; 3] = [CALL, QSO_DATE, TIME_ON];

/// Hex-encoded SHA-256 identifying one contact for duplicate suppression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DupeKey(String);

impl DupeKey {
    /// Hashes `date_time_call_freq_mode`; missing fields are passed as `""`.
    pub fn from_fields(date: &str, time: &str, call: &str, freq: &str, mode: &str) -> Self {
        let normalized = format!("{date}_{time}_{call}_{freq}_{mode}");
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Wraps a key read back from storage.
    pub fn from_stored(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
