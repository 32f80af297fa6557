//! Contact record parsed from one tagged line, and its duplicate key.

use hashbrown::HashMap;

use crate::{
    adif,
    types::{CALL, DupeKey, FREQ, MODE, QSO_DATE, REQUIRED_TAGS, TIME_ON, TX_PWR},
};

/// Field mapping reconstructed from a tagged line.
///
/// Tag names are folded to uppercase. A repeated tag keeps its last value;
/// iteration follows the order in which tags were first seen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QsoRecord {
    fields: HashMap<String, String>,
    order: Vec<String>,
}

impl QsoRecord {
    /// Parses `line`; `None` when no tags are present or a required tag is
    /// missing.
    pub fn parse(line: &str) -> Option<Self> {
        let mut rec = Self::default();
        for tag in adif::tags(line) {
            rec.set(tag.name.to_ascii_uppercase(), tag.value.trim().to_string());
        }

        if rec.fields.is_empty() || REQUIRED_TAGS.iter().any(|t| !rec.fields.contains_key(*t)) {
            return None;
        }
        Some(rec)
    }

    /// Value for `tag`, matched case-insensitively.
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields.get(&tag.to_ascii_uppercase()).map(String::as_str)
    }

    /// Worked callsign. Always present on a parsed record.
    pub fn call(&self) -> &str {
        self.get(CALL).unwrap_or_default()
    }

    /// Number of distinct tags.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// True when the record has no tags.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates `(tag, value)` in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.order
            .iter()
            .filter_map(|t| self.fields.get(t).map(|v| (t.as_str(), v.as_str())))
    }

    /// Duplicate key over date, time, call, frequency and mode.
    pub fn dupe_key(&self) -> DupeKey {
        let field = |t: &str| self.get(t).unwrap_or_default();
        DupeKey::from_fields(
            field(QSO_DATE),
            field(TIME_ON),
            field(CALL),
            field(FREQ),
            field(MODE),
        )
    }

    /// Strips one trailing unit letter from `TX_PWR` (`"100 W"` becomes `"100"`).
    pub fn normalize_tx_pwr(&mut self) {
        if let Some(v) = self.fields.get_mut(TX_PWR) {
            let trimmed = v.trim();
            let stripped = match trimmed.chars().next_back() {
                Some(c) if c.is_ascii_alphabetic() => trimmed[..trimmed.len() - 1].trim_end(),
                _ => trimmed,
            };
            *v = stripped.to_string();
        }
    }

    fn set(&mut self, tag: String, value: String) {
        if !self.fields.contains_key(&tag) {
            self.order.push(tag.clone());
        }
        self.fields.insert(tag, value);
    }
}

/// Parses one tagged line. See [`QsoRecord::parse`].
pub fn parse(line: &str) -> Option<QsoRecord> {
    QsoRecord::parse(line)
}

/// Duplicate key for `line`, or `None` when it does not parse.
pub fn dupe_key(line: &str) -> Option<DupeKey> {
    QsoRecord::parse(line).map(|rec| rec.dupe_key())
}
