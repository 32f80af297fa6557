//! Tokenizer for the tagged `<NAME:LENGTH>VALUE` text format.
//!
//! The same scanner serves whole log lines and records embedded in
//! arbitrary datagram payloads. The declared length is reported but never
//! used to bound the value: a value runs to the next `<` or end of input.

/// One `<NAME:LENGTH>VALUE` occurrence borrowed from the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag<'a> {
    /// Tag name exactly as written.
    pub name: &'a str,
    /// Declared value length; informational only.
    pub declared_len: usize,
    /// Raw value text, untrimmed.
    pub value: &'a str,
}

/// Iterator over the tags of a text, see [`tags`].
#[derive(Debug, Clone)]
pub struct Tags<'a> {
    text: &'a str,
    pos: usize,
}

/// Scans `text` for `<NAME:LENGTH>VALUE` occurrences.
///
/// Angle-bracket sequences that do not have that shape (`<EOR>`, `<EOH>`,
/// typed tags such as `<FREQ:8:N>`) are skipped.
pub fn tags(text: &str) -> Tags<'_> {
    Tags { text, pos: 0 }
}

impl<'a> Iterator for Tags<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(off) = self.text[self.pos..].find('<') {
            let start = self.pos + off;
            self.pos = start + 1;
            if let Some((tag, end)) = match_tag(self.text, start) {
                self.pos = end;
                return Some(tag);
            }
        }
        self.pos = self.text.len();
        None
    }
}

const QSO_DATE_OPEN: &str = "<qso_date:";
const CALL_OPEN: &str = "<call:";
const EOR: &str = "<eor>";

/// Cheap pre-check: true when `text` mentions both a `QSO_DATE` and a
/// `CALL` tag opening (ASCII case-insensitive).
pub fn mentions_record(text: &str) -> bool {
    let folded = text.to_ascii_lowercase();
    folded.contains(QSO_DATE_OPEN) && folded.contains(CALL_OPEN)
}

/// Finds the first embedded record in `text`.
///
/// A record starts at a `<QSO_DATE:n>` tag whose value begins with a digit
/// and ends at the first following `<EOR>` on the same line. Matching is
/// ASCII case-insensitive; the returned slice keeps the original casing.
pub fn extract_record(text: &str) -> Option<&str> {
    let folded = text.to_ascii_lowercase();
    let bytes = folded.as_bytes();
    let mut from = 0;

    while let Some(off) = folded[from..].find(QSO_DATE_OPEN) {
        let start = from + off;
        from = start + 1;

        let len_start = start + QSO_DATE_OPEN.len();
        let len_end = scan(bytes, len_start, u8::is_ascii_digit);
        if len_end == len_start || bytes.get(len_end) != Some(&b'>') {
            continue;
        }
        let value_start = len_end + 1;
        let value_end = scan(bytes, value_start, u8::is_ascii_digit);
        if value_end == value_start {
            continue;
        }

        let line_end = folded[value_end..]
            .find('\n')
            .map_or(folded.len(), |i| value_end + i);
        if let Some(eor) = folded[value_end..line_end].find(EOR) {
            return Some(&text[start..value_end + eor + EOR.len()]);
        }
    }

    None
}

fn match_tag(text: &str, start: usize) -> Option<(Tag<'_>, usize)> {
    let bytes = text.as_bytes();

    let name_start = start + 1;
    let name_end = scan(bytes, name_start, is_word);
    if name_end == name_start || bytes.get(name_end) != Some(&b':') {
        return None;
    }

    let len_start = name_end + 1;
    let len_end = scan(bytes, len_start, u8::is_ascii_digit);
    if len_end == len_start || bytes.get(len_end) != Some(&b'>') {
        return None;
    }

    let value_start = len_end + 1;
    let value_end = text[value_start..]
        .find('<')
        .map_or(text.len(), |i| value_start + i);

    let tag = Tag {
        name: &text[name_start..name_end],
        declared_len: text[len_start..len_end].parse().unwrap_or(usize::MAX),
        value: &text[value_start..value_end],
    };
    Some((tag, value_end))
}

fn scan(bytes: &[u8], from: usize, pred: impl Fn(&u8) -> bool) -> usize {
    let mut i = from;
    while i < bytes.len() && pred(&bytes[i]) {
        i += 1;
    }
    i
}

fn is_word(b: &u8) -> bool {
    b.is_ascii_alphanumeric() || *b == b'_'
}
