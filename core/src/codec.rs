//! Decoder for the quasi-CSV text PUMAPI returns.
//!
//! # Design
//! PUMAPI's "CSV" has no escaping: fields are split on every comma, string
//! values usually carry one pair of double quotes, booleans are bare `true` /
//! `false`, and rows sometimes have a different number of fields than the
//! header. Rather than rejecting such responses outright, the decoder has a
//! graceful mode that truncates the longer side of each mismatching row and
//! logs what was dropped. Strict mode turns every inconsistency into an
//! error.
//!
//! In `decode_table` narrowing the header is sticky: once a short row has
//! cut the header down, all following rows are zipped against the shorter
//! header. Record order therefore matters, and tables decoded gracefully are
//! not guaranteed to have a uniform key set.

use std::fmt;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{info, warn};

use crate::error::{PpmsError, Result};

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Str(String),
    Bool(bool),
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            Scalar::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            Scalar::Str(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Str(s) => f.write_str(s),
            Scalar::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// An ordered mapping from header field name to value.
///
/// Inserting an existing key replaces its value in place, so a header with
/// duplicate names keeps the position of the first occurrence and the value
/// of the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    entries: Vec<(String, Scalar)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// The value of `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Scalar::as_str)
    }

    /// The value of `key` if it is a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Scalar::as_bool)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<Scalar>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// The records of a multi-line response plus the row widths observed while
/// decoding it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTable {
    records: Vec<Record>,
    min_width: usize,
    max_width: usize,
}

impl ParsedTable {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Smallest field count seen, header included.
    pub fn min_width(&self) -> usize {
        self.min_width
    }

    /// Largest field count seen, header included.
    pub fn max_width(&self) -> usize {
        self.max_width
    }

    /// Whether rows disagreed in width; records may then have different keys.
    pub fn is_ragged(&self) -> bool {
        self.min_width != self.max_width
    }
}

impl IntoIterator for ParsedTable {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a ParsedTable {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Strip one pair of surrounding double quotes from every field and turn the
/// bare tokens `true` / `false` into booleans.
pub fn normalize_row(fields: Vec<String>) -> Vec<Scalar> {
    fields
        .into_iter()
        .map(|field| {
            let unquoted = if field.len() >= 2 && field.starts_with('"') && field.ends_with('"') {
                field[1..field.len() - 1].to_string()
            } else {
                field
            };
            match unquoted.as_str() {
                "true" => Scalar::Bool(true),
                "false" => Scalar::Bool(false),
                _ => Scalar::Str(unquoted),
            }
        })
        .collect()
}

fn split_fields(line: &str) -> Vec<String> {
    line.split(',').map(str::to_string).collect()
}

/// Bring header and data to the same length, dropping the tail of whichever
/// is longer. Fails in strict mode.
fn reconcile(
    header: &mut Vec<String>,
    data: &mut Vec<Scalar>,
    graceful: bool,
) -> std::result::Result<(), String> {
    if header.len() == data.len() {
        return Ok(());
    }
    let msg = format!(
        "mismatch of header vs. data fields count ({} vs. {})",
        header.len(),
        data.len()
    );
    warn!("parsing CSV failed, {msg}");
    if !graceful {
        return Err(msg);
    }

    let minimum = header.len().min(data.len());
    if minimum < header.len() {
        let dropped = header.split_off(minimum);
        warn!(?dropped, "discarding header fields");
    } else {
        let dropped = data.split_off(minimum);
        warn!(?dropped, "discarding data fields");
    }
    Ok(())
}

/// Decode a two-line response (header line, one data line) into a record.
///
/// The response consisting of exactly two empty lines decodes to `{"": ""}`.
pub fn decode_single(text: &str, graceful: bool) -> Result<Record> {
    if text == "\n\n" {
        return Ok(Record::from_iter([("", "")]));
    }

    let lines: Vec<&str> = text.lines().collect();
    if lines.len() != 2 {
        warn!(lines = lines.len(), text, "response expected to have exactly two lines");
        if !graceful {
            return Err(PpmsError::format(text, "invalid response format, expected two lines"));
        }
    }

    let (Some(header_line), Some(data_line)) = (lines.first(), lines.get(1)) else {
        tracing::error!(text, "unable to parse data returned by PUMAPI");
        return Err(PpmsError::format(text, "response has no data line"));
    };

    let mut header = split_fields(header_line);
    let mut data = normalize_row(split_fields(data_line));
    reconcile(&mut header, &mut data, graceful).map_err(|reason| PpmsError::format(text, reason))?;

    Ok(header.into_iter().zip(data).collect())
}

/// Decode a multi-line response: a header line followed by any number of
/// data lines.
pub fn decode_table(text: &str, graceful: bool) -> Result<ParsedTable> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < 2 {
        info!(text, "response has less than two lines");
        if !graceful {
            return Err(PpmsError::NoData(text.to_string()));
        }
        return Ok(ParsedTable::default());
    }

    let mut header: Vec<String> = lines[0].split(',').map(|f| f.trim().to_string()).collect();
    let mut min_width = header.len();
    let mut max_width = header.len();
    let mut records: Vec<Record> = Vec::with_capacity(lines.len() - 1);

    for line in &lines[1..] {
        let mut data = normalize_row(split_fields(line));
        min_width = min_width.min(data.len());
        max_width = max_width.max(data.len());
        reconcile(&mut header, &mut data, graceful)
            .map_err(|reason| PpmsError::format(text, reason))?;
        records.push(header.iter().cloned().zip(data).collect());
    }

    if min_width != max_width {
        warn!(
            min_width,
            max_width, "inconsistent data detected, not all records have the same number of fields"
        );
    }

    Ok(ParsedTable {
        records,
        min_width,
        max_width,
    })
}
