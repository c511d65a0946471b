//! Canonical text encoding shared by every wire record.
//!
//! A record is rendered as `Name [key1:v1, key2:v2]` where every value is the standard, padded
//! base64 of its UTF-8 text. Field order is fixed per record type and decoding is strict:
//! unknown, missing or reordered keys are errors. Because hashes and signatures are computed
//! over this text, `decode(encode(x))` must re-encode to the identical bytes.

use crate::error::ChainError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::str::FromStr;

const FIELD_SEPARATOR: &str = ", ";

pub fn encode_b64(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

pub fn decode_b64(encoded: &str) -> Result<String, ChainError> {
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(String::from_utf8(bytes)?)
}

/// Encodes a list of already-rendered records: each item is base64'd, then joined.
pub fn encode_list<I>(items: I) -> String
where
    I: IntoIterator<Item = String>,
{
    items
        .into_iter()
        .map(|item| encode_b64(&item))
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR)
}

pub fn decode_list(text: &str) -> Result<Vec<String>, ChainError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(FIELD_SEPARATOR).map(decode_b64).collect()
}

/// Builds one canonical record.
pub struct RecordWriter {
    name: &'static str,
    fields: Vec<String>,
}

impl RecordWriter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: &'static str, value: impl AsRef<str>) -> Self {
        self.fields
            .push(format!("{}:{}", key, encode_b64(value.as_ref())));
        self
    }

    pub fn finish(self) -> String {
        format!("{} [{}]", self.name, self.fields.join(FIELD_SEPARATOR))
    }
}

/// Reads the fields of one canonical record in their declared order.
pub struct RecordReader {
    name: &'static str,
    fields: std::vec::IntoIter<(String, String)>,
}

impl RecordReader {
    pub fn parse(name: &'static str, text: &str) -> Result<Self, ChainError> {
        let body = text
            .trim()
            .strip_prefix(name)
            .and_then(|rest| rest.strip_prefix(" ["))
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| ChainError::Codec(format!("expected a {} record", name)))?;

        let mut fields = Vec::new();
        if !body.is_empty() {
            for part in body.split(FIELD_SEPARATOR) {
                let (key, value) = part.split_once(':').ok_or_else(|| {
                    ChainError::Codec(format!("{} field without key: {}", name, part))
                })?;
                fields.push((key.to_string(), decode_b64(value)?));
            }
        }

        Ok(Self {
            name,
            fields: fields.into_iter(),
        })
    }

    /// Returns the decoded value of the next field, which must be `key`.
    pub fn next(&mut self, key: &str) -> Result<String, ChainError> {
        match self.fields.next() {
            Some((found, value)) if found == key => Ok(value),
            Some((found, _)) => Err(ChainError::Codec(format!(
                "{} record: expected field '{}', found '{}'",
                self.name, key, found
            ))),
            None => Err(ChainError::Codec(format!(
                "{} record: missing field '{}'",
                self.name, key
            ))),
        }
    }

    pub fn next_parsed<T>(&mut self, key: &str) -> Result<T, ChainError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.next(key)?;
        raw.parse::<T>().map_err(|e| {
            ChainError::Codec(format!(
                "{} record: field '{}' has invalid value '{}': {}",
                self.name, key, raw, e
            ))
        })
    }

    /// Fails if fields remain after the last expected key.
    pub fn finish(mut self) -> Result<(), ChainError> {
        match self.fields.next() {
            None => Ok(()),
            Some((key, _)) => Err(ChainError::Codec(format!(
                "{} record: unexpected field '{}'",
                self.name, key
            ))),
        }
    }
}
