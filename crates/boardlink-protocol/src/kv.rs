//! Flat, line-oriented `key=value` payload encoding.
//!
//! Used by the lobby and dialog payloads. One field per line; the first raw
//! `=` on a line separates key from value. Keys and values are escaped so
//! that no line terminator and no `=` ever appears raw inside them:
//!
//! | raw             | escaped |
//! |-----------------|---------|
//! | `\`             | `\\`    |
//! | newline         | `\n`    |
//! | carriage return | `\r`    |
//! | `=`             | `\e`    |
//!
//! On decode, an unknown escape keeps the character after the backslash
//! and drops the backslash. The format never nests.

use std::fmt;
use std::str::FromStr;

use crate::ProtocolError;

/// An ordered list of `key=value` fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KvMap {
    fields: Vec<(String, String)>,
}

impl KvMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(field) => field.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The value of `key`, or an error naming the missing field.
    pub fn require(&self, key: &str) -> Result<&str, ProtocolError> {
        self.get(key).ok_or_else(|| ProtocolError::missing(key))
    }

    /// Parses the value of `key` with [`FromStr`].
    pub fn parse_field<T: FromStr>(&self, key: &str) -> Result<T, ProtocolError> {
        self.require(key)?
            .trim()
            .parse()
            .map_err(|_| ProtocolError::wrong_type(key, std::any::type_name::<T>()))
    }

    /// Like [`parse_field`](Self::parse_field) but `None` when absent.
    pub fn parse_optional<T: FromStr>(&self, key: &str) -> Result<Option<T>, ProtocolError> {
        match self.get(key) {
            None => Ok(None),
            Some(_) => self.parse_field(key).map(Some),
        }
    }

    /// Renders the fields, one per line, with no trailing newline.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            escape_into(&mut out, key);
            out.push('=');
            escape_into(&mut out, value);
        }
        out
    }

    /// Parses the flat form produced by [`encode`](Self::encode).
    ///
    /// Blank lines are skipped. A non-blank line with no `=` is malformed.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let mut map = KvMap::new();
        for (n, line) in text.split('\n').enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.trim().is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ProtocolError::MalformedMessage(format!(
                    "line {} has no `=`",
                    n + 1
                ))
            })?;
            map.insert(unescape(key), unescape(value));
        }
        Ok(map)
    }
}

impl fmt::Display for KvMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Escapes a single key or value.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    escape_into(&mut out, raw);
    out
}

fn escape_into(out: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '=' => out.push_str("\\e"),
            c => out.push(c),
        }
    }
}

/// Reverses [`escape`].
pub fn unescape(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('e') => out.push('='),
            Some(other) => out.push(other),
            // A lone trailing backslash has nothing to escape.
            None => {}
        }
    }
    out
}
