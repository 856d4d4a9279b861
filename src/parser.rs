//! Parser for RouterOS terminal output.
//!
//! RouterOS prints records as whitespace separated `key=value` tokens, usually
//! prefixed with an index number and a few single-letter flags:
//!
//! ```text
//! Flags: X - disabled, D - dynamic
//!  0   list=blocked address=10.0.0.5 comment="port scan"
//!  1 X list=blocked address=10.0.0.6
//! ```
//!
//! [`parse`] turns such output into one [`Record`] per block. It never fails:
//! anything it does not understand is skipped.

use std::collections::BTreeMap;

use log::trace;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};

/// Header lines that never carry record data.
const BANNER_PREFIXES: &[&str] = &["Flags:", "Columns:"];

static INDEX_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+").unwrap());
static FILLER_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[#\s]*$").unwrap());
static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

/// Value of a single field in a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Value of a `key=value` token, quotes stripped.
    Text(String),
    /// A bare token such as `X` or `disabled`.
    Flag,
}

impl FieldValue {
    /// The text value, `None` for flags.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Flag => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(s) => serializer.serialize_str(s),
            FieldValue::Flag => serializer.serialize_bool(true),
        }
    }
}

/// One parsed device entity. Never empty when returned by [`parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Record(BTreeMap<String, FieldValue>);

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a field, replacing an earlier value for the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) {
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Text value of `key`; `None` when absent or a bare flag.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    /// Text value of `key`, or `default` when absent or a flag.
    pub fn text_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.text(key).unwrap_or(default)
    }

    /// True for a bare flag or a `true`/`yes` value.
    pub fn is_set(&self, key: &str) -> bool {
        match self.get(key) {
            Some(FieldValue::Flag) => true,
            Some(FieldValue::Text(v)) => v == "true" || v == "yes",
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

enum BlockState {
    BetweenBlocks,
    InBlock(Record),
}

struct Scanner {
    state: BlockState,
    records: Vec<Record>,
}

impl Scanner {
    fn new() -> Self {
        Self {
            state: BlockState::BetweenBlocks,
            records: Vec::new(),
        }
    }

    fn in_block(&self) -> bool {
        matches!(self.state, BlockState::InBlock(_))
    }

    /// Closes the current block, if any.
    fn flush(&mut self) {
        if let BlockState::InBlock(record) =
            std::mem::replace(&mut self.state, BlockState::BetweenBlocks)
            && !record.is_empty()
        {
            self.records.push(record);
        }
    }

    fn store(&mut self, key: String, value: FieldValue) {
        match &mut self.state {
            BlockState::InBlock(record) => record.insert(key, value),
            BlockState::BetweenBlocks => {
                let mut record = Record::new();
                record.insert(key, value);
                self.state = BlockState::InBlock(record);
            }
        }
    }

    fn line(&mut self, line: &str) {
        if line.is_empty()
            || BANNER_PREFIXES.iter().any(|p| line.starts_with(p))
            || FILLER_LINE.is_match(line)
        {
            trace!("skip {line:?}");
            return;
        }

        if INDEX_LINE.is_match(line) || (self.in_block() && line.contains('=')) {
            self.flush();
        }

        for token in tokenize(line) {
            if let Some((key, value)) = token.split_once('=') {
                let key = key.trim();
                if !key.is_empty() {
                    self.store(key.to_string(), FieldValue::Text(unquote(value)));
                }
            } else if !NUMERIC_TOKEN.is_match(token) {
                self.store(token.to_string(), FieldValue::Flag);
            }
        }
    }

    fn finish(mut self) -> Vec<Record> {
        self.flush();
        self.records
    }
}

/// Parses the full text reply of one RouterOS command.
pub fn parse(raw: &str) -> Vec<Record> {
    let mut scanner = Scanner::new();
    for line in raw.trim().split('\n') {
        scanner.line(line.trim());
    }
    scanner.finish()
}

/// Like [`parse`], for output that may not be valid UTF-8. Non-text input
/// yields no records.
pub fn parse_bytes(raw: &[u8]) -> Vec<Record> {
    match std::str::from_utf8(raw) {
        Ok(text) => parse(text),
        Err(_) => Vec::new(),
    }
}

/// Splits a line on runs of whitespace. Whitespace inside a quoted value
/// (`key="a b"`) does not split; a quote only opens at the start of a token
/// or right after `=`. A quote left open at the end of the line protects
/// nothing and the rest of the line is split on whitespace.
fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;

    for (idx, ch) in line.char_indices() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch.is_whitespace() => {
                if let Some(s) = start.take() {
                    tokens.push(&line[s..idx]);
                }
            }
            None => {
                let token_start = start.is_none();
                if token_start {
                    start = Some(idx);
                }
                if (ch == '"' || ch == '\'') && (token_start || prev == Some('=')) {
                    quote = Some(ch);
                }
            }
        }
        prev = Some(ch);
    }
    if let Some(s) = start {
        if quote.is_some() {
            tokens.extend(line[s..].split_whitespace());
        } else {
            tokens.push(&line[s..]);
        }
    }
    tokens
}

/// Strips surrounding quotes and whitespace from a value.
fn unquote(value: &str) -> String {
    let is_quote = |c: char| c == '"' || c == '\'';
    let mut v = value;
    let mut chars = v.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if first == last && is_quote(first) => {
            v = &v[1..v.len() - 1];
        }
        _ => {
            v = v.strip_prefix(is_quote).unwrap_or(v);
            v = v.strip_suffix(is_quote).unwrap_or(v);
        }
    }
    v.trim().to_string()
}
