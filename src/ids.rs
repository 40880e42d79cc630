//! Identifier sets, relationship maps and key normalization.
//!
//! Identifier sets and relationship maps are the only structures the
//! engine holds in full; their size grows with the number of distinct
//! identifiers, not with the size of the streams being processed.

use crate::error::{EngineError, Result};
use crate::fasta::FastaReader;
use crate::streaming::{LineSource, OutputSink, RecordWriter};
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::{BufRead, Write};
use std::path::Path;

/// Header line of relationship files.
pub const RELATIONSHIP_HEADER: &str = "\"new_id\";\"old_id\"";

/// Presence-only identifier set.
#[derive(Debug, Default, Clone)]
pub struct IdentifierSet {
    ids: FxHashSet<String>,
}

impl IdentifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an identifier list: one id per line (first whitespace token),
    /// blank lines and `#` comments ignored.
    pub fn from_list_file(path: &Path) -> Result<Self> {
        Self::from_list_source(LineSource::from_path(path)?)
    }

    /// Load an identifier list from any buffered source.
    pub fn from_list_reader<R: BufRead>(reader: R) -> Result<Self> {
        Self::from_list_source(LineSource::new(reader, "<memory>"))
    }

    fn from_list_source<R: BufRead>(mut source: LineSource<R>) -> Result<Self> {
        let mut set = Self::new();
        while let Some(line) = source.next_line()? {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(id) = line.split_whitespace().next() {
                set.insert(id);
            }
        }
        Ok(set)
    }

    /// Collect the header identifiers of a FASTA stream.
    pub fn from_fasta<R: BufRead>(mut reader: FastaReader<R>) -> Result<Self> {
        let mut set = Self::new();
        while let Some(record) = reader.read_record()? {
            set.ids.insert(record.seq_id);
        }
        Ok(set)
    }

    pub fn insert(&mut self, id: &str) -> bool {
        self.ids.insert(id.to_string())
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for IdentifierSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id.as_ref());
        }
        set
    }
}

/// One-to-one mapping between new (internal) and old (original) ids.
///
/// An empty map translates every id to itself. A non-empty map is
/// mandatory: translating an absent id is a lookup error.
#[derive(Debug, Default, Clone)]
pub struct IdRelationshipMap {
    new_to_old: FxHashMap<String, String>,
    old_to_new: FxHashMap<String, String>,
}

impl IdRelationshipMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a relationship file: header line then `"new_id";"old_id"` rows.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_source(LineSource::from_path(path)?)
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        Self::from_source(LineSource::new(reader, "<memory>"))
    }

    fn from_source<R: BufRead>(mut source: LineSource<R>) -> Result<Self> {
        let mut map = Self::new();
        let mut row = 0;
        let mut header_seen = false;
        while let Some(line) = source.next_line()? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !header_seen {
                header_seen = true;
                continue;
            }
            row += 1;

            let pair = line
                .split_once(';')
                .map(|(new_id, old_id)| (unquote(new_id), unquote(old_id)));
            let (new_id, old_id) = match pair {
                Some((n, o)) if !n.is_empty() && !o.is_empty() && !o.contains(';') => (n, o),
                _ => {
                    let message = format!("expected \"new_id\";\"old_id\", found '{}'", line);
                    return Err(EngineError::format(source.name(), row, message));
                }
            };
            let (new_id, old_id) = (new_id.to_string(), old_id.to_string());
            map.insert(new_id, old_id)
                .map_err(|message| EngineError::format(source.name(), row, message))?;
        }
        Ok(map)
    }

    /// Add a pair, rejecting anything that would break the one-to-one
    /// invariant.
    pub fn insert(&mut self, new_id: String, old_id: String) -> std::result::Result<(), String> {
        if self.new_to_old.contains_key(&new_id) {
            return Err(format!("new id '{}' mapped twice", new_id));
        }
        if self.old_to_new.contains_key(&old_id) {
            return Err(format!("old id '{}' mapped twice", old_id));
        }
        self.old_to_new.insert(old_id.clone(), new_id.clone());
        self.new_to_old.insert(new_id, old_id);
        Ok(())
    }

    pub fn old_id(&self, new_id: &str) -> Option<&str> {
        self.new_to_old.get(new_id).map(String::as_str)
    }

    pub fn new_id(&self, old_id: &str) -> Option<&str> {
        self.old_to_new.get(old_id).map(String::as_str)
    }

    /// Translate a new id back to its old id.
    pub fn restore<'a>(&'a self, new_id: &'a str) -> Result<&'a str> {
        if self.is_empty() {
            return Ok(new_id);
        }
        self.old_id(new_id).ok_or_else(|| EngineError::Lookup {
            id: new_id.to_string(),
            context: "the identifier relationship map".to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.new_to_old.len()
    }

    pub fn is_empty(&self) -> bool {
        self.new_to_old.is_empty()
    }
}

/// Writes a relationship file incrementally, one pair per record.
pub struct RelationshipWriter<W: Write> {
    writer: RecordWriter<W>,
}

impl<W: Write> RelationshipWriter<W> {
    pub fn new(output: W, name: impl Into<String>) -> Result<Self> {
        let mut writer = RecordWriter::new(output, name);
        writer.write_line(RELATIONSHIP_HEADER)?;
        Ok(Self { writer })
    }

    pub fn write_pair(&mut self, new_id: &str, old_id: &str) -> Result<()> {
        self.writer.write_bytes(b"\"")?;
        self.writer.write_bytes(new_id.as_bytes())?;
        self.writer.write_bytes(b"\";\"")?;
        self.writer.write_bytes(old_id.as_bytes())?;
        self.writer.write_bytes(b"\"")?;
        self.writer.write_newline()
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer.into_inner()
    }
}

impl RelationshipWriter<OutputSink> {
    /// Flush and close the relationship file.
    pub fn finish(self) -> Result<()> {
        self.writer.finish()
    }
}

fn unquote(raw: &str) -> &str {
    let raw = raw.trim();
    raw.strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw)
}

/// How a key matched by a [`NormalizationRule`] is shortened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truncation {
    /// Use the key as is.
    Keep,
    /// Cut at the first occurrence of the character.
    AtFirst(char),
    /// Cut before the n-th occurrence of the character (n >= 1).
    AtNth(char, usize),
}

impl Truncation {
    fn apply<'a>(&self, key: &'a str) -> &'a str {
        match *self {
            Truncation::Keep => key,
            Truncation::AtFirst(c) => key.split(c).next().unwrap_or(key),
            Truncation::AtNth(c, n) => match key.match_indices(c).nth(n.saturating_sub(1)) {
                Some((idx, _)) => &key[..idx],
                None => key,
            },
        }
    }
}

/// Prefix-selected truncation of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizationRule {
    pub prefix: String,
    pub truncation: Truncation,
}

impl NormalizationRule {
    pub fn new(prefix: impl Into<String>, truncation: Truncation) -> Self {
        Self {
            prefix: prefix.into(),
            truncation,
        }
    }

    /// Parse `PREFIX=first:C`, `PREFIX=nth:C:N` or `PREFIX=keep`.
    ///
    /// The prefix may be empty to match every key.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || {
            EngineError::Argument(format!(
                "invalid normalization rule '{}' (expected PREFIX=keep, PREFIX=first:C or PREFIX=nth:C:N)",
                spec
            ))
        };
        let (prefix, strategy) = spec.rsplit_once('=').ok_or_else(invalid)?;
        let mut parts = strategy.split(':');
        let truncation = match parts.next() {
            Some("keep") => Truncation::Keep,
            Some("first") => {
                let c = single_char(parts.next()).ok_or_else(invalid)?;
                Truncation::AtFirst(c)
            }
            Some("nth") => {
                let c = single_char(parts.next()).ok_or_else(invalid)?;
                let n = parts
                    .next()
                    .and_then(|n| n.parse::<usize>().ok())
                    .filter(|&n| n >= 1)
                    .ok_or_else(invalid)?;
                Truncation::AtNth(c, n)
            }
            _ => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self::new(prefix, truncation))
    }
}

fn single_char(s: Option<&str>) -> Option<char> {
    let s = s?;
    let mut chars = s.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

/// Ordered list of normalization rules; the first matching prefix wins.
///
/// Reduces upstream identifiers that embed extra parts to the canonical
/// form present in identifier sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNormalizer {
    rules: Vec<NormalizationRule>,
}

impl Default for KeyNormalizer {
    fn default() -> Self {
        Self::new(vec![
            NormalizationRule::new("gi|", Truncation::AtNth('|', 2)),
            NormalizationRule::new("", Truncation::AtFirst(' ')),
        ])
    }
}

impl KeyNormalizer {
    pub fn new(rules: Vec<NormalizationRule>) -> Self {
        Self { rules }
    }

    /// A normalizer that leaves every key untouched.
    pub fn identity() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rules(&self) -> &[NormalizationRule] {
        &self.rules
    }

    #[inline]
    pub fn normalize<'a>(&self, key: &'a str) -> &'a str {
        self.rules
            .iter()
            .find(|rule| key.starts_with(rule.prefix.as_str()))
            .map(|rule| rule.truncation.apply(key))
            .unwrap_or(key)
    }
}
