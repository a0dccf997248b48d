//! Front-matter codec.
//!
//! A managed document starts with a `---` line, carries a key/value mapping,
//! and closes the block with a second `---` line. Nested mappings under a key
//! are carried as opaque text. Everything after
//! the closing line is the body and is never interpreted here.
//!
//! The codec keeps the source text of every field it did not modify, so
//! `encode(decode(f)) == f` holds for any well-formed input. Modified fields
//! are re-rendered in block style with their original quote style.

use crate::core::error::DmctError;
use serde::Serialize;

pub const DELIMITER: &str = "---";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    Plain,
    Single,
    Double,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Scalar(String),
    Sequence(Vec<String>),
    /// Indented block under a key that is neither a sequence nor a block
    /// scalar, dedented but otherwise uninterpreted.
    Mapping(String),
}

impl FieldValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(s) => Some(s),
            FieldValue::Sequence(_) | FieldValue::Mapping(_) => None,
        }
    }

    /// Scalars split on commas, sequences as-is. Empty items are dropped.
    pub fn items(&self) -> Vec<String> {
        match self {
            FieldValue::Scalar(s) => s
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            FieldValue::Sequence(items) => items
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            FieldValue::Mapping(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: FieldValue,
    quote: QuoteStyle,
    /// Verbatim source lines; dropped once the field is modified.
    source: Option<String>,
}

impl Field {
    fn new(key: &str, value: FieldValue, quote: QuoteStyle) -> Self {
        Self {
            key: key.to_string(),
            value,
            quote,
            source: None,
        }
    }

    pub fn quote_style(&self) -> QuoteStyle {
        self.quote
    }

    fn render(&self) -> String {
        match &self.value {
            FieldValue::Scalar(s) => format!("{}: {}\n", self.key, render_scalar(s, self.quote)),
            FieldValue::Sequence(items) if items.is_empty() => format!("{}: []\n", self.key),
            FieldValue::Sequence(items) => {
                let mut out = format!("{}:\n", self.key);
                for item in items {
                    out.push_str(&format!("  - {}\n", render_scalar(item, QuoteStyle::Plain)));
                }
                out
            }
            FieldValue::Mapping(text) => {
                let mut out = format!("{}:\n", self.key);
                for line in text.lines() {
                    if !line.is_empty() {
                        out.push_str("  ");
                        out.push_str(line);
                    }
                    out.push('\n');
                }
                out
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Field(Field),
    /// Blank and comment lines inside the block.
    Verbatim(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    entries: Vec<Entry>,
    closing_newline: bool,
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            closing_newline: true,
        }
    }
}

impl FrontMatter {
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Field(f) => Some(f),
            Entry::Verbatim(_) => None,
        })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields().map(|f| f.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Last occurrence wins, matching YAML loaders that accept duplicate keys.
    pub fn field(&self, key: &str) -> Option<&Field> {
        self.fields().filter(|f| f.key == key).last()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.field(key).map(|f| &f.value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_scalar)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.field(key).is_some()
    }

    /// Sets a scalar, keeping the field's position and quote style. New keys
    /// go after the last existing field, double-quoted. Returns true when the
    /// stored value changed.
    pub fn set_scalar(&mut self, key: &str, value: impl Into<String>) -> bool {
        let value = FieldValue::Scalar(value.into());
        let existing = self.entries.iter_mut().rev().find_map(|e| match e {
            Entry::Field(f) if f.key == key => Some(f),
            _ => None,
        });
        match existing {
            Some(field) => {
                if field.value == value {
                    return false;
                }
                field.value = value;
                field.source = None;
                true
            }
            None => {
                let at = self
                    .entries
                    .iter()
                    .rposition(|e| matches!(e, Entry::Field(_)))
                    .map_or(0, |i| i + 1);
                self.entries
                    .insert(at, Entry::Field(Field::new(key, value, QuoteStyle::Double)));
                true
            }
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            match entry {
                Entry::Verbatim(text) => out.push_str(text),
                Entry::Field(f) => match &f.source {
                    Some(src) => out.push_str(src),
                    None => out.push_str(&f.render()),
                },
            }
        }
        out
    }
}

/// Splits `text` into its front-matter mapping and body.
pub fn decode(text: &str) -> Result<(FrontMatter, String), DmctError> {
    let Some(rest) = text.strip_prefix("---\n") else {
        return Err(DmctError::MalformedFrontMatter(
            "file does not begin with a `---` line".to_string(),
        ));
    };

    let mut offset = 0usize;
    let mut block_end = None;
    for line in rest.split_inclusive('\n') {
        let content = line.strip_suffix('\n').unwrap_or(line);
        if content == DELIMITER {
            block_end = Some((offset, offset + line.len(), line.ends_with('\n')));
            break;
        }
        offset += line.len();
    }

    let Some((block_len, body_start, closing_newline)) = block_end else {
        return Err(DmctError::MalformedFrontMatter(
            "missing closing `---` delimiter".to_string(),
        ));
    };

    let mut fm = parse_block(&rest[..block_len])?;
    fm.closing_newline = closing_newline;
    Ok((fm, rest[body_start..].to_string()))
}

/// Serializes a mapping and body back into a full document.
pub fn encode(fm: &FrontMatter, body: &str) -> String {
    let mut out = String::with_capacity(body.len() + 256);
    out.push_str(DELIMITER);
    out.push('\n');
    out.push_str(&fm.render());
    out.push_str(DELIMITER);
    if fm.closing_newline {
        out.push('\n');
    }
    out.push_str(body);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuation {
    None,
    MaybeSequence,
    Sequence,
    Literal,
    Folded,
    Nested,
}

fn parse_block(block: &str) -> Result<FrontMatter, DmctError> {
    let mut fm = FrontMatter::default();
    let mut current: Option<(Field, Continuation, Vec<String>)> = None;

    for (idx, line) in block.split_inclusive('\n').enumerate() {
        let line_num = idx + 2;
        let content = line.strip_suffix('\n').unwrap_or(line);
        let trimmed = content.trim();
        let indented = content.starts_with(' ') || content.starts_with('\t');

        if let Some((field, mode, lines)) = current.as_mut() {
            let in_block_scalar = matches!(mode, Continuation::Literal | Continuation::Folded);
            if in_block_scalar && (indented || trimmed.is_empty()) {
                lines.push(content.to_string());
                push_source(field, line);
                continue;
            }
            if indented && !trimmed.is_empty() {
                if *mode == Continuation::Nested {
                    push_source(field, line);
                    continue;
                }
                if matches!(mode, Continuation::MaybeSequence | Continuation::Sequence)
                    && list_item(trimmed).is_none()
                    && !trimmed.starts_with('#')
                {
                    *mode = Continuation::Nested;
                    push_source(field, line);
                    continue;
                }
                if let Some(folded) = wrapped_plain_scalar(field, *mode, trimmed) {
                    field.value = FieldValue::Scalar(folded);
                    push_source(field, line);
                    continue;
                }
            }
            if let Some(item) = list_item(trimmed).filter(|_| {
                matches!(mode, Continuation::MaybeSequence | Continuation::Sequence)
            }) {
                *mode = Continuation::Sequence;
                lines.push(parse_scalar(item).0);
                push_source(field, line);
                continue;
            }
            if indented && !trimmed.is_empty() && !trimmed.starts_with('#') {
                return Err(DmctError::MalformedFrontMatter(format!(
                    "line {}: unexpected indented content under `{}`",
                    line_num, field.key
                )));
            }
        }

        if trimmed.is_empty() || trimmed.starts_with('#') {
            finish(&mut fm, current.take());
            fm.entries.push(Entry::Verbatim(line.to_string()));
            continue;
        }

        if indented || list_item(trimmed).is_some() {
            return Err(DmctError::MalformedFrontMatter(format!(
                "line {}: continuation without a key",
                line_num
            )));
        }

        let Some((key, raw_value)) = split_key_value(content) else {
            return Err(DmctError::MalformedFrontMatter(format!(
                "line {}: expected `key: value`",
                line_num
            )));
        };

        finish(&mut fm, current.take());

        let (value, quote, mode) = match raw_value {
            "" => (FieldValue::Scalar(String::new()), QuoteStyle::Plain, Continuation::MaybeSequence),
            v if v.starts_with('[') && v.ends_with(']') => (
                FieldValue::Sequence(parse_flow_sequence(v)),
                QuoteStyle::Plain,
                Continuation::None,
            ),
            v if is_block_indicator(v, '|') => {
                (FieldValue::Scalar(String::new()), QuoteStyle::Plain, Continuation::Literal)
            }
            v if is_block_indicator(v, '>') => {
                (FieldValue::Scalar(String::new()), QuoteStyle::Plain, Continuation::Folded)
            }
            v => {
                let (s, quote) = parse_scalar(v);
                (FieldValue::Scalar(s), quote, Continuation::None)
            }
        };

        let mut field = Field::new(key, value, quote);
        field.source = Some(line.to_string());
        current = Some((field, mode, Vec::new()));
    }

    finish(&mut fm, current.take());
    Ok(fm)
}

fn push_source(field: &mut Field, line: &str) {
    if let Some(src) = field.source.as_mut() {
        src.push_str(line);
    }
}

fn finish(fm: &mut FrontMatter, current: Option<(Field, Continuation, Vec<String>)>) {
    let Some((mut field, mode, lines)) = current else {
        return;
    };
    match mode {
        Continuation::Sequence => field.value = FieldValue::Sequence(lines),
        Continuation::Literal => field.value = FieldValue::Scalar(dedent(&lines).join("\n")),
        Continuation::Folded => field.value = FieldValue::Scalar(dedent(&lines).join(" ")),
        Continuation::Nested => {
            let raw: Vec<String> = field
                .source
                .as_deref()
                .unwrap_or("")
                .lines()
                .skip(1)
                .map(str::to_string)
                .collect();
            field.value = FieldValue::Mapping(dedent(&raw).join("\n"));
        }
        Continuation::None | Continuation::MaybeSequence => {}
    }
    fm.entries.push(Entry::Field(field));
}

/// Plain scalars may wrap onto indented lines; YAML folds them with a space.
fn wrapped_plain_scalar(field: &Field, mode: Continuation, trimmed: &str) -> Option<String> {
    if mode != Continuation::None || field.quote != QuoteStyle::Plain || trimmed.starts_with('#') {
        return None;
    }
    match &field.value {
        FieldValue::Scalar(s) if !s.is_empty() => {
            let next = parse_scalar(trimmed).0;
            Some(format!("{} {}", s, next))
        }
        _ => None,
    }
}

fn dedent(lines: &[String]) -> Vec<String> {
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| l.get(indent..).unwrap_or("").trim_end().to_string())
        .collect()
}

fn is_block_indicator(value: &str, marker: char) -> bool {
    let mut chars = value.chars();
    chars.next() == Some(marker) && chars.all(|c| c == '-' || c == '+' || c.is_ascii_digit())
}

fn list_item(trimmed: &str) -> Option<&str> {
    if trimmed == "-" {
        return Some("");
    }
    trimmed.strip_prefix("- ")
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    if key.is_empty()
        || !key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return None;
    }
    if !value.is_empty() && !value.starts_with(' ') && !value.starts_with('\t') {
        return None;
    }
    Some((key, value.trim()))
}

fn parse_flow_sequence(value: &str) -> Vec<String> {
    let inner = &value[1..value.len() - 1];
    inner
        .split(',')
        .map(|item| parse_scalar(item.trim()).0)
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_scalar(value: &str) -> (String, QuoteStyle) {
    let value = value.trim();
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        return (unescape_double(inner), QuoteStyle::Double);
    }
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        let inner = &value[1..value.len() - 1];
        return (inner.replace("''", "'"), QuoteStyle::Single);
    }
    let plain = match value.find(" #") {
        Some(pos) => value[..pos].trim_end(),
        None => value,
    };
    (plain.to_string(), QuoteStyle::Plain)
}

fn unescape_double(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn render_scalar(value: &str, quote: QuoteStyle) -> String {
    match quote {
        QuoteStyle::Double => format!(
            "\"{}\"",
            value
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n")
        ),
        QuoteStyle::Single if !value.contains('\n') => format!("'{}'", value.replace('\'', "''")),
        _ if is_plain_safe(value) => value.to_string(),
        _ => render_scalar(value, QuoteStyle::Double),
    }
}

fn is_plain_safe(value: &str) -> bool {
    let Some(first) = value.chars().next() else {
        return false;
    };
    if "-?:,[]{}#&*!|>'\"%@`".contains(first) || first.is_whitespace() {
        return false;
    }
    !value.contains(": ")
        && !value.contains(" #")
        && !value.contains('\n')
        && !value.ends_with(' ')
        && !value.ends_with(':')
}
