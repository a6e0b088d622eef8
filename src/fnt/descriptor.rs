//! Text-format BMFont descriptor primitives.
//! - Line splitter that keeps each line's own terminator ("\n", "\r\n" or none)
//! - Tolerant `key=value` tokenizer: any field order, quoted values, unknown keys kept
//! - `GlyphRecord` parse + canonical re-serialization of `char` lines
//! - No regex; byte scanning only, borrowed slices wherever possible

use std::fmt::Write as _;
use std::str::FromStr;

use log::debug;
use serde::Serialize;

use crate::error::DescriptorError;

/// Leading token of a glyph-record line. `chars count=N` is NOT a glyph line.
pub const GLYPH_MARKER: &str = "char";

const MANDATORY_FIELDS: [&str; 8] = [
    "id", "x", "y", "width", "height", "xoffset", "yoffset", "xadvance",
];

/* ======================= LINES ======================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLine<'a> {
    /// 1-based line number.
    pub number: usize,
    pub body: &'a str,
    pub terminator: &'a str,
}

pub struct Lines<'a> {
    rest: &'a str,
    number: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = RawLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        self.number += 1;
        let (body, terminator, rest) = match self.rest.find('\n') {
            Some(nl) => {
                let line = &self.rest[..nl];
                let rest = &self.rest[nl + 1..];
                match line.strip_suffix('\r') {
                    Some(body) => (body, &self.rest[nl - 1..=nl], rest),
                    None => (line, &self.rest[nl..=nl], rest),
                }
            }
            None => (self.rest, "", ""),
        };
        self.rest = rest;
        Some(RawLine {
            number: self.number,
            body,
            terminator,
        })
    }
}

/// Splits `text` into lines without losing a single byte: concatenating
/// `body + terminator` of every item reproduces the input.
#[inline(always)]
pub const fn split_lines(text: &str) -> Lines<'_> {
    Lines {
        rest: text,
        number: 0,
    }
}

/// First whitespace-delimited token of a line (the record tag: info, common, char...).
#[inline(always)]
#[must_use]
pub fn record_tag(body: &str) -> Option<&str> {
    body.split_ascii_whitespace().next()
}

#[inline(always)]
pub fn is_glyph_line(body: &str) -> bool {
    record_tag(body) == Some(GLYPH_MARKER)
}

/// Text after the record tag. Empty when the line has no tag.
#[inline(always)]
fn after_tag(body: &str) -> &str {
    let t = body.trim_start();
    t.find(|c: char| c.is_ascii_whitespace())
        .map_or("", |i| &t[i..])
}

/* ======================= FIELDS ======================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    pub key: &'a str,
    /// Value with surrounding quotes removed.
    pub value: &'a str,
    /// Token exactly as written (`file="a b.png"`).
    pub raw: &'a str,
}

#[inline(always)]
fn unquote(v: &str) -> &str {
    if v.len() >= 2 && v.starts_with('"') && v.ends_with('"') {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

/// Tokenizes `key=value key2="quoted value" ...`. Tokens without `=` come back
/// with an empty value. Allocation-free apart from the returned Vec.
pub fn fields(s: &str) -> Vec<Field<'_>> {
    let bytes = s.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let start = i;
        let mut eq = None;
        let mut in_quotes = false;
        while i < bytes.len() {
            match bytes[i] {
                b'"' => in_quotes = !in_quotes,
                b'=' if !in_quotes && eq.is_none() => eq = Some(i),
                b if !in_quotes && b.is_ascii_whitespace() => break,
                _ => {}
            }
            i += 1;
        }
        let raw = &s[start..i];
        let (key, value) = match eq {
            Some(e) => (&s[start..e], unquote(&s[e + 1..i])),
            None => (raw, ""),
        };
        out.push(Field { key, value, raw });
    }
    out
}

/// Fields of a whole line, record tag skipped.
#[inline(always)]
pub fn line_fields(body: &str) -> Vec<Field<'_>> {
    fields(after_tag(body))
}

/* ======================= GLYPH RECORDS ======================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldLayout {
    /// `id x y xoffset yoffset width height xadvance` + unrecognized fields.
    #[default]
    Complete,
    /// `id xoffset yoffset width height xadvance`; atlas position and extras dropped.
    Legacy,
}

impl FieldLayout {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "Complete",
            Self::Legacy => "Legacy",
        }
    }
}

impl FromStr for FieldLayout {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "complete" => Ok(Self::Complete),
            "legacy" => Ok(Self::Legacy),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraField {
    pub key: String,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlyphRecord {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub xoffset: i32,
    pub yoffset: i32,
    pub xadvance: i32,
    /// Unrecognized fields in original order (`page=0`, `chnl=15`, ...).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<ExtraField>,
}

impl GlyphRecord {
    /// Parses a `char` line. `line` is only used for error reporting.
    pub fn parse(body: &str, line: usize) -> Result<Self, DescriptorError> {
        let mut found: [Option<&str>; 8] = [None; 8];
        let mut extra = Vec::new();
        for f in line_fields(body) {
            match MANDATORY_FIELDS.iter().position(|&k| k == f.key) {
                Some(slot) => match found[slot] {
                    // First occurrence wins.
                    Some(kept) => debug!(
                        "line {line}: duplicate {}={:?} ignored, keeping {kept:?}",
                        f.key, f.value
                    ),
                    None => found[slot] = Some(f.value),
                },
                None => extra.push(ExtraField {
                    key: f.key.to_string(),
                    raw: f.raw.to_string(),
                }),
            }
        }

        let missing: Vec<&'static str> = MANDATORY_FIELDS
            .iter()
            .zip(found.iter())
            .filter(|(_, v)| v.is_none())
            .map(|(k, _)| *k)
            .collect();
        if !missing.is_empty() {
            return Err(DescriptorError::MissingFields {
                line,
                fields: missing,
            });
        }

        let int = |slot: usize| -> Result<i32, DescriptorError> {
            let raw = found[slot].unwrap_or_default();
            raw.trim()
                .parse::<i32>()
                .map_err(|_| DescriptorError::InvalidValue {
                    line,
                    key: MANDATORY_FIELDS[slot],
                    value: raw.to_string(),
                })
        };
        let id_raw = found[0].unwrap_or_default();
        let id = id_raw
            .trim()
            .parse::<u32>()
            .map_err(|_| DescriptorError::InvalidValue {
                line,
                key: "id",
                value: id_raw.to_string(),
            })?;

        Ok(Self {
            id,
            x: int(1)?,
            y: int(2)?,
            width: int(3)?,
            height: int(4)?,
            xoffset: int(5)?,
            yoffset: int(6)?,
            xadvance: int(7)?,
            extra,
        })
    }

    /// Value of an unrecognized field, quotes removed.
    pub fn extra_value(&self, key: &str) -> Option<&str> {
        self.extra
            .iter()
            .find(|f| f.key == key)
            .and_then(|f| f.raw.split_once('='))
            .map(|(_, v)| unquote(v))
    }

    /// Atlas page index; BMFont defaults to page 0 when absent.
    pub fn page(&self) -> u32 {
        self.extra_value("page")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Appends the canonical `char ...` line (no terminator) to `out`.
    pub fn write_line(&self, layout: FieldLayout, out: &mut String) {
        let _ = write!(out, "{GLYPH_MARKER} id={}", self.id);
        if layout == FieldLayout::Complete {
            let _ = write!(out, " x={} y={}", self.x, self.y);
        }
        let _ = write!(
            out,
            " xoffset={} yoffset={} width={} height={} xadvance={}",
            self.xoffset, self.yoffset, self.width, self.height, self.xadvance
        );
        if layout == FieldLayout::Complete {
            for f in &self.extra {
                out.push(' ');
                out.push_str(&f.raw);
            }
        }
    }
}
