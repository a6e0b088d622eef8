//! Descriptor fixer: clamps negative glyph offsets and widens advances that the
//! glyph's drawn footprint overflows. Every non-`char` line passes through
//! byte-for-byte, in order, with its own line terminator.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, trace};
use serde::Serialize;

use super::descriptor::{self, FieldLayout, GlyphRecord};
use crate::error::DescriptorError;

const BOM: char = '\u{FEFF}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOptions {
    /// Extra units added past the footprint when an advance is widened.
    pub advance_padding: i32,
    pub field_layout: FieldLayout,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            advance_padding: 1,
            field_layout: FieldLayout::Complete,
        }
    }
}

/// One changed rule on one glyph. `Display` is the operator-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Correction {
    /// Offsets that were negative, before clamping to 0.
    NegativeOffset {
        line: usize,
        id: u32,
        xoffset: Option<i32>,
        yoffset: Option<i32>,
    },
    AdvanceOverflow {
        line: usize,
        id: u32,
        /// Widened to `i64`: footprint and advance may sit at opposite ends of `i32`.
        overflow: i64,
        old_xadvance: i32,
        new_xadvance: i32,
    },
}

impl Correction {
    pub const fn line(&self) -> usize {
        match self {
            Self::NegativeOffset { line, .. } | Self::AdvanceOverflow { line, .. } => *line,
        }
    }
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NegativeOffset {
                line,
                id,
                xoffset,
                yoffset,
            } => {
                write!(f, "line {line}: glyph {id}: negative offset clamped to 0 (")?;
                match (xoffset, yoffset) {
                    (Some(x), Some(y)) => write!(f, "xoffset={x}, yoffset={y}")?,
                    (Some(x), None) => write!(f, "xoffset={x}")?,
                    (None, Some(y)) => write!(f, "yoffset={y}")?,
                    (None, None) => {}
                }
                f.write_str(")")
            }
            Self::AdvanceOverflow {
                line,
                id,
                overflow,
                old_xadvance,
                new_xadvance,
            } => write!(
                f,
                "line {line}: glyph {id}: footprint overflows advance by {overflow}, \
                 xadvance {old_xadvance} -> {new_xadvance}"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixOutcome {
    pub corrected_text: String,
    pub corrections: Vec<Correction>,
}

impl FixOutcome {
    #[inline(always)]
    pub fn is_clean(&self) -> bool {
        self.corrections.is_empty()
    }

    /// Number of distinct glyph lines that had at least one field changed.
    pub fn glyphs_changed(&self) -> usize {
        let mut lines: Vec<usize> = self.corrections.iter().map(Correction::line).collect();
        lines.dedup();
        lines.len()
    }
}

/// Applies both metric rules to one glyph, appending a correction per rule that fired.
///
/// The offset clamp skips zero-width glyphs; the advance check runs afterwards
/// regardless, so a zero-width glyph with a very negative `xoffset` can still
/// have its advance rewritten (and lowered) by the second rule.
///
/// Footprint arithmetic runs in `i64`. A widened advance that does not fit
/// back into `i32` is reported as an invalid `xadvance` for that line.
pub fn correct_glyph(
    glyph: &mut GlyphRecord,
    line: usize,
    opts: &FixOptions,
    log: &mut Vec<Correction>,
) -> Result<(), DescriptorError> {
    if glyph.width > 0 && (glyph.xoffset < 0 || glyph.yoffset < 0) {
        let xoffset = (glyph.xoffset < 0).then_some(glyph.xoffset);
        let yoffset = (glyph.yoffset < 0).then_some(glyph.yoffset);
        glyph.xoffset = glyph.xoffset.max(0);
        glyph.yoffset = glyph.yoffset.max(0);
        log.push(Correction::NegativeOffset {
            line,
            id: glyph.id,
            xoffset,
            yoffset,
        });
    }

    let footprint = i64::from(glyph.xoffset) + i64::from(glyph.width);
    let old_xadvance = glyph.xadvance;
    if footprint > i64::from(old_xadvance) {
        let widened = footprint + i64::from(opts.advance_padding);
        glyph.xadvance =
            i32::try_from(widened).map_err(|_| DescriptorError::InvalidValue {
                line,
                key: "xadvance",
                value: widened.to_string(),
            })?;
        log.push(Correction::AdvanceOverflow {
            line,
            id: glyph.id,
            overflow: footprint - i64::from(old_xadvance),
            old_xadvance,
            new_xadvance: glyph.xadvance,
        });
    }
    Ok(())
}

/// Fixes a whole descriptor. Pure: the input is untouched and the first
/// malformed `char` line aborts with no partial output.
pub fn fix(raw_text: &str, opts: &FixOptions) -> Result<FixOutcome, DescriptorError> {
    let mut out = FixOutcome {
        corrected_text: String::with_capacity(raw_text.len() + raw_text.len() / 8),
        corrections: Vec::new(),
    };
    let mut glyph_lines = 0usize;

    for line in descriptor::split_lines(raw_text) {
        // A byte-order mark only ever precedes the first line's tag.
        let (bom, body) = match line.body.strip_prefix(BOM) {
            Some(rest) if line.number == 1 => (true, rest),
            _ => (false, line.body),
        };
        if !descriptor::is_glyph_line(body) {
            out.corrected_text.push_str(line.body);
            out.corrected_text.push_str(line.terminator);
            continue;
        }
        glyph_lines += 1;
        let mut glyph = GlyphRecord::parse(body, line.number)?;
        let before = out.corrections.len();
        correct_glyph(&mut glyph, line.number, opts, &mut out.corrections)?;
        for c in &out.corrections[before..] {
            trace!("{c}");
        }
        if bom {
            out.corrected_text.push(BOM);
        }
        glyph.write_line(opts.field_layout, &mut out.corrected_text);
        out.corrected_text.push_str(line.terminator);
    }

    debug!(
        "fixed descriptor: {glyph_lines} glyph lines, {} corrections",
        out.corrections.len()
    );
    Ok(out)
}

/// `dir/name.fnt` -> `dir/name<suffix>.fnt`; files without an extension just get the suffix.
pub fn suggested_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    input.with_file_name(name)
}
