//! Read-only font model built from a descriptor: common block, pages, glyphs, kerning.
//! Used for layout measurement (sweep, `measure`) and the atlas bounds check.

use log::{debug, trace, warn};
use rustc_hash::FxHashMap;

use super::descriptor::{self, GlyphRecord};
use crate::error::DescriptorError;

/* ======================= TYPES ======================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommonInfo {
    pub line_height: i32,
    pub base: i32,
    /// Declared atlas size; 0 when the descriptor omits it.
    pub scale_w: u32,
    pub scale_h: u32,
    pub pages: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: u32,
    pub file: String,
}

#[derive(Debug, Clone, Default)]
pub struct FontMetrics {
    pub face: Option<String>,
    pub common: Option<CommonInfo>,
    pub pages: Vec<Page>,
    glyphs: Vec<GlyphRecord>,
    index: FxHashMap<u32, usize>,
    kerning: FxHashMap<(u32, u32), i32>,
}

/// A glyph placed on the pen line. `ink` is `None` for zero-width glyphs.
///
/// Positions are `i64` so sums of `i32` metrics never wrap or clamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedGlyph {
    pub ch: char,
    pub pen_x: i64,
    /// Kerning applied between the previous glyph and this one.
    pub kerning: i32,
    pub ink: Option<(i64, i64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineLayout {
    pub glyphs: Vec<PlacedGlyph>,
    /// Sum of advances and kerning: where the pen ends up.
    pub logical_width: i64,
    pub missing: Vec<char>,
}

impl LineLayout {
    /// Leftmost and rightmost inked pixel column, if anything was inked.
    pub fn ink_extent(&self) -> Option<(i64, i64)> {
        self.glyphs
            .iter()
            .filter_map(|g| g.ink)
            .fold(None, |acc, (l, r)| match acc {
                None => Some((l, r)),
                Some((al, ar)) => Some((al.min(l), ar.max(r))),
            })
    }
}

#[inline(always)]
fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{FEFF}').unwrap_or(s)
}

#[inline(always)]
fn int_field<T: std::str::FromStr>(fields: &[descriptor::Field<'_>], key: &str) -> Option<T> {
    fields
        .iter()
        .find(|f| f.key == key)
        .and_then(|f| f.value.trim().parse().ok())
}

/* ======================= PARSE ======================= */

impl FontMetrics {
    pub fn parse(text: &str) -> Result<Self, DescriptorError> {
        let mut font = Self::default();
        for line in descriptor::split_lines(strip_bom(text)) {
            let Some(tag) = descriptor::record_tag(line.body) else {
                continue;
            };
            match tag {
                descriptor::GLYPH_MARKER => {
                    font.insert_glyph(GlyphRecord::parse(line.body, line.number)?);
                }
                "info" => {
                    let f = descriptor::line_fields(line.body);
                    font.face = f
                        .iter()
                        .find(|f| f.key == "face")
                        .map(|f| f.value.to_string());
                }
                "common" => {
                    let f = descriptor::line_fields(line.body);
                    font.common = Some(CommonInfo {
                        line_height: int_field(&f, "lineHeight").unwrap_or(0),
                        base: int_field(&f, "base").unwrap_or(0),
                        scale_w: int_field(&f, "scaleW").unwrap_or(0),
                        scale_h: int_field(&f, "scaleH").unwrap_or(0),
                        pages: int_field(&f, "pages").unwrap_or(0),
                    });
                }
                "page" => {
                    let f = descriptor::line_fields(line.body);
                    let id = int_field::<u32>(&f, "id");
                    let file = f.iter().find(|f| f.key == "file").map(|f| f.value);
                    match (id, file) {
                        (Some(id), Some(file)) => font.pages.push(Page {
                            id,
                            file: file.to_string(),
                        }),
                        _ => warn!("line {}: ignoring page line without id/file", line.number),
                    }
                }
                "kerning" => {
                    let f = descriptor::line_fields(line.body);
                    match (
                        int_field::<u32>(&f, "first"),
                        int_field::<u32>(&f, "second"),
                        int_field::<i32>(&f, "amount"),
                    ) {
                        (Some(a), Some(b), Some(amount)) => {
                            font.kerning.insert((a, b), amount);
                        }
                        _ => warn!("line {}: ignoring malformed kerning line", line.number),
                    }
                }
                _ => {}
            }
        }
        debug!(
            "Font '{}': {} glyphs, {} kerning pairs, {} pages",
            font.face.as_deref().unwrap_or("?"),
            font.glyphs.len(),
            font.kerning.len(),
            font.pages.len()
        );
        Ok(font)
    }

    fn insert_glyph(&mut self, glyph: GlyphRecord) {
        if let Some(&slot) = self.index.get(&glyph.id) {
            debug!("glyph {} defined twice; later definition wins", glyph.id);
            self.glyphs[slot] = glyph;
        } else {
            self.index.insert(glyph.id, self.glyphs.len());
            self.glyphs.push(glyph);
        }
    }

    /* ======================= API ======================= */

    /// Glyphs in descriptor order.
    pub fn glyphs(&self) -> &[GlyphRecord] {
        &self.glyphs
    }

    pub fn glyph(&self, id: u32) -> Option<&GlyphRecord> {
        self.index.get(&id).map(|&i| &self.glyphs[i])
    }

    pub fn glyph_mut(&mut self, id: u32) -> Option<&mut GlyphRecord> {
        self.index.get(&id).map(|&i| &mut self.glyphs[i])
    }

    #[inline(always)]
    pub fn kerning(&self, first: u32, second: u32) -> i32 {
        self.kerning.get(&(first, second)).copied().unwrap_or(0)
    }

    pub fn set_kerning(&mut self, first: u32, second: u32, amount: i32) {
        if amount == 0 {
            self.kerning.remove(&(first, second));
        } else {
            self.kerning.insert((first, second), amount);
        }
    }

    pub fn kerning_pairs(&self) -> usize {
        self.kerning.len()
    }

    /// Lays `text` out on a single line starting at pen 0.
    /// Kerning applies only between two adjacent glyphs that both exist.
    pub fn layout(&self, text: &str) -> LineLayout {
        let mut out = LineLayout::default();
        let mut pen = 0i64;
        let mut prev: Option<u32> = None;
        for ch in text.chars() {
            let id = ch as u32;
            let Some(g) = self.glyph(id) else {
                trace!("no glyph for {ch:?} (U+{id:04X})");
                out.missing.push(ch);
                prev = None;
                continue;
            };
            let kerning = prev.map_or(0, |p| self.kerning(p, id));
            pen += i64::from(kerning);
            let ink = (g.width > 0).then(|| {
                let left = pen + i64::from(g.xoffset);
                (left, left + i64::from(g.width))
            });
            out.glyphs.push(PlacedGlyph {
                ch,
                pen_x: pen,
                kerning,
                ink,
            });
            pen += i64::from(g.xadvance);
            prev = Some(id);
        }
        out.logical_width = pen;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FONT: &str = "\u{FEFF}info face=\"Digits Bold\" size=32\n\
common lineHeight=40 base=32 scaleW=64 scaleH=32 pages=1\n\
page id=0 file=\"digits 0.png\"\n\
chars count=3\n\
char id=48 x=0 y=0 width=10 height=20 xoffset=1 yoffset=2 xadvance=12 page=0\n\
char id=49 x=10 y=0 width=6 height=20 xoffset=-2 yoffset=2 xadvance=8 page=0\n\
char id=32 x=0 y=0 width=0 height=0 xoffset=0 yoffset=0 xadvance=5 page=0\n\
kernings count=2\n\
kerning first=48 second=49 amount=-3\n\
kerning first=49 second=48\n";

    #[test]
    fn parses_header_pages_glyphs_and_kerning() {
        let m = FontMetrics::parse(FONT).unwrap();
        assert_eq!(m.face.as_deref(), Some("Digits Bold"));
        let common = m.common.unwrap();
        assert_eq!((common.line_height, common.base), (40, 32));
        assert_eq!((common.scale_w, common.scale_h, common.pages), (64, 32, 1));
        assert_eq!(
            m.pages,
            vec![Page {
                id: 0,
                file: "digits 0.png".to_string()
            }]
        );
        assert_eq!(m.glyphs().len(), 3);
        assert_eq!(m.glyph('1' as u32).unwrap().xoffset, -2);
        assert_eq!(m.kerning('0' as u32, '1' as u32), -3);
        // The malformed kerning line is skipped, not an error.
        assert_eq!(m.kerning_pairs(), 1);
    }

    #[test]
    fn layout_applies_advances_kerning_and_ink() {
        let m = FontMetrics::parse(FONT).unwrap();
        let l = m.layout("01");
        assert_eq!(l.logical_width, 12 - 3 + 8);
        assert_eq!(l.glyphs[0].ink, Some((1, 11)));
        assert_eq!(l.glyphs[1].pen_x, 9);
        assert_eq!(l.glyphs[1].kerning, -3);
        assert_eq!(l.glyphs[1].ink, Some((7, 13)));
        assert_eq!(l.ink_extent(), Some((1, 13)));
        assert_eq!(m.layout("0 0").logical_width, 12 + 5 + 12);
    }

    #[test]
    fn unknown_chars_break_kerning_and_are_reported() {
        let m = FontMetrics::parse(FONT).unwrap();
        let l = m.layout("0x1");
        assert_eq!(l.missing, vec!['x']);
        assert_eq!(l.logical_width, 12 + 8);
        assert_eq!(l.glyphs[1].kerning, 0);
    }

    #[test]
    fn zero_width_glyph_has_no_ink() {
        let m = FontMetrics::parse(FONT).unwrap();
        let l = m.layout(" ");
        assert_eq!(l.glyphs[0].ink, None);
        assert_eq!(l.ink_extent(), None);
    }

    #[test]
    fn duplicate_glyph_ids_keep_the_last_definition() {
        let text = "char id=65 x=0 y=0 width=1 height=1 xoffset=0 yoffset=0 xadvance=2\n\
char id=65 x=0 y=0 width=1 height=1 xoffset=0 yoffset=0 xadvance=7\n";
        let m = FontMetrics::parse(text).unwrap();
        assert_eq!(m.glyphs().len(), 1);
        assert_eq!(m.glyph(65).unwrap().xadvance, 7);
    }

    #[test]
    fn malformed_char_line_is_an_error() {
        let err = FontMetrics::parse("info face=x\nchar id=1 width=3\n").unwrap_err();
        assert!(matches!(err, DescriptorError::MissingFields { line: 2, .. }));
    }

    #[test]
    fn set_kerning_zero_removes_pair() {
        let mut m = FontMetrics::parse(FONT).unwrap();
        m.set_kerning('0' as u32, '1' as u32, 0);
        assert_eq!(m.kerning_pairs(), 0);
        assert_eq!(m.layout("01").logical_width, 20);
    }
}
