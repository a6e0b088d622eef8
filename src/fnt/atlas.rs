//! Glyph-rectangle bounds check against the page images a descriptor names.

use std::fmt;
use std::path::Path;

use log::{debug, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;

use super::metrics::FontMetrics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AtlasFinding {
    MissingPage {
        page: u32,
        file: String,
        reason: String,
    },
    UnknownPage {
        id: u32,
        page: u32,
    },
    /// `rect` is `[x, y, width, height]`, `atlas` is `[width, height]`.
    OutOfBounds {
        id: u32,
        page: u32,
        rect: [i32; 4],
        atlas: [u32; 2],
    },
}

impl fmt::Display for AtlasFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingPage { page, file, reason } => {
                write!(f, "page {page} ({file}): {reason}")
            }
            Self::UnknownPage { id, page } => {
                write!(f, "glyph {id}: references undeclared page {page}")
            }
            Self::OutOfBounds {
                id,
                page,
                rect: [x, y, w, h],
                atlas: [aw, ah],
            } => write!(
                f,
                "glyph {id}: rect {x},{y} {w}x{h} exceeds page {page} ({aw}x{ah})"
            ),
        }
    }
}

#[inline(always)]
fn rect_fits(x: i32, y: i32, w: i32, h: i32, aw: u32, ah: u32) -> bool {
    let (x, y, w, h) = (i64::from(x), i64::from(y), i64::from(w), i64::from(h));
    x >= 0 && y >= 0 && w >= 0 && h >= 0 && x + w <= i64::from(aw) && y + h <= i64::from(ah)
}

/// Pure bounds check given known page dimensions.
/// Glyphs on pages absent from `dims` are skipped (their page was already reported).
pub fn check_bounds(metrics: &FontMetrics, dims: &FxHashMap<u32, (u32, u32)>) -> Vec<AtlasFinding> {
    let mut out = Vec::new();
    for g in metrics.glyphs() {
        let page = g.page();
        if !metrics.pages.is_empty() && !metrics.pages.iter().any(|p| p.id == page) {
            out.push(AtlasFinding::UnknownPage { id: g.id, page });
            continue;
        }
        let Some(&(aw, ah)) = dims.get(&page) else {
            continue;
        };
        if !rect_fits(g.x, g.y, g.width, g.height, aw, ah) {
            out.push(AtlasFinding::OutOfBounds {
                id: g.id,
                page,
                rect: [g.x, g.y, g.width, g.height],
                atlas: [aw, ah],
            });
        }
    }
    out
}

/// Reads every page's dimensions from `atlas_dir`, then checks glyph rectangles.
/// An unreadable page falls back to the descriptor's `scaleW`/`scaleH` when declared.
pub fn check_atlas(metrics: &FontMetrics, atlas_dir: &Path) -> Vec<AtlasFinding> {
    let mut findings = Vec::new();
    let mut dims: FxHashMap<u32, (u32, u32)> = FxHashMap::default();
    let declared = metrics
        .common
        .filter(|c| c.scale_w > 0 && c.scale_h > 0)
        .map(|c| (c.scale_w, c.scale_h));

    for page in &metrics.pages {
        let path = atlas_dir.join(&page.file);
        match image::image_dimensions(&path) {
            Ok(wh) => {
                debug!("page {} '{}': {}x{}", page.id, path.display(), wh.0, wh.1);
                if let Some(d) = declared
                    && d != wh
                {
                    warn!(
                        "page {} is {}x{} but common declares {}x{}",
                        page.id, wh.0, wh.1, d.0, d.1
                    );
                }
                dims.insert(page.id, wh);
            }
            Err(e) => {
                warn!("page {} '{}': {e}", page.id, path.display());
                findings.push(AtlasFinding::MissingPage {
                    page: page.id,
                    file: page.file.clone(),
                    reason: e.to_string(),
                });
                if let Some(d) = declared {
                    dims.insert(page.id, d);
                }
            }
        }
    }

    let bounds = check_bounds(metrics, &dims);
    for f in &bounds {
        warn!("{f}");
    }
    findings.extend(bounds);
    findings
}
