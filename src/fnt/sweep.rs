//! Digit sweep: lays out every number in a range (two-digit numbers by default)
//! and flags strings whose ink escapes the logical box, or where a kerning pair
//! pushes one glyph's ink into the previous one.
//!
//! `sweep_and_adjust` patches the in-memory metrics (never the file) and sweeps again.

use std::fmt;
use std::ops::RangeInclusive;

use log::{info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use super::metrics::FontMetrics;

pub const DEFAULT_RANGE: RangeInclusive<u32> = 10..=99;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    MissingGlyph {
        ch: char,
    },
    /// Rightmost ink lies past the final pen position.
    InkOverflow {
        text: String,
        overflow: i64,
    },
    /// Leftmost ink lies before pen origin 0.
    InkUnderflow {
        text: String,
        amount: i64,
    },
    KerningOverlap {
        text: String,
        first: char,
        second: char,
        kerning: i32,
        overlap: i64,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingGlyph { ch } => write!(f, "no glyph for {ch:?}"),
            Self::InkOverflow { text, overflow } => {
                write!(f, "{text:?}: ink overflows logical width by {overflow}")
            }
            Self::InkUnderflow { text, amount } => {
                write!(f, "{text:?}: ink starts {amount} left of the pen origin")
            }
            Self::KerningOverlap {
                text,
                first,
                second,
                kerning,
                overlap,
            } => write!(
                f,
                "{text:?}: kerning {first:?}{second:?} ({kerning}) overlaps ink by {overlap}"
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub findings: Vec<Finding>,
}

impl SweepReport {
    #[inline(always)]
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }
}

/// In-memory metric change made by `sweep_and_adjust`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Adjustment {
    Advance { ch: char, from: i32, to: i32 },
    Kerning { first: char, second: char, from: i32, to: i32 },
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advance { ch, from, to } => write!(f, "{ch:?}: xadvance {from} -> {to}"),
            Self::Kerning {
                first,
                second,
                from,
                to,
            } => write!(f, "{first:?}{second:?}: kerning {from} -> {to}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdjustedSweep {
    pub before: SweepReport,
    pub adjustments: Vec<Adjustment>,
    pub after: SweepReport,
}

/// Checks one laid-out string, appending findings for it.
fn check_text(
    metrics: &FontMetrics,
    text: &str,
    missing_seen: &mut FxHashSet<char>,
    out: &mut Vec<Finding>,
) {
    let layout = metrics.layout(text);
    for &ch in &layout.missing {
        if missing_seen.insert(ch) {
            out.push(Finding::MissingGlyph { ch });
        }
    }

    if let Some((left, right)) = layout.ink_extent() {
        if right > layout.logical_width {
            out.push(Finding::InkOverflow {
                text: text.to_string(),
                overflow: right - layout.logical_width,
            });
        }
        if left < 0 {
            out.push(Finding::InkUnderflow {
                text: text.to_string(),
                amount: -left,
            });
        }
    }

    for pair in layout.glyphs.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b.kerning >= 0 {
            continue;
        }
        if let (Some((_, a_right)), Some((b_left, _))) = (a.ink, b.ink)
            && a_right > b_left
        {
            out.push(Finding::KerningOverlap {
                text: text.to_string(),
                first: a.ch,
                second: b.ch,
                kerning: b.kerning,
                overlap: a_right - b_left,
            });
        }
    }
}

pub fn sweep(metrics: &FontMetrics, range: RangeInclusive<u32>) -> SweepReport {
    let mut report = SweepReport::default();
    let mut missing_seen = FxHashSet::default();
    for n in range {
        let text = n.to_string();
        let before = report.findings.len();
        check_text(metrics, &text, &mut missing_seen, &mut report.findings);
        for finding in &report.findings[before..] {
            warn!("{finding}");
        }
        report.checked += 1;
    }
    info!(
        "sweep: {} strings checked, {} findings",
        report.checked,
        report.findings.len()
    );
    report
}

/// Raises the advance of the glyph that owns the overflowing ink and relaxes
/// overlapping kerning pairs, each by the largest amount seen, then re-sweeps.
/// Underflow is reported only; offsets are the fixer's business.
pub fn sweep_and_adjust(metrics: &mut FontMetrics, range: RangeInclusive<u32>) -> AdjustedSweep {
    let before = sweep(metrics, range.clone());

    let mut advance_raise: FxHashMap<char, i64> = FxHashMap::default();
    let mut kerning_relax: FxHashMap<(char, char), i64> = FxHashMap::default();
    for finding in &before.findings {
        match finding {
            Finding::InkOverflow { text, overflow } => {
                let layout = metrics.layout(text);
                let owner = layout
                    .glyphs
                    .iter()
                    .filter(|g| g.ink.is_some_and(|(_, r)| r > layout.logical_width))
                    .max_by_key(|g| g.ink.map_or(i64::MIN, |(_, r)| r));
                if let Some(g) = owner {
                    let e = advance_raise.entry(g.ch).or_insert(0);
                    *e = (*e).max(*overflow);
                }
            }
            Finding::KerningOverlap {
                first,
                second,
                kerning,
                overlap,
                ..
            } => {
                // Never relax past zero: kerning only ever tightens in this direction.
                let relax = (*overlap).min(-i64::from(*kerning));
                let e = kerning_relax.entry((*first, *second)).or_insert(0);
                *e = (*e).max(relax);
            }
            Finding::MissingGlyph { .. } | Finding::InkUnderflow { .. } => {}
        }
    }

    let mut adjustments = Vec::new();
    let mut raises: Vec<_> = advance_raise.into_iter().collect();
    raises.sort_unstable();
    for (ch, raise) in raises {
        if let Some(g) = metrics.glyph_mut(ch as u32) {
            let from = g.xadvance;
            let wanted = i64::from(from) + raise;
            g.xadvance = i32::try_from(wanted).unwrap_or_else(|_| {
                warn!("{ch:?}: xadvance {wanted} does not fit, capped at {}", i32::MAX);
                i32::MAX
            });
            adjustments.push(Adjustment::Advance {
                ch,
                from,
                to: g.xadvance,
            });
        }
    }
    let mut relaxes: Vec<_> = kerning_relax.into_iter().collect();
    relaxes.sort_unstable();
    for ((first, second), relax) in relaxes {
        let from = metrics.kerning(first as u32, second as u32);
        // relax <= -from, so the sum lands in from..=0.
        let to = i32::try_from(i64::from(from) + relax).unwrap_or(0);
        metrics.set_kerning(first as u32, second as u32, to);
        adjustments.push(Adjustment::Kerning {
            first,
            second,
            from,
            to,
        });
    }
    for a in &adjustments {
        info!("adjusted {a}");
    }

    let after = sweep(metrics, range);
    AdjustedSweep {
        before,
        adjustments,
        after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits(lines: &[&str]) -> FontMetrics {
        let mut text = String::from("common lineHeight=20 base=16 scaleW=128 scaleH=32 pages=1\n");
        for d in 0..10u32 {
            let id = '0' as u32 + d;
            if let Some(custom) = lines.iter().find(|l| l.contains(&format!("id={id} "))) {
                text.push_str(custom);
            } else {
                text.push_str(&format!(
                    "char id={id} x={} y=0 width=8 height=12 xoffset=1 yoffset=2 xadvance=10",
                    d * 10
                ));
            }
            text.push('\n');
        }
        FontMetrics::parse(&text).unwrap()
    }

    #[test]
    fn well_formed_digits_sweep_clean() {
        let m = digits(&[]);
        let r = sweep(&m, DEFAULT_RANGE);
        assert_eq!(r.checked, 90);
        assert!(r.is_clean(), "{:?}", r.findings);
    }

    #[test]
    fn narrow_advance_is_an_overflow_on_trailing_strings() {
        // '7' draws 1..11 but only advances 8.
        let m = digits(&["char id=55 x=70 y=0 width=10 height=12 xoffset=1 yoffset=2 xadvance=8"]);
        let r = sweep(&m, 70..=79);
        assert!(r.findings.contains(&Finding::InkOverflow {
            text: "77".to_string(),
            overflow: 3,
        }));
        // "70": '0' ink ends at 8+1+8=17 < 18, so only strings ending in 7 overflow.
        assert!(!r.findings.iter().any(|f| matches!(
            f,
            Finding::InkOverflow { text, .. } if text == "70"
        )));
    }

    #[test]
    fn negative_offset_underflows() {
        let m = digits(&["char id=49 x=10 y=0 width=8 height=12 xoffset=-2 yoffset=2 xadvance=10"]);
        let r = sweep(&m, 10..=19);
        assert!(r.findings.contains(&Finding::InkUnderflow {
            text: "10".to_string(),
            amount: 2,
        }));
    }

    #[test]
    fn tight_kerning_overlaps_and_missing_digits_report_once() {
        let mut m = digits(&[]);
        m.set_kerning('1' as u32, '1' as u32, -4);
        let r = sweep(&m, 11..=11);
        assert_eq!(
            r.findings,
            vec![Finding::KerningOverlap {
                text: "11".to_string(),
                first: '1',
                second: '1',
                kerning: -4,
                overlap: 2,
            }]
        );

        let sparse = FontMetrics::parse(
            "char id=49 x=0 y=0 width=8 height=12 xoffset=1 yoffset=2 xadvance=10\n",
        )
        .unwrap();
        let r = sweep(&sparse, 10..=12);
        let missing: Vec<_> = r
            .findings
            .iter()
            .filter(|f| matches!(f, Finding::MissingGlyph { .. }))
            .collect();
        assert_eq!(missing.len(), 2, "{:?}", r.findings);
    }

    #[test]
    fn extreme_metrics_are_measured_exactly_and_capped_on_adjust() {
        let mut m = digits(&[
            "char id=55 x=70 y=0 width=100 height=12 xoffset=2147483600 yoffset=2 xadvance=-2147483648",
        ]);
        let res = sweep_and_adjust(&mut m, 77..=77);
        // Ink spans -48..2147483700 while the pen ends at 2 * i32::MIN.
        assert!(res.before.findings.contains(&Finding::InkOverflow {
            text: "77".to_string(),
            overflow: 2_147_483_700 + 4_294_967_296,
        }));
        assert!(res.before.findings.contains(&Finding::InkUnderflow {
            text: "77".to_string(),
            amount: 48,
        }));
        assert_eq!(
            res.adjustments,
            vec![Adjustment::Advance {
                ch: '7',
                from: i32::MIN,
                to: i32::MAX,
            }]
        );
    }

    #[test]
    fn adjust_clears_overflow_and_overlap() {
        let mut m = digits(&["char id=55 x=70 y=0 width=10 height=12 xoffset=1 yoffset=2 xadvance=8"]);
        m.set_kerning('1' as u32, '1' as u32, -4);
        let res = sweep_and_adjust(&mut m, DEFAULT_RANGE);
        assert!(!res.before.is_clean());
        assert!(res.after.is_clean(), "{:?}", res.after.findings);
        assert!(res.adjustments.contains(&Adjustment::Advance {
            ch: '7',
            from: 8,
            to: 11,
        }));
        assert!(res.adjustments.contains(&Adjustment::Kerning {
            first: '1',
            second: '1',
            from: -4,
            to: -2,
        }));
        assert_eq!(m.glyph('7' as u32).unwrap().xadvance, 11);
    }
}
