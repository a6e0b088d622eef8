//! Command line surface: argument parsing and one handler per subcommand.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::config::{self, Config};
use crate::error::Error;
use crate::fnt::{atlas, fixer, metrics::FontMetrics, sweep};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
/// Validate and repair text-format BMFont descriptors
pub struct Cli {
    /// Configuration file
    #[clap(long, global = true, default_value = config::CONFIG_PATH)]
    pub config: PathBuf,
    /// Log at debug level regardless of the configured level
    #[clap(short, long, global = true)]
    pub verbose: bool,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clamp negative offsets and widen overflowing advances
    Fix(FixArgs),
    /// Lay out a range of numbers and report width/kerning mismatches
    Sweep(SweepArgs),
    /// Check glyph rectangles against the page images
    Atlas(AtlasArgs),
    /// Print logical and ink widths of sample strings
    Measure(MeasureArgs),
    /// Write the default configuration file
    InitConfig,
}

#[derive(clap::Args, Debug)]
pub struct FixArgs {
    /// Descriptor to fix
    pub input: PathBuf,
    /// Output path (default: input name plus the configured suffix)
    #[clap(short, long)]
    pub output: Option<PathBuf>,
    /// Write the corrections as JSON
    #[clap(long)]
    pub report: Option<PathBuf>,
    /// Report corrections without writing the descriptor
    #[clap(long)]
    pub dry_run: bool,
    /// Emit only id/xoffset/yoffset/width/height/xadvance on glyph lines
    #[clap(long)]
    pub legacy_fields: bool,
    /// Units added past the footprint when widening an advance
    #[clap(long)]
    pub padding: Option<u32>,
}

#[derive(clap::Args, Debug)]
pub struct SweepArgs {
    pub input: PathBuf,
    #[clap(long)]
    pub from: Option<u32>,
    #[clap(long)]
    pub to: Option<u32>,
    /// Adjust in-memory metrics for each finding and sweep again
    #[clap(long)]
    pub adjust: bool,
    /// Write the sweep result as JSON
    #[clap(long)]
    pub report: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct AtlasArgs {
    pub input: PathBuf,
    /// Directory holding the page images (default: the descriptor's directory)
    #[clap(long)]
    pub atlas_dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct MeasureArgs {
    pub input: PathBuf,
    #[clap(required = true)]
    pub text: Vec<String>,
}

fn read_text(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

fn write_report<T: Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|e| Error::io(path, e))?;
    info!("Report written to '{}'.", path.display());
    Ok(())
}

fn load_metrics(path: &Path) -> Result<FontMetrics, Error> {
    Ok(FontMetrics::parse(&read_text(path)?)?)
}

#[derive(Serialize)]
struct FixReport<'a> {
    input: &'a Path,
    output: Option<&'a Path>,
    corrections: &'a [fixer::Correction],
}

fn run_fix(args: &FixArgs, cfg: &Config) -> Result<(), Error> {
    let mut opts = cfg.fix_options();
    if args.legacy_fields {
        opts.field_layout = crate::fnt::descriptor::FieldLayout::Legacy;
    }
    if let Some(p) = args.padding {
        opts.advance_padding = i32::try_from(p).unwrap_or(i32::MAX);
    }

    let raw = read_text(&args.input)?;
    let outcome = fixer::fix(&raw, &opts).inspect_err(|e| {
        error!("'{}': {e}; no output written.", args.input.display());
    })?;
    for c in &outcome.corrections {
        info!("{c}");
    }

    let output = (!args.dry_run).then(|| {
        args.output
            .clone()
            .unwrap_or_else(|| fixer::suggested_output_path(&args.input, &cfg.output_suffix))
    });
    if let Some(out) = &output {
        fs::write(out, &outcome.corrected_text).map_err(|e| Error::io(out, e))?;
    }

    println!(
        "{}: {} corrections on {} glyphs{}",
        args.input.display(),
        outcome.corrections.len(),
        outcome.glyphs_changed(),
        output
            .as_ref()
            .map_or(String::new(), |p| format!(" -> {}", p.display()))
    );
    if outcome.is_clean() {
        println!("  all glyph metrics already valid");
    }
    for c in &outcome.corrections {
        println!("  {c}");
    }

    if let Some(path) = &args.report {
        write_report(
            path,
            &FixReport {
                input: &args.input,
                output: output.as_deref(),
                corrections: &outcome.corrections,
            },
        )?;
    }
    Ok(())
}

fn run_sweep(args: &SweepArgs, cfg: &Config) -> Result<(), Error> {
    let from = args.from.unwrap_or(cfg.sweep_from);
    let to = args.to.unwrap_or(cfg.sweep_to);
    if from > to {
        return Err(Error::EmptyRange { from, to });
    }
    let mut metrics = load_metrics(&args.input)?;

    if args.adjust {
        let res = sweep::sweep_and_adjust(&mut metrics, from..=to);
        println!(
            "{}: {} findings before, {} adjustments, {} findings after",
            args.input.display(),
            res.before.findings.len(),
            res.adjustments.len(),
            res.after.findings.len()
        );
        if !res.after.is_clean() {
            warn!("findings remain after adjustment");
        }
        for a in &res.adjustments {
            println!("  {a}");
        }
        for f in &res.after.findings {
            println!("  {f}");
        }
        if let Some(path) = &args.report {
            write_report(path, &res)?;
        }
    } else {
        let report = sweep::sweep(&metrics, from..=to);
        println!(
            "{}: {} strings checked, {} findings",
            args.input.display(),
            report.checked,
            report.findings.len()
        );
        for f in &report.findings {
            println!("  {f}");
        }
        if let Some(path) = &args.report {
            write_report(path, &report)?;
        }
    }
    Ok(())
}

fn run_atlas(args: &AtlasArgs) -> Result<(), Error> {
    let metrics = load_metrics(&args.input)?;
    let dir = args.atlas_dir.clone().unwrap_or_else(|| {
        args.input
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    });
    if metrics.pages.is_empty() {
        warn!("'{}' declares no pages.", args.input.display());
    }
    if let Some(c) = metrics.common
        && c.pages as usize != metrics.pages.len()
    {
        warn!(
            "common declares {} pages but {} page lines were found",
            c.pages,
            metrics.pages.len()
        );
    }
    let findings = atlas::check_atlas(&metrics, &dir);
    println!(
        "{}: {} pages, {} glyphs, {} findings",
        args.input.display(),
        metrics.pages.len(),
        metrics.glyphs().len(),
        findings.len()
    );
    for f in &findings {
        println!("  {f}");
    }
    Ok(())
}

fn run_measure(args: &MeasureArgs) -> Result<(), Error> {
    let metrics = load_metrics(&args.input)?;
    if let Some(c) = metrics.common {
        println!(
            "line height {} base {}, {} kerning pairs",
            c.line_height,
            c.base,
            metrics.kerning_pairs()
        );
    }
    for text in &args.text {
        let layout = metrics.layout(text);
        let ink = layout
            .ink_extent()
            .map_or_else(|| "none".to_string(), |(l, r)| format!("{l}..{r}"));
        println!("{text:?}: width {} ink {ink}", layout.logical_width);
        debug!(
            "{text:?}: pen positions {:?}",
            layout.glyphs.iter().map(|g| g.pen_x).collect::<Vec<_>>()
        );
        if !layout.missing.is_empty() {
            println!("  missing: {:?}", layout.missing);
        }
    }
    Ok(())
}

pub fn run(cli: &Cli, cfg: &Config) -> Result<(), Error> {
    match &cli.command {
        Command::Fix(args) => run_fix(args, cfg),
        Command::Sweep(args) => run_sweep(args, cfg),
        Command::Atlas(args) => run_atlas(args),
        Command::Measure(args) => run_measure(args),
        Command::InitConfig => {
            config::write_default(&cli.config).map_err(|e| Error::io(&cli.config, e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fntfix-cli-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fix_flags() {
        let cli = Cli::try_parse_from([
            "fntfix", "fix", "a.fnt", "-o", "b.fnt", "--legacy-fields", "--padding", "2",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from(config::CONFIG_PATH));
        let Command::Fix(args) = cli.command else {
            panic!("expected fix");
        };
        assert_eq!(args.output, Some(PathBuf::from("b.fnt")));
        assert!(args.legacy_fields);
        assert_eq!(args.padding, Some(2));
    }

    #[test]
    fn fix_writes_suggested_file_and_report() {
        let dir = scratch("fix");
        let input = dir.join("digits.fnt");
        fs::write(
            &input,
            "info face=\"d\"\nchar id=5 x=0 y=0 width=10 height=12 xoffset=-3 yoffset=-2 xadvance=8\n",
        )
        .unwrap();
        let report = dir.join("report.json");
        let args = FixArgs {
            input: input.clone(),
            output: None,
            report: Some(report.clone()),
            dry_run: false,
            legacy_fields: false,
            padding: None,
        };
        run_fix(&args, &Config::default()).unwrap();

        let fixed = fs::read_to_string(dir.join("digits_fixed.fnt")).unwrap();
        assert_eq!(
            fixed,
            "info face=\"d\"\nchar id=5 x=0 y=0 xoffset=0 yoffset=0 width=10 height=12 xadvance=11\n"
        );
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        let corrections = json["corrections"].as_array().unwrap();
        assert_eq!(corrections.len(), 2);
        assert_eq!(corrections[0]["kind"], "negative_offset");
        assert_eq!(corrections[1]["new_xadvance"], 11);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_input_writes_nothing() {
        let dir = scratch("malformed");
        let input = dir.join("bad.fnt");
        fs::write(&input, "info face=\"Foo\" size=32\nchar id=2 width=5\n").unwrap();
        let args = FixArgs {
            input,
            output: None,
            report: None,
            dry_run: false,
            legacy_fields: false,
            padding: None,
        };
        let err = run_fix(&args, &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Descriptor(_)));
        assert!(!dir.join("bad_fixed.fnt").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn dry_run_reports_without_writing_the_descriptor() {
        let dir = scratch("dry-run");
        let input = dir.join("digits.fnt");
        let raw = "char id=5 x=0 y=0 width=10 height=12 xoffset=-3 yoffset=-2 xadvance=8\n";
        fs::write(&input, raw).unwrap();
        let report = dir.join("report.json");
        let args = FixArgs {
            input: input.clone(),
            output: Some(dir.join("explicit.fnt")),
            report: Some(report.clone()),
            dry_run: true,
            legacy_fields: false,
            padding: None,
        };
        run_fix(&args, &Config::default()).unwrap();

        assert!(!dir.join("digits_fixed.fnt").exists());
        assert!(!dir.join("explicit.fnt").exists());
        assert_eq!(fs::read_to_string(&input).unwrap(), raw);
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert!(json["output"].is_null());
        assert_eq!(json["corrections"].as_array().unwrap().len(), 2);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn sweep_adjust_writes_before_adjustments_and_after() {
        let dir = scratch("sweep-adjust");
        let input = dir.join("digits.fnt");
        let mut text = String::from("common lineHeight=20 base=16 scaleW=128 scaleH=32 pages=1\n");
        for d in 0..10u32 {
            // '7' draws past its advance.
            let advance = if d == 7 { 8 } else { 10 };
            text.push_str(&format!(
                "char id={} x={} y=0 width=8 height=12 xoffset=1 yoffset=2 xadvance={advance}\n",
                '0' as u32 + d,
                d * 10
            ));
        }
        fs::write(&input, &text).unwrap();
        let report = dir.join("sweep.json");
        let args = SweepArgs {
            input: input.clone(),
            from: Some(70),
            to: Some(79),
            adjust: true,
            report: Some(report.clone()),
        };
        run_sweep(&args, &Config::default()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(json["before"]["checked"], 10);
        assert!(!json["before"]["findings"].as_array().unwrap().is_empty());
        let adjustments = json["adjustments"].as_array().unwrap();
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0]["kind"], "advance");
        assert_eq!(adjustments[0]["from"], 8);
        assert_eq!(adjustments[0]["to"], 9);
        assert_eq!(json["after"]["findings"].as_array().unwrap().len(), 0);
        // The descriptor on disk is never touched by a sweep.
        assert_eq!(fs::read_to_string(&input).unwrap(), text);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn inverted_sweep_range_is_an_error() {
        let args = SweepArgs {
            input: PathBuf::from("unused.fnt"),
            from: Some(9),
            to: Some(1),
            adjust: false,
            report: None,
        };
        assert!(matches!(
            run_sweep(&args, &Config::default()),
            Err(Error::EmptyRange { from: 9, to: 1 })
        ));
    }
}
