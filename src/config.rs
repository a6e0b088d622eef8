use crate::fnt::descriptor::FieldLayout;
use crate::fnt::fixer::FixOptions;
use ini::Ini;
use log::{debug, info, warn};
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;

pub const CONFIG_PATH: &str = "fntfix.ini";
const SECTION: &str = "Options";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: LogLevel,
    /// Appended to the input's file stem when no output path is given.
    pub output_suffix: String,
    pub advance_padding: i32,
    pub field_layout: FieldLayout,
    pub sweep_from: u32,
    pub sweep_to: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Warn,
            output_suffix: "_fixed".to_string(),
            advance_padding: 1,
            field_layout: FieldLayout::Complete,
            sweep_from: 10,
            sweep_to: 99,
        }
    }
}

impl Config {
    pub const fn fix_options(&self) -> FixOptions {
        FixOptions {
            advance_padding: self.advance_padding,
            field_layout: self.field_layout,
        }
    }

    pub const fn sweep_range(&self) -> RangeInclusive<u32> {
        self.sweep_from..=self.sweep_to
    }
}

// --- File I/O ---

fn default_ini() -> Ini {
    let default = Config::default();
    let mut conf = Ini::new();
    // keys in alphabetical order
    conf.with_section(Some(SECTION))
        .set("AdvancePadding", default.advance_padding.to_string())
        .set("FieldLayout", default.field_layout.as_str())
        .set("LogLevel", default.log_level.as_str())
        .set("OutputSuffix", default.output_suffix.as_str())
        .set("SweepFrom", default.sweep_from.to_string())
        .set("SweepTo", default.sweep_to.to_string());
    conf
}

pub fn write_default(path: &Path) -> Result<(), std::io::Error> {
    info!("Writing default config to '{}'.", path.display());
    default_ini().write_to_file(path)
}

/// Reads a value and parses it, warning (and falling back) on garbage.
fn get_parsed<T: FromStr>(conf: &Ini, key: &str, fallback: T) -> T {
    match conf.get_from(Some(SECTION), key) {
        None => fallback,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Config: invalid {key}={raw:?}, using default.");
            fallback
        }),
    }
}

pub fn from_ini(conf: &Ini) -> Config {
    let default = Config::default();
    let mut cfg = Config {
        log_level: get_parsed(conf, "LogLevel", default.log_level),
        output_suffix: conf
            .get_from(Some(SECTION), "OutputSuffix")
            .map_or(default.output_suffix.clone(), str::to_string),
        advance_padding: get_parsed(conf, "AdvancePadding", default.advance_padding),
        field_layout: get_parsed(conf, "FieldLayout", default.field_layout),
        sweep_from: get_parsed(conf, "SweepFrom", default.sweep_from),
        sweep_to: get_parsed(conf, "SweepTo", default.sweep_to),
    };
    if cfg.advance_padding < 0 {
        warn!(
            "Config: AdvancePadding={} is negative, using {}.",
            cfg.advance_padding, default.advance_padding
        );
        cfg.advance_padding = default.advance_padding;
    }
    if cfg.sweep_from > cfg.sweep_to {
        warn!(
            "Config: SweepFrom={} > SweepTo={}, using {}..={}.",
            cfg.sweep_from, cfg.sweep_to, default.sweep_from, default.sweep_to
        );
        cfg.sweep_from = default.sweep_from;
        cfg.sweep_to = default.sweep_to;
    }
    cfg
}

/// Loads configuration from `path`. Never fails: a missing or unreadable
/// file yields the defaults.
pub fn load(path: &Path) -> Config {
    if !path.exists() {
        debug!("'{}' not found, using default config.", path.display());
        return Config::default();
    }
    match Ini::load_from_file(path) {
        Ok(conf) => {
            let cfg = from_ini(&conf);
            info!("Loaded config from '{}'.", path.display());
            cfg
        }
        Err(e) => {
            warn!("Failed to load '{}': {e}; using defaults.", path.display());
            Config::default()
        }
    }
}
