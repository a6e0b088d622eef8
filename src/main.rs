mod cli;
mod config;
mod error;
mod fnt;

use clap::Parser;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    let args = cli::Cli::parse();
    let cfg = config::load(&args.config);
    let level = if args.verbose {
        cfg.log_level.as_level_filter().max(log::LevelFilter::Debug)
    } else {
        cfg.log_level.as_level_filter()
    };
    log::set_max_level(level);

    if let Err(e) = cli::run(&args, &cfg) {
        log::error!("{e}");
        return Err(e.into());
    }
    Ok(())
}
