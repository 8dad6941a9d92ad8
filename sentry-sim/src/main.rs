mod cli;
mod commands;
mod tone;
mod wav;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Measure {
            input,
            interval_ms,
            device,
            band_offsets,
        } => commands::measure(&input, interval_ms, &device, &band_offsets),
        Command::Calibrate {
            input,
            reference_db,
        } => commands::calibrate(&input, reference_db),
    }
}
