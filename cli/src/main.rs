//! jtagscan CLI - boundary-scan demo harness
//!
//! # Usage
//! ```bash
//! jtagscan device.bsdl                       # drive the simulator adapter
//! jtagscan device.bsdl --adapter serial --port /dev/ttyACM0
//! jtagscan device.bsdl --adapter vendor --poll-ms 50 -v
//! ```

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod error;

/// jtagscan - IEEE 1149.1 boundary-scan controller demo harness
#[derive(Parser)]
#[command(name = "jtagscan")]
#[command(author = "jtagscan contributors")]
#[command(version = "0.1.0")]
#[command(about = "Load a BSDL file and drive its boundary-scan chain")]
#[command(long_about = None)]
pub struct Cli {
    /// BSDL file describing the target device
    bsdl: PathBuf,

    /// Adapter backend to use
    #[arg(short, long, default_value = "sim")]
    adapter: String,

    /// Serial port path (only used by the serial adapter)
    #[arg(short, long)]
    port: Option<String>,

    /// Worker poll interval in milliseconds
    #[arg(long, default_value = "100")]
    poll_ms: u64,

    /// Verbose output (raises the default log level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode (suppress the banner)
    #[arg(short, long, global = true)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = commands::run(&cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn print_banner() {
    println!(
        "{}",
        r#"
        _ _
       (_) |_ __ _  __ _ ___  ___ __ _ _ __
       | | __/ _` |/ _` / __|/ __/ _` | '_ \
       | | || (_| | (_| \__ \ (_| (_| | | | |
       |_|\__\__,_|\__, |___/\___\__,_|_| |_|
                    |___/   boundary-scan CLI
"#
        .cyan()
    );
}
