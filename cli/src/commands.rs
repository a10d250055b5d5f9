//! The demo harness: connect an adapter, load a BSDL file, and run the
//! safe EXTEST entry sequence while printing pin snapshots as they arrive.

use crate::error::CliError;
use crate::Cli;
use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use jtagscan_core::adapter::AdapterType;
use jtagscan_core::{JtagController, PinLevel, WorkerEvent};
use std::time::Duration;

/// Number of snapshots the demo harness prints before shutting the worker
/// down and returning; this is a harness convenience, not a core limit.
const DEMO_SNAPSHOT_COUNT: usize = 5;

pub fn run(cli: &Cli) -> Result<()> {
    let adapter_type = AdapterType::from_str_ci(&cli.adapter)
        .ok_or_else(|| CliError::UnknownAdapter(cli.adapter.clone()))?;

    let mut controller = JtagController::new();
    controller
        .connect_adapter_with_id(adapter_type, cli.port.as_deref())
        .map_err(|source| CliError::AdapterConnect {
            adapter: cli.adapter.clone(),
            source,
        })?;
    log::info!("connected adapter '{}'", cli.adapter);

    controller
        .load_bsdl(&cli.bsdl)
        .map_err(|source| CliError::BsdlLoad {
            path: cli.bsdl.display().to_string(),
            source,
        })?;
    println!("{} {}", "Loaded".green().bold(), cli.bsdl.display());

    controller.initialize().map_err(CliError::Initialize)?;
    controller.set_poll_interval_ms(cli.poll_ms);

    if controller.is_no_target_detected() {
        println!("{}", "Warning: no target detected on scan chain".yellow());
    }

    println!(
        "{} polling every {} ms, {} snapshot(s)...",
        "Running".cyan().bold(),
        cli.poll_ms,
        DEMO_SNAPSHOT_COUNT
    );

    let pb = create_progress_bar(DEMO_SNAPSHOT_COUNT as u64, "waiting for first snapshot");

    let mut seen = 0usize;
    while seen < DEMO_SNAPSHOT_COUNT {
        match controller.try_recv_event() {
            Some(WorkerEvent::PinsUpdated(pins)) => {
                pb.set_message(format!("snapshot {} of {}", seen + 1, DEMO_SNAPSHOT_COUNT));
                pb.set_position(seen as u64);
                print_snapshot(&pb, seen, &pins);
                seen += 1;
            }
            Some(WorkerEvent::Error(e)) => {
                log::warn!("worker reported an error: {}", e);
            }
            Some(WorkerEvent::Stopped) => break,
            None => std::thread::sleep(Duration::from_millis(cli.poll_ms.max(1))),
        }
    }
    pb.finish_and_clear();

    controller.stop_polling();
    println!("{}", "Done.".green().bold());
    Ok(())
}

/// Progress bar for the snapshot-polling loop, styled after the teacher's
/// `create_progress_bar`.
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("█▓▒░"),
    );
    pb.set_message(message.to_string());
    pb
}

fn print_snapshot(pb: &ProgressBar, index: usize, pins: &[PinLevel]) {
    let rendered: String = pins
        .iter()
        .map(|p| match p {
            PinLevel::Low => '0',
            PinLevel::High => '1',
            PinLevel::HighZ => 'Z',
        })
        .collect();
    pb.suspend(|| println!("  [{:>3}] {}", index, rendered.dimmed()));
}
