use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use minar::cli::{Cli, Command};
use minar::pearson::Accumulation;
use minar::scanner::BatchPlan;
use minar::{correlation, distribution, frequency, merge};
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    } else {
        // Parse and integrity warnings must surface even without RUST_LOG
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Install the interrupt handler that requests a checkpoint flush
fn install_interrupt_flag() -> Result<Arc<AtomicBool>> {
    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, flushing accumulated statistics...");
        handler_flag.store(true, Ordering::Relaxed);
    })
    .context("failed to install interrupt handler")?;
    Ok(cancel)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);
    let cancel = install_interrupt_flag()?;

    match cli.command {
        Command::Pearson {
            trace,
            output,
            batch_start,
            batch_end,
            group_blocks,
            squared,
            keys_file,
            format,
        } => {
            let plan = BatchPlan::new(batch_start, batch_end)?;
            let tracked = match keys_file {
                Some(path) => correlation::Tracked::Keys(correlation::read_keys_file(&path)?),
                None => correlation::Tracked::Categories,
            };
            let accumulation = if squared {
                Accumulation::Squared
            } else {
                Accumulation::Raw
            };
            correlation::run(
                &correlation::CorrelationConfig {
                    trace,
                    output,
                    plan,
                    group_blocks,
                    accumulation,
                    tracked,
                    format,
                    progress_interval: cli.progress,
                },
                cancel,
            )
        }
        Command::Pairs {
            trace,
            output_dir,
            distance,
            batch_start,
            batch_end,
            min_freq,
        } => {
            if distance.is_empty() {
                anyhow::bail!("at least one pairing distance is required");
            }
            let plan = BatchPlan::new(batch_start, batch_end)?;
            frequency::run(
                &frequency::FrequencyConfig {
                    traces: trace,
                    output_dir,
                    distances: distance,
                    plan,
                    min_freq,
                    progress_interval: cli.progress,
                },
                cancel,
            )
        }
        Command::Distribution {
            trace,
            output_dir,
            start,
            end,
            step,
        } => distribution::run(
            &distribution::DistributionConfig {
                trace,
                output_dir,
                start_block: start,
                end_block: end,
                step,
                progress_interval: cli.progress,
            },
            cancel,
        ),
        Command::Count { trace, output } => distribution::run_count(
            &distribution::CountConfig {
                trace,
                output,
                progress_interval: cli.progress,
            },
            cancel,
        ),
        Command::Merge { input, output } => merge::run(&merge::MergeConfig {
            inputs: input,
            output,
        }),
    }
}
