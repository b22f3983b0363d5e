//! Fixed-distance frequency run
//!
//! Drives a [`PairTracker`] over each configured trace and distance. Each
//! batch flushes its surviving pairs (frequency above the cut) to its own
//! report file and clears the map, so a multi-range run over a very large
//! trace never holds more than one batch of pairs.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::memory;
use crate::pairs::{PairSide, PairTracker};
use crate::parser::TraceEvent;
use crate::report;
use crate::scanner::{BatchPlan, BatchSink, Scanner};

/// Settings for one frequency run (all traces, all distances)
#[derive(Debug, Clone)]
pub struct FrequencyConfig {
    pub traces: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub distances: Vec<usize>,
    pub plan: BatchPlan,
    /// Pairs below this frequency are dropped at flush (noise cut)
    pub min_freq: u64,
    pub progress_interval: u64,
}

/// Sink for one (trace, distance) pass
struct FrequencySink {
    tracker: PairTracker,
    min_freq: u64,
    output_dir: PathBuf,
    trace_stem: String,
}

impl FrequencySink {
    fn report_path(&self, end_id: u64) -> PathBuf {
        self.output_dir.join(format!(
            "rawFreq-{}-Dist{}-{}.log",
            end_id,
            self.tracker.distance(),
            self.trace_stem
        ))
    }
}

impl BatchSink for FrequencySink {
    fn on_block_start(&mut self, _block_id: u64) {
        // Pairs never span a block boundary.
        self.tracker.reset_window();
    }

    fn on_event(&mut self, event: &TraceEvent, block_id: u64) {
        if !event.is_keyed_get() {
            return;
        }
        let key = event.key.as_deref().unwrap_or_default();
        let size = event.size.unwrap_or_default();
        self.tracker.record(PairSide::new(key, size), block_id);
    }

    fn on_batch_end(&mut self, start_id: u64, end_id: u64) -> Result<()> {
        let entries = self.tracker.drain_frequent(self.min_freq);
        let path = self.report_path(end_id);
        let file = File::create(&path)
            .with_context(|| format!("failed to create report {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        report::write_frequency(&mut writer, &entries)?;
        writer.flush().context("failed to flush report")?;

        info!(
            start_id,
            end_id,
            pairs = entries.len(),
            "batch pairs flushed"
        );
        println!("The final processed block ID in this batch is {}", end_id);
        memory::report_usage();
        Ok(())
    }
}

/// File-name stem for a trace path: its final component
fn trace_stem(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| "trace".to_string(), |name| name.to_string_lossy().into_owned())
}

/// Execute every (trace, distance) combination in the config
pub fn run(config: &FrequencyConfig, cancel: Arc<AtomicBool>) -> Result<()> {
    for trace in &config.traces {
        for &distance in &config.distances {
            info!(trace = %trace.display(), distance, "starting frequency pass");
            println!("Processing {}, distance={}", trace.display(), distance);
            let mut sink = FrequencySink {
                tracker: PairTracker::new(distance),
                min_freq: config.min_freq,
                output_dir: config.output_dir.clone(),
                trace_stem: trace_stem(trace),
            };
            let scanner = Scanner::new(
                config.plan.clone(),
                config.progress_interval,
                Arc::clone(&cancel),
            );
            let summary = scanner.scan_file(trace, &mut sink)?;
            if summary.interrupted {
                info!("interrupted, partial results flushed");
                return Ok(());
            }
        }
    }
    Ok(())
}
