//! Correlation analysis run
//!
//! Builds one presence bit-vector per tracked label (category, or hex key
//! when a keys file is given), advances one bit position per classified
//! Get event, and folds a Pearson matrix into the running accumulator at
//! every partition boundary. A partition is the whole batch, or every
//! `group_blocks` blocks when grouping is on.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::bitvec::BitVec;
use crate::cli::ReportFormat;
use crate::memory;
use crate::parser::TraceEvent;
use crate::pearson::{pearson_matrix, Accumulation, MatrixAccumulator};
use crate::report;
use crate::scanner::{BatchPlan, BatchSink, Scanner};
use crate::schema;

/// What the correlation run tracks per bit-vector slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tracked {
    /// One slot per schema category
    Categories,
    /// One slot per explicit hex key
    Keys(Vec<String>),
}

/// Settings for one correlation run
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    pub trace: PathBuf,
    pub output: PathBuf,
    pub plan: BatchPlan,
    /// 0 treats the whole batch as a single partition
    pub group_blocks: u64,
    pub accumulation: Accumulation,
    pub tracked: Tracked,
    pub format: ReportFormat,
    pub progress_interval: u64,
}

/// Presence accumulation and matrix folding for one run
struct CorrelationSink {
    labels: Vec<String>,
    index: HashMap<String, usize>,
    by_category: bool,
    bits: Vec<BitVec>,
    position: usize,
    group_blocks: u64,
    blocks_in_group: u64,
    accumulator: MatrixAccumulator,
}

impl CorrelationSink {
    fn new(tracked: &Tracked, group_blocks: u64, accumulation: Accumulation) -> Self {
        let (labels, by_category) = match tracked {
            Tracked::Categories => (
                schema::categories()
                    .into_iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
                true,
            ),
            Tracked::Keys(keys) => (keys.clone(), false),
        };
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        let bits = vec![BitVec::new(); labels.len()];
        let accumulator = MatrixAccumulator::new(labels.len(), accumulation);
        Self {
            labels,
            index,
            by_category,
            bits,
            position: 0,
            group_blocks,
            blocks_in_group: 0,
            accumulator,
        }
    }

    /// Fold the current partition into the accumulator and reset bits
    ///
    /// Empty partitions are skipped: a matrix over zero trials carries no
    /// information and its forced 1.0 diagonal would still pollute sums.
    fn fold_partition(&mut self) {
        if self.position > 0 {
            let matrix = pearson_matrix(&self.bits, self.position);
            self.accumulator.fold(&matrix);
        }
        for bit_vec in &mut self.bits {
            bit_vec.clear();
        }
        self.position = 0;
        self.blocks_in_group = 0;
    }
}

impl BatchSink for CorrelationSink {
    fn on_block_start(&mut self, _block_id: u64) {}

    fn on_event(&mut self, event: &TraceEvent, _block_id: u64) {
        if !event.is_keyed_get() {
            return;
        }
        let key = event.key.as_deref().unwrap_or_default();
        let slot = if self.by_category {
            self.index.get(schema::classify(key))
        } else {
            self.index.get(&hex::encode(key))
        };
        if let Some(&slot) = slot {
            self.bits[slot].set(self.position);
        }
        // Every classified Get advances the position, tracked or not, so
        // all vectors in the partition share one logical length.
        self.position += 1;
    }

    fn on_block_end(&mut self, _block_id: u64) -> Result<()> {
        if self.group_blocks > 0 {
            self.blocks_in_group += 1;
            if self.blocks_in_group == self.group_blocks {
                self.fold_partition();
            }
        }
        Ok(())
    }

    fn on_batch_end(&mut self, start_id: u64, end_id: u64) -> Result<()> {
        self.fold_partition();
        info!(start_id, end_id, "batch finalized");
        println!("The final processed block ID in this batch is {}", end_id);
        memory::report_usage();
        Ok(())
    }
}

/// Read tracked keys from a distribution report: second whitespace field
/// of every line that has one
pub fn read_keys_file(path: &Path) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("failed to open keys file {}", path.display()))?;
    let mut keys = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.context("error reading keys file")?;
        let mut fields = line.split_whitespace();
        let (first, second) = (fields.next(), fields.next());
        if let (Some(_), Some(key)) = (first, second) {
            keys.push(key.to_string());
        }
    }
    if keys.is_empty() {
        anyhow::bail!("keys file {} contains no keys", path.display());
    }
    Ok(keys)
}

/// Execute a correlation run end to end
pub fn run(config: &CorrelationConfig, cancel: Arc<AtomicBool>) -> Result<()> {
    let mut sink = CorrelationSink::new(&config.tracked, config.group_blocks, config.accumulation);
    info!(
        labels = sink.labels.len(),
        batches = config.plan.batch_count(),
        "starting correlation run"
    );

    let output = File::create(&config.output)
        .with_context(|| format!("failed to create output {}", config.output.display()))?;
    let mut writer = BufWriter::new(output);

    let scanner = Scanner::new(config.plan.clone(), config.progress_interval, cancel);
    let summary = scanner.scan_file(&config.trace, &mut sink)?;
    if summary.interrupted {
        info!(lines = summary.lines, "interrupted, flushing partial results");
    }

    match config.format {
        ReportFormat::Text => {
            report::write_correlation_text(&mut writer, &sink.labels, sink.accumulator.sums())?;
        }
        ReportFormat::Json => {
            let json = report::correlation_json(
                &sink.labels,
                sink.accumulator.sums(),
                sink.accumulator.partitions(),
            );
            serde_json::to_writer_pretty(&mut writer, &json)
                .context("failed to serialize correlation report")?;
            writeln!(writer)?;
        }
    }
    writer.flush().context("failed to flush output")?;

    println!(
        "Correlation results written to {} ({} partitions over {} lines)",
        config.output.display(),
        sink.accumulator.partitions(),
        summary.lines
    );
    memory::report_usage();
    Ok(())
}
