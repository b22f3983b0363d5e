//! Operation distribution analysis
//!
//! Two related runs. `count` scans a whole trace and tallies op types per
//! key category. `distribution` walks a block range in fixed-size windows
//! and, per window, writes the per-category tallies plus one frequency
//! file per (category, op type) listing how often each individual key was
//! touched. Windows reset all tallies so peak memory stays bounded by one
//! window, not the whole range.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::memory;
use crate::parser::{LineParser, OpType, TraceLine};
use crate::report;
use crate::scanner::{BatchPlan, BatchSink, Scanner};
use crate::schema;

/// Settings for the whole-file `count` run
#[derive(Debug, Clone)]
pub struct CountConfig {
    pub trace: PathBuf,
    pub output: PathBuf,
    pub progress_interval: u64,
}

/// Settings for the windowed `distribution` run
#[derive(Debug, Clone)]
pub struct DistributionConfig {
    pub trace: PathBuf,
    pub output_dir: PathBuf,
    pub start_block: u64,
    pub end_block: u64,
    pub step: u64,
    pub progress_interval: u64,
}

/// Per-key touch counts for each op kind within one category
#[derive(Debug, Default)]
struct OpDistribution {
    get: HashMap<String, u64>,
    batch_put: HashMap<String, u64>,
    put: HashMap<String, u64>,
    update: HashMap<String, u64>,
    delete: HashMap<String, u64>,
    scan: HashMap<String, u64>,
}

impl OpDistribution {
    fn map_for(&mut self, op: &OpType) -> Option<&mut HashMap<String, u64>> {
        match op {
            OpType::Get => Some(&mut self.get),
            OpType::BatchPut => Some(&mut self.batch_put),
            OpType::Put => Some(&mut self.put),
            OpType::Update => Some(&mut self.update),
            OpType::BatchDelete => Some(&mut self.delete),
            OpType::NewIterator => Some(&mut self.scan),
            OpType::Other(_) => None,
        }
    }

    fn tagged_maps(&self) -> [(&'static str, &HashMap<String, u64>); 6] {
        [
            ("get", &self.get),
            ("batchput", &self.batch_put),
            ("put", &self.put),
            ("update", &self.update),
            ("delete", &self.delete),
            ("scan", &self.scan),
        ]
    }
}

/// Category an event's key belongs to; keyless ops land in Unknown
fn event_category(key: Option<&[u8]>) -> &'static str {
    key.map_or(schema::UNKNOWN_CATEGORY, schema::classify)
}

/// Total op count across a tally, SIMD-summed
fn op_total(stats: &BTreeMap<String, BTreeMap<String, u64>>) -> u64 {
    let counts: Vec<f32> = stats
        .values()
        .flat_map(|ops| ops.values())
        .map(|&c| c as f32)
        .collect();
    if counts.is_empty() {
        return 0;
    }
    trueno::Vector::from_slice(&counts).sum().unwrap_or(0.0) as u64
}

/// Write one `ID\tKey\tCount` frequency file, most-touched keys first
fn write_distribution_file(path: &Path, counts: &HashMap<String, u64>) -> Result<()> {
    let mut sorted: Vec<(&String, &u64)> = counts.iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    let file = File::create(path)
        .with_context(|| format!("failed to create distribution file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writeln!(writer, "ID\tKey\tCount").context("failed to write distribution header")?;
    for (id, (key, count)) in sorted.iter().enumerate() {
        writeln!(writer, "{}\t{}\t{}", id + 1, key, count)
            .context("failed to write distribution row")?;
    }
    writer.flush().context("failed to flush distribution file")
}

/// Windowed sink: tallies reset on every window flush
struct DistributionSink {
    output_dir: PathBuf,
    stats: BTreeMap<String, BTreeMap<String, u64>>,
    dist: HashMap<&'static str, OpDistribution>,
}

impl DistributionSink {
    fn new(output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            stats: BTreeMap::new(),
            dist: HashMap::new(),
        }
    }

    fn reset(&mut self) {
        self.stats = BTreeMap::new();
        self.dist = HashMap::new();
    }
}

impl BatchSink for DistributionSink {
    fn on_block_start(&mut self, _block_id: u64) {}

    fn on_event(&mut self, event: &crate::parser::TraceEvent, _block_id: u64) {
        let category = event_category(event.key.as_deref());
        *self
            .stats
            .entry(category.to_string())
            .or_default()
            .entry(event.op.as_str().to_string())
            .or_default() += 1;

        if let Some(key) = event.key.as_deref() {
            let dist = self.dist.entry(category).or_default();
            if let Some(map) = dist.map_for(&event.op) {
                *map.entry(hex::encode(key)).or_default() += 1;
            }
        }
    }

    fn on_batch_end(&mut self, start_id: u64, end_id: u64) -> Result<()> {
        let count_path = self
            .output_dir
            .join(format!("countKVDist-{}_{}.txt", start_id, end_id));
        let file = File::create(&count_path)
            .with_context(|| format!("failed to create count report {}", count_path.display()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "Count of KV operations:").context("failed to write count report")?;
        report::write_counts(&mut writer, &self.stats)?;
        writer.flush().context("failed to flush count report")?;

        for (category, dist) in &self.dist {
            for (tag, map) in dist.tagged_maps() {
                // Single-key maps carry no distribution worth a file.
                if map.len() > 1 {
                    let path = self.output_dir.join(format!(
                        "distribution-{}_{}_{}_{}_dis.txt",
                        start_id, end_id, category, tag
                    ));
                    write_distribution_file(&path, map)?;
                }
            }
        }

        info!(
            start_id,
            end_id,
            ops = op_total(&self.stats),
            "window flushed"
        );
        println!(
            "Window {}..{} written to {}",
            start_id,
            end_id,
            count_path.display()
        );
        memory::report_usage();
        self.reset();
        Ok(())
    }
}

/// Execute a windowed distribution run
pub fn run(config: &DistributionConfig, cancel: Arc<AtomicBool>) -> Result<()> {
    let plan = BatchPlan::from_chunks(config.start_block, config.end_block, config.step)?;
    info!(
        windows = plan.batch_count(),
        start = config.start_block,
        end = config.end_block,
        "starting distribution run"
    );
    let mut sink = DistributionSink::new(config.output_dir.clone());
    let scanner = Scanner::new(plan, config.progress_interval, cancel);
    let summary = scanner.scan_file(&config.trace, &mut sink)?;
    println!(
        "Processed {} lines, {} windows flushed",
        summary.lines, summary.batches_completed
    );
    Ok(())
}

/// Execute a whole-file count run: no block machinery, every op line
/// counts
pub fn run_count(config: &CountConfig, cancel: Arc<AtomicBool>) -> Result<()> {
    let file = File::open(&config.trace)
        .with_context(|| format!("failed to open trace {}", config.trace.display()))?;
    let parser = LineParser::new();
    let mut stats: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    let mut lines = 0_u64;

    for line in BufReader::new(file).lines() {
        let line = line.context("error reading trace")?;
        lines += 1;
        if config.progress_interval > 0 && lines % config.progress_interval == 0 {
            print!("\rProcessed {} lines", lines);
        }
        if cancel.load(std::sync::atomic::Ordering::Relaxed) {
            info!(lines, "interrupted, flushing partial counts");
            break;
        }
        match parser.parse(line.trim()) {
            Ok(TraceLine::Op(event)) => {
                let category = event_category(event.key.as_deref());
                *stats
                    .entry(category.to_string())
                    .or_default()
                    .entry(event.op.as_str().to_string())
                    .or_default() += 1;
            }
            Ok(_) => {}
            Err(err) => warn!(line = lines, %err, "skipping malformed line"),
        }
    }

    let output = File::create(&config.output)
        .with_context(|| format!("failed to create output {}", config.output.display()))?;
    let mut writer = BufWriter::new(output);
    report::write_counts(&mut writer, &stats)?;
    writer.flush().context("failed to flush output")?;

    println!(
        "\rProcessed a total of {} lines ({} operations), statistics written to {}",
        lines,
        op_total(&stats),
        config.output.display()
    );
    memory::report_usage();
    Ok(())
}
