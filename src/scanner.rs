//! Streaming trace scan with batch partitioning
//!
//! The scanner reads the trace once, start to end, and tracks a two-state
//! machine: `Seeking` until a block-start marker whose ID opens one of the
//! configured batches, then `InBatch` until the block-end marker carrying
//! that batch's closing ID. Lines outside a batch are skipped without
//! classification. An interrupt flag flushes through the same path as a
//! normal batch end, so a cancelled run leaves a usable report behind.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::warn;

use crate::parser::{LineParser, TraceEvent, TraceLine};

/// Invalid run configuration, rejected before any scanning begins
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("batch boundary lists are empty")]
    EmptyBatches,
    #[error("batch start list has {starts} entries but end list has {ends}")]
    UnevenBatches { starts: usize, ends: usize },
    #[error("batch {index}: start block {start} is beyond end block {end}")]
    InvertedBatch { index: usize, start: u64, end: u64 },
    #[error("block step must be greater than zero")]
    ZeroStep,
    #[error("start block {start} is not below end block {end}")]
    InvertedRange { start: u64, end: u64 },
}

/// One or more disjoint block-ID ranges whose statistics flush as a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    starts: Vec<u64>,
    ends: Vec<u64>,
}

impl BatchPlan {
    /// Build a plan from parallel start/end ID lists
    pub fn new(starts: Vec<u64>, ends: Vec<u64>) -> Result<Self, ConfigError> {
        if starts.is_empty() || ends.is_empty() {
            return Err(ConfigError::EmptyBatches);
        }
        if starts.len() != ends.len() {
            return Err(ConfigError::UnevenBatches {
                starts: starts.len(),
                ends: ends.len(),
            });
        }
        for (index, (&start, &end)) in starts.iter().zip(ends.iter()).enumerate() {
            if start > end {
                return Err(ConfigError::InvertedBatch { index, start, end });
            }
        }
        Ok(Self { starts, ends })
    }

    /// Cover `[start, end)` with consecutive `step`-sized batches
    pub fn from_chunks(start: u64, end: u64, step: u64) -> Result<Self, ConfigError> {
        if step == 0 {
            return Err(ConfigError::ZeroStep);
        }
        if start >= end {
            return Err(ConfigError::InvertedRange { start, end });
        }
        let mut starts = Vec::new();
        let mut ends = Vec::new();
        let mut cursor = start;
        while cursor < end {
            let chunk_end = (cursor + step - 1).min(end - 1);
            starts.push(cursor);
            ends.push(chunk_end);
            cursor += step;
        }
        Self::new(starts, ends)
    }

    pub fn batch_count(&self) -> usize {
        self.starts.len()
    }

    /// Bounds of batch `index`
    pub fn bounds(&self, index: usize) -> (u64, u64) {
        (self.starts[index], self.ends[index])
    }

    fn index_of_start(&self, block_id: u64) -> Option<usize> {
        self.starts.iter().position(|&id| id == block_id)
    }

    fn is_last(&self, index: usize) -> bool {
        index + 1 == self.starts.len()
    }
}

/// Consumer of classified scan events
///
/// One implementation per analysis mode; the scanner owns the state
/// machine, the sink owns the accumulators.
pub trait BatchSink {
    /// A block inside an active batch begins
    fn on_block_start(&mut self, block_id: u64);

    /// An operation record inside an active batch
    fn on_event(&mut self, event: &TraceEvent, block_id: u64);

    /// A block inside an active batch closed (fires before any batch end)
    fn on_block_end(&mut self, _block_id: u64) -> Result<()> {
        Ok(())
    }

    /// The active batch reached its configured end: flush and reset
    fn on_batch_end(&mut self, start_id: u64, end_id: u64) -> Result<()>;
}

/// What a completed (or interrupted) scan looked like
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub lines: u64,
    pub batches_completed: usize,
    pub last_block: Option<u64>,
    pub interrupted: bool,
}

/// Trace scanner: one compiled parser, one plan, one cancel flag
pub struct Scanner {
    parser: LineParser,
    plan: BatchPlan,
    progress_interval: u64,
    cancel: Arc<AtomicBool>,
}

impl Scanner {
    pub fn new(plan: BatchPlan, progress_interval: u64, cancel: Arc<AtomicBool>) -> Self {
        Self {
            parser: LineParser::new(),
            plan,
            progress_interval,
            cancel,
        }
    }

    /// Scan a trace file, feeding `sink` with everything inside the plan
    pub fn scan_file(&self, path: &Path, sink: &mut dyn BatchSink) -> Result<ScanSummary> {
        let file = File::open(path)
            .with_context(|| format!("failed to open trace {}", path.display()))?;
        self.scan(BufReader::new(file), sink)
    }

    /// Scan any line source; exposed separately for tests
    pub fn scan<R: BufRead>(&self, reader: R, sink: &mut dyn BatchSink) -> Result<ScanSummary> {
        let mut summary = ScanSummary {
            lines: 0,
            batches_completed: 0,
            last_block: None,
            interrupted: false,
        };
        // State: None = Seeking, Some(batch index) = InBatch
        let mut active_batch: Option<usize> = None;
        let mut current_block: Option<u64> = None;

        for line in reader.lines() {
            let line = line.context("error reading trace")?;
            summary.lines += 1;

            if self.progress_interval > 0 && summary.lines % self.progress_interval == 0 {
                print!("\rProcessed {} lines", summary.lines);
            }

            if self.cancel.load(Ordering::Relaxed) {
                // Flush whatever the current batch accumulated, then stop.
                if let Some(index) = active_batch {
                    let (start_id, end_id) = self.plan.bounds(index);
                    sink.on_batch_end(start_id, end_id)?;
                    summary.batches_completed += 1;
                }
                summary.interrupted = true;
                return Ok(summary);
            }

            let parsed = match self.parser.parse(line.trim()) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(line = summary.lines, %err, "skipping malformed line");
                    continue;
                }
            };

            match parsed {
                TraceLine::BlockStart(id) => {
                    summary.last_block = Some(id);
                    current_block = Some(id);
                    if let Some(index) = self.plan.index_of_start(id) {
                        active_batch = Some(index);
                    }
                    if active_batch.is_some() {
                        sink.on_block_start(id);
                    }
                }
                TraceLine::Op(event) => {
                    if active_batch.is_some() {
                        let block_id = current_block.unwrap_or(0);
                        sink.on_event(&event, block_id);
                    }
                }
                TraceLine::BlockEnd(id) => {
                    if let Some(open) = current_block {
                        if open != id {
                            warn!(start = open, end = id, "block ID mismatch");
                        }
                    }
                    if active_batch.is_some() {
                        sink.on_block_end(id)?;
                    }
                    if let Some(index) = active_batch {
                        let (start_id, end_id) = self.plan.bounds(index);
                        if id == end_id {
                            sink.on_batch_end(start_id, end_id)?;
                            summary.batches_completed += 1;
                            active_batch = None;
                            if self.plan.is_last(index) {
                                // Nothing left to look for in this trace.
                                break;
                            }
                        }
                    }
                }
                TraceLine::Other => {}
            }
        }

        // A batch still open at end of trace flushes what it has; a trace
        // that ends mid-range is common when the range outruns the log.
        if let Some(index) = active_batch {
            let (start_id, end_id) = self.plan.bounds(index);
            warn!(start_id, end_id, "trace ended before batch end marker");
            sink.on_batch_end(start_id, end_id)?;
            summary.batches_completed += 1;
        }

        if self.progress_interval > 0 {
            println!("\rProcessed {} lines", summary.lines);
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::OpType;
    use std::io::Cursor;

    #[derive(Default)]
    struct RecordingSink {
        blocks: Vec<u64>,
        events: Vec<(String, u64)>,
        batch_ends: Vec<(u64, u64)>,
    }

    impl BatchSink for RecordingSink {
        fn on_block_start(&mut self, block_id: u64) {
            self.blocks.push(block_id);
        }
        fn on_event(&mut self, event: &TraceEvent, block_id: u64) {
            self.events.push((event.op.as_str().to_string(), block_id));
        }
        fn on_batch_end(&mut self, start_id: u64, end_id: u64) -> Result<()> {
            self.batch_ends.push((start_id, end_id));
            Ok(())
        }
    }

    fn scan_text(plan: BatchPlan, text: &str) -> (ScanSummary, RecordingSink) {
        let scanner = Scanner::new(plan, 0, Arc::new(AtomicBool::new(false)));
        let mut sink = RecordingSink::default();
        let summary = scanner.scan(Cursor::new(text.to_string()), &mut sink).unwrap();
        (summary, sink)
    }

    #[test]
    fn test_plan_rejects_empty_lists() {
        assert_eq!(BatchPlan::new(vec![], vec![]), Err(ConfigError::EmptyBatches));
    }

    #[test]
    fn test_plan_rejects_uneven_lists() {
        assert_eq!(
            BatchPlan::new(vec![1, 2], vec![3]),
            Err(ConfigError::UnevenBatches { starts: 2, ends: 1 })
        );
    }

    #[test]
    fn test_plan_rejects_inverted_batch() {
        assert_eq!(
            BatchPlan::new(vec![10], vec![5]),
            Err(ConfigError::InvertedBatch { index: 0, start: 10, end: 5 })
        );
    }

    #[test]
    fn test_plan_from_chunks() {
        let plan = BatchPlan::from_chunks(100, 130, 10).unwrap();
        assert_eq!(plan.batch_count(), 3);
        assert_eq!(plan.bounds(0), (100, 109));
        assert_eq!(plan.bounds(2), (120, 129));
    }

    #[test]
    fn test_plan_from_chunks_partial_tail() {
        let plan = BatchPlan::from_chunks(0, 25, 10).unwrap();
        assert_eq!(plan.batch_count(), 3);
        assert_eq!(plan.bounds(2), (20, 24));
    }

    #[test]
    fn test_plan_from_chunks_zero_step() {
        assert_eq!(BatchPlan::from_chunks(0, 10, 0), Err(ConfigError::ZeroStep));
    }

    #[test]
    fn test_lines_outside_batch_are_skipped() {
        let text = "\
Processing block (start), ID: 5
OPType: Get, key: 6161, size: 1
Processing block (end), ID: 5
Processing block (start), ID: 10
OPType: Get, key: 6262, size: 2
Processing block (end), ID: 10
";
        let plan = BatchPlan::new(vec![10], vec![10]).unwrap();
        let (summary, sink) = scan_text(plan, text);
        assert_eq!(sink.events.len(), 1);
        assert_eq!(sink.events[0], ("Get".to_string(), 10));
        assert_eq!(sink.batch_ends, vec![(10, 10)]);
        assert_eq!(summary.batches_completed, 1);
    }

    #[test]
    fn test_scan_stops_after_last_batch() {
        let text = "\
Processing block (start), ID: 1
Processing block (end), ID: 1
Processing block (start), ID: 2
OPType: Get, key: 6161, size: 1
Processing block (end), ID: 2
";
        let plan = BatchPlan::new(vec![1], vec![1]).unwrap();
        let (summary, sink) = scan_text(plan, text);
        assert_eq!(summary.batches_completed, 1);
        // The block-2 event is never delivered
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_multi_batch_flushes_each_range() {
        let text = "\
Processing block (start), ID: 1
OPType: Get, key: 6161, size: 1
Processing block (end), ID: 1
Processing block (start), ID: 2
Processing block (end), ID: 2
Processing block (start), ID: 3
OPType: Get, key: 6262, size: 1
Processing block (end), ID: 4
Processing block (start), ID: 4
Processing block (end), ID: 4
";
        let plan = BatchPlan::new(vec![1, 3], vec![2, 4]).unwrap();
        let (summary, sink) = scan_text(plan, text);
        assert_eq!(sink.batch_ends, vec![(1, 2), (3, 4)]);
        assert_eq!(summary.batches_completed, 2);
    }

    #[test]
    fn test_open_batch_flushes_at_end_of_trace() {
        let text = "\
Processing block (start), ID: 1
OPType: Get, key: 6161, size: 1
Processing block (end), ID: 1
";
        // Batch end 5 never appears; EOF still flushes the open batch.
        let plan = BatchPlan::new(vec![1], vec![5]).unwrap();
        let (summary, sink) = scan_text(plan, text);
        assert_eq!(sink.batch_ends, vec![(1, 5)]);
        assert_eq!(summary.batches_completed, 1);
        assert!(!summary.interrupted);
    }

    #[test]
    fn test_malformed_line_is_skipped_not_fatal() {
        let text = "\
Processing block (start), ID: 1
OPType: Get, key: 6, size: 1
OPType: Get, key: 6161, size: 1
Processing block (end), ID: 1
";
        let plan = BatchPlan::new(vec![1], vec![1]).unwrap();
        let (summary, sink) = scan_text(plan, text);
        assert_eq!(sink.events.len(), 1);
        assert_eq!(summary.batches_completed, 1);
    }

    #[test]
    fn test_interrupt_flushes_active_batch() {
        let text = "\
Processing block (start), ID: 1
OPType: Get, key: 6161, size: 1
OPType: Get, key: 6262, size: 1
Processing block (end), ID: 9
";
        let plan = BatchPlan::new(vec![1], vec![9]).unwrap();
        let cancel = Arc::new(AtomicBool::new(false));
        let scanner = Scanner::new(plan, 0, Arc::clone(&cancel));
        let mut sink = RecordingSink::default();

        // Cancel is already set: the very first line triggers the flush path.
        cancel.store(true, Ordering::Relaxed);
        let summary = scanner
            .scan(Cursor::new(text.to_string()), &mut sink)
            .unwrap();
        assert!(summary.interrupted);
        // No batch was active yet at line one, so nothing flushed.
        assert!(sink.batch_ends.is_empty());
    }

    #[test]
    fn test_interrupt_mid_batch_flushes_through_batch_end() {
        let text = "\
Processing block (start), ID: 1
OPType: Get, key: 6161, size: 1
OPType: Get, key: 6262, size: 1
Processing block (end), ID: 9
";
        let plan = BatchPlan::new(vec![1], vec![9]).unwrap();
        let cancel = Arc::new(AtomicBool::new(false));
        let scanner = Scanner::new(plan, 0, Arc::clone(&cancel));

        // Sink raises the flag after the first event, as the ctrlc
        // handler would from its own thread.
        struct CancellingSink {
            cancel: Arc<AtomicBool>,
            events: usize,
            flushes: Vec<(u64, u64)>,
        }
        impl BatchSink for CancellingSink {
            fn on_block_start(&mut self, _: u64) {}
            fn on_event(&mut self, _: &TraceEvent, _: u64) {
                self.events += 1;
                self.cancel.store(true, Ordering::Relaxed);
            }
            fn on_batch_end(&mut self, start_id: u64, end_id: u64) -> Result<()> {
                self.flushes.push((start_id, end_id));
                Ok(())
            }
        }
        let mut sink = CancellingSink {
            cancel: Arc::clone(&cancel),
            events: 0,
            flushes: Vec::new(),
        };
        let summary = scanner
            .scan(Cursor::new(text.to_string()), &mut sink)
            .unwrap();
        assert!(summary.interrupted);
        assert_eq!(sink.events, 1);
        // The in-flight batch flushed exactly once, via the normal path.
        assert_eq!(sink.flushes, vec![(1, 9)]);
    }

    #[test]
    fn test_block_id_mismatch_is_nonfatal() {
        let text = "\
Processing block (start), ID: 1
OPType: Get, key: 6161, size: 1
Processing block (end), ID: 99
Processing block (end), ID: 1
";
        let plan = BatchPlan::new(vec![1], vec![1]).unwrap();
        // End ID 99 mismatches but only warns; the batch closes when the
        // configured end ID finally shows up.
        let (summary, sink) = scan_text(plan, text);
        assert_eq!(summary.batches_completed, 1);
        assert_eq!(sink.events.len(), 1);
    }

    #[test]
    fn test_event_carries_op_detail() {
        let text = "\
Processing block (start), ID: 1
OPType: BatchPut, key: 6161, size: 32
OPType: NewIterator
Processing block (end), ID: 1
";
        let plan = BatchPlan::new(vec![1], vec![1]).unwrap();
        let scanner = Scanner::new(plan, 0, Arc::new(AtomicBool::new(false)));

        struct OpSink(Vec<OpType>);
        impl BatchSink for OpSink {
            fn on_block_start(&mut self, _: u64) {}
            fn on_event(&mut self, event: &TraceEvent, _: u64) {
                self.0.push(event.op.clone());
            }
            fn on_batch_end(&mut self, _: u64, _: u64) -> Result<()> {
                Ok(())
            }
        }
        let mut sink = OpSink(Vec::new());
        scanner.scan(Cursor::new(text.to_string()), &mut sink).unwrap();
        assert_eq!(sink.0, vec![OpType::BatchPut, OpType::NewIterator]);
    }
}
