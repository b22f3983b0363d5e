//! Frequency report merging
//!
//! Folds any number of per-batch frequency reports into one: frequencies
//! add, observed-block sets union. The merged result is re-sorted by
//! descending frequency before writing, so the output of a merge is
//! itself a valid merge input.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::pairs::PairStats;
use crate::report;

/// Settings for one merge run
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
}

/// Fold one report file into the accumulator map
fn merge_file(path: &Path, merged: &mut HashMap<String, PairStats>) -> Result<()> {
    let file =
        File::open(path).with_context(|| format!("failed to open input {}", path.display()))?;
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("error reading input")?;
        if line.trim().is_empty() {
            continue;
        }
        match report::parse_frequency_line(line.trim()) {
            Ok((pair_key, stats)) => {
                let entry = merged.entry(pair_key).or_default();
                entry.frequency += stats.frequency;
                entry.blocks.extend(stats.blocks);
            }
            Err(err) => {
                warn!(file = %path.display(), line = number + 1, %err, "skipping bad line");
            }
        }
    }
    Ok(())
}

/// Merge all inputs and write the combined, sorted report
pub fn run(config: &MergeConfig) -> Result<()> {
    let mut merged: HashMap<String, PairStats> = HashMap::new();
    for input in &config.inputs {
        info!(input = %input.display(), "merging");
        merge_file(input, &mut merged)?;
    }

    let mut entries: Vec<(String, PairStats)> = merged.into_iter().collect();
    entries.sort_by(|a, b| b.1.frequency.cmp(&a.1.frequency).then_with(|| a.0.cmp(&b.0)));

    let output = File::create(&config.output)
        .with_context(|| format!("failed to create output {}", config.output.display()))?;
    let mut writer = BufWriter::new(output);
    report::write_frequency(&mut writer, &entries)?;
    writer.flush().context("failed to flush output")?;

    println!(
        "Merged {} inputs into {} ({} pairs)",
        config.inputs.len(),
        config.output.display(),
        entries.len()
    );
    Ok(())
}
