//! Report line formats
//!
//! Three textual formats, kept stable because downstream plotting scripts
//! parse them:
//!
//! ```text
//! category1: HeaderPrefix; category2: BlockBodyPrefix; coeff: 0.412311
//! key: 6161-1;6262-2; Freq: 17; Blocks: 100;101;107
//! Category: HeaderPrefix
//!   OPType: Get, Count: 42
//! ```
//!
//! The correlation report can also be exported as JSON for machine
//! consumption.

use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::pairs::PairStats;

/// A single cell of the correlation report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonCoefficient {
    pub category1: String,
    pub category2: String,
    pub coeff: f64,
}

/// Whole correlation report for `--format json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonCorrelationReport {
    /// Tracked labels in matrix order
    pub labels: Vec<String>,
    /// Number of partitions folded into the sums
    pub partitions: u64,
    pub coefficients: Vec<JsonCoefficient>,
}

/// Matrix cells ordered by descending |coefficient|, then label pair
fn sorted_cells(labels: &[String], sums: &[f64]) -> Vec<(usize, usize)> {
    let n = labels.len();
    let mut cells: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .collect();
    cells.sort_by(|&(ai, aj), &(bi, bj)| {
        sums[bi * n + bj]
            .abs()
            .partial_cmp(&sums[ai * n + aj].abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (&labels[ai], &labels[aj]).cmp(&(&labels[bi], &labels[bj])))
    });
    cells
}

/// Write the N×N correlation matrix, strongest coefficients first
pub fn write_correlation_text<W: Write>(
    writer: &mut W,
    labels: &[String],
    sums: &[f64],
) -> Result<()> {
    let n = labels.len();
    for (i, j) in sorted_cells(labels, sums) {
        writeln!(
            writer,
            "category1: {}; category2: {}; coeff: {:.6}",
            labels[i],
            labels[j],
            sums[i * n + j]
        )
        .context("failed to write correlation report")?;
    }
    Ok(())
}

/// Build the JSON form of the correlation report, same ordering as text
pub fn correlation_json(labels: &[String], sums: &[f64], partitions: u64) -> JsonCorrelationReport {
    let n = labels.len();
    let coefficients = sorted_cells(labels, sums)
        .into_iter()
        .map(|(i, j)| JsonCoefficient {
            category1: labels[i].clone(),
            category2: labels[j].clone(),
            coeff: sums[i * n + j],
        })
        .collect();
    JsonCorrelationReport {
        labels: labels.to_vec(),
        partitions,
        coefficients,
    }
}

/// Write pair-frequency entries: `key: <pair>; Freq: <n>; Blocks: <ids>`
pub fn write_frequency<W: Write>(writer: &mut W, entries: &[(String, PairStats)]) -> Result<()> {
    for (pair_key, stats) in entries {
        let blocks = stats
            .blocks
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(";");
        writeln!(
            writer,
            "key: {}; Freq: {}; Blocks: {}",
            pair_key, stats.frequency, blocks
        )
        .context("failed to write frequency report")?;
    }
    Ok(())
}

/// Parse one frequency-report line back into its parts
///
/// Accepts exactly what [`write_frequency`] emits.
pub fn parse_frequency_line(line: &str) -> Result<(String, PairStats)> {
    // The pair key itself contains one ';', so split on the labeled
    // fields: "key: A;B; Freq: n; Blocks: ...".
    let rest = line
        .strip_prefix("key: ")
        .ok_or_else(|| anyhow!("missing key field: {:?}", line))?;
    let (pair_key, rest) = rest
        .split_once("; Freq: ")
        .ok_or_else(|| anyhow!("missing Freq field: {:?}", line))?;
    let (freq_text, blocks_text) = rest
        .split_once("; Blocks: ")
        .ok_or_else(|| anyhow!("missing Blocks field: {:?}", line))?;

    let frequency: u64 = freq_text
        .trim()
        .parse()
        .with_context(|| format!("bad frequency in {:?}", line))?;
    let mut stats = PairStats {
        frequency,
        ..PairStats::default()
    };
    for id_text in blocks_text.trim().split(';').filter(|t| !t.is_empty()) {
        let id: u64 = id_text
            .trim()
            .parse()
            .with_context(|| format!("bad block ID {:?} in {:?}", id_text, line))?;
        stats.blocks.insert(id);
    }
    Ok((pair_key.to_string(), stats))
}

/// Write per-category op-type counts in the `Category:`/`OPType:` format
///
/// `BTreeMap` keys keep the output deterministic run to run.
pub fn write_counts<W: Write>(
    writer: &mut W,
    stats: &BTreeMap<String, BTreeMap<String, u64>>,
) -> Result<()> {
    for (category, ops) in stats {
        writeln!(writer, "Category: {}", category).context("failed to write count report")?;
        for (op, count) in ops {
            writeln!(writer, "  OPType: {}, Count: {}", op, count)
                .context("failed to write count report")?;
        }
    }
    Ok(())
}
