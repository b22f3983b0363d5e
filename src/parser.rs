//! Trace line grammar
//!
//! The client emits one line per key-value operation plus block boundary
//! markers. The exact shapes are:
//!
//! ```text
//! Processing block (start), ID: 20500000
//! OPType: Get, key: 68616263, size: 10
//! OPType: NewIterator, prefix: 68
//! Processing block (end), ID: 20500000
//! ```
//!
//! All patterns are compiled once per run and shared; the scan loop never
//! rebuilds a regex.

use regex::Regex;
use thiserror::Error;

/// Operation type recorded in the trace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OpType {
    Get,
    Put,
    BatchPut,
    Update,
    BatchDelete,
    NewIterator,
    /// Any op word the taxonomy does not name explicitly
    Other(String),
}

impl OpType {
    fn from_word(word: &str) -> Self {
        match word {
            "Get" => OpType::Get,
            "Put" => OpType::Put,
            "BatchPut" => OpType::BatchPut,
            "Update" => OpType::Update,
            "BatchDelete" => OpType::BatchDelete,
            "NewIterator" => OpType::NewIterator,
            other => OpType::Other(other.to_string()),
        }
    }

    /// The op word as it appears in the trace
    pub fn as_str(&self) -> &str {
        match self {
            OpType::Get => "Get",
            OpType::Put => "Put",
            OpType::BatchPut => "BatchPut",
            OpType::Update => "Update",
            OpType::BatchDelete => "BatchDelete",
            OpType::NewIterator => "NewIterator",
            OpType::Other(word) => word,
        }
    }

    /// Short lowercase tag used in distribution output file names
    pub fn file_tag(&self) -> &str {
        match self {
            OpType::Get => "get",
            OpType::Put => "put",
            OpType::BatchPut => "batchput",
            OpType::Update => "update",
            OpType::BatchDelete => "delete",
            OpType::NewIterator => "scan",
            OpType::Other(word) => word,
        }
    }
}

impl std::fmt::Display for OpType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One parsed operation record
///
/// `key` and `size` are optional in the general form; `NewIterator` lines
/// may carry a `prefix:` field instead of `key:`, which lands in `key` too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub op: OpType,
    pub key: Option<Vec<u8>>,
    pub size: Option<u64>,
}

impl TraceEvent {
    /// True for the narrow `OPType: Get, key: .., size: ..` form that the
    /// correlation and pairing engines consume
    pub fn is_keyed_get(&self) -> bool {
        self.op == OpType::Get && self.key.is_some() && self.size.is_some()
    }
}

/// Result of parsing a single trace line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceLine {
    BlockStart(u64),
    BlockEnd(u64),
    Op(TraceEvent),
    /// Anything else (client log noise between records)
    Other,
}

/// A malformed line that matched an operation shape but cannot be used
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid hex key {key:?}: {source}")]
    InvalidHex {
        key: String,
        source: hex::FromHexError,
    },
    #[error("invalid numeric field {field:?} in line {line:?}")]
    InvalidNumber { field: String, line: String },
}

/// Compiled line patterns, built once and shared across the whole scan
#[derive(Debug)]
pub struct LineParser {
    start: Regex,
    end: Regex,
    op: Regex,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    pub fn new() -> Self {
        // The patterns are static and known-good; expect here is fine.
        Self {
            start: Regex::new(r"Processing block \(start\), ID: (\d+)")
                .expect("block start pattern"),
            end: Regex::new(r"Processing block \(end\), ID: (\d+)").expect("block end pattern"),
            op: Regex::new(r"OPType: (\w+)(?:, (?:key|prefix): ([0-9a-fA-F]+))?(?:, size: (\d+))?")
                .expect("operation pattern"),
        }
    }

    /// Parse one trimmed trace line
    ///
    /// Lines matching no pattern come back as [`TraceLine::Other`]; only a
    /// line that matched an operation shape but carries garbage (bad hex,
    /// unparseable number) is an error, and callers treat that as a
    /// warning, not a stop.
    pub fn parse(&self, line: &str) -> Result<TraceLine, ParseError> {
        if let Some(caps) = self.start.captures(line) {
            let id = Self::capture_u64(&caps, 1, line)?;
            return Ok(TraceLine::BlockStart(id));
        }
        if let Some(caps) = self.end.captures(line) {
            let id = Self::capture_u64(&caps, 1, line)?;
            return Ok(TraceLine::BlockEnd(id));
        }
        if let Some(caps) = self.op.captures(line) {
            let op = OpType::from_word(caps.get(1).map_or("", |m| m.as_str()));
            let key = match caps.get(2) {
                Some(m) => Some(hex::decode(m.as_str()).map_err(|source| {
                    ParseError::InvalidHex {
                        key: m.as_str().to_string(),
                        source,
                    }
                })?),
                None => None,
            };
            let size = match caps.get(3) {
                Some(m) => Some(m.as_str().parse::<u64>().map_err(|_| {
                    ParseError::InvalidNumber {
                        field: m.as_str().to_string(),
                        line: line.to_string(),
                    }
                })?),
                None => None,
            };
            return Ok(TraceLine::Op(TraceEvent { op, key, size }));
        }
        Ok(TraceLine::Other)
    }

    fn capture_u64(
        caps: &regex::Captures<'_>,
        index: usize,
        line: &str,
    ) -> Result<u64, ParseError> {
        let text = caps.get(index).map_or("", |m| m.as_str());
        text.parse::<u64>().map_err(|_| ParseError::InvalidNumber {
            field: text.to_string(),
            line: line.to_string(),
        })
    }
}
