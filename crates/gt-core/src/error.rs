//! Error taxonomy shared by the sweep crates.
//!
//! Configuration and resource problems are raised before any computation
//! starts; computation errors abort a run from inside the transition.

use std::path::PathBuf;
use thiserror::Error;

/// Invalid or contradictory configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A count or size that must be strictly positive was zero.
    #[error("{field} must be > 0")]
    Zero {
        /// Option name.
        field: &'static str,
    },
    /// A chunk size larger than the dimension it partitions.
    #[error("{field} = {size} exceeds the partitioned dimension {dimension}")]
    ChunkTooLarge {
        /// Option name.
        field: &'static str,
        /// Configured chunk size.
        size: usize,
        /// Length of the partitioned dimension.
        dimension: usize,
    },
    /// Sweep resolution outside `1..=999` per mille.
    #[error("alpha_mu_interval {0} is out of supported range [1, 999]")]
    IntervalOutOfRange(u32),
    /// An option required by the selected policy is missing.
    #[error("option '{option}' is required when {reason}")]
    Missing {
        /// Missing option name.
        option: &'static str,
        /// Why it is required.
        reason: &'static str,
    },
    /// Two options that cannot be combined.
    #[error("options '{0}' and '{1}' cannot be combined")]
    Contradiction(&'static str, &'static str),
    /// A monetary or goods quantity that must not be negative.
    #[error("{field} must be non-negative")]
    Negative {
        /// Option name.
        field: &'static str,
    },
    /// A saved chunk id that does not name an epoch window.
    #[error("saved chunk id {id} is out of range (only {windows} epoch windows)")]
    UnknownChunk {
        /// Offending id.
        id: usize,
        /// Number of epoch windows.
        windows: usize,
    },
    /// Minimum floors for the random policy exceed the configured total.
    #[error("{field}: floor {floor} x {agents} agents exceeds total {total}")]
    FloorExceedsTotal {
        /// Which quantity.
        field: &'static str,
        /// Per-agent floor.
        floor: String,
        /// Agent count.
        agents: usize,
        /// Configured total.
        total: String,
    },
}

/// Unreadable or malformed external input.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// I/O failure on an input file.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// CSV framing error.
    #[error("malformed csv in {path}: {source}")]
    Csv {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: csv::Error,
    },
    /// Content that parsed but violates the file contract.
    #[error("invalid content in {path}: {reason}")]
    Malformed {
        /// File path.
        path: PathBuf,
        /// Human-readable reason.
        reason: String,
    },
}

impl ResourceError {
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ResourceError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Exact-arithmetic failure inside a transition.
#[derive(Debug, Error, PartialEq)]
pub enum ComputationError {
    /// Checked decimal operation overflowed.
    #[error("decimal overflow computing {quantity} for agent {agent} at epoch {epoch}")]
    Overflow {
        /// Quantity being computed.
        quantity: &'static str,
        /// Agent index.
        agent: usize,
        /// Epoch index being produced.
        epoch: usize,
    },
    /// Division by zero.
    #[error("division by zero computing {quantity} for agent {agent} at epoch {epoch}")]
    DivisionByZero {
        /// Quantity being computed.
        quantity: &'static str,
        /// Agent index.
        agent: usize,
        /// Epoch index being produced.
        epoch: usize,
    },
    /// Window request does not match the active extent of the buffer.
    #[error("window request is {expected_pairs} x {expected_len} but buffer is {pairs} x {len}")]
    ShapeMismatch {
        /// Pairs in the request.
        expected_pairs: usize,
        /// Epochs in the requested window.
        expected_len: usize,
        /// Active pairs of the buffer.
        pairs: usize,
        /// Active window length of the buffer.
        len: usize,
    },
    /// Worker pool for the parallelism hint could not be built.
    #[error("cannot build worker pool: {0}")]
    WorkerPool(String),
}

/// Failures that happen while preparing a run, before the sweep begins.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
}
