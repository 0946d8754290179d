#![deny(warnings)]

//! Persistence layer: the chunked output store for GT sweeps.
//!
//! A store holds three datasets (cash, goods, price), each shaped
//! `(agents, pairs, epochs)` and laid out in blocks of
//! `(agents, parameter_chunk_size, epoch_chunk_size)` so that one simulation
//! window is one contiguous write per dataset. Values are fixed-point `i64`
//! scaled by the run's integer sensitivity.

pub mod header;
pub mod store;

pub use header::StoreHeader;
pub use store::{StoreReader, StoreWriter};

use gt_core::SimulationConfig;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::path::PathBuf;
use thiserror::Error;

/// Dataset file extension.
pub const DATASET_EXTENSION: &str = "gtds";

/// Errors raised while creating, writing or reading a store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a GT dataset (bad magic bytes)")]
    BadMagic,
    #[error("unsupported store format version {0}")]
    UnsupportedVersion(u8),
    #[error("corrupt store: {0}")]
    Corrupt(String),
    /// Value times sensitivity does not fit the store's integer encoding.
    #[error("value {value} x {sensitivity} does not fit in i64")]
    Quantization { value: Decimal, sensitivity: u32 },
    #[error("parameter chunk {0:?} is not part of this store")]
    UnknownParameterChunk(gt_core::Bounds),
    #[error("epoch window {0:?} is not part of this store")]
    UnknownWindow(gt_core::Bounds),
    #[error("window shape mismatch: expected {expected:?}, found {found:?}")]
    Shape {
        expected: [usize; 3],
        found: [usize; 3],
    },
    #[error("coordinate out of range: agent {agent}, pair {pair}, epoch {epoch}")]
    OutOfRange {
        agent: usize,
        pair: usize,
        epoch: usize,
    },
}

/// Convert an exact value to fixed-point with the given sensitivity,
/// rounding half to even. Returns `None` when the result overflows `i64`.
///
/// Example:
/// let v = Decimal::new(12345678, 6); // 12.345678
/// assert_eq!(decimal_to_scaled_i64(v, 10_000), Some(123457));
pub fn decimal_to_scaled_i64(value: Decimal, sensitivity: u32) -> Option<i64> {
    value
        .checked_mul(Decimal::from(sensitivity))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .to_i64()
}

/// Inverse of [`decimal_to_scaled_i64`].
pub fn scaled_i64_to_decimal(raw: i64, sensitivity: u32) -> Decimal {
    Decimal::from(raw) / Decimal::from(sensitivity)
}

/// Folder name of a run, derived from network name, sweep resolution, epoch
/// count and quantization sensitivity.
pub fn result_folder_name(network: &str, interval: u32, epochs: usize, sensitivity: u32) -> String {
    format!("{network}_s{interval}_e{epochs}_is{sensitivity}")
}

/// Full path of the dataset file for a run.
pub fn dataset_path(config: &SimulationConfig, network: &str) -> PathBuf {
    config
        .result_folder
        .join(result_folder_name(
            network,
            config.alpha_mu_interval,
            config.epochs,
            config.integer_sensitivity,
        ))
        .join(format!("dataset_{}.{DATASET_EXTENSION}", config.simulation_index))
}
