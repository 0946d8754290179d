#![deny(warnings)]

//! Core domain types for GT parameter sweeps.
//!
//! This crate holds the validated run configuration, the error taxonomy, the
//! parameter-space partition, the network adjacency and the exact-decimal
//! tensors that carry one simulation window.

pub mod config;
pub mod error;
pub mod grid;
pub mod network;
pub mod tensor;

pub use config::{FlushPolicy, InitialCondition, RawConfig, SimulationConfig};
pub use error::{ComputationError, ConfigError, ResourceError, SetupError};
pub use grid::{AlphaMu, Bounds, EpochWindows, ParameterGrid, ParameterSpace};
pub use network::{Adjacency, Network, NetworkAttributes, NetworkRef};
pub use tensor::{ChunkState, Quantity, StateTensor};
