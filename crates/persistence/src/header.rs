//! Store header: immutable run metadata written once at creation.
//!
//! Framing:
//! ```text
//! [magic "GTDS": 4][version: 1][length: 4 LE][header JSON: N][crc32: 4 LE]
//! ```

use crate::PersistenceError;
use chrono::{DateTime, Utc};
use crc32fast::Hasher;
use gt_core::{
    AlphaMu, Bounds, EpochWindows, NetworkAttributes, ParameterGrid, ParameterSpace,
    SimulationConfig,
};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

pub const MAGIC: [u8; 4] = *b"GTDS";
pub const FORMAT_VERSION: u8 = 1;

/// Reject headers above this size when reading.
const MAX_HEADER_SIZE: usize = 256 * 1024 * 1024;

/// Run metadata stored ahead of the data region.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreHeader {
    pub network: NetworkAttributes,
    /// Node labels in agent-index order.
    pub agent_labels: Vec<String>,
    pub config: SimulationConfig,
    /// Ordered parameter grid; position is the pair index.
    pub pairs: Vec<AlphaMu>,
    /// Epoch-window table; position is the window index.
    pub windows: Vec<Bounds>,
    pub created_at: DateTime<Utc>,
    /// Version string of the program that produced the store.
    pub generator: String,
}

impl StoreHeader {
    pub fn new(
        network: &NetworkAttributes,
        agent_labels: Vec<String>,
        config: &SimulationConfig,
        space: &ParameterSpace,
        generator: impl Into<String>,
    ) -> Self {
        Self {
            network: network.clone(),
            agent_labels,
            config: config.clone(),
            pairs: space.grid.pairs().to_vec(),
            windows: space.windows.windows().to_vec(),
            created_at: Utc::now(),
            generator: generator.into(),
        }
    }

    pub fn agents(&self) -> usize {
        self.network.agents
    }

    /// Dataset shape `(agents, pairs, epochs)`.
    pub fn shape(&self) -> [usize; 3] {
        [self.agents(), self.pairs.len(), self.config.epochs]
    }

    /// Storage block shape `(agents, parameter_chunk_size, epoch_chunk_size)`.
    pub fn block_shape(&self) -> [usize; 3] {
        [
            self.agents(),
            self.config.alpha_mu_chunk_size,
            self.config.epochs_chunk_size,
        ]
    }

    pub fn grid(&self) -> Result<ParameterGrid, PersistenceError> {
        ParameterGrid::from_pairs(self.pairs.clone(), self.config.alpha_mu_chunk_size)
            .map_err(|e| PersistenceError::Corrupt(e.to_string()))
    }

    pub fn epoch_windows(&self) -> EpochWindows {
        EpochWindows::from_windows(self.windows.clone())
    }

    /// Framed bytes; returns the number of bytes written.
    pub fn write_to(&self, w: &mut impl Write) -> Result<u64, std::io::Error> {
        let data = serde_json::to_vec(self)?;
        let mut hasher = Hasher::new();
        hasher.update(&data);
        let crc = hasher.finalize();
        let len = u32::try_from(data.len()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "header too large")
        })?;
        w.write_all(&MAGIC)?;
        w.write_all(&[FORMAT_VERSION])?;
        w.write_all(&len.to_le_bytes())?;
        w.write_all(&data)?;
        w.write_all(&crc.to_le_bytes())?;
        Ok(framed_len(data.len()))
    }

    /// Parse and verify a framed header; returns it with its framed length.
    pub fn read_from(r: &mut impl Read) -> Result<(Self, u64), PersistenceError> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(PersistenceError::BadMagic);
        }
        let mut version = [0u8; 1];
        r.read_exact(&mut version)?;
        if version[0] != FORMAT_VERSION {
            return Err(PersistenceError::UnsupportedVersion(version[0]));
        }
        let mut len_bytes = [0u8; 4];
        r.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;
        if len > MAX_HEADER_SIZE {
            return Err(PersistenceError::Corrupt(format!(
                "header size {len} exceeds maximum {MAX_HEADER_SIZE}"
            )));
        }
        let mut data = vec![0u8; len];
        r.read_exact(&mut data)?;
        let mut crc_bytes = [0u8; 4];
        r.read_exact(&mut crc_bytes)?;
        let stored = u32::from_le_bytes(crc_bytes);
        let mut hasher = Hasher::new();
        hasher.update(&data);
        let computed = hasher.finalize();
        if stored != computed {
            return Err(PersistenceError::Corrupt(format!(
                "header CRC mismatch: stored={stored:08x}, computed={computed:08x}"
            )));
        }
        let header: StoreHeader = serde_json::from_slice(&data)
            .map_err(|e| PersistenceError::Corrupt(format!("header decode failed: {e}")))?;
        Ok((header, framed_len(len)))
    }
}

fn framed_len(data_len: usize) -> u64 {
    (MAGIC.len() + 1 + 4 + data_len + 4) as u64
}
