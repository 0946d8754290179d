//! Chunked fixed-point store: writer used by the sweep driver, reader used by
//! analysis tooling and tests.
//!
//! Data region layout, after the framed header:
//! ```text
//! dataset q (cash, goods, price)
//!   parameter chunk pc
//!     epoch window w
//!       block of agents * parameter_chunk_size * epoch_chunk_size i64 LE
//! ```
//! Inside a block a cell sits at `(agent * pcs + pair_offset) * ecs + epoch_offset`.
//! Cells never written read back as zero.

use crate::{decimal_to_scaled_i64, scaled_i64_to_decimal, PersistenceError, StoreHeader};
use gt_core::{Bounds, ChunkState, EpochWindows, ParameterGrid, Quantity};
use rust_decimal::Decimal;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CELL: u64 = std::mem::size_of::<i64>() as u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Layout {
    data_start: u64,
    agents: usize,
    pcs: usize,
    ecs: usize,
    n_pc: usize,
    n_w: usize,
}

impl Layout {
    fn new(header: &StoreHeader, data_start: u64) -> Self {
        let [agents, pcs, ecs] = header.block_shape();
        Self {
            data_start,
            agents,
            pcs,
            ecs,
            n_pc: header.pairs.len().div_ceil(pcs.max(1)),
            n_w: header.windows.len(),
        }
    }

    fn block_elems(&self) -> usize {
        self.agents * self.pcs * self.ecs
    }

    fn block_offset(&self, q: Quantity, pc: usize, w: usize) -> u64 {
        let block = (q.ordinal() * self.n_pc + pc) * self.n_w + w;
        self.data_start + block as u64 * self.block_elems() as u64 * CELL
    }

    fn cell_in_block(&self, agent: usize, pair_offset: usize, epoch_offset: usize) -> usize {
        (agent * self.pcs + pair_offset) * self.ecs + epoch_offset
    }

    fn total_len(&self) -> u64 {
        self.block_offset(Quantity::Cash, 0, 0)
            + (Quantity::ALL.len() * self.n_pc * self.n_w * self.block_elems()) as u64 * CELL
    }
}

/// Append-only writer over a freshly created store file.
#[derive(Debug)]
pub struct StoreWriter {
    path: PathBuf,
    header: StoreHeader,
    grid: ParameterGrid,
    windows: EpochWindows,
    layout: Layout,
    file: BufWriter<File>,
    scratch: Vec<u8>,
}

impl StoreWriter {
    /// Create the store at `path`, truncating any previous file. Parent
    /// directories are created as needed.
    pub fn create(path: impl AsRef<Path>, header: StoreHeader) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let grid = header.grid()?;
        let windows = header.epoch_windows();
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        let data_start = header.write_to(&mut file)?;
        let layout = Layout::new(&header, data_start);
        file.set_len(layout.total_len())?;
        info!(
            path = %path.display(),
            shape = ?header.shape(),
            block = ?header.block_shape(),
            bytes = layout.total_len(),
            "created store"
        );
        Ok(Self {
            path,
            header,
            grid,
            windows,
            layout,
            file: BufWriter::new(file),
            scratch: Vec::with_capacity(layout.block_elems() * CELL as usize),
        })
    }

    pub fn header(&self) -> &StoreHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Quantize and write slots `0..len` of `state` as epochs
    /// `window.first..=window.last` for the pairs of `pair_chunk`.
    pub fn write_window(
        &mut self,
        pair_chunk: Bounds,
        window: Bounds,
        state: &ChunkState,
        sensitivity: u32,
    ) -> Result<(), PersistenceError> {
        let pc = self
            .grid
            .chunk_position(pair_chunk)
            .ok_or(PersistenceError::UnknownParameterChunk(pair_chunk))?;
        let w = self
            .windows
            .position_of(window)
            .ok_or(PersistenceError::UnknownWindow(window))?;
        let expected = [self.layout.agents, pair_chunk.len(), window.len()];
        let found = [state.agents(), state.pairs(), state.window_len()];
        if expected != found {
            return Err(PersistenceError::Shape { expected, found });
        }
        let layout = self.layout;
        for q in Quantity::ALL {
            let tensor = state.tensor(q);
            let mut block = vec![0i64; layout.block_elems()];
            for agent in 0..layout.agents {
                for pair in 0..pair_chunk.len() {
                    for slot in 0..window.len() {
                        let value = tensor.get(agent, pair, slot);
                        block[layout.cell_in_block(agent, pair, slot)] =
                            decimal_to_scaled_i64(value, sensitivity).ok_or(
                                PersistenceError::Quantization { value, sensitivity },
                            )?;
                    }
                }
            }
            self.scratch.clear();
            for v in &block {
                self.scratch.extend_from_slice(&v.to_le_bytes());
            }
            self.file.seek(SeekFrom::Start(layout.block_offset(q, pc, w)))?;
            self.file.write_all(&self.scratch)?;
        }
        debug!(
            pairs = ?pair_chunk,
            epochs = ?window,
            "window persisted"
        );
        Ok(())
    }

    /// Flush buffered blocks and sync the file to disk.
    pub fn flush(&mut self) -> Result<(), PersistenceError> {
        self.file.flush()?;
        self.file.get_ref().sync_all()?;
        Ok(())
    }
}

/// Random-access reader over a finished store.
#[derive(Debug)]
pub struct StoreReader {
    header: StoreHeader,
    layout: Layout,
    file: File,
}

impl StoreReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let mut file = File::open(path.as_ref())?;
        let (header, data_start) = StoreHeader::read_from(&mut file)?;
        if let Err(e) = header.config.validate() {
            return Err(PersistenceError::Corrupt(format!(
                "invalid run configuration: {e}"
            )));
        }
        let layout = Layout::new(&header, data_start);
        let actual = file.metadata()?.len();
        if actual < layout.total_len() {
            return Err(PersistenceError::Corrupt(format!(
                "data region truncated: {actual} bytes, expected {}",
                layout.total_len()
            )));
        }
        Ok(Self {
            header,
            layout,
            file,
        })
    }

    pub fn header(&self) -> &StoreHeader {
        &self.header
    }

    /// Stored fixed-point value at `(agent, pair_index, epoch)`.
    pub fn read_raw(
        &mut self,
        q: Quantity,
        agent: usize,
        pair_index: usize,
        epoch: usize,
    ) -> Result<i64, PersistenceError> {
        let [agents, pairs, epochs] = self.header.shape();
        if agent >= agents || pair_index >= pairs || epoch >= epochs {
            return Err(PersistenceError::OutOfRange {
                agent,
                pair: pair_index,
                epoch,
            });
        }
        let l = self.layout;
        let offset = l.block_offset(q, pair_index / l.pcs, epoch / l.ecs)
            + l.cell_in_block(agent, pair_index % l.pcs, epoch % l.ecs) as u64 * CELL;
        let mut buf = [0u8; CELL as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_value(
        &mut self,
        q: Quantity,
        agent: usize,
        pair_index: usize,
        epoch: usize,
    ) -> Result<Decimal, PersistenceError> {
        let raw = self.read_raw(q, agent, pair_index, epoch)?;
        Ok(scaled_i64_to_decimal(
            raw,
            self.header.config.integer_sensitivity,
        ))
    }

    /// Full epoch series of one agent under one parameter pair.
    pub fn read_series(
        &mut self,
        q: Quantity,
        agent: usize,
        pair_index: usize,
    ) -> Result<Vec<Decimal>, PersistenceError> {
        (0..self.header.config.epochs)
            .map(|epoch| self.read_value(q, agent, pair_index, epoch))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gt_core::{NetworkAttributes, SimulationConfig};
    use tempfile::tempdir;

    fn header(epochs: usize, ecs: usize, pcs: usize, interval: u32) -> StoreHeader {
        let config = SimulationConfig {
            epochs,
            alpha_mu_interval: interval,
            alpha_mu_chunk_size: pcs,
            epochs_chunk_size: ecs,
            ..Default::default()
        };
        let space = config.parameter_space().unwrap();
        let network = NetworkAttributes {
            name: "pair".into(),
            agents: 2,
            edges: 2,
            max_in_degree: 1,
            max_out_degree: 1,
            sources: 0,
            sinks: 0,
            self_loops: 0,
        };
        StoreHeader::new(&network, vec!["a".into(), "b".into()], &config, &space, "test")
    }

    /// State whose cell value encodes its coordinates.
    fn tagged_state(pcs: usize, ecs: usize, pairs: usize, len: usize, base: i64) -> ChunkState {
        let mut state = ChunkState::new(2, pcs, ecs);
        state.set_extent(pairs, len);
        for q in Quantity::ALL {
            for agent in 0..2 {
                for pair in 0..pairs {
                    for slot in 0..=len {
                        let v = base
                            + q.ordinal() as i64 * 1000
                            + agent as i64 * 100
                            + pair as i64 * 10
                            + slot as i64;
                        state.tensor_mut(q).set(agent, pair, slot, Decimal::new(v, 2));
                    }
                }
            }
        }
        state
    }

    #[test]
    fn written_windows_read_back_at_global_coordinates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dataset_0.gtds");
        // 16 pairs in chunks of 16, 5 epochs in windows of 2 (last window short).
        let header = header(5, 2, 16, 200);
        let mut writer = StoreWriter::create(&path, header).unwrap();
        let chunk = Bounds::new(0, 15);
        let first = tagged_state(16, 2, 16, 2, 0);
        let last = tagged_state(16, 2, 16, 1, 40);
        writer
            .write_window(chunk, Bounds::new(0, 1), &first, 10_000)
            .unwrap();
        writer
            .write_window(chunk, Bounds::new(4, 4), &last, 10_000)
            .unwrap();
        writer.flush().unwrap();

        let mut reader = StoreReader::open(&path).unwrap();
        assert_eq!(reader.header().shape(), [2, 16, 5]);
        assert_eq!(
            reader.read_value(Quantity::Goods, 1, 3, 1).unwrap(),
            Decimal::new(1000 + 100 + 30 + 1, 2)
        );
        assert_eq!(
            reader.read_value(Quantity::Price, 0, 15, 4).unwrap(),
            Decimal::new(40 + 2000 + 150, 2)
        );
        // Window (2, 3) was never written.
        assert_eq!(reader.read_raw(Quantity::Cash, 0, 0, 2).unwrap(), 0);
        let series = reader.read_series(Quantity::Cash, 0, 0).unwrap();
        assert_eq!(series.len(), 5);
        assert_eq!(series[1], Decimal::new(1, 2));
    }

    #[test]
    fn short_parameter_chunk_is_addressed_by_position() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.gtds");
        // 16 pairs in chunks of 5: last chunk holds a single pair.
        let mut writer = StoreWriter::create(&path, header(2, 2, 5, 200)).unwrap();
        let state = tagged_state(5, 2, 1, 2, 7);
        writer
            .write_window(Bounds::new(15, 15), Bounds::new(0, 1), &state, 10_000)
            .unwrap();
        writer.flush().unwrap();
        let mut reader = StoreReader::open(&path).unwrap();
        assert_eq!(
            reader.read_value(Quantity::Cash, 1, 15, 1).unwrap(),
            Decimal::new(7 + 100 + 1, 2)
        );
        assert_eq!(reader.read_raw(Quantity::Cash, 1, 14, 1).unwrap(), 0);
    }

    #[test]
    fn rejects_foreign_chunks_and_shapes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.gtds");
        let mut writer = StoreWriter::create(path, header(4, 2, 1, 500)).unwrap();
        let state = tagged_state(1, 2, 1, 2, 0);
        assert!(matches!(
            writer.write_window(Bounds::new(0, 0), Bounds::new(1, 2), &state, 10_000),
            Err(PersistenceError::UnknownWindow(_))
        ));
        assert!(matches!(
            writer.write_window(Bounds::new(1, 1), Bounds::new(0, 1), &state, 10_000),
            Err(PersistenceError::UnknownParameterChunk(_))
        ));
        let short = tagged_state(1, 2, 1, 1, 0);
        assert!(matches!(
            writer.write_window(Bounds::new(0, 0), Bounds::new(2, 3), &short, 10_000),
            Err(PersistenceError::Shape { .. })
        ));
    }

    #[test]
    fn header_with_invalid_configuration_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.gtds");
        let mut bad = header(4, 2, 1, 500);
        bad.config.alpha_mu_chunk_size = 0;
        let mut file = File::create(&path).unwrap();
        bad.write_to(&mut file).unwrap();
        file.set_len(4096).unwrap();
        drop(file);
        let err = StoreReader::open(&path).unwrap_err();
        assert!(matches!(err, PersistenceError::Corrupt(_)), "{err}");
    }

    #[test]
    fn out_of_range_reads_fail() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.gtds");
        StoreWriter::create(&path, header(4, 2, 1, 500))
            .unwrap()
            .flush()
            .unwrap();
        let mut reader = StoreReader::open(&path).unwrap();
        assert!(matches!(
            reader.read_raw(Quantity::Cash, 2, 0, 0),
            Err(PersistenceError::OutOfRange { .. })
        ));
        assert!(matches!(
            reader.read_raw(Quantity::Cash, 0, 0, 4),
            Err(PersistenceError::OutOfRange { .. })
        ));
    }

    #[test]
    fn unrepresentable_values_fail_quantization() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("d.gtds");
        let mut writer = StoreWriter::create(path, header(2, 2, 1, 500)).unwrap();
        let mut state = ChunkState::new(2, 1, 2);
        state.cash.set(0, 0, 1, Decimal::MAX);
        assert!(matches!(
            writer.write_window(Bounds::new(0, 0), Bounds::new(0, 1), &state, 10_000),
            Err(PersistenceError::Quantization { .. })
        ));
    }
}
