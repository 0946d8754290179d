//! Parameter-space construction: the (alpha, mu) grid, its chunked partition,
//! and the partition of the epoch range into windows.

use crate::error::ConfigError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::RangeInclusive;

/// Alpha and mu are expressed in thousandths.
pub const PER_MILLE: u32 = 1000;

/// One point of the two-dimensional constant-parameter sweep, in per mille.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AlphaMu {
    /// Fraction of cash spent per epoch, per mille.
    pub alpha: u32,
    /// Fraction of goods offered per epoch, per mille.
    pub mu: u32,
}

impl AlphaMu {
    pub fn new(alpha: u32, mu: u32) -> Self {
        Self { alpha, mu }
    }

    /// Alpha as an exact fraction, e.g. 200 -> 0.200.
    pub fn alpha_fraction(&self) -> Decimal {
        Decimal::new(i64::from(self.alpha), 3)
    }

    /// Mu as an exact fraction.
    pub fn mu_fraction(&self) -> Decimal {
        Decimal::new(i64::from(self.mu), 3)
    }
}

/// Inclusive `(first, last)` bounds of a contiguous chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Bounds {
    pub first: usize,
    pub last: usize,
}

impl Bounds {
    pub fn new(first: usize, last: usize) -> Self {
        debug_assert!(first <= last);
        Self { first, last }
    }

    /// Number of elements covered; never zero.
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    /// Always false; present for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.first..=self.last).contains(&index)
    }

    pub fn range(&self) -> RangeInclusive<usize> {
        self.first..=self.last
    }
}

/// Split `[0, len)` into consecutive chunks of `size` elements; the last
/// chunk is short when `size` does not divide `len`.
pub fn chunk_bounds(len: usize, size: usize) -> Result<Vec<Bounds>, ConfigError> {
    if size == 0 {
        return Err(ConfigError::Zero {
            field: "chunk size",
        });
    }
    let mut out = Vec::with_capacity(len.div_ceil(size));
    let mut first = 0;
    while first < len {
        let last = (first + size).min(len) - 1;
        out.push(Bounds::new(first, last));
        first = last + 1;
    }
    Ok(out)
}

/// Axis values for a sweep resolution: `interval, 2*interval, ...` below 1000.
pub fn axis_values(interval: u32) -> Result<Vec<u32>, ConfigError> {
    if interval == 0 || interval >= PER_MILLE {
        return Err(ConfigError::IntervalOutOfRange(interval));
    }
    Ok((interval..PER_MILLE).step_by(interval as usize).collect())
}

/// Number of (alpha, mu) pairs produced by a sweep resolution.
pub fn pair_count(interval: u32) -> Result<usize, ConfigError> {
    let axis = axis_values(interval)?.len();
    Ok(axis * axis)
}

/// Ordered (alpha, mu) pairs with their index bijection and chunk partition.
#[derive(Clone, Debug)]
pub struct ParameterGrid {
    pairs: Vec<AlphaMu>,
    index: HashMap<AlphaMu, usize>,
    chunks: Vec<Bounds>,
}

impl ParameterGrid {
    /// Square grid for a sweep resolution, alpha-major.
    pub fn from_interval(interval: u32, chunk_size: usize) -> Result<Self, ConfigError> {
        let axis = axis_values(interval)?;
        Self::from_axes(&axis, &axis, chunk_size)
    }

    /// Cartesian product of explicit axes, alpha-major.
    pub fn from_axes(alphas: &[u32], mus: &[u32], chunk_size: usize) -> Result<Self, ConfigError> {
        let pairs: Vec<AlphaMu> = alphas
            .iter()
            .flat_map(|&a| mus.iter().map(move |&m| AlphaMu::new(a, m)))
            .collect();
        Self::from_pairs(pairs, chunk_size)
    }

    /// Grid from an already ordered pair list, e.g. one read back from a
    /// store header.
    pub fn from_pairs(pairs: Vec<AlphaMu>, chunk_size: usize) -> Result<Self, ConfigError> {
        if pairs.is_empty() {
            return Err(ConfigError::Zero {
                field: "parameter pairs",
            });
        }
        let chunks = chunk_bounds(pairs.len(), chunk_size)?;
        let index = pairs.iter().enumerate().map(|(i, p)| (*p, i)).collect();
        Ok(Self {
            pairs,
            index,
            chunks,
        })
    }

    pub fn pairs(&self) -> &[AlphaMu] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn index_of(&self, pair: &AlphaMu) -> Option<usize> {
        self.index.get(pair).copied()
    }

    pub fn pair_at(&self, index: usize) -> Option<AlphaMu> {
        self.pairs.get(index).copied()
    }

    /// `(first, last)` index bounds of every parameter chunk, in order.
    pub fn chunks(&self) -> &[Bounds] {
        &self.chunks
    }

    /// Pairs covered by a chunk.
    pub fn chunk_pairs(&self, chunk: Bounds) -> &[AlphaMu] {
        &self.pairs[chunk.range()]
    }

    /// Boundary pairs `(min, max)` of a chunk.
    pub fn chunk_boundary_pairs(&self, chunk: Bounds) -> (AlphaMu, AlphaMu) {
        (self.pairs[chunk.first], self.pairs[chunk.last])
    }

    /// Position of a chunk in the partition, given its bounds.
    pub fn chunk_position(&self, chunk: Bounds) -> Option<usize> {
        let size = self.chunks.first().map(Bounds::len)?;
        let pos = chunk.first / size;
        (self.chunks.get(pos) == Some(&chunk)).then_some(pos)
    }
}

/// Partition of `[0, epochs)` into contiguous inclusive windows.
#[derive(Clone, Debug)]
pub struct EpochWindows {
    windows: Vec<Bounds>,
    position: HashMap<Bounds, usize>,
}

impl EpochWindows {
    pub fn new(epochs: usize, chunk_size: usize) -> Result<Self, ConfigError> {
        if epochs == 0 {
            return Err(ConfigError::Zero { field: "epochs" });
        }
        Ok(Self::from_windows(chunk_bounds(epochs, chunk_size)?))
    }

    /// Rebuild from a stored window table.
    pub fn from_windows(windows: Vec<Bounds>) -> Self {
        let position = windows.iter().enumerate().map(|(i, w)| (*w, i)).collect();
        Self { windows, position }
    }

    pub fn windows(&self) -> &[Bounds] {
        &self.windows
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Ordinal of a window, used for store offset addressing.
    pub fn position_of(&self, window: Bounds) -> Option<usize> {
        self.position.get(&window).copied()
    }

    /// Total number of epochs covered.
    pub fn epochs(&self) -> usize {
        self.windows.last().map_or(0, |w| w.last + 1)
    }
}

/// Grid and windows derived once from a configuration.
#[derive(Clone, Debug)]
pub struct ParameterSpace {
    pub grid: ParameterGrid,
    pub windows: EpochWindows,
}

impl ParameterSpace {
    pub fn build(
        interval: u32,
        parameter_chunk_size: usize,
        epochs: usize,
        epoch_chunk_size: usize,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            grid: ParameterGrid::from_interval(interval, parameter_chunk_size)?,
            windows: EpochWindows::new(epochs, epoch_chunk_size)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_interval_gives_sixteen_pairs() {
        let grid = ParameterGrid::from_interval(200, 16).unwrap();
        assert_eq!(grid.len(), 16);
        assert_eq!(grid.chunks(), &[Bounds::new(0, 15)]);
        assert_eq!(grid.pair_at(0), Some(AlphaMu::new(200, 200)));
        assert_eq!(grid.pair_at(1), Some(AlphaMu::new(200, 400)));
        assert_eq!(grid.pair_at(15), Some(AlphaMu::new(800, 800)));
    }

    #[test]
    fn interval_500_gives_single_pair() {
        let grid = ParameterGrid::from_interval(500, 1).unwrap();
        assert_eq!(grid.pairs(), &[AlphaMu::new(500, 500)]);
        assert_eq!(
            grid.pair_at(0).unwrap().alpha_fraction(),
            Decimal::new(5, 1)
        );
    }

    #[test]
    fn interval_out_of_range_is_rejected() {
        assert_eq!(
            ParameterGrid::from_interval(0, 1).unwrap_err(),
            ConfigError::IntervalOutOfRange(0)
        );
        assert!(ParameterGrid::from_interval(1000, 1).is_err());
    }

    #[test]
    fn short_final_parameter_chunk() {
        let grid = ParameterGrid::from_axes(&[100], &[100, 200, 300], 2).unwrap();
        assert_eq!(grid.chunks(), &[Bounds::new(0, 1), Bounds::new(2, 2)]);
        assert_eq!(grid.chunks()[1].len(), 1);
        assert_eq!(
            grid.chunk_pairs(grid.chunks()[1]),
            &[AlphaMu::new(100, 300)]
        );
        assert_eq!(grid.chunk_position(Bounds::new(2, 2)), Some(1));
        assert_eq!(grid.chunk_position(Bounds::new(1, 2)), None);
    }

    #[test]
    fn window_lookup_by_bounds() {
        let w = EpochWindows::new(250, 100).unwrap();
        assert_eq!(
            w.windows(),
            &[
                Bounds::new(0, 99),
                Bounds::new(100, 199),
                Bounds::new(200, 249)
            ]
        );
        assert_eq!(w.position_of(Bounds::new(200, 249)), Some(2));
        assert_eq!(w.position_of(Bounds::new(200, 299)), None);
        assert_eq!(w.epochs(), 250);
    }

    #[test]
    fn zero_chunk_size_is_an_error() {
        assert!(chunk_bounds(10, 0).is_err());
        assert!(EpochWindows::new(0, 1).is_err());
    }

    proptest! {
        #[test]
        fn parameter_chunks_reproduce_grid(interval in 50u32..999, size in 1usize..40) {
            let grid = ParameterGrid::from_interval(interval, size).unwrap();
            let joined: Vec<AlphaMu> = grid
                .chunks()
                .iter()
                .flat_map(|c| grid.chunk_pairs(*c).iter().copied())
                .collect();
            prop_assert_eq!(joined.as_slice(), grid.pairs());
            for (i, p) in grid.pairs().iter().enumerate() {
                prop_assert_eq!(grid.index_of(p), Some(i));
            }
        }

        #[test]
        fn windows_partition_epochs(epochs in 1usize..2_000, size in 1usize..300) {
            let w = EpochWindows::new(epochs, size).unwrap();
            let mut next = 0;
            for (i, b) in w.windows().iter().enumerate() {
                prop_assert_eq!(b.first, next);
                prop_assert!(b.last >= b.first);
                prop_assert!(b.len() <= size);
                prop_assert_eq!(w.position_of(*b), Some(i));
                next = b.last + 1;
            }
            prop_assert_eq!(next, epochs);
        }
    }
}
