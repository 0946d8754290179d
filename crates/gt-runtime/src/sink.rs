//! Destination of computed windows.

use gt_core::{Bounds, ChunkState};
use persistence::{PersistenceError, StoreWriter};
use std::path::Path;

/// Receives every persisted window of a run.
pub trait PersistenceSink {
    /// Quantize and store slots `0..len` of `state` as epochs
    /// `window.first..=window.last` of the pairs in `pair_chunk`.
    fn write_window(
        &mut self,
        pair_chunk: Bounds,
        window: Bounds,
        state: &ChunkState,
        sensitivity: u32,
    ) -> Result<(), PersistenceError>;

    /// Make buffered writes durable.
    fn flush(&mut self) -> Result<(), PersistenceError>;

    /// Where the output lives, if anywhere.
    fn location(&self) -> Option<&Path> {
        None
    }
}

impl PersistenceSink for StoreWriter {
    fn write_window(
        &mut self,
        pair_chunk: Bounds,
        window: Bounds,
        state: &ChunkState,
        sensitivity: u32,
    ) -> Result<(), PersistenceError> {
        StoreWriter::write_window(self, pair_chunk, window, state, sensitivity)
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        StoreWriter::flush(self)
    }

    fn location(&self) -> Option<&Path> {
        Some(self.path())
    }
}

impl<S: PersistenceSink + ?Sized> PersistenceSink for &mut S {
    fn write_window(
        &mut self,
        pair_chunk: Bounds,
        window: Bounds,
        state: &ChunkState,
        sensitivity: u32,
    ) -> Result<(), PersistenceError> {
        (**self).write_window(pair_chunk, window, state, sensitivity)
    }

    fn flush(&mut self) -> Result<(), PersistenceError> {
        (**self).flush()
    }

    fn location(&self) -> Option<&Path> {
        (**self).location()
    }
}
