//! Chunked sweep driver.
//!
//! Parameter chunks are processed one after another. Inside a chunk the epoch
//! windows run in order, each window starting from the terminal state of the
//! previous one. Every chunk starts again from the global initial condition.

use crate::sink::PersistenceSink;
use crate::RunError;
use gt_core::{Adjacency, ChunkState, FlushPolicy, ParameterSpace, SimulationConfig};
use gt_model::{InitialState, Transition, WindowRequest};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Everything a run needs besides the transition and the sink.
#[derive(Clone, Debug)]
pub struct DriverState {
    pub space: ParameterSpace,
    pub initial: InitialState,
    pub adjacency: Adjacency,
    /// Window buffer sized for the largest chunk and window.
    pub buffer: ChunkState,
}

impl DriverState {
    pub fn new(
        space: ParameterSpace,
        initial: InitialState,
        adjacency: Adjacency,
        parameter_chunk_size: usize,
        epoch_chunk_size: usize,
    ) -> Result<Self, RunError> {
        if initial.agents() != adjacency.len() {
            return Err(RunError::AgentMismatch {
                network: adjacency.len(),
                initial: initial.agents(),
            });
        }
        let buffer = ChunkState::new(adjacency.len(), parameter_chunk_size, epoch_chunk_size);
        Ok(Self {
            space,
            initial,
            adjacency,
            buffer,
        })
    }

    /// Derive the parameter space and buffer from a validated configuration.
    pub fn from_config(
        config: &SimulationConfig,
        initial: InitialState,
        adjacency: Adjacency,
    ) -> Result<Self, RunError> {
        config.validate()?;
        Self::new(
            config.parameter_space()?,
            initial,
            adjacency,
            config.alpha_mu_chunk_size,
            config.epochs_chunk_size,
        )
    }
}

/// Summary of a finished run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub parameter_chunks: usize,
    pub windows_computed: usize,
    pub windows_persisted: usize,
    pub elapsed: Duration,
    pub output: Option<PathBuf>,
}

pub struct SimulationDriver<T, S> {
    config: SimulationConfig,
    state: DriverState,
    transition: T,
    sink: S,
}

impl<T: Transition, S: PersistenceSink> SimulationDriver<T, S> {
    pub fn new(config: SimulationConfig, state: DriverState, transition: T, sink: S) -> Self {
        Self {
            config,
            state,
            transition,
            sink,
        }
    }

    pub fn state(&self) -> &DriverState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Sweep every parameter chunk over every epoch window.
    pub fn run(&mut self) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let DriverState {
            space,
            initial,
            adjacency,
            buffer,
        } = &mut self.state;
        let grid = &space.grid;
        let windows = space.windows.windows();
        let sensitivity = self.config.integer_sensitivity;
        let mut report = RunReport {
            parameter_chunks: grid.chunks().len(),
            windows_computed: 0,
            windows_persisted: 0,
            elapsed: Duration::ZERO,
            output: None,
        };
        info!(
            pairs = grid.len(),
            parameter_chunks = report.parameter_chunks,
            windows = windows.len(),
            agents = adjacency.len(),
            "sweep started"
        );

        for &pair_chunk in grid.chunks() {
            let pairs = grid.chunk_pairs(pair_chunk);
            let (low, high) = grid.chunk_boundary_pairs(pair_chunk);
            if let Some(first) = windows.first() {
                buffer.set_extent(pair_chunk.len(), first.len());
            }
            buffer.reset_leading(&initial.cash, &initial.goods, &initial.price);
            debug!(?pair_chunk, ?low, ?high, "parameter chunk reset");

            for (position, &window) in windows.iter().enumerate() {
                let window_started = Instant::now();
                buffer.set_extent(pair_chunk.len(), window.len());
                let request = WindowRequest {
                    pairs,
                    pair_bounds: pair_chunk,
                    window,
                    adjacency,
                };
                self.transition.advance(&request, buffer)?;
                report.windows_computed += 1;

                let persisted = self.config.persists_window(position);
                if persisted {
                    self.sink
                        .write_window(pair_chunk, window, buffer, sensitivity)?;
                    report.windows_persisted += 1;
                    if self.config.flush_policy == FlushPolicy::EveryWindow {
                        self.sink.flush()?;
                    }
                }
                buffer.carry_terminal();
                debug!(
                    ?pair_chunk,
                    ?window,
                    persisted,
                    elapsed_ms = window_started.elapsed().as_millis() as u64,
                    "window done"
                );
            }
        }

        self.sink.flush()?;
        report.elapsed = started.elapsed();
        report.output = self.sink.location().map(PathBuf::from);
        info!(
            windows_computed = report.windows_computed,
            windows_persisted = report.windows_persisted,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "sweep finished"
        );
        Ok(report)
    }
}
