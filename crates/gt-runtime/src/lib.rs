#![deny(warnings)]

//! Sweep runtime: drives a [`Transition`] over every parameter chunk and epoch
//! window and hands the results to a [`PersistenceSink`].

pub mod driver;
pub mod sink;

pub use driver::{DriverState, RunReport, SimulationDriver};
pub use sink::PersistenceSink;

use gt_core::{
    ComputationError, ConfigError, NetworkRef, ResourceError, SetupError, SimulationConfig,
};
use gt_model::{GtModel, Transition};
use persistence::{PersistenceError, StoreHeader, StoreWriter};
use thiserror::Error;
use tracing::info;

/// Any failure that ends a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),
    #[error("computation error: {0}")]
    Computation(#[from] ComputationError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("initial condition has {initial} agents but the network has {network}")]
    AgentMismatch { network: usize, initial: usize },
}

impl From<SetupError> for RunError {
    fn from(e: SetupError) -> Self {
        match e {
            SetupError::Config(e) => RunError::Config(e),
            SetupError::Resource(e) => RunError::Resource(e),
        }
    }
}

/// Load the network, prepare the initial condition, create the store and run
/// the reference model over the full sweep.
///
/// `generator` is recorded in the store header.
pub fn launch(
    network: &NetworkRef,
    config: &SimulationConfig,
    generator: &str,
) -> Result<RunReport, RunError> {
    config.validate()?;
    let net = gt_core::network::load(network)?;
    info!(
        network = %net.attributes.name,
        agents = net.attributes.agents,
        edges = net.attributes.edges,
        "network loaded"
    );
    let initial = gt_model::provide(&config.initial_condition, net.attributes.agents)?;
    let model = GtModel::with_processors(config.n_processors)?;
    let state = DriverState::from_config(config, initial, net.adjacency)?;

    let header = StoreHeader::new(
        &net.attributes,
        net.labels,
        config,
        &state.space,
        generator,
    );
    let path = persistence::dataset_path(config, &network.name);
    let writer = StoreWriter::create(&path, header)?;

    run_with(config, state, model, writer)
}

/// Run an already prepared state with any transition and sink.
pub fn run_with<T: Transition, S: PersistenceSink>(
    config: &SimulationConfig,
    state: DriverState,
    transition: T,
    sink: S,
) -> Result<RunReport, RunError> {
    SimulationDriver::new(config.clone(), state, transition, sink).run()
}
