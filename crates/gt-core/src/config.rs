//! Run configuration.
//!
//! [`RawConfig`] mirrors the user-facing option table: every field optional,
//! unknown keys rejected. [`SimulationConfig::from_raw`] resolves defaults once
//! and rejects invalid or contradictory combinations before any work starts.

use crate::error::ConfigError;
use crate::grid::{self, ParameterSpace};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

pub const DEFAULT_EPOCHS: usize = 100;
pub const DEFAULT_ALPHA_MU_INTERVAL: u32 = 200;
pub const DEFAULT_ALPHA_MU_CHUNK_SIZE: usize = 16;
pub const DEFAULT_EPOCHS_CHUNK_SIZE: usize = 100;
pub const DEFAULT_INTEGER_SENSITIVITY: u32 = 10_000;
pub const DEFAULT_RNG_SEED: u64 = 42;
pub const DEFAULT_RESULT_FOLDER: &str = "./results/";

fn default_c0() -> Decimal {
    Decimal::new(300, 0)
}

fn default_g0() -> Decimal {
    Decimal::new(40, 0)
}

fn default_p0() -> Decimal {
    Decimal::new(10, 0)
}

/// Policy producing the per-agent state at epoch zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum InitialCondition {
    /// Precomputed vectors read from a CSV file.
    FromFile { path: PathBuf },
    /// Floors plus uniformly weighted shares of the totals; random price.
    RandomUniform {
        c_tot: Decimal,
        g_tot: Decimal,
        c_min_lim: Decimal,
        g_min_lim: Decimal,
        /// Centre of the uniform price draw.
        p0: Decimal,
        seed: u64,
    },
    /// Every agent gets the same scalars.
    HomogeneousFixed {
        c0: Decimal,
        g0: Decimal,
        p0: Decimal,
    },
    /// Totals split evenly across agents, fixed price.
    HomogeneousScaled {
        c_tot: Decimal,
        g_tot: Decimal,
        p0: Decimal,
    },
}

/// When the output store is forced to durable storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Once, after the last window.
    #[default]
    EndOfRun,
    /// After every persisted window.
    EveryWindow,
}

/// Option table as read from a config file; every field optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub epochs: Option<usize>,
    pub alpha_mu_interval: Option<u32>,
    pub resultfolder: Option<PathBuf>,
    pub rand_ic: Option<bool>,
    pub alpha_mu_chunk_size: Option<usize>,
    pub epochs_chunk_size: Option<usize>,
    pub integer_sensitivity: Option<u32>,
    pub using_c0_g0: Option<bool>,
    pub c0: Option<Decimal>,
    pub g0: Option<Decimal>,
    pub p0: Option<Decimal>,
    pub c_tot: Option<Decimal>,
    pub g_tot: Option<Decimal>,
    pub c_min_lim: Option<Decimal>,
    pub g_min_lim: Option<Decimal>,
    pub rng_seed: Option<u64>,
    pub icfile: Option<PathBuf>,
    pub selectchunk: Option<bool>,
    pub saved_chunkids: Option<BTreeSet<usize>>,
    pub n_processors: Option<usize>,
    pub simulation_index: Option<usize>,
    pub flush_policy: Option<FlushPolicy>,
}

/// Validated, fully resolved run configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Total epochs swept.
    pub epochs: usize,
    /// Sweep resolution in per mille.
    pub alpha_mu_interval: u32,
    /// Root directory for run outputs.
    pub result_folder: PathBuf,
    /// Pairs per parameter chunk.
    pub alpha_mu_chunk_size: usize,
    /// Epochs per window.
    pub epochs_chunk_size: usize,
    /// Fixed-point factor applied when values are written.
    pub integer_sensitivity: u32,
    pub initial_condition: InitialCondition,
    /// Epoch-window ordinals to persist; `None` persists all.
    pub saved_chunk_ids: Option<BTreeSet<usize>>,
    /// Parallelism hint forwarded to the transition.
    pub n_processors: usize,
    /// Suffix of the dataset file name.
    pub simulation_index: usize,
    pub flush_policy: FlushPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            epochs: DEFAULT_EPOCHS,
            alpha_mu_interval: DEFAULT_ALPHA_MU_INTERVAL,
            result_folder: PathBuf::from(DEFAULT_RESULT_FOLDER),
            alpha_mu_chunk_size: DEFAULT_ALPHA_MU_CHUNK_SIZE,
            epochs_chunk_size: DEFAULT_EPOCHS_CHUNK_SIZE,
            integer_sensitivity: DEFAULT_INTEGER_SENSITIVITY,
            initial_condition: InitialCondition::HomogeneousFixed {
                c0: default_c0(),
                g0: default_g0(),
                p0: default_p0(),
            },
            saved_chunk_ids: None,
            n_processors: 1,
            simulation_index: 0,
            flush_policy: FlushPolicy::EndOfRun,
        }
    }
}

impl SimulationConfig {
    /// Resolve defaults and validate.
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let initial_condition = resolve_initial_condition(&raw)?;
        let saved_chunk_ids = match (raw.selectchunk.unwrap_or(false), raw.saved_chunkids) {
            (true, Some(ids)) => Some(ids),
            (true, None) => {
                return Err(ConfigError::Missing {
                    option: "saved_chunkids",
                    reason: "selectchunk is true",
                })
            }
            (false, Some(_)) => {
                return Err(ConfigError::Missing {
                    option: "selectchunk",
                    reason: "saved_chunkids is given",
                })
            }
            (false, None) => None,
        };
        let cfg = Self {
            epochs: raw.epochs.unwrap_or(DEFAULT_EPOCHS),
            alpha_mu_interval: raw.alpha_mu_interval.unwrap_or(DEFAULT_ALPHA_MU_INTERVAL),
            result_folder: raw
                .resultfolder
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULT_FOLDER)),
            alpha_mu_chunk_size: raw
                .alpha_mu_chunk_size
                .unwrap_or(DEFAULT_ALPHA_MU_CHUNK_SIZE),
            epochs_chunk_size: raw.epochs_chunk_size.unwrap_or(DEFAULT_EPOCHS_CHUNK_SIZE),
            integer_sensitivity: raw
                .integer_sensitivity
                .unwrap_or(DEFAULT_INTEGER_SENSITIVITY),
            initial_condition,
            saved_chunk_ids,
            n_processors: raw.n_processors.unwrap_or(1),
            simulation_index: raw.simulation_index.unwrap_or(0),
            flush_policy: raw.flush_policy.unwrap_or_default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every invariant; also used for configurations built in code.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epochs == 0 {
            return Err(ConfigError::Zero { field: "epochs" });
        }
        let pairs = grid::pair_count(self.alpha_mu_interval)?;
        check_chunk("alpha_mu_chunk_size", self.alpha_mu_chunk_size, pairs)?;
        check_chunk("epochs_chunk_size", self.epochs_chunk_size, self.epochs)?;
        if self.integer_sensitivity == 0 {
            return Err(ConfigError::Zero {
                field: "integer_sensitivity",
            });
        }
        if self.n_processors == 0 {
            return Err(ConfigError::Zero {
                field: "n_processors",
            });
        }
        if let Some(ids) = &self.saved_chunk_ids {
            if ids.is_empty() {
                return Err(ConfigError::Zero {
                    field: "saved_chunkids",
                });
            }
            let windows = self.epochs.div_ceil(self.epochs_chunk_size);
            if let Some(&id) = ids.iter().find(|&&id| id >= windows) {
                return Err(ConfigError::UnknownChunk { id, windows });
            }
        }
        match &self.initial_condition {
            InitialCondition::FromFile { .. } => {}
            InitialCondition::RandomUniform {
                c_tot,
                g_tot,
                c_min_lim,
                g_min_lim,
                p0,
                ..
            } => {
                non_negative("c_tot", *c_tot)?;
                non_negative("g_tot", *g_tot)?;
                non_negative("c_min_lim", *c_min_lim)?;
                non_negative("g_min_lim", *g_min_lim)?;
                positive("p0", *p0)?;
            }
            InitialCondition::HomogeneousFixed { c0, g0, p0 } => {
                non_negative("c0", *c0)?;
                non_negative("g0", *g0)?;
                positive("p0", *p0)?;
            }
            InitialCondition::HomogeneousScaled { c_tot, g_tot, p0 } => {
                non_negative("c_tot", *c_tot)?;
                non_negative("g_tot", *g_tot)?;
                positive("p0", *p0)?;
            }
        }
        Ok(())
    }

    /// Grid and epoch windows for this configuration.
    pub fn parameter_space(&self) -> Result<ParameterSpace, ConfigError> {
        ParameterSpace::build(
            self.alpha_mu_interval,
            self.alpha_mu_chunk_size,
            self.epochs,
            self.epochs_chunk_size,
        )
    }

    /// Whether the epoch window at `position` is written to the store.
    pub fn persists_window(&self, position: usize) -> bool {
        self.saved_chunk_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&position))
    }
}

fn resolve_initial_condition(raw: &RawConfig) -> Result<InitialCondition, ConfigError> {
    let rand_ic = raw.rand_ic.unwrap_or(false);
    let p0 = raw.p0.unwrap_or_else(default_p0);
    if let Some(path) = &raw.icfile {
        if rand_ic {
            return Err(ConfigError::Contradiction("icfile", "rand_ic"));
        }
        return Ok(InitialCondition::FromFile { path: path.clone() });
    }
    if rand_ic {
        if raw.using_c0_g0 == Some(true) {
            return Err(ConfigError::Contradiction("rand_ic", "using_c0_g0"));
        }
        const WHY: &str = "rand_ic is true";
        return Ok(InitialCondition::RandomUniform {
            c_tot: require(raw.c_tot, "c_tot", WHY)?,
            g_tot: require(raw.g_tot, "g_tot", WHY)?,
            c_min_lim: require(raw.c_min_lim, "c_min_lim", WHY)?,
            g_min_lim: require(raw.g_min_lim, "g_min_lim", WHY)?,
            p0,
            seed: raw.rng_seed.unwrap_or(DEFAULT_RNG_SEED),
        });
    }
    if raw.using_c0_g0.unwrap_or(true) {
        Ok(InitialCondition::HomogeneousFixed {
            c0: raw.c0.unwrap_or_else(default_c0),
            g0: raw.g0.unwrap_or_else(default_g0),
            p0,
        })
    } else {
        const WHY: &str = "using_c0_g0 is false";
        Ok(InitialCondition::HomogeneousScaled {
            c_tot: require(raw.c_tot, "c_tot", WHY)?,
            g_tot: require(raw.g_tot, "g_tot", WHY)?,
            p0,
        })
    }
}

fn require<T>(
    value: Option<T>,
    option: &'static str,
    reason: &'static str,
) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::Missing { option, reason })
}

fn check_chunk(field: &'static str, size: usize, dimension: usize) -> Result<(), ConfigError> {
    if size == 0 {
        return Err(ConfigError::Zero { field });
    }
    if size > dimension {
        return Err(ConfigError::ChunkTooLarge {
            field,
            size,
            dimension,
        });
    }
    Ok(())
}

fn non_negative(field: &'static str, v: Decimal) -> Result<(), ConfigError> {
    if v.is_sign_negative() && !v.is_zero() {
        return Err(ConfigError::Negative { field });
    }
    Ok(())
}

fn positive(field: &'static str, v: Decimal) -> Result<(), ConfigError> {
    if v <= Decimal::ZERO {
        return Err(ConfigError::Zero { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_options_resolve_to_defaults() {
        let cfg = SimulationConfig::from_raw(RawConfig::default()).unwrap();
        assert_eq!(cfg, SimulationConfig::default());
        assert!(cfg.persists_window(3));
    }

    #[test]
    fn yaml_options_are_parsed() {
        let text = "epochs: 2\n\
                    alpha_mu_interval: 500\n\
                    alpha_mu_chunk_size: 1\n\
                    epochs_chunk_size: 2\n\
                    c0: 300\n\
                    g0: 40\n\
                    p0: 10\n\
                    flush_policy: every_window\n";
        let raw: RawConfig = serde_yaml::from_str(text).unwrap();
        let cfg = SimulationConfig::from_raw(raw).unwrap();
        assert_eq!(cfg.epochs, 2);
        assert_eq!(cfg.flush_policy, FlushPolicy::EveryWindow);
        assert_eq!(
            cfg.initial_condition,
            InitialCondition::HomogeneousFixed {
                c0: Decimal::new(300, 0),
                g0: Decimal::new(40, 0),
                p0: Decimal::new(10, 0),
            }
        );
    }

    #[test]
    fn unknown_option_is_rejected() {
        let res: Result<RawConfig, _> = serde_yaml::from_str("epoch: 10\n");
        assert!(res.is_err());
    }

    #[test]
    fn random_policy_requires_totals() {
        let raw = RawConfig {
            rand_ic: Some(true),
            c_tot: Some(Decimal::new(1000, 0)),
            ..Default::default()
        };
        assert_eq!(
            SimulationConfig::from_raw(raw).unwrap_err(),
            ConfigError::Missing {
                option: "g_tot",
                reason: "rand_ic is true"
            }
        );
    }

    #[test]
    fn random_policy_resolves_with_seed() {
        let raw = RawConfig {
            rand_ic: Some(true),
            c_tot: Some(Decimal::new(1000, 0)),
            g_tot: Some(Decimal::new(100, 0)),
            c_min_lim: Some(Decimal::new(1, 0)),
            g_min_lim: Some(Decimal::ZERO),
            rng_seed: Some(7),
            ..Default::default()
        };
        let cfg = SimulationConfig::from_raw(raw).unwrap();
        assert!(matches!(
            cfg.initial_condition,
            InitialCondition::RandomUniform { seed: 7, .. }
        ));
    }

    #[test]
    fn icfile_and_rand_ic_contradict() {
        let raw = RawConfig {
            rand_ic: Some(true),
            icfile: Some(PathBuf::from("ic.csv")),
            ..Default::default()
        };
        assert_eq!(
            SimulationConfig::from_raw(raw).unwrap_err(),
            ConfigError::Contradiction("icfile", "rand_ic")
        );
    }

    #[test]
    fn scaled_policy_requires_totals() {
        let raw = RawConfig {
            using_c0_g0: Some(false),
            ..Default::default()
        };
        assert!(matches!(
            SimulationConfig::from_raw(raw),
            Err(ConfigError::Missing {
                option: "c_tot",
                ..
            })
        ));
    }

    #[test]
    fn chunk_sizes_are_bounded() {
        let raw = RawConfig {
            epochs: Some(10),
            epochs_chunk_size: Some(11),
            ..Default::default()
        };
        assert_eq!(
            SimulationConfig::from_raw(raw).unwrap_err(),
            ConfigError::ChunkTooLarge {
                field: "epochs_chunk_size",
                size: 11,
                dimension: 10
            }
        );
        let raw = RawConfig {
            alpha_mu_chunk_size: Some(17),
            ..Default::default()
        };
        assert!(SimulationConfig::from_raw(raw).is_err());
        let raw = RawConfig {
            alpha_mu_chunk_size: Some(0),
            ..Default::default()
        };
        assert!(SimulationConfig::from_raw(raw).is_err());
    }

    #[test]
    fn selected_chunks_are_checked() {
        let raw = RawConfig {
            epochs: Some(10),
            epochs_chunk_size: Some(5),
            selectchunk: Some(true),
            saved_chunkids: Some([1].into_iter().collect()),
            ..Default::default()
        };
        let cfg = SimulationConfig::from_raw(raw).unwrap();
        assert!(!cfg.persists_window(0));
        assert!(cfg.persists_window(1));

        let raw = RawConfig {
            epochs: Some(10),
            epochs_chunk_size: Some(5),
            selectchunk: Some(true),
            saved_chunkids: Some([2].into_iter().collect()),
            ..Default::default()
        };
        assert_eq!(
            SimulationConfig::from_raw(raw).unwrap_err(),
            ConfigError::UnknownChunk { id: 2, windows: 2 }
        );

        let raw = RawConfig {
            selectchunk: Some(true),
            ..Default::default()
        };
        assert!(SimulationConfig::from_raw(raw).is_err());
    }

    #[test]
    fn negative_scalars_are_rejected() {
        let raw = RawConfig {
            c0: Some(Decimal::new(-1, 0)),
            ..Default::default()
        };
        assert_eq!(
            SimulationConfig::from_raw(raw).unwrap_err(),
            ConfigError::Negative { field: "c0" }
        );
    }
}
