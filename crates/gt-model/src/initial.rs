//! Initial-condition policies.
//!
//! Every policy yields three vectors of length `n` (cash, goods, price).

use gt_core::network::read_records;
use gt_core::{ConfigError, InitialCondition, ResourceError, SetupError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Decimal places kept for random shares and prices.
const RANDOM_DP: u32 = 12;
/// Resolution of the uniform weights drawn per agent.
const WEIGHT_RESOLUTION: u32 = 1_000_000;

/// Per-agent state at epoch zero.
#[derive(Clone, Debug, PartialEq)]
pub struct InitialState {
    pub cash: Vec<Decimal>,
    pub goods: Vec<Decimal>,
    pub price: Vec<Decimal>,
}

impl InitialState {
    /// Every agent gets identical scalars.
    pub fn homogeneous(cash: Decimal, goods: Decimal, price: Decimal, n: usize) -> Self {
        Self {
            cash: vec![cash; n],
            goods: vec![goods; n],
            price: vec![price; n],
        }
    }

    pub fn agents(&self) -> usize {
        self.cash.len()
    }

    pub fn total_cash(&self) -> Decimal {
        self.cash.iter().copied().sum()
    }

    pub fn total_goods(&self) -> Decimal {
        self.goods.iter().copied().sum()
    }
}

/// Produce the initial state for `n` agents under the configured policy.
pub fn provide(policy: &InitialCondition, n: usize) -> Result<InitialState, SetupError> {
    if n == 0 {
        return Err(ConfigError::Zero { field: "agents" }.into());
    }
    let state = match policy {
        InitialCondition::FromFile { path } => load_from_file(path, n)?,
        InitialCondition::RandomUniform {
            c_tot,
            g_tot,
            c_min_lim,
            g_min_lim,
            p0,
            seed,
        } => random_uniform(*c_tot, *g_tot, *c_min_lim, *g_min_lim, *p0, *seed, n)?,
        InitialCondition::HomogeneousFixed { c0, g0, p0 } => {
            InitialState::homogeneous(*c0, *g0, *p0, n)
        }
        InitialCondition::HomogeneousScaled { c_tot, g_tot, p0 } => {
            homogeneous_scaled(*c_tot, *g_tot, *p0, n)
        }
    };
    info!(
        agents = n,
        total_cash = %state.total_cash(),
        total_goods = %state.total_goods(),
        "initial condition ready"
    );
    Ok(state)
}

/// Totals split evenly across `n > 0` agents, fixed price.
///
/// Example:
/// let s = homogeneous_scaled(Decimal::new(900, 0), Decimal::new(30, 0), Decimal::ONE, 3);
/// assert_eq!(s.cash[0], Decimal::new(300, 0));
pub fn homogeneous_scaled(c_tot: Decimal, g_tot: Decimal, p0: Decimal, n: usize) -> InitialState {
    let n_dec = Decimal::from(n);
    InitialState::homogeneous(c_tot / n_dec, g_tot / n_dec, p0, n)
}

/// Floors plus uniformly weighted shares of the remaining totals.
///
/// Totals are conserved exactly: the last agent absorbs the rounding
/// remainder. Price is uniform in `[p0/2, 3*p0/2]`. The draw is reproducible
/// for a given seed.
pub fn random_uniform(
    c_tot: Decimal,
    g_tot: Decimal,
    c_min_lim: Decimal,
    g_min_lim: Decimal,
    p0: Decimal,
    seed: u64,
    n: usize,
) -> Result<InitialState, ConfigError> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let cash = split_with_floor("c_tot", c_tot, c_min_lim, n, &mut rng)?;
    let goods = split_with_floor("g_tot", g_tot, g_min_lim, n, &mut rng)?;
    let low = p0 * Decimal::new(5, 1);
    let price = (0..n)
        .map(|_| {
            let u = Decimal::new(i64::from(rng.gen_range(0..=WEIGHT_RESOLUTION)), 6);
            (low + p0 * u).round_dp(RANDOM_DP)
        })
        .collect();
    Ok(InitialState { cash, goods, price })
}

fn split_with_floor(
    field: &'static str,
    total: Decimal,
    floor: Decimal,
    n: usize,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<Decimal>, ConfigError> {
    let exceeds = || ConfigError::FloorExceedsTotal {
        field,
        floor: floor.to_string(),
        agents: n,
        total: total.to_string(),
    };
    let floor_sum = floor.checked_mul(Decimal::from(n)).ok_or_else(exceeds)?;
    if floor_sum > total {
        return Err(exceeds());
    }
    let free = total - floor_sum;
    let weights: Vec<u32> = (0..n)
        .map(|_| rng.gen_range(1..=WEIGHT_RESOLUTION))
        .collect();
    let weight_sum = Decimal::from(weights.iter().map(|&w| u64::from(w)).sum::<u64>());
    let unit = free / weight_sum;

    let mut out = Vec::with_capacity(n);
    let mut given = Decimal::ZERO;
    for &w in &weights[..n - 1] {
        let share = (unit * Decimal::from(w))
            .round_dp_with_strategy(RANDOM_DP, RoundingStrategy::ToZero)
            .min(free - given);
        given += share;
        out.push(floor + share);
    }
    out.push(floor + (free - given));
    Ok(out)
}

/// Read `n` rows of `cash,goods,price` from a headed CSV file.
pub fn load_from_file(path: &Path, n: usize) -> Result<InitialState, ResourceError> {
    let records = read_records(path)?;
    if records.len() != n {
        return Err(ResourceError::malformed(
            path,
            format!("expected {n} agent rows, found {}", records.len()),
        ));
    }
    let mut state = InitialState {
        cash: Vec::with_capacity(n),
        goods: Vec::with_capacity(n),
        price: Vec::with_capacity(n),
    };
    for (row, record) in records.iter().enumerate() {
        let field = |col: usize, name: &str| -> Result<Decimal, ResourceError> {
            let raw = record.get(col).unwrap_or_default();
            let v = Decimal::from_str(raw).map_err(|e| {
                ResourceError::malformed(path, format!("row {row}: bad {name} '{raw}': {e}"))
            })?;
            if v.is_sign_negative() && !v.is_zero() {
                return Err(ResourceError::malformed(
                    path,
                    format!("row {row}: negative {name}"),
                ));
            }
            Ok(v)
        };
        state.cash.push(field(0, "cash")?);
        state.goods.push(field(1, "goods")?);
        state.price.push(field(2, "price")?);
    }
    Ok(state)
}
