//! Window transitions.
//!
//! A [`Transition`] fills slots `1..=len` of a [`ChunkState`] for every pair of
//! the current parameter chunk, starting from slot 0. [`GtModel`] is the
//! reference GT trade rule.

use gt_core::{Adjacency, AlphaMu, Bounds, ChunkState, ComputationError};
use rayon::prelude::*;
use rust_decimal::Decimal;

/// Inputs of one window computation besides the state buffer.
#[derive(Clone, Copy, Debug)]
pub struct WindowRequest<'a> {
    /// Pairs of the current parameter chunk, in chunk order.
    pub pairs: &'a [AlphaMu],
    /// Grid-index bounds of the parameter chunk.
    pub pair_bounds: Bounds,
    /// Epoch bounds of the window.
    pub window: Bounds,
    pub adjacency: &'a Adjacency,
}

/// Per-window state transition.
pub trait Transition {
    /// Fill slots `1..=request.window.len()` of `state` for every active pair.
    fn advance(
        &self,
        request: &WindowRequest<'_>,
        state: &mut ChunkState,
    ) -> Result<(), ComputationError>;
}

impl<T: Transition + ?Sized> Transition for &T {
    fn advance(
        &self,
        request: &WindowRequest<'_>,
        state: &mut ChunkState,
    ) -> Result<(), ComputationError> {
        (**self).advance(request, state)
    }
}

/// Per-agent state vectors at one epoch.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentState {
    pub cash: Vec<Decimal>,
    pub goods: Vec<Decimal>,
    pub price: Vec<Decimal>,
}

/// Reference GT transition.
///
/// Pairs of one window are independent, so they are advanced on a dedicated
/// worker pool when more than one processor is allowed.
pub struct GtModel {
    pool: Option<rayon::ThreadPool>,
}

impl GtModel {
    /// Sequential model.
    pub fn new() -> Self {
        Self { pool: None }
    }

    /// Model that spreads the pairs of a window over `n_processors` threads.
    pub fn with_processors(n_processors: usize) -> Result<Self, ComputationError> {
        if n_processors <= 1 {
            return Ok(Self::new());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(n_processors)
            .thread_name(|i| format!("gt-model-{i}"))
            .build()
            .map_err(|e| ComputationError::WorkerPool(e.to_string()))?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn processors(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.current_num_threads())
    }
}

impl Default for GtModel {
    fn default() -> Self {
        Self::new()
    }
}

impl Transition for GtModel {
    fn advance(
        &self,
        request: &WindowRequest<'_>,
        state: &mut ChunkState,
    ) -> Result<(), ComputationError> {
        let len = request.window.len();
        let pairs = state.pairs();
        if pairs != request.pairs.len() || len != state.window_len() {
            return Err(ComputationError::ShapeMismatch {
                expected_pairs: request.pairs.len(),
                expected_len: len,
                pairs,
                len: state.window_len(),
            });
        }

        let snapshot: &ChunkState = state;
        let run_pair = |p: usize| -> Result<Vec<AgentState>, ComputationError> {
            let mut current = AgentState {
                cash: snapshot.cash.slot_vector(p, 0),
                goods: snapshot.goods.slot_vector(p, 0),
                price: snapshot.price.slot_vector(p, 0),
            };
            let mut series = Vec::with_capacity(len);
            for k in 0..len {
                let epoch = request.window.first + k + 1;
                current = step(request.adjacency, request.pairs[p], &current, epoch)?;
                series.push(current.clone());
            }
            Ok(series)
        };
        let results: Vec<Vec<AgentState>> = match &self.pool {
            Some(pool) => pool.install(|| {
                (0..pairs)
                    .into_par_iter()
                    .map(run_pair)
                    .collect::<Result<Vec<_>, _>>()
            })?,
            None => (0..pairs).map(run_pair).collect::<Result<Vec<_>, _>>()?,
        };

        for (p, series) in results.into_iter().enumerate() {
            for (k, s) in series.into_iter().enumerate() {
                let slot = k + 1;
                for agent in 0..s.cash.len() {
                    state.cash.set(agent, p, slot, s.cash[agent]);
                    state.goods.set(agent, p, slot, s.goods[agent]);
                    state.price.set(agent, p, slot, s.price[agent]);
                }
            }
        }
        Ok(())
    }
}

struct Checked {
    epoch: usize,
}

impl Checked {
    fn overflow(&self, quantity: &'static str, agent: usize) -> ComputationError {
        ComputationError::Overflow {
            quantity,
            agent,
            epoch: self.epoch,
        }
    }

    fn add(
        &self,
        q: &'static str,
        agent: usize,
        a: Decimal,
        b: Decimal,
    ) -> Result<Decimal, ComputationError> {
        a.checked_add(b).ok_or_else(|| self.overflow(q, agent))
    }

    fn sub(
        &self,
        q: &'static str,
        agent: usize,
        a: Decimal,
        b: Decimal,
    ) -> Result<Decimal, ComputationError> {
        a.checked_sub(b).ok_or_else(|| self.overflow(q, agent))
    }

    fn mul(
        &self,
        q: &'static str,
        agent: usize,
        a: Decimal,
        b: Decimal,
    ) -> Result<Decimal, ComputationError> {
        a.checked_mul(b).ok_or_else(|| self.overflow(q, agent))
    }

    fn div(
        &self,
        q: &'static str,
        agent: usize,
        a: Decimal,
        b: Decimal,
    ) -> Result<Decimal, ComputationError> {
        if b.is_zero() {
            return Err(ComputationError::DivisionByZero {
                quantity: q,
                agent,
                epoch: self.epoch,
            });
        }
        a.checked_div(b).ok_or_else(|| self.overflow(q, agent))
    }
}

/// One GT epoch for a single (alpha, mu) pair.
///
/// Every agent spends `alpha * cash`, split across its suppliers by edge
/// weight. Every supplier offers `mu * goods`. A supplier that receives cash
/// and has goods sells everything offered at `incoming / offered` and each
/// buyer gets goods in proportion to the cash it sent. A supplier with no
/// buyers keeps its price; one with nothing to offer refunds its buyers.
/// Total cash and goods are conserved up to decimal rounding.
pub fn step(
    adj: &Adjacency,
    pair: AlphaMu,
    s: &AgentState,
    epoch: usize,
) -> Result<AgentState, ComputationError> {
    let ck = Checked { epoch };
    let n = s.cash.len();
    let alpha = pair.alpha_fraction();
    let mu = pair.mu_fraction();

    let mut next = s.clone();
    let mut incoming = vec![Decimal::ZERO; n];
    // Per supplier: (buyer, cash sent).
    let mut orders: Vec<Vec<(usize, Decimal)>> = vec![Vec::new(); n];

    for buyer in 0..n {
        let (suppliers, weights) = adj.predecessors(buyer);
        if suppliers.is_empty() {
            continue;
        }
        let budget = ck.mul("cash", buyer, alpha, s.cash[buyer])?;
        if budget.is_zero() {
            continue;
        }
        let mut weight_sum = Decimal::ZERO;
        for w in weights {
            weight_sum = ck.add("cash", buyer, weight_sum, *w)?;
        }
        for (&supplier, &w) in suppliers.iter().zip(weights) {
            let share = ck.div("cash", buyer, w, weight_sum)?;
            let sent = ck.mul("cash", buyer, budget, share)?;
            next.cash[buyer] = ck.sub("cash", buyer, next.cash[buyer], sent)?;
            incoming[supplier] = ck.add("cash", supplier, incoming[supplier], sent)?;
            orders[supplier].push((buyer, sent));
        }
    }

    for supplier in 0..n {
        let received = incoming[supplier];
        if received.is_zero() {
            continue;
        }
        let offered = ck.mul("goods", supplier, mu, s.goods[supplier])?;
        if offered.is_zero() {
            for &(buyer, sent) in &orders[supplier] {
                next.cash[buyer] = ck.add("cash", buyer, next.cash[buyer], sent)?;
            }
            continue;
        }
        next.price[supplier] = ck.div("price", supplier, received, offered)?;
        next.cash[supplier] = ck.add("cash", supplier, next.cash[supplier], received)?;
        next.goods[supplier] = ck.sub("goods", supplier, next.goods[supplier], offered)?;
        for &(buyer, sent) in &orders[supplier] {
            let fraction = ck.div("goods", buyer, sent, received)?;
            let bought = ck.mul("goods", buyer, offered, fraction)?;
            next.goods[buyer] = ck.add("goods", buyer, next.goods[buyer], bought)?;
        }
    }
    Ok(next)
}
