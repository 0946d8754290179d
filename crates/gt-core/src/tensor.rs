//! Dense exact-decimal tensors holding one simulation window.

use rust_decimal::Decimal;

/// Dense `(agent, pair, slot)` tensor of decimals.
///
/// Storage is allocated once for a capacity shape. The active extent along the
/// pair and slot axes can shrink for short chunks without moving or
/// reallocating data, so slot 0 survives a change of extent.
#[derive(Clone, Debug, PartialEq)]
pub struct StateTensor {
    capacity: [usize; 3],
    active: [usize; 3],
    data: Vec<Decimal>,
}

impl StateTensor {
    pub fn zeros(agents: usize, pairs: usize, slots: usize) -> Self {
        Self {
            capacity: [agents, pairs, slots],
            active: [agents, pairs, slots],
            data: vec![Decimal::ZERO; agents * pairs * slots],
        }
    }

    /// Active shape `(agents, pairs, slots)`.
    pub fn shape(&self) -> [usize; 3] {
        self.active
    }

    pub fn capacity(&self) -> [usize; 3] {
        self.capacity
    }

    fn offset(&self, agent: usize, pair: usize, slot: usize) -> usize {
        assert!(
            agent < self.active[0] && pair < self.active[1] && slot < self.active[2],
            "index ({agent}, {pair}, {slot}) out of active shape {:?}",
            self.active
        );
        (agent * self.capacity[1] + pair) * self.capacity[2] + slot
    }

    pub fn get(&self, agent: usize, pair: usize, slot: usize) -> Decimal {
        self.data[self.offset(agent, pair, slot)]
    }

    pub fn set(&mut self, agent: usize, pair: usize, slot: usize, value: Decimal) {
        let i = self.offset(agent, pair, slot);
        self.data[i] = value;
    }

    fn set_active(&mut self, pairs: usize, slots: usize) {
        assert!(pairs <= self.capacity[1] && slots <= self.capacity[2]);
        self.active[1] = pairs;
        self.active[2] = slots;
    }

    /// Copy slot `from` onto slot `to` for every active agent and pair.
    pub fn copy_slot(&mut self, from: usize, to: usize) {
        for agent in 0..self.active[0] {
            for pair in 0..self.active[1] {
                let v = self.get(agent, pair, from);
                self.set(agent, pair, to, v);
            }
        }
    }

    /// Set `slot` of every active pair to the per-agent vector `values`.
    pub fn broadcast_slot(&mut self, slot: usize, values: &[Decimal]) {
        assert_eq!(values.len(), self.active[0]);
        for (agent, v) in values.iter().enumerate() {
            for pair in 0..self.active[1] {
                self.set(agent, pair, slot, *v);
            }
        }
    }

    /// Per-agent values of one pair at one slot.
    pub fn slot_vector(&self, pair: usize, slot: usize) -> Vec<Decimal> {
        (0..self.active[0])
            .map(|agent| self.get(agent, pair, slot))
            .collect()
    }
}

/// Which of the three per-agent state quantities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Quantity {
    Cash,
    Goods,
    Price,
}

impl Quantity {
    pub const ALL: [Quantity; 3] = [Quantity::Cash, Quantity::Goods, Quantity::Price];

    /// Position of the dataset inside a store.
    pub fn ordinal(self) -> usize {
        match self {
            Quantity::Cash => 0,
            Quantity::Goods => 1,
            Quantity::Price => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Quantity::Cash => "cash",
            Quantity::Goods => "goods",
            Quantity::Price => "price",
        }
    }
}

/// Cash, goods and price for one (parameter chunk x epoch window).
///
/// Slot 0 holds the window's initial condition; slots `1..=len` are filled by
/// the transition. Capacity is `(n, parameter_chunk_size, epoch_chunk_size + 1)`.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkState {
    pub cash: StateTensor,
    pub goods: StateTensor,
    pub price: StateTensor,
}

impl ChunkState {
    pub fn new(agents: usize, parameter_chunk_size: usize, epoch_chunk_size: usize) -> Self {
        let t = StateTensor::zeros(agents, parameter_chunk_size, epoch_chunk_size + 1);
        Self {
            cash: t.clone(),
            goods: t.clone(),
            price: t,
        }
    }

    pub fn agents(&self) -> usize {
        self.cash.shape()[0]
    }

    /// Pairs in the current parameter chunk.
    pub fn pairs(&self) -> usize {
        self.cash.shape()[1]
    }

    /// Epochs in the current window (active slots minus the leading slot).
    pub fn window_len(&self) -> usize {
        self.cash.shape()[2] - 1
    }

    /// Restrict indexing to the actual chunk and window lengths.
    pub fn set_extent(&mut self, pairs: usize, window_len: usize) {
        for t in self.tensors_mut() {
            t.set_active(pairs, window_len + 1);
        }
    }

    pub fn tensor(&self, q: Quantity) -> &StateTensor {
        match q {
            Quantity::Cash => &self.cash,
            Quantity::Goods => &self.goods,
            Quantity::Price => &self.price,
        }
    }

    pub fn tensor_mut(&mut self, q: Quantity) -> &mut StateTensor {
        match q {
            Quantity::Cash => &mut self.cash,
            Quantity::Goods => &mut self.goods,
            Quantity::Price => &mut self.price,
        }
    }

    fn tensors_mut(&mut self) -> [&mut StateTensor; 3] {
        [&mut self.cash, &mut self.goods, &mut self.price]
    }

    /// Overwrite the leading slot of every active pair with an initial condition.
    pub fn reset_leading(&mut self, cash: &[Decimal], goods: &[Decimal], price: &[Decimal]) {
        self.cash.broadcast_slot(0, cash);
        self.goods.broadcast_slot(0, goods);
        self.price.broadcast_slot(0, price);
    }

    /// Move the terminal slot into the leading slot for the next window.
    pub fn carry_terminal(&mut self) {
        let terminal = self.window_len();
        for t in self.tensors_mut() {
            t.copy_slot(terminal, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: i64) -> Decimal {
        Decimal::new(v, 0)
    }

    #[test]
    fn capacity_shape_has_leading_slot() {
        let s = ChunkState::new(3, 2, 5);
        assert_eq!(s.cash.shape(), [3, 2, 6]);
        assert_eq!(s.window_len(), 5);
    }

    #[test]
    fn short_extent_keeps_leading_slot() {
        let mut s = ChunkState::new(2, 2, 4);
        s.reset_leading(&[d(1), d(2)], &[d(3), d(4)], &[d(5), d(6)]);
        s.set_extent(1, 2);
        assert_eq!(s.price.shape(), [2, 1, 3]);
        assert_eq!(s.cash.get(1, 0, 0), d(2));
        assert_eq!(s.price.get(0, 0, 0), d(5));
    }

    #[test]
    #[should_panic]
    fn indexing_beyond_active_extent_panics() {
        let mut s = ChunkState::new(2, 2, 4);
        s.set_extent(1, 4);
        let _ = s.cash.get(0, 1, 0);
    }

    #[test]
    fn carry_terminal_uses_actual_window() {
        let mut s = ChunkState::new(1, 1, 4);
        s.set_extent(1, 2);
        s.goods.set(0, 0, 2, d(9));
        s.goods.set(0, 0, 0, d(1));
        s.carry_terminal();
        assert_eq!(s.goods.get(0, 0, 0), d(9));
    }

    #[test]
    fn slot_vector_reads_agents_in_order() {
        let mut t = StateTensor::zeros(3, 1, 1);
        t.broadcast_slot(0, &[d(1), d(2), d(3)]);
        assert_eq!(t.slot_vector(0, 0), vec![d(1), d(2), d(3)]);
    }
}
