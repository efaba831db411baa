use crate::protocol::errors::InvalidSnapshotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    pub index: i32,
    pub liquidity_gross: u128,
    pub net_liquidity: i128,
}

impl TickInfo {
    pub fn new(index: i32, liquidity_gross: u128, net_liquidity: i128) -> Self {
        TickInfo { index, liquidity_gross, net_liquidity }
    }
}

/// The bounded window of initialized ticks loaded for one pool.
///
/// Sorted ascending by index with no duplicates and no uninitialized entries.
/// The first and last entry bound the prices this pool can be simulated at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickList {
    tick_spacing: u16,
    ticks: Vec<TickInfo>,
}

impl TickList {
    pub fn new(tick_spacing: u16, ticks: Vec<TickInfo>) -> Result<Self, InvalidSnapshotError> {
        if tick_spacing == 0 {
            return Err(InvalidSnapshotError::ValueError("tick spacing must be positive".into()));
        }
        let mut ticks: Vec<TickInfo> = ticks
            .into_iter()
            .filter(|t| t.liquidity_gross != 0)
            .collect();
        if ticks.is_empty() {
            return Err(InvalidSnapshotError::ValueError("no initialized ticks".into()));
        }
        ticks.sort_by_key(|t| t.index);

        for pair in ticks.windows(2) {
            if pair[0].index == pair[1].index {
                return Err(InvalidSnapshotError::ValueError(format!(
                    "duplicate tick {}",
                    pair[0].index
                )));
            }
        }
        if let Some(bad) = ticks
            .iter()
            .find(|t| t.index % tick_spacing as i32 != 0)
        {
            return Err(InvalidSnapshotError::ValueError(format!(
                "tick {} is not a multiple of spacing {tick_spacing}",
                bad.index
            )));
        }

        Ok(TickList { tick_spacing, ticks })
    }

    pub fn tick_spacing(&self) -> u16 {
        self.tick_spacing
    }

    pub fn min_tick(&self) -> i32 {
        self.ticks[0].index
    }

    pub fn max_tick(&self) -> i32 {
        self.ticks[self.ticks.len() - 1].index
    }

    pub fn get_tick(&self, index: i32) -> Option<&TickInfo> {
        self.ticks
            .binary_search_by_key(&index, |t| t.index)
            .ok()
            .map(|pos| &self.ticks[pos])
    }

    /// Largest initialized tick `<= tick`, if any.
    fn next_initialized_below_or_at(&self, tick: i32) -> Option<i32> {
        let pos = self.ticks.partition_point(|t| t.index <= tick);
        pos.checked_sub(1)
            .map(|p| self.ticks[p].index)
    }

    /// Smallest initialized tick `> tick`, if any.
    fn next_initialized_above(&self, tick: i32) -> Option<i32> {
        let pos = self.ticks.partition_point(|t| t.index <= tick);
        self.ticks.get(pos).map(|t| t.index)
    }

    /// Mirrors `TickBitmap.nextInitializedTickWithinOneWord` over the sorted list.
    ///
    /// Returns the next tick to step to and whether it is initialized. The
    /// search never leaves the 256-tick word of `tick`, so the result may be
    /// an uninitialized word boundary.
    pub fn next_initialized_tick_within_one_word(&self, tick: i32, lte: bool) -> (i32, bool) {
        let spacing = self.tick_spacing as i32;
        let compressed = tick.div_euclid(spacing);

        if lte {
            let word = compressed >> 8;
            let minimum = (word << 8) * spacing;
            match self.next_initialized_below_or_at(tick) {
                Some(index) if index >= minimum => (index, true),
                _ => (minimum, false),
            }
        } else {
            let word = (compressed + 1) >> 8;
            let maximum = (((word + 1) << 8) - 1) * spacing;
            match self.next_initialized_above(tick) {
                Some(index) if index <= maximum => (index, true),
                _ => (maximum, false),
            }
        }
    }
}
