use std::{
    fmt,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::Deserialize;

use crate::{models::PoolSnapshot, protocol::errors::InvalidSnapshotError};

/// Time, in seconds since the Unix epoch, at which time-dependent pool parameters such as
/// an amplification ramp are evaluated.
#[derive(Clone)]
pub enum Clock {
    Fixed(u64),
    /// Read on every quote, so a shared instance follows the ramp without being mutated.
    Live(Arc<dyn Fn() -> u64 + Send + Sync>),
}

impl Clock {
    pub fn live(source: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Clock::Live(Arc::new(source))
    }

    /// Wall-clock time. A system clock set before the epoch reads as 0.
    pub fn system() -> Self {
        Clock::live(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default()
        })
    }

    pub fn now(&self) -> u64 {
        match self {
            Clock::Fixed(now) => *now,
            Clock::Live(source) => source(),
        }
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clock::Fixed(now) => f
                .debug_tuple("Fixed")
                .field(now)
                .finish(),
            Clock::Live(_) => write!(f, "Live"),
        }
    }
}

impl PartialEq for Clock {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Clock::Fixed(a), Clock::Fixed(b)) => a == b,
            (Clock::Live(a), Clock::Live(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Clock {}

/// Construction-time settings shared by every simulator built from snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Gas charged for a concentrated-liquidity swap that crosses no tick
    pub cl_base_gas: u64,
    /// Additional gas per initialized tick crossed
    pub cl_gas_per_tick: u64,
    /// Flat gas estimate of a StableSwap exchange
    pub stable_swap_gas: u64,
    /// Whether Newton iterations that hit their cap fail the quote instead of
    /// returning the last iterate
    pub strict_convergence: bool,
    /// Time source for amplification ramps. Without one, each pool is evaluated at its
    /// snapshot timestamp.
    #[serde(skip)]
    pub clock: Option<Clock>,
}

impl SimulationConfig {
    pub fn new() -> Self {
        Self {
            cl_base_gas: 125_000,
            cl_gas_per_tick: 21_000,
            stable_swap_gas: 130_000,
            strict_convergence: false,
            clock: None,
        }
    }

    pub fn with_cl_gas(mut self, base: u64, per_tick: u64) -> Self {
        self.cl_base_gas = base;
        self.cl_gas_per_tick = per_tick;
        self
    }

    pub fn with_stable_swap_gas(mut self, gas: u64) -> Self {
        self.stable_swap_gas = gas;
        self
    }

    pub fn with_strict_convergence(mut self, strict: bool) -> Self {
        self.strict_convergence = strict;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds a simulator from a pool snapshot, parsing its venue payloads once.
pub trait TryFromSnapshot: Sized {
    fn try_from_snapshot(
        snapshot: &PoolSnapshot,
        config: &SimulationConfig,
    ) -> Result<Self, InvalidSnapshotError>;
}
