//! The contract every venue-specific simulator implements.
use alloy::primitives::{Address, U256};
use num_bigint::BigUint;
use num_traits::Zero;
use serde::Serialize;

use crate::{models::PoolInfo, protocol::errors::SimulationError};

/// State change produced by a quote, to be fed back into [`PoolSim::commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateDelta {
    ConcentratedLiquidity { sqrt_price: U256, liquidity: u128, tick: i32 },
    StableSwap {
        index_in: usize,
        index_out: usize,
        reserve_in_added: BigUint,
        reserve_out_removed: BigUint,
    },
}

/// Result of a quote call.
///
/// `remaining` is the part of the requested amount that could not be filled
/// because the loaded liquidity ran out: unconsumed input for exact-input
/// quotes, unfilled output for exact-output quotes. A non-zero remainder is a
/// partial fill, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    /// Input actually consumed, fee included.
    pub amount_in: BigUint,
    pub amount_out: BigUint,
    /// Fee charged, denominated in the input token.
    pub fee: BigUint,
    pub gas: u64,
    pub remaining: BigUint,
    pub delta: StateDelta,
}

impl SwapQuote {
    pub fn is_partial(&self) -> bool {
        !self.remaining.is_zero()
    }
}

/// Venue-specific data downstream consumers need to build the actual swap.
///
/// Purely informational: it never feeds back into pricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum VenueMetadata {
    #[serde(rename_all = "camelCase")]
    ConcentratedLiquidity {
        pool: String,
        exchange: String,
        fee_pips: u32,
        tick_spacing: u16,
        zero_for_one: bool,
    },
    #[serde(rename_all = "camelCase")]
    StableSwap {
        pool: String,
        exchange: String,
        token_in_index: usize,
        token_out_index: usize,
    },
}

/// Simulates swaps against the last known state of one pool.
///
/// Quote methods take `&self`, keep every working value on the call stack and
/// are therefore safe to call from any number of threads at once. `commit` is
/// the only mutation; callers serialize it against concurrent quotes, or
/// commit into a private copy obtained from `clone_state`.
#[enum_delegate::register]
pub trait PoolSim {
    /// Identity, tokens and reserves of the pool.
    fn info(&self) -> &PoolInfo;

    /// Swap fee as a fraction of the input, e.g. `0.003` for 0.3%.
    fn fee(&self) -> f64;

    /// Marginal price of `base` denominated in `quote`, adjusted for decimals and ignoring fees.
    fn spot_price(&self, base: &Address, quote: &Address) -> Result<f64, SimulationError>;

    fn quote_exact_input(
        &self,
        token_in: &Address,
        amount_in: &BigUint,
        token_out: &Address,
    ) -> Result<SwapQuote, SimulationError>;

    fn quote_exact_output(
        &self,
        token_out: &Address,
        amount_out: &BigUint,
        token_in: &Address,
    ) -> Result<SwapQuote, SimulationError>;

    /// Maximum `(amount_in, amount_out)` the pool can currently trade from `token_in` to
    /// `token_out`.
    fn get_limits(
        &self,
        token_in: &Address,
        token_out: &Address,
    ) -> Result<(BigUint, BigUint), SimulationError>;

    /// Applies the delta of a previously returned quote.
    fn commit(&mut self, delta: &StateDelta) -> Result<(), SimulationError>;

    fn metadata(
        &self,
        token_in: &Address,
        token_out: &Address,
    ) -> Result<VenueMetadata, SimulationError>;
}
