use alloy::primitives::{Address, I256, U256};
use num_bigint::BigUint;
use num_traits::Zero;
use tracing::trace;

use crate::{
    evm::protocol::{
        safe_math::{safe_add_i256, safe_add_u256, safe_sub_i256, safe_sub_u256, u256_to_i256},
        u256_num::{biguint_to_u256, u256_to_biguint},
        utils::uniswap::{
            liquidity_math,
            sqrt_price_math::sqrt_price_q96_to_f64,
            swap_math,
            tick_list::TickList,
            tick_math::{
                get_sqrt_ratio_at_tick, get_tick_at_sqrt_ratio, MAX_SQRT_RATIO, MAX_TICK,
                MIN_SQRT_RATIO, MIN_TICK,
            },
        },
    },
    models::PoolInfo,
    protocol::{
        errors::{InvalidSnapshotError, SimulationError},
        models::SimulationConfig,
        pool_sim::{PoolSim, StateDelta, SwapQuote, VenueMetadata},
    },
};

const FEE_DENOMINATOR: u32 = 1_000_000;

/// Concentrated-liquidity pool restricted to a bounded window of loaded ticks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniswapV3State {
    info: PoolInfo,
    liquidity: u128,
    sqrt_price: U256,
    fee: u32,
    tick: i32,
    ticks: TickList,
    base_gas: u64,
    gas_per_tick: u64,
}

#[derive(Debug)]
struct SwapState {
    amount_remaining: I256,
    amount_calculated: I256,
    sqrt_price: U256,
    tick: i32,
    liquidity: u128,
}

#[derive(Debug)]
struct SwapResults {
    /// Signed like the specified amount; zero unless the price limit was hit.
    amount_remaining: I256,
    /// Negative output for exact input swaps, positive input for exact output swaps.
    amount_calculated: I256,
    sqrt_price: U256,
    liquidity: u128,
    tick: i32,
    fee: U256,
    crossed_ticks: u64,
}

impl SwapResults {
    fn delta(&self) -> StateDelta {
        StateDelta::ConcentratedLiquidity {
            sqrt_price: self.sqrt_price,
            liquidity: self.liquidity,
            tick: self.tick,
        }
    }
}

impl UniswapV3State {
    /// Creates a new instance of `UniswapV3State`.
    ///
    /// # Arguments
    /// - `info`: The pool identity. Must hold exactly two tokens, token0 first.
    /// - `liquidity`: The liquidity active at the current price.
    /// - `sqrt_price`: The square root of the current price as Q64.96.
    /// - `fee`: The swap fee in pips.
    /// - `tick`: The current tick of the pool.
    /// - `ticks`: The loaded window of initialized ticks.
    /// - `config`: Supplies the gas schedule.
    pub fn new(
        info: PoolInfo,
        liquidity: u128,
        sqrt_price: U256,
        fee: u32,
        tick: i32,
        ticks: TickList,
        config: &SimulationConfig,
    ) -> Result<Self, InvalidSnapshotError> {
        if info.tokens.len() != 2 {
            return Err(InvalidSnapshotError::ValueError(format!(
                "concentrated liquidity pools hold two tokens, got {}",
                info.tokens.len()
            )));
        }
        if fee >= FEE_DENOMINATOR {
            return Err(InvalidSnapshotError::ValueError(format!(
                "fee {fee} pips is not below 100%"
            )));
        }
        if sqrt_price < MIN_SQRT_RATIO || sqrt_price >= MAX_SQRT_RATIO {
            return Err(InvalidSnapshotError::ValueError(format!(
                "sqrt price {sqrt_price} outside of price bounds"
            )));
        }
        if !(MIN_TICK..=MAX_TICK).contains(&tick) {
            return Err(InvalidSnapshotError::ValueError(format!(
                "tick {tick} outside of tick bounds"
            )));
        }
        Ok(UniswapV3State {
            info,
            liquidity,
            sqrt_price,
            fee,
            tick,
            ticks,
            base_gas: config.cl_base_gas,
            gas_per_tick: config.cl_gas_per_tick,
        })
    }

    pub fn liquidity(&self) -> u128 {
        self.liquidity
    }

    pub fn sqrt_price(&self) -> U256 {
        self.sqrt_price
    }

    pub fn tick(&self) -> i32 {
        self.tick
    }

    /// Furthest price the swap may reach: one unit beyond the outermost loaded tick.
    fn sqrt_price_limit(&self, zero_for_one: bool) -> Result<U256, SimulationError> {
        let one = U256::from(1u64);
        if zero_for_one {
            let edge = safe_sub_u256(get_sqrt_ratio_at_tick(self.ticks.min_tick())?, one)?;
            Ok(edge.max(MIN_SQRT_RATIO + one))
        } else {
            let edge = safe_add_u256(get_sqrt_ratio_at_tick(self.ticks.max_tick())?, one)?;
            Ok(edge.min(MAX_SQRT_RATIO - one))
        }
    }

    fn swap(
        &self,
        zero_for_one: bool,
        amount_specified: I256,
    ) -> Result<SwapResults, SimulationError> {
        let price_limit = self.sqrt_price_limit(zero_for_one)?;
        let limit_ahead = if zero_for_one {
            price_limit < self.sqrt_price
        } else {
            price_limit > self.sqrt_price
        };
        if !limit_ahead {
            return Err(SimulationError::OutOfRange(format!(
                "price {} is already at the edge of the loaded ticks",
                self.sqrt_price
            )));
        }

        let exact_input = amount_specified.is_positive();

        let mut state = SwapState {
            amount_remaining: amount_specified,
            amount_calculated: I256::ZERO,
            sqrt_price: self.sqrt_price,
            tick: self.tick,
            liquidity: self.liquidity,
        };
        let mut fee = U256::ZERO;
        let mut crossed_ticks = 0u64;

        while !state.amount_remaining.is_zero() && state.sqrt_price != price_limit {
            let sqrt_price_start = state.sqrt_price;
            let (next_tick, initialized) = self
                .ticks
                .next_initialized_tick_within_one_word(state.tick, zero_for_one);
            let next_tick = next_tick.clamp(MIN_TICK, MAX_TICK);
            let sqrt_price_next = get_sqrt_ratio_at_tick(next_tick)?;

            let step = swap_math::compute_swap_step(
                state.sqrt_price,
                Self::get_sqrt_ratio_target(sqrt_price_next, price_limit, zero_for_one),
                state.liquidity,
                state.amount_remaining,
                self.fee,
            )?;
            state.sqrt_price = step.sqrt_price_next;

            let amount_in = u256_to_i256(safe_add_u256(step.amount_in, step.fee_amount)?)?;
            let amount_out = u256_to_i256(step.amount_out)?;
            if exact_input {
                state.amount_remaining = safe_sub_i256(state.amount_remaining, amount_in)?;
                state.amount_calculated = safe_sub_i256(state.amount_calculated, amount_out)?;
            } else {
                state.amount_remaining = safe_add_i256(state.amount_remaining, amount_out)?;
                state.amount_calculated = safe_add_i256(state.amount_calculated, amount_in)?;
            }
            fee = safe_add_u256(fee, step.fee_amount)?;

            if state.sqrt_price == sqrt_price_next {
                if initialized {
                    let liquidity_raw = self
                        .ticks
                        .get_tick(next_tick)
                        .map(|t| t.net_liquidity)
                        .unwrap_or_default();
                    let liquidity_net = if zero_for_one {
                        liquidity_raw.checked_neg().ok_or_else(|| {
                            SimulationError::Overflow(format!("liquidity net {liquidity_raw}"))
                        })?
                    } else {
                        liquidity_raw
                    };
                    state.liquidity =
                        liquidity_math::add_liquidity_delta(state.liquidity, liquidity_net)?;
                    crossed_ticks += 1;
                }
                state.tick = if zero_for_one { next_tick - 1 } else { next_tick };
            } else if state.sqrt_price != sqrt_price_start {
                state.tick = get_tick_at_sqrt_ratio(state.sqrt_price)?;
            }
        }

        Ok(SwapResults {
            amount_remaining: state.amount_remaining,
            amount_calculated: state.amount_calculated,
            sqrt_price: state.sqrt_price,
            liquidity: state.liquidity,
            tick: state.tick,
            fee,
            crossed_ticks,
        })
    }

    fn get_sqrt_ratio_target(
        sqrt_price_next: U256,
        sqrt_price_limit: U256,
        zero_for_one: bool,
    ) -> U256 {
        let beyond_limit = if zero_for_one {
            sqrt_price_next < sqrt_price_limit
        } else {
            sqrt_price_next > sqrt_price_limit
        };

        if beyond_limit {
            sqrt_price_limit
        } else {
            sqrt_price_next
        }
    }

    fn zero_for_one(
        &self,
        token_in: &Address,
        token_out: &Address,
    ) -> Result<bool, SimulationError> {
        let (index_in, _) = self.info.resolve_pair(token_in, token_out)?;
        Ok(index_in == 0)
    }

    fn gas(&self, crossed_ticks: u64) -> u64 {
        self.base_gas
            .saturating_add(crossed_ticks.saturating_mul(self.gas_per_tick))
    }
}

impl PoolSim for UniswapV3State {
    fn info(&self) -> &PoolInfo {
        &self.info
    }

    fn fee(&self) -> f64 {
        self.fee as f64 / FEE_DENOMINATOR as f64
    }

    fn spot_price(&self, base: &Address, quote: &Address) -> Result<f64, SimulationError> {
        let zero_for_one = self.zero_for_one(base, quote)?;
        let price = sqrt_price_q96_to_f64(
            self.sqrt_price,
            self.info.tokens[0].decimals,
            self.info.tokens[1].decimals,
        );
        Ok(if zero_for_one { price } else { 1.0f64 / price })
    }

    fn quote_exact_input(
        &self,
        token_in: &Address,
        amount_in: &BigUint,
        token_out: &Address,
    ) -> Result<SwapQuote, SimulationError> {
        let zero_for_one = self.zero_for_one(token_in, token_out)?;
        if amount_in.is_zero() {
            return Err(SimulationError::ZeroOrNegativeAmount);
        }
        let amount_specified = u256_to_i256(biguint_to_u256(amount_in)?)?;

        let result = self.swap(zero_for_one, amount_specified)?;
        trace!(?amount_in, ?token_in, ?token_out, ?zero_for_one, ?result, "CL SWAP");

        let amount_out = result.amount_calculated.unsigned_abs();
        if amount_out.is_zero() {
            return Err(SimulationError::ZeroOutput);
        }
        let remaining = result.amount_remaining.unsigned_abs();
        let consumed = safe_sub_u256(amount_specified.unsigned_abs(), remaining)?;

        Ok(SwapQuote {
            amount_in: u256_to_biguint(consumed),
            amount_out: u256_to_biguint(amount_out),
            fee: u256_to_biguint(result.fee),
            gas: self.gas(result.crossed_ticks),
            remaining: u256_to_biguint(remaining),
            delta: result.delta(),
        })
    }

    fn quote_exact_output(
        &self,
        token_out: &Address,
        amount_out: &BigUint,
        token_in: &Address,
    ) -> Result<SwapQuote, SimulationError> {
        let zero_for_one = self.zero_for_one(token_in, token_out)?;
        if amount_out.is_zero() {
            return Err(SimulationError::ZeroOrNegativeAmount);
        }
        let requested = u256_to_i256(biguint_to_u256(amount_out)?)?;
        let amount_specified = safe_sub_i256(I256::ZERO, requested)?;

        let result = self.swap(zero_for_one, amount_specified)?;
        trace!(?amount_out, ?token_in, ?token_out, ?zero_for_one, ?result, "CL SWAP EXACT OUT");

        let remaining = result.amount_remaining.unsigned_abs();
        let filled = safe_sub_u256(requested.unsigned_abs(), remaining)?;
        if filled.is_zero() {
            return Err(SimulationError::ZeroOutput);
        }

        Ok(SwapQuote {
            amount_in: u256_to_biguint(result.amount_calculated.unsigned_abs()),
            amount_out: u256_to_biguint(filled),
            fee: u256_to_biguint(result.fee),
            gas: self.gas(result.crossed_ticks),
            remaining: u256_to_biguint(remaining),
            delta: result.delta(),
        })
    }

    fn get_limits(
        &self,
        token_in: &Address,
        token_out: &Address,
    ) -> Result<(BigUint, BigUint), SimulationError> {
        let zero_for_one = self.zero_for_one(token_in, token_out)?;
        let unbounded = u256_to_i256(U256::from(u128::MAX))?;

        let result = match self.swap(zero_for_one, unbounded) {
            Ok(result) => result,
            // Nothing left to trade in this direction within the loaded ticks
            Err(SimulationError::OutOfRange(_)) => {
                return Ok((BigUint::zero(), BigUint::zero()));
            }
            Err(err) => return Err(err),
        };
        let consumed =
            safe_sub_u256(unbounded.unsigned_abs(), result.amount_remaining.unsigned_abs())?;

        Ok((u256_to_biguint(consumed), u256_to_biguint(result.amount_calculated.unsigned_abs())))
    }

    fn commit(&mut self, delta: &StateDelta) -> Result<(), SimulationError> {
        match delta {
            StateDelta::ConcentratedLiquidity { sqrt_price, liquidity, tick } => {
                self.sqrt_price = *sqrt_price;
                self.liquidity = *liquidity;
                self.tick = *tick;
                Ok(())
            }
            other => Err(SimulationError::IncompatibleDelta(format!(
                "{other:?} applied to concentrated liquidity pool {}",
                self.info.address
            ))),
        }
    }

    fn metadata(
        &self,
        token_in: &Address,
        token_out: &Address,
    ) -> Result<VenueMetadata, SimulationError> {
        Ok(VenueMetadata::ConcentratedLiquidity {
            pool: self.info.address.clone(),
            exchange: self.info.exchange.clone(),
            fee_pips: self.fee,
            tick_spacing: self.ticks.tick_spacing(),
            zero_for_one: self.zero_for_one(token_in, token_out)?,
        })
    }
}
