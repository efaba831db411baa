use alloy::primitives::{I256, U256};

use super::sqrt_price_math;
use crate::{
    evm::protocol::{
        safe_math::safe_sub_u256,
        utils::solidity_math::{mul_div, mul_div_rounding_up},
    },
    protocol::errors::SimulationError,
};

const FEE_DENOMINATOR: u32 = 1_000_000;

/// Result of swapping within a single price range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    /// Price after the step; never beyond the target.
    pub sqrt_price_next: U256,
    pub amount_in: U256,
    pub amount_out: U256,
    /// Part of the input kept as fee.
    pub fee_amount: U256,
}

/// Computes the result of swapping some amount in, or amount out, given the parameters of the swap.
///
/// Port of Uniswap's `SwapMath.computeSwapStep`.
///
/// # Arguments
///
/// * `sqrt_ratio_current` - The current sqrt price as a Q64.96 fixed-point number.
/// * `sqrt_ratio_target` - The price that cannot be exceeded. The swap direction is inferred from
///   it: `zero_for_one` when `sqrt_ratio_current >= sqrt_ratio_target`.
/// * `liquidity` - The usable liquidity in the current tick range.
/// * `amount_remaining` - Positive for exact input swaps, negative for exact output swaps.
/// * `fee_pips` - The fee taken from the input amount, in hundredths of a bip.
///
/// The fee plus the amount in never exceeds the amount remaining on exact input swaps.
pub(crate) fn compute_swap_step(
    sqrt_ratio_current: U256,
    sqrt_ratio_target: U256,
    liquidity: u128,
    amount_remaining: I256,
    fee_pips: u32,
) -> Result<SwapStep, SimulationError> {
    let zero_for_one = sqrt_ratio_current >= sqrt_ratio_target;
    let exact_in = !amount_remaining.is_negative();
    let remaining_abs = amount_remaining.unsigned_abs();

    let mut amount_in = U256::ZERO;
    let mut amount_out = U256::ZERO;

    let sqrt_ratio_next = if exact_in {
        let amount_remaining_less_fee = mul_div(
            remaining_abs,
            U256::from(FEE_DENOMINATOR - fee_pips),
            U256::from(FEE_DENOMINATOR),
        )?;
        amount_in = if zero_for_one {
            sqrt_price_math::get_amount0_delta(
                sqrt_ratio_target,
                sqrt_ratio_current,
                liquidity,
                true,
            )?
        } else {
            sqrt_price_math::get_amount1_delta(
                sqrt_ratio_current,
                sqrt_ratio_target,
                liquidity,
                true,
            )?
        };
        if amount_remaining_less_fee >= amount_in {
            sqrt_ratio_target
        } else {
            sqrt_price_math::get_next_sqrt_price_from_input(
                sqrt_ratio_current,
                liquidity,
                amount_remaining_less_fee,
                zero_for_one,
            )?
        }
    } else {
        amount_out = if zero_for_one {
            sqrt_price_math::get_amount1_delta(
                sqrt_ratio_target,
                sqrt_ratio_current,
                liquidity,
                false,
            )?
        } else {
            sqrt_price_math::get_amount0_delta(
                sqrt_ratio_current,
                sqrt_ratio_target,
                liquidity,
                false,
            )?
        };
        if remaining_abs >= amount_out {
            sqrt_ratio_target
        } else {
            sqrt_price_math::get_next_sqrt_price_from_output(
                sqrt_ratio_current,
                liquidity,
                remaining_abs,
                zero_for_one,
            )?
        }
    };

    let reached_target = sqrt_ratio_target == sqrt_ratio_next;

    if zero_for_one {
        if !(reached_target && exact_in) {
            amount_in = sqrt_price_math::get_amount0_delta(
                sqrt_ratio_next,
                sqrt_ratio_current,
                liquidity,
                true,
            )?;
        }
        if !(reached_target && !exact_in) {
            amount_out = sqrt_price_math::get_amount1_delta(
                sqrt_ratio_next,
                sqrt_ratio_current,
                liquidity,
                false,
            )?;
        }
    } else {
        if !(reached_target && exact_in) {
            amount_in = sqrt_price_math::get_amount1_delta(
                sqrt_ratio_current,
                sqrt_ratio_next,
                liquidity,
                true,
            )?;
        }
        if !(reached_target && !exact_in) {
            amount_out = sqrt_price_math::get_amount0_delta(
                sqrt_ratio_current,
                sqrt_ratio_next,
                liquidity,
                false,
            )?;
        }
    }

    // cap the output amount to not exceed the remaining output amount
    if !exact_in && amount_out > remaining_abs {
        amount_out = remaining_abs;
    }

    let fee_amount = if exact_in && !reached_target {
        // the remainder of the input is taken as fee
        safe_sub_u256(remaining_abs, amount_in)?
    } else {
        mul_div_rounding_up(
            amount_in,
            U256::from(fee_pips),
            U256::from(FEE_DENOMINATOR - fee_pips),
        )?
    };

    Ok(SwapStep { sqrt_price_next: sqrt_ratio_next, amount_in, amount_out, fee_amount })
}
