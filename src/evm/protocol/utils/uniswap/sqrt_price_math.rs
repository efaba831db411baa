use alloy::primitives::U256;

use crate::{
    evm::protocol::{
        safe_math::{div_rounding_up, safe_add_u256, safe_div_u256, safe_mul_u256, safe_sub_u256},
        u256_num::u256_to_f64,
        utils::solidity_math::{mul_div, mul_div_rounding_up},
    },
    protocol::errors::SimulationError,
};

const RESOLUTION: usize = 96;
const Q96: U256 = U256::from_limbs([0, 1 << 32, 0, 0]);
const U160_MAX: U256 = U256::from_limbs([u64::MAX, u64::MAX, u64::MAX >> 32, 0]);

fn sort(a: U256, b: U256) -> (U256, U256) {
    if a > b {
        (b, a)
    } else {
        (a, b)
    }
}

/// Amount of token0 between two sqrt prices: `L * 2^96 * (b - a) / (a * b)`.
pub fn get_amount0_delta(
    a: U256,
    b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, SimulationError> {
    let (lower, upper) = sort(a, b);
    if lower.is_zero() {
        return Err(SimulationError::OutOfRange("sqrt price of zero".to_string()));
    }

    let numerator1 = U256::from(liquidity) << RESOLUTION;
    let numerator2 = upper - lower;

    if round_up {
        div_rounding_up(mul_div_rounding_up(numerator1, numerator2, upper)?, lower)
    } else {
        safe_div_u256(mul_div(numerator1, numerator2, upper)?, lower)
    }
}

/// Amount of token1 between two sqrt prices: `L * (b - a) / 2^96`.
pub fn get_amount1_delta(
    a: U256,
    b: U256,
    liquidity: u128,
    round_up: bool,
) -> Result<U256, SimulationError> {
    let (lower, upper) = sort(a, b);
    if round_up {
        mul_div_rounding_up(U256::from(liquidity), upper - lower, Q96)
    } else {
        mul_div(U256::from(liquidity), upper - lower, Q96)
    }
}

fn get_next_sqrt_price_from_amount0_rounding_up(
    sqrt_price: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, SimulationError> {
    if amount.is_zero() {
        return Ok(sqrt_price);
    }
    let numerator1 = U256::from(liquidity) << RESOLUTION;

    if add {
        if let Some(product) = amount.checked_mul(sqrt_price) {
            if let Some(denominator) = numerator1.checked_add(product) {
                return mul_div_rounding_up(numerator1, sqrt_price, denominator);
            }
        }
        let fallback = safe_add_u256(safe_div_u256(numerator1, sqrt_price)?, amount)?;
        div_rounding_up(numerator1, fallback)
    } else {
        let product = safe_mul_u256(amount, sqrt_price)?;
        if numerator1 <= product {
            return Err(SimulationError::InsufficientLiquidity(
                "output exceeds token0 liquidity in range".to_string(),
            ));
        }
        mul_div_rounding_up(numerator1, sqrt_price, numerator1 - product)
    }
}

fn get_next_sqrt_price_from_amount1_rounding_down(
    sqrt_price: U256,
    liquidity: u128,
    amount: U256,
    add: bool,
) -> Result<U256, SimulationError> {
    let liquidity = U256::from(liquidity);
    if add {
        let quotient = if amount <= U160_MAX {
            safe_div_u256(amount << RESOLUTION, liquidity)?
        } else {
            mul_div(amount, Q96, liquidity)?
        };
        safe_add_u256(sqrt_price, quotient)
    } else {
        let quotient = if amount <= U160_MAX {
            div_rounding_up(amount << RESOLUTION, liquidity)?
        } else {
            mul_div_rounding_up(amount, Q96, liquidity)?
        };
        if sqrt_price <= quotient {
            return Err(SimulationError::InsufficientLiquidity(
                "output exceeds token1 liquidity in range".to_string(),
            ));
        }
        safe_sub_u256(sqrt_price, quotient)
    }
}

/// Price after adding `amount_in` of the input token, rounded so the pool never loses.
pub fn get_next_sqrt_price_from_input(
    sqrt_price: U256,
    liquidity: u128,
    amount_in: U256,
    zero_for_one: bool,
) -> Result<U256, SimulationError> {
    if sqrt_price.is_zero() || liquidity == 0 {
        return Err(SimulationError::InsufficientLiquidity("no liquidity in range".to_string()));
    }
    if zero_for_one {
        get_next_sqrt_price_from_amount0_rounding_up(sqrt_price, liquidity, amount_in, true)
    } else {
        get_next_sqrt_price_from_amount1_rounding_down(sqrt_price, liquidity, amount_in, true)
    }
}

/// Price after removing `amount_out` of the output token.
pub fn get_next_sqrt_price_from_output(
    sqrt_price: U256,
    liquidity: u128,
    amount_out: U256,
    zero_for_one: bool,
) -> Result<U256, SimulationError> {
    if sqrt_price.is_zero() || liquidity == 0 {
        return Err(SimulationError::InsufficientLiquidity("no liquidity in range".to_string()));
    }
    if zero_for_one {
        get_next_sqrt_price_from_amount1_rounding_down(sqrt_price, liquidity, amount_out, false)
    } else {
        get_next_sqrt_price_from_amount0_rounding_up(sqrt_price, liquidity, amount_out, false)
    }
}

/// Converts a Q64.96 sqrt price into the decimal-adjusted price of token0 in token1.
pub fn sqrt_price_q96_to_f64(sqrt_price: U256, token0_decimals: u32, token1_decimals: u32) -> f64 {
    let token_correction = 10f64.powi(token0_decimals as i32 - token1_decimals as i32);
    let price = u256_to_f64(sqrt_price) / 2f64.powi(RESOLUTION as i32);
    price.powi(2) * token_correction
}
