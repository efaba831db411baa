//! Two-coin StableSwap invariant, solved with Newton iterations in integer arithmetic.
use alloy::primitives::U256;
use metrics::counter;
use tracing::warn;

use crate::{
    evm::protocol::safe_math::{safe_add_u256, safe_div_u256, safe_mul_u256, safe_sub_u256},
    protocol::errors::SimulationError,
};

pub const FEE_DENOMINATOR: u64 = 100_000;
pub const DEFAULT_A_PRECISION: u64 = 100;
pub const MAX_LOOP_LIMIT: usize = 256;

/// N^N for two coins.
const N_POW_N: u64 = 4;

/// Last iterate of a Newton loop and whether it met the ±1 tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Newton {
    pub(crate) value: U256,
    pub(crate) converged: bool,
}

impl Newton {
    /// Accepts the iterate, reporting loops that ran out of iterations.
    ///
    /// Exhaustion keeps the last value unless `strict` is set.
    pub(crate) fn settle(
        self,
        solver: &'static str,
        strict: bool,
    ) -> Result<U256, SimulationError> {
        if self.converged {
            return Ok(self.value);
        }
        warn!(
            solver,
            iterations = MAX_LOOP_LIMIT,
            value = %self.value,
            "StableSwapNewtonExhausted"
        );
        counter!("stable_swap_newton_exhausted", "solver" => solver).increment(1);
        if strict {
            Err(SimulationError::ConvergenceExhausted { solver, iterations: MAX_LOOP_LIMIT })
        } else {
            Ok(self.value)
        }
    }
}

fn within_one(a: U256, b: U256) -> bool {
    let diff = if a > b { a - b } else { b - a };
    diff <= U256::from(1u64)
}

/// Invariant `D` of normalized balances `x0`, `x1` under amplification `amp`.
///
/// `amp` is scaled by `a_precision`.
pub(crate) fn compute_d(
    amp: U256,
    a_precision: U256,
    x0: U256,
    x1: U256,
    max_iterations: usize,
) -> Result<Newton, SimulationError> {
    let s = safe_add_u256(x0, x1)?;
    if s.is_zero() {
        return Ok(Newton { value: U256::ZERO, converged: true });
    }
    if x0.is_zero() || x1.is_zero() {
        return Err(SimulationError::InsufficientLiquidity(
            "empty balance in invariant".to_string(),
        ));
    }

    let n_a = safe_mul_u256(amp, U256::from(N_POW_N))?;
    let numerator_base = safe_div_u256(safe_mul_u256(n_a, s)?, a_precision)?;
    let denominator_factor = safe_sub_u256(safe_div_u256(n_a, a_precision)?, U256::from(1u64))?;

    let mut d = s;
    for _ in 0..max_iterations {
        let mut d_p = safe_div_u256(safe_mul_u256(d, d)?, x0)?;
        d_p = safe_div_u256(safe_div_u256(safe_mul_u256(d_p, d)?, x1)?, U256::from(N_POW_N))?;

        let previous = d;
        let numerator = safe_mul_u256(
            safe_add_u256(numerator_base, safe_mul_u256(d_p, U256::from(2u64))?)?,
            d,
        )?;
        let denominator = safe_add_u256(
            safe_mul_u256(denominator_factor, d)?,
            safe_mul_u256(d_p, U256::from(3u64))?,
        )?;
        d = safe_div_u256(numerator, denominator)?;

        if within_one(d, previous) {
            return Ok(Newton { value: d, converged: true });
        }
    }
    Ok(Newton { value: d, converged: false })
}

/// Balance of the other coin that keeps the invariant at `d` when one coin holds `x`.
pub(crate) fn get_y(
    amp: U256,
    a_precision: U256,
    x: U256,
    d: U256,
    max_iterations: usize,
) -> Result<Newton, SimulationError> {
    if x.is_zero() {
        return Err(SimulationError::InsufficientLiquidity(
            "empty balance in invariant".to_string(),
        ));
    }
    let n_a = safe_mul_u256(amp, U256::from(N_POW_N))?;
    let two = U256::from(2u64);

    let mut c = safe_div_u256(safe_mul_u256(d, d)?, safe_mul_u256(x, two)?)?;
    c = safe_div_u256(safe_mul_u256(safe_mul_u256(c, d)?, a_precision)?, safe_mul_u256(n_a, two)?)?;
    let b = safe_add_u256(x, safe_div_u256(safe_mul_u256(d, a_precision)?, n_a)?)?;

    let mut y = d;
    for _ in 0..max_iterations {
        let previous = y;
        let numerator = safe_add_u256(safe_mul_u256(y, y)?, c)?;
        let denominator = safe_sub_u256(safe_add_u256(safe_mul_u256(y, two)?, b)?, d)?;
        y = safe_div_u256(numerator, denominator)?;

        if within_one(y, previous) {
            return Ok(Newton { value: y, converged: true });
        }
    }
    Ok(Newton { value: y, converged: false })
}

/// `A` at time `now` of a linear ramp from `initial_a` at `initial_time` to `future_a` at
/// `future_time`.
pub(crate) fn ramp_a(
    initial_a: U256,
    future_a: U256,
    initial_time: u64,
    future_time: u64,
    now: u64,
) -> Result<U256, SimulationError> {
    if now >= future_time || future_time <= initial_time {
        return Ok(future_a);
    }
    let elapsed = U256::from(now.saturating_sub(initial_time));
    let duration = U256::from(future_time - initial_time);
    if future_a > initial_a {
        let step = safe_div_u256(safe_mul_u256(future_a - initial_a, elapsed)?, duration)?;
        safe_add_u256(initial_a, step)
    } else {
        let step = safe_div_u256(safe_mul_u256(initial_a - future_a, elapsed)?, duration)?;
        safe_sub_u256(initial_a, step)
    }
}
