//! Uniswap V3 core math, ported from the `v3-core` libraries.
pub mod liquidity_math;
pub mod sqrt_price_math;
pub mod swap_math;
pub mod tick_list;
pub mod tick_math;
