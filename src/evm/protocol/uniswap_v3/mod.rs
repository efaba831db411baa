//! Concentrated-liquidity venues: Uniswap V3 and its forks.
pub mod decoder;
mod enums;
pub mod state;
