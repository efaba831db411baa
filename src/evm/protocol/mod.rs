//! Supported swap venues and the 256-bit arithmetic they share.

pub mod safe_math;
pub mod stable_swap;
pub mod u256_num;
pub mod uniswap_v3;
pub mod utils;
