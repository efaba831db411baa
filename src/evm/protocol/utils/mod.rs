pub mod solidity_math;
pub mod uniswap;
