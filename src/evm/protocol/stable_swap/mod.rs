//! Curve-style StableSwap pools with two coins.
pub mod decoder;
pub mod math;
pub mod state;
