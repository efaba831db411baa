//! Venue-agnostic simulation contract, dispatch and collaborators.
pub mod errors;
pub mod models;
pub mod pool_sim;
pub mod sources;
pub mod state;
