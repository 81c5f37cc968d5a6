//! Multi-level approval: the pure route walker and its database side.

pub mod engine;
pub mod store;
