//! Database queries

pub mod plan;
pub mod task;
