//! Type definitions

pub mod geo;
pub mod plan;
pub mod task;

pub use geo::*;
pub use plan::*;
pub use task::*;
