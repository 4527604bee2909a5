pub mod events;
pub mod geo;
pub mod lifecycle;
pub mod matrix;
pub mod notify;
pub mod optimizer;
pub mod simulator;
pub mod solver;
pub mod store;
