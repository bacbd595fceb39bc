//! Top-level `Simulator` and the three-clock-domain event loop (spec §5).

pub mod simulator;

pub use simulator::{SimReport, Simulator};
