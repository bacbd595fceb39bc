//! Shared types used throughout the simulator: addresses, the error
//! taxonomy, and cross-cutting constants.

/// Bit-exact address encoding/decoding and PIM header packing.
pub mod address;
/// System-wide constants (sentinel addresses, default field widths).
pub mod constants;
/// Error taxonomy: configuration errors, fatal invariant violations, and
/// the non-error `IssueOutcome` used for recoverable scheduling conditions.
pub mod error;

pub use address::{Address, AddressMapping};
pub use constants::GARBAGE_ADDR;
pub use error::{IssueOutcome, SimError};
