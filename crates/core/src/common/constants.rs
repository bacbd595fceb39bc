//! Cross-cutting constants.

/// Sentinel returned by tensor addressing when an index falls outside the
/// tensor's logical bounds. Callers must treat it as "no memory access
/// needed" (spec §4.7) rather than as a real physical address.
pub const GARBAGE_ADDR: u64 = u64::MAX;

/// Number of systolic-array pipeline-fill cycles charged to the first
/// `COMP` of a PIM stream, expressed as a multiplier on `tCCD_S`.
pub const COMP_PIPELINE_FILL_TCCD_S_MULT: u64 = 6;

/// Multiplier used in the `GWRITE` same-bankgroup blocking window:
/// `gwrite_delay = 32 * (tCCD_S + tCCD_L)`.
pub const GWRITE_DELAY_MULT: u64 = 32;
