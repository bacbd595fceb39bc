//! System/run-mode config (spec §6): whether PIM is used at all, batching
//! limits, and the kernel-fusion/channel-load-balancing toggles pulled in
//! from `original_source/src/SimulationConfig.h` (spec_full §3).

use serde::Deserialize;

/// Whether PIM resources participate in the stage sequencer at all.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Npu,
    #[serde(rename = "npu+pim")]
    NpuPim,
}

impl RunMode {
    /// `true` for `npu+pim`, `false` for plain NPU-only execution (spec
    /// §4.5's Stage table collapses to SA-only work in this mode).
    #[must_use]
    pub const fn uses_pim(self) -> bool {
        matches!(self, RunMode::NpuPim)
    }
}

/// DRAM-channel assignment policy for newly initiated requests (spec_full
/// §3 supplemented feature, `ch_load_balancing` in `SimulationConfig.h`).
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChLoadBalancing {
    #[default]
    RoundRobin,
    LeastLoaded,
}

/// System-level scheduling configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct SystemConfig {
    pub run_mode: RunMode,
    pub sub_batch_mode: bool,
    /// Shares one lowering pass between QKV projection and FFN when true
    /// (spec_full §3 supplemented feature); otherwise each is lowered as a
    /// separate `StageProgram`.
    #[serde(default)]
    pub kernel_fusion: bool,
    pub max_seq_len: u32,
    pub max_active_reqs: u32,
    pub max_batch_size: u32,
    #[serde(default)]
    pub ch_load_balancing: ChLoadBalancing,
}
