//! Memory config (spec §6): DRAM protocol selection, channel/bank geometry,
//! and PIM-specific parameters.

use serde::Deserialize;

use crate::common::error::SimError;

/// Which DRAM/PIM protocol variant the controller emulates.
///
/// `Dram` is a plain DDR/HBM channel with no PIM commands. `Newton` is the
/// single-buffer PIM variant (spec §4.1's "Single-buffer mode"). `NeuPims`
/// is the dual-buffer variant that is this simulator's namesake.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DramType {
    Dram,
    Newton,
    #[serde(rename = "NEUPIMS")]
    NeuPims,
}

impl DramType {
    /// Whether this protocol maintains an independent PIM row buffer per
    /// bank (spec §4.1 "Dual-buffer mode"), as opposed to sharing one
    /// buffer guarded by `pim_lock`.
    #[must_use]
    pub const fn is_dual_buffer(self) -> bool {
        matches!(self, DramType::NeuPims)
    }

    /// Whether this protocol supports PIM commands at all.
    #[must_use]
    pub const fn supports_pim(self) -> bool {
        !matches!(self, DramType::Dram)
    }
}

/// Memory-side configuration: protocol, geometry, timing source, and PIM
/// batch parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct MemoryConfig {
    pub dram_type: DramType,
    pub dram_freq: u64,
    pub dram_channels: u32,
    pub dram_ranks: u32,
    pub dram_bankgroups: u32,
    pub dram_banks_per_ch: u32,
    pub dram_rows: u32,
    pub dram_req_size: u32,
    pub dram_page_size: u32,
    pub burst_length: u32,
    /// Number of operand params covered by one `PIM_COMP` command.
    pub pim_comp_coverage: u32,
    pub hbm_size: u64,
    pub hbm_act_buf_size: u64,
    pub pim_config_path: String,
    /// Disables sub-batch interleaving tricks to reproduce the paper's
    /// non-interleaved NPU-only baseline experiment.
    #[serde(default)]
    pub baseline_exp: bool,
    /// Whether the controller may issue two commands in the same cycle
    /// (one read/write, one other) per spec §4.4.
    #[serde(default = "default_true")]
    pub hbm_dual_cmd: bool,
    /// Number of per-bank command FIFOs in the PIM-aware command queue
    /// (spec §3 `CommandQueue`).
    #[serde(default = "default_num_queues")]
    pub num_queues: u32,
    /// 12-character field-order string for address decomposition (spec §6).
    #[serde(default = "default_address_mapping")]
    pub address_mapping: String,
}

const fn default_true() -> bool {
    true
}

const fn default_num_queues() -> u32 {
    4
}

fn default_address_mapping() -> String {
    "rorabgbachco".to_string()
}

impl MemoryConfig {
    /// Validates configuration-time invariants: an unknown `dram_type`
    /// string fails at `serde` deserialization already (unknown variant),
    /// so this only checks cross-field invariants `serde` cannot express.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.address_mapping.len() != 12 {
            return Err(SimError::config(format!(
                "address_mapping must be 12 characters, got {:?}",
                self.address_mapping
            )));
        }
        if self.dram_channels == 0 || self.dram_banks_per_ch == 0 {
            return Err(SimError::config(
                "dram_channels and dram_banks_per_ch must be nonzero",
            ));
        }
        if !self.dram_type.supports_pim() && self.pim_comp_coverage > 0 {
            tracing::debug!(
                "pim_comp_coverage set but dram_type={:?} does not support PIM",
                self.dram_type
            );
        }
        Ok(())
    }
}
