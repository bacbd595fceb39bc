//! Simulator configuration: the five JSON config files plus the DRAM timing
//! `.ini` file described in spec §6.
//!
//! Each sub-config is independently `serde::Deserialize`; [`Config`]
//! composes them the way the teacher repo's `config.rs` composes
//! `GeneralConfig`/`SystemConfig`/`MemoryConfig` into one value threaded
//! through the rest of the crate.

/// Client dataset (CSV) and per-run client parameters.
pub mod client;
/// DRAM timing `.ini` parser (tCK/tRCD/tRP/... key=value pairs).
pub mod dram_ini;
/// Hardware config: core count/type/dims, SRAM sizes, vector-unit latencies.
pub mod hardware;
/// Model config: name, parameter count, layer/head/embedding dims.
pub mod model;
/// Memory config: DRAM protocol, geometry, PIM parameters.
pub mod memory;
/// System/run-mode config: run mode, sub-batch mode, batching limits.
pub mod system;

pub use client::ClientConfig;
pub use dram_ini::DramTiming;
pub use hardware::HardwareConfig;
pub use memory::MemoryConfig;
pub use model::ModelConfig;
pub use system::{ChLoadBalancing, RunMode, SystemConfig};

use crate::common::error::SimError;

/// The full simulator configuration, composed from the five JSON files and
/// the DRAM timing `.ini` named on the command line (spec §6).
#[derive(Clone, Debug)]
pub struct Config {
    pub hardware: HardwareConfig,
    pub memory: MemoryConfig,
    pub model: ModelConfig,
    pub system: SystemConfig,
    pub client: ClientConfig,
    pub dram_timing: DramTiming,
}

impl Config {
    /// Parses each config file's contents (already read by the caller) into
    /// a composed [`Config`]. Splitting parse from I/O keeps this crate
    /// free of filesystem concerns, per spec §1's "CLI parsing, JSON config
    /// loading... out of scope" boundary — the CLI crate owns reading files
    /// and calls this.
    pub fn from_sources(
        hardware_json: &str,
        memory_json: &str,
        model_json: &str,
        system_json: &str,
        client_json: &str,
        dram_ini_text: &str,
    ) -> Result<Self, SimError> {
        let hardware: HardwareConfig = serde_json::from_str(hardware_json)
            .map_err(|e| SimError::config(format!("hardware config: {e}")))?;
        let memory: MemoryConfig = serde_json::from_str(memory_json)
            .map_err(|e| SimError::config(format!("memory config: {e}")))?;
        let model: ModelConfig = serde_json::from_str(model_json)
            .map_err(|e| SimError::config(format!("model config: {e}")))?;
        let system: SystemConfig = serde_json::from_str(system_json)
            .map_err(|e| SimError::config(format!("system config: {e}")))?;
        let client: ClientConfig = serde_json::from_str(client_json)
            .map_err(|e| SimError::config(format!("client config: {e}")))?;
        let dram_timing = DramTiming::parse(dram_ini_text)?;

        memory.validate()?;

        Ok(Self {
            hardware,
            memory,
            model,
            system,
            client,
            dram_timing,
        })
    }

    /// Builds the [`crate::common::address::AddressMapping`] implied by this
    /// configuration's memory geometry.
    pub fn address_mapping(&self) -> Result<crate::common::address::AddressMapping, SimError> {
        crate::common::address::AddressMapping::new(
            &self.memory.address_mapping,
            self.memory.dram_channels,
            self.memory.dram_ranks,
            self.memory.dram_bankgroups,
            self.memory.dram_banks_per_ch,
            self.memory.dram_rows,
            self.memory.dram_page_size / self.hardware.precision.max(1),
            self.memory.burst_length,
            self.hardware.bus_width_bytes,
        )
    }
}
