//! Hardware config (spec §6): core array dimensions, SRAM, vector-unit
//! latencies, interconnect parameters, and tensor layout.

use serde::Deserialize;

/// Systolic array dataflow: output-stationary or weight-stationary.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CoreType {
    SystolicOs,
    SystolicWs,
}

/// Tensor memory layout convention.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum Layout {
    NCHW,
    NHWC,
}

/// Per-op vector-unit latency table (cycles), used by the vector-op tile
/// compiler (spec §4.6.2).
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct VectorLatencies {
    pub layernorm: u64,
    pub softmax: u64,
    pub add: u64,
    pub gelu: u64,
    pub exp: u64,
    pub add_tree: u64,
    pub scalar_sqrt: u64,
    pub scalar_add: u64,
    pub scalar_mul: u64,
}

/// Hardware-side configuration: NPU core array, SRAM, vector unit, and
/// interconnect.
#[derive(Clone, Debug, Deserialize)]
pub struct HardwareConfig {
    pub num_cores: u32,
    pub core_type: CoreType,
    pub core_width: u32,
    pub core_height: u32,
    pub core_freq: u64,
    pub sram_size: u32,
    pub spad_size: u32,
    pub accum_spad_size: u32,
    pub vector_core_count: u32,
    pub vector_core_width: u32,
    pub vector_latencies: VectorLatencies,
    pub icnt_freq: u64,
    pub icnt_latency: u64,
    /// Bytes per element (e.g. 2 for fp16/bf16).
    pub precision: u32,
    pub layout: Layout,
    /// System bus width in bytes, used for address low-bit alignment.
    #[serde(default = "default_bus_width")]
    pub bus_width_bytes: u32,
}

const fn default_bus_width() -> u32 {
    32
}
