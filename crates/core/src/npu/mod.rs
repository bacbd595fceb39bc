//! NPU core array: scratchpad, compute pipelines, and per-cycle stepping
//! (spec §4.8).

pub mod core;
pub mod pipeline;
pub mod sram;

pub use core::{ComputePayload, Core, MemoryRequest};
pub use pipeline::{instruction_ready, least_loaded, systolic_latency, vector_latency, Pipeline, PipelineEntry};
pub use sram::{Scratchpad, ScratchpadHalf, SramLine};
