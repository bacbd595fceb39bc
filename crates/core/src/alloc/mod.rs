//! Weight, activation, and KV-cache address allocators (spec §4.10), wired
//! together in the initialization order weights → activations → KV cache.

pub mod activation;
pub mod kv;
pub mod weight;

pub use activation::ActivationAllocator;
pub use kv::{NpuKvAllocator, PimKvAllocator};
pub use weight::WeightAllocator;

/// The three HBM arenas cohabiting one address space, laid out weights
/// first, then activations, then KV cache (spec §4.10).
#[derive(Clone, Debug)]
pub struct Allocators {
    pub weight: WeightAllocator,
    pub activation: ActivationAllocator,
    pub npu_kv: NpuKvAllocator,
    pub pim_kv: PimKvAllocator,
}

impl Allocators {
    /// Lays the activation and KV arenas out after `weight` (already
    /// populated by the caller loading model weights): the activation
    /// arena starts at `weight.limit()`, and the KV arena starts at the
    /// activation arena's limit (spec §4.10's initialization order).
    #[must_use]
    pub fn new(
        weight: WeightAllocator,
        dram_channels: u32,
        activation_arena_size: u64,
        npu_kv_block_stride: u64,
        pim_kv_rows_per_channel: u32,
    ) -> Self {
        let activation = ActivationAllocator::new(weight.limit(), activation_arena_size);
        let npu_kv = NpuKvAllocator::new(activation.limit(), npu_kv_block_stride);
        let pim_kv = PimKvAllocator::new(dram_channels, pim_kv_rows_per_channel);
        Self { weight, activation, npu_kv, pim_kv }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arenas_lay_out_weights_then_activations_then_kv_cache() {
        let mut weight = WeightAllocator::new(64, 2);
        weight.allocate(500).unwrap();
        let weight_limit = weight.limit();
        let allocators = Allocators::new(weight, 2, 1024, 64, 8);
        assert_eq!(allocators.weight.limit(), weight_limit);
        assert_eq!(allocators.activation.limit(), weight_limit + 1024);
    }
}
