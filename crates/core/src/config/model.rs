//! Model config (spec §6): the symbolic transformer shape driving tile
//! generation (no weight values are ever read or computed — spec §1
//! Non-goals).

use serde::Deserialize;

/// Transformer model shape parameters used to size tiles and KV tensors.
#[derive(Clone, Debug, Deserialize)]
pub struct ModelConfig {
    pub model_name: String,
    pub model_params_b: u32,
    pub model_vocab_size: u32,
    pub model_n_layer: u32,
    pub model_n_head: u32,
    pub model_n_embd: u32,
    /// Tensor-parallel degree; divides `model_n_embd`/`model_n_head` for
    /// per-core shard sizing.
    pub n_tp: u32,
}

impl ModelConfig {
    /// Per-head dimension `d_k = model_n_embd / model_n_head`.
    #[must_use]
    pub const fn head_dim(&self) -> u32 {
        self.model_n_embd / self.model_n_head
    }

    /// Embedding width after tensor-parallel sharding.
    #[must_use]
    pub const fn sharded_embd(&self) -> u32 {
        self.model_n_embd / self.n_tp
    }
}
