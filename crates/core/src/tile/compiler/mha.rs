//! Fused MHA / QKV-split lowering (spec §4.6.4): Reshape, Split, Concat,
//! and SplitDecoding all emit *skip tiles* that retire immediately, since
//! they only relabel existing scratchpad/DRAM regions rather than moving
//! data. SplitDecoding additionally extends the K/V tensors by one token.

use crate::tensor::{KvNpuLayout, KvPimLayout};
use crate::tile::instruction::{Instruction, Opcode};

/// A zero-cost view-relabeling op (spec §4.6.4's "skip tile"): the
/// instruction list is always empty, but the op still participates in the
/// operation graph's executability/output bookkeeping.
#[must_use]
pub fn compile_skip_tile() -> Vec<Instruction> {
    vec![Instruction::new(Opcode::Skip)]
}

/// The three logical views `SplitDecoding` produces over shared K/V
/// buffers, each one token longer than before (spec §4.6.4).
pub struct SplitDecodingViews<'a> {
    pub key_npu: Option<&'a mut KvNpuLayout>,
    pub value_npu: Option<&'a mut KvNpuLayout>,
    pub key_pim: Option<&'a mut KvPimLayout>,
    pub value_pim: Option<&'a mut KvPimLayout>,
}

/// Advances whichever K/V tensors are present by one token, using the
/// supplied allocators only when a new block/row is actually needed.
pub fn split_decoding_add_token(
    views: SplitDecodingViews<'_>,
    mut alloc_npu_block: impl FnMut() -> u64,
    mut alloc_pim_row: impl FnMut() -> u32,
) -> Vec<Instruction> {
    if let Some(k) = views.key_npu {
        k.add_token(&mut alloc_npu_block);
    }
    if let Some(v) = views.value_npu {
        v.add_token(&mut alloc_npu_block);
    }
    if let Some(k) = views.key_pim {
        k.add_token(&mut alloc_pim_row);
    }
    if let Some(v) = views.value_pim {
        v.add_token(&mut alloc_pim_row);
    }
    compile_skip_tile()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_tile_has_no_real_work() {
        let instrs = compile_skip_tile();
        assert_eq!(instrs.len(), 1);
        assert_eq!(instrs[0].opcode, Opcode::Skip);
    }

    #[test]
    fn split_decoding_extends_kv_tensors_by_one_token() {
        let mut key = KvNpuLayout { d_k: 64, precision: 2, blocks: vec![0], num_tokens: 5 };
        let mut value = KvNpuLayout { d_k: 64, precision: 2, blocks: vec![100], num_tokens: 5 };
        let views = SplitDecodingViews { key_npu: Some(&mut key), value_npu: Some(&mut value), key_pim: None, value_pim: None };
        split_decoding_add_token(views, || 999, || 0);
        assert_eq!(key.num_tokens, 6);
        assert_eq!(value.num_tokens, 6);
    }
}
