//! Tensor addressing (spec §4.7): a tagged sum of the three address schemes
//! a tile compiler needs, sharing one `get_addr`/`get_all_addrs`/
//! `add_token` contract. Out-of-range indices return [`GARBAGE_ADDR`]
//! rather than erroring — callers treat it as "no memory access needed"
//! (spec §4.7, §8's tail-padding tolerance).

use crate::common::address::{Address, AddressMapping};
use crate::common::constants::GARBAGE_ADDR;

/// A dense 2D weight or activation tensor: `base + (i * cols + j) *
/// precision`, then `switch_co_ch` (spec §4.7).
#[derive(Clone, Debug)]
pub struct Dense2D {
    pub base: u64,
    pub rows: u32,
    pub cols: u32,
    pub precision: u32,
}

impl Dense2D {
    #[must_use]
    pub fn get_addr(&self, mapping: &AddressMapping, i: u32, j: u32) -> Address {
        if i >= self.rows || j >= self.cols {
            return Address::new(GARBAGE_ADDR);
        }
        let offset = u64::from(i) * u64::from(self.cols) + u64::from(j);
        let raw = self.base + offset * u64::from(self.precision);
        mapping.switch_co_ch(Address::new(raw))
    }

    /// All addresses for row `i` across every column (used by MOVIN/MOVOUT
    /// tiling, spec §4.6.1).
    #[must_use]
    pub fn get_all_addrs(&self, mapping: &AddressMapping, i: u32) -> Vec<Address> {
        (0..self.cols).map(|j| self.get_addr(mapping, i, j)).collect()
    }
}

/// A KV-cache tensor laid out NPU-style: 32-token blocks, each
/// `32 * d_k * precision` bytes, extended one block at a time on overflow
/// (spec §4.7).
#[derive(Clone, Debug)]
pub struct KvNpuLayout {
    pub d_k: u32,
    pub precision: u32,
    /// Base address of each allocated block, in allocation order.
    pub blocks: Vec<u64>,
    pub num_tokens: u32,
}

const NPU_KV_BLOCK_TOKENS: u32 = 32;

impl KvNpuLayout {
    #[must_use]
    pub fn block_size_bytes(&self) -> u64 {
        u64::from(NPU_KV_BLOCK_TOKENS) * u64::from(self.d_k) * u64::from(self.precision)
    }

    #[must_use]
    pub fn get_addr(&self, token: u32) -> Address {
        if token >= self.num_tokens {
            return Address::new(GARBAGE_ADDR);
        }
        let block_idx = (token / NPU_KV_BLOCK_TOKENS) as usize;
        let Some(&block_base) = self.blocks.get(block_idx) else {
            return Address::new(GARBAGE_ADDR);
        };
        let within = u64::from(token % NPU_KV_BLOCK_TOKENS) * u64::from(self.d_k) * u64::from(self.precision);
        Address::new(block_base + within)
    }

    #[must_use]
    pub fn get_all_addrs(&self) -> Vec<Address> {
        (0..self.num_tokens).map(|t| self.get_addr(t)).collect()
    }

    /// Extends the tensor by one token, allocating a new block when the
    /// current one has filled (spec §4.7's `add_token`). `alloc_block`
    /// supplies the base address of a freshly allocated block; it is not
    /// called unless a new block is actually needed.
    pub fn add_token(&mut self, alloc_block: impl FnOnce() -> u64) {
        if self.num_tokens % NPU_KV_BLOCK_TOKENS == 0 {
            self.blocks.push(alloc_block());
        }
        self.num_tokens += 1;
    }
}

/// A KV-cache tensor laid out PIM-style: keys stride along banks (one row
/// spans `bank_per_ch` tokens), values stride along columns (one row spans
/// `num_ele_per_row` tokens); `_rows` holds the allocated row base indices
/// per channel (spec §4.7).
#[derive(Clone, Debug)]
pub struct KvPimLayout {
    pub is_key: bool,
    pub d_k: u32,
    pub precision: u32,
    pub bank_per_ch: u32,
    pub num_ele_per_row: u32,
    pub channel: u32,
    pub rows: Vec<u32>,
    pub num_tokens: u32,
}

impl KvPimLayout {
    fn tokens_per_row(&self) -> u32 {
        if self.is_key {
            self.bank_per_ch
        } else {
            self.num_ele_per_row
        }
    }

    #[must_use]
    pub fn get_addr(&self, mapping: &AddressMapping, token: u32, feature: u32) -> Address {
        if token >= self.num_tokens || feature >= self.d_k {
            return Address::new(GARBAGE_ADDR);
        }
        let per_row = self.tokens_per_row().max(1);
        let row_idx = (token / per_row) as usize;
        let Some(&row) = self.rows.get(row_idx) else {
            return Address::new(GARBAGE_ADDR);
        };
        let within_row = token % per_row;
        let (bank, column) = if self.is_key {
            (within_row, feature)
        } else {
            (feature % self.bank_per_ch.max(1), within_row)
        };
        mapping.make_address(self.channel, 0, 0, bank, row, column)
    }

    #[must_use]
    pub fn get_all_addrs(&self, mapping: &AddressMapping, token: u32) -> Vec<Address> {
        (0..self.d_k).map(|f| self.get_addr(mapping, token, f)).collect()
    }

    /// Extends the tensor by one token, allocating a new row in this
    /// channel's free-row pool when the current row has filled.
    pub fn add_token(&mut self, alloc_row: impl FnOnce() -> u32) {
        if self.num_tokens % self.tokens_per_row().max(1) == 0 {
            self.rows.push(alloc_row());
        }
        self.num_tokens += 1;
    }
}

/// The tagged sum of every tensor addressing scheme a tile needs (spec
/// §4.7): keeping this a plain enum (rather than a trait object or
/// inheritance hierarchy) means the compiler exhaustively checks every
/// addressing mode at each call site.
#[derive(Clone, Debug)]
pub enum Tensor {
    Dense2D(Dense2D),
    KvNpu(KvNpuLayout),
    KvPim(KvPimLayout),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> AddressMapping {
        AddressMapping::new("rorabgbachco", 16, 2, 4, 4, 32768, 1024, 8, 2).unwrap()
    }

    #[test]
    fn dense2d_out_of_range_returns_garbage() {
        let t = Dense2D { base: 0, rows: 4, cols: 4, precision: 2 };
        assert_eq!(t.get_addr(&mapping(), 10, 0).raw(), GARBAGE_ADDR);
    }

    #[test]
    fn kv_npu_layout_allocates_new_block_on_overflow() {
        let mut t = KvNpuLayout { d_k: 64, precision: 2, blocks: vec![0], num_tokens: 0 };
        for _ in 0..32 {
            t.add_token(|| 1000);
        }
        assert_eq!(t.blocks, vec![0, 1000]);
        assert_eq!(t.num_tokens, 32);
    }

    #[test]
    fn kv_npu_layout_out_of_range_token_is_garbage() {
        let t = KvNpuLayout { d_k: 64, precision: 2, blocks: vec![0], num_tokens: 5 };
        assert_eq!(t.get_addr(10).raw(), GARBAGE_ADDR);
    }
}
