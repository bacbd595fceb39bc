//! The micro-op set a [`crate::tile::tile::Tile`] is compiled into (spec
//! §4.6, §4.8): scratchpad moves plus the systolic/vector/PIM compute ops.

use crate::common::address::Address;

/// One scratchpad-addressed micro-operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// Load from DRAM into an SRAM line.
    MovIn,
    /// Store an SRAM line out to DRAM.
    MovOut,
    /// Systolic-array multiply-accumulate, continuing an existing
    /// accumulation (no weight reload).
    Gemm,
    /// Systolic-array multiply-accumulate that first reloads weights
    /// (spec §4.6.1, §4.8's prolog-cycle cost).
    GemmPreload,
    LayerNorm,
    Softmax,
    Add,
    Gelu,
    /// `GWRITE` broadcast of a query vector into the PIM row (spec §4.6.3).
    PimGwrite,
    /// Arms a PIM COMP/READRES sequence (spec §4.4's `P_HEADER`).
    PimHeader,
    PimComp,
    PimReadres,
    PimCompsReadres,
    /// A retire-immediately placeholder for Reshape/Split/Concat/
    /// SplitDecoding (spec §4.6.4's "skip tiles").
    Skip,
}

impl Opcode {
    #[must_use]
    pub const fn is_systolic(self) -> bool {
        matches!(self, Opcode::Gemm | Opcode::GemmPreload)
    }

    #[must_use]
    pub const fn is_vector(self) -> bool {
        matches!(self, Opcode::LayerNorm | Opcode::Softmax | Opcode::Add | Opcode::Gelu)
    }

    #[must_use]
    pub const fn is_pim(self) -> bool {
        matches!(
            self,
            Opcode::PimGwrite | Opcode::PimHeader | Opcode::PimComp | Opcode::PimReadres | Opcode::PimCompsReadres
        )
    }
}

/// One scratchpad operand reference: which half-buffer and which line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SramRef {
    pub buffer: u32,
    pub line: u32,
}

/// A single lowered instruction (spec §4.6, §4.8). `srcs` names the SRAM
/// lines that must be valid before it can issue (spec's `remain_req_count`
/// gating); for `MovIn`/`MovOut`, `dram_addr` is the physical address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub srcs: Vec<SramRef>,
    pub dst: Option<SramRef>,
    pub dram_addr: Option<Address>,
    /// Element count or batch size the latency formula keys on (spec
    /// §4.8's `max(size, 4)`, §4.6.3's `num_comps`/`num_readres`).
    pub size: u32,
}

impl Instruction {
    #[must_use]
    pub fn new(opcode: Opcode) -> Self {
        Self { opcode, srcs: Vec::new(), dst: None, dram_addr: None, size: 0 }
    }

    #[must_use]
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_dram_addr(mut self, addr: Address) -> Self {
        self.dram_addr = Some(addr);
        self
    }

    #[must_use]
    pub fn with_src(mut self, src: SramRef) -> Self {
        self.srcs.push(src);
        self
    }

    #[must_use]
    pub fn with_dst(mut self, dst: SramRef) -> Self {
        self.dst = Some(dst);
        self
    }
}
