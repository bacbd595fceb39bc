//! Vector-op tiling (spec §4.6.2): LayerNorm/Softmax/Add/Gelu, iterated
//! row-at-a-time along the last non-feature axis.

use crate::common::address::AddressMapping;
use crate::tensor::Dense2D;
use crate::tile::instruction::{Instruction, Opcode, SramRef};

/// Which vector operation to lower a row through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorOp {
    LayerNorm,
    Softmax,
    Add,
    Gelu,
}

impl VectorOp {
    const fn opcode(self) -> Opcode {
        match self {
            VectorOp::LayerNorm => Opcode::LayerNorm,
            VectorOp::Softmax => Opcode::Softmax,
            VectorOp::Add => Opcode::Add,
            VectorOp::Gelu => Opcode::Gelu,
        }
    }
}

/// Lowers `op` over every row of `input` into MOVIN → vector-instruction →
/// MOVOUT, pinning LayerNorm's `gamma`/`beta` in scratchpad ahead of the
/// row loop rather than reloading them each row (spec §4.6.2).
#[must_use]
pub fn compile_vector_op(
    mapping: &AddressMapping,
    op: VectorOp,
    input: &Dense2D,
    output: &Dense2D,
    gamma_beta: Option<(&Dense2D, &Dense2D)>,
) -> Vec<Instruction> {
    let mut out = Vec::new();
    if let Some((gamma, beta)) = gamma_beta {
        out.push(
            Instruction::new(Opcode::MovIn)
                .with_dram_addr(gamma.get_addr(mapping, 0, 0))
                .with_dst(SramRef { buffer: 0, line: 0 })
                .with_size(gamma.cols),
        );
        out.push(
            Instruction::new(Opcode::MovIn)
                .with_dram_addr(beta.get_addr(mapping, 0, 0))
                .with_dst(SramRef { buffer: 0, line: 1 })
                .with_size(beta.cols),
        );
    }
    for row in 0..input.rows {
        let in_addr = input.get_addr(mapping, row, 0);
        out.push(
            Instruction::new(Opcode::MovIn)
                .with_dram_addr(in_addr)
                .with_dst(SramRef { buffer: 0, line: row + 2 })
                .with_size(input.cols),
        );
        out.push(
            Instruction::new(op.opcode())
                .with_src(SramRef { buffer: 0, line: row + 2 })
                .with_dst(SramRef { buffer: 1, line: row })
                .with_size(input.cols),
        );
        let out_addr = output.get_addr(mapping, row, 0);
        out.push(
            Instruction::new(Opcode::MovOut)
                .with_dram_addr(out_addr)
                .with_src(SramRef { buffer: 1, line: row })
                .with_size(output.cols),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layernorm_pins_gamma_beta_before_row_loop() {
        let mapping = AddressMapping::new("rorabgbachco", 16, 2, 4, 4, 32768, 1024, 8, 2).unwrap();
        let input = Dense2D { base: 0, rows: 2, cols: 8, precision: 2 };
        let output = Dense2D { base: 4096, rows: 2, cols: 8, precision: 2 };
        let gamma = Dense2D { base: 8192, rows: 1, cols: 8, precision: 2 };
        let beta = Dense2D { base: 8192 + 16, rows: 1, cols: 8, precision: 2 };
        let instrs = compile_vector_op(&mapping, VectorOp::LayerNorm, &input, &output, Some((&gamma, &beta)));
        assert_eq!(instrs[0].opcode, Opcode::MovIn);
        assert_eq!(instrs[1].opcode, Opcode::MovIn);
        assert!(instrs.iter().any(|i| i.opcode == Opcode::LayerNorm));
    }
}
