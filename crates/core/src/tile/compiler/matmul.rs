//! MatMul tiling (spec §4.6.1): chooses inner-loop block sizes that fit half
//! the scratchpad, then lowers nested MOVIN/GEMM/MOVOUT instructions over
//! the outer `(M/m, K/k, N/n)` grid.

use crate::common::address::AddressMapping;
use crate::tensor::Dense2D;
use crate::tile::instruction::{Instruction, Opcode, SramRef};

/// The three matmul dimensions, `(…, M, K) × (K, N)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatMulShape {
    pub m: u32,
    pub k: u32,
    pub n: u32,
}

/// Chooses inner-loop block sizes `(m, k, n)` that keep the projected SRAM
/// footprint `(m*k + k*n + m*n) * precision` within half the scratchpad,
/// halving the largest dimension (rounding up) until it fits (spec
/// §4.6.1).
#[must_use]
pub fn choose_inner_sizes(shape: MatMulShape, spad_size: u32, precision: u32) -> MatMulShape {
    let mut m = shape.m.max(1);
    let mut k = shape.k.max(1);
    let mut n = shape.n.max(1);
    let budget = spad_size / 2;

    loop {
        let footprint = (u64::from(m) * u64::from(k) + u64::from(k) * u64::from(n) + u64::from(m) * u64::from(n))
            * u64::from(precision);
        if footprint <= u64::from(budget) || (m == 1 && k == 1 && n == 1) {
            break;
        }
        if m >= k && m >= n {
            m = m.div_ceil(2);
        } else if k >= n {
            k = k.div_ceil(2);
        } else {
            n = n.div_ceil(2);
        }
    }
    MatMulShape { m, k, n }
}

/// Lowers one MatMul into MOVIN/GEMM(_PRELOAD)/MOVOUT instructions over the
/// outer `(M/m, K/k, N/n)` grid (spec §4.6.1). `loop_size` is the L1-block
/// size (`core_width`) the `(m, k, n)` inner block is further divided into.
#[must_use]
pub fn compile_matmul(
    mapping: &AddressMapping,
    activation: &Dense2D,
    weight: &Dense2D,
    output: &Dense2D,
    bias: Option<&Dense2D>,
    inner: MatMulShape,
    loop_size: u32,
) -> Vec<Instruction> {
    let mut out = Vec::new();
    let loop_size = loop_size.max(1);
    let outer_m = inner.m.max(1);
    let outer_k = inner.k.max(1);
    let outer_n = inner.n.max(1);

    let m_blocks = activation.rows.div_ceil(outer_m).max(1);
    let k_blocks = activation.cols.div_ceil(outer_k).max(1);
    let n_blocks = output.cols.div_ceil(outer_n).max(1);

    for n_block in 0..n_blocks {
        if let Some(bias) = bias {
            // K == 0 path: seed the accumulator with the bias slice before
            // any GEMM touches it (spec §4.6.1).
            let addr = bias.get_addr(mapping, 0, n_block * outer_n);
            out.push(
                Instruction::new(Opcode::MovIn)
                    .with_dram_addr(addr)
                    .with_dst(SramRef { buffer: 1, line: n_block })
                    .with_size(outer_n),
            );
        }
        for m_block in 0..m_blocks {
            for k_block in 0..k_blocks {
                let m_steps = outer_m.div_ceil(loop_size).max(1);
                let k_steps = outer_k.div_ceil(loop_size).max(1);
                for m_step in 0..m_steps {
                    for k_step in 0..k_steps {
                        let row = m_block * outer_m + m_step * loop_size;
                        let col = k_block * outer_k + k_step * loop_size;
                        if k_step == 0 {
                            let addr = activation.get_addr(mapping, row, col);
                            out.push(
                                Instruction::new(Opcode::MovIn)
                                    .with_dram_addr(addr)
                                    .with_dst(SramRef { buffer: 0, line: m_step })
                                    .with_size(loop_size),
                            );
                        }
                        if m_step == 0 {
                            let addr = weight.get_addr(mapping, col, n_block * outer_n);
                            out.push(
                                Instruction::new(Opcode::MovIn)
                                    .with_dram_addr(addr)
                                    .with_dst(SramRef { buffer: 0, line: k_step + outer_m })
                                    .with_size(loop_size),
                            );
                        }
                        let opcode = if m_step == 0 { Opcode::GemmPreload } else { Opcode::Gemm };
                        out.push(
                            Instruction::new(opcode)
                                .with_src(SramRef { buffer: 0, line: m_step })
                                .with_src(SramRef { buffer: 0, line: k_step + outer_m })
                                .with_dst(SramRef { buffer: 1, line: m_step })
                                .with_size(loop_size),
                        );
                        if k_block + 1 == k_blocks && k_step + 1 == k_steps {
                            let addr = output.get_addr(mapping, row, n_block * outer_n);
                            out.push(
                                Instruction::new(Opcode::MovOut)
                                    .with_dram_addr(addr)
                                    .with_src(SramRef { buffer: 1, line: m_step })
                                    .with_size(outer_n),
                            );
                        }
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_largest_dimension_until_footprint_fits() {
        let shape = MatMulShape { m: 1024, k: 1024, n: 1024 };
        let chosen = choose_inner_sizes(shape, 65536, 2);
        let footprint = (u64::from(chosen.m) * u64::from(chosen.k)
            + u64::from(chosen.k) * u64::from(chosen.n)
            + u64::from(chosen.m) * u64::from(chosen.n))
            * 2;
        assert!(footprint <= 65536 / 2);
    }

    #[test]
    fn small_shape_is_left_untiled() {
        let shape = MatMulShape { m: 4, k: 4, n: 4 };
        let chosen = choose_inner_sizes(shape, 1 << 20, 2);
        assert_eq!(chosen, shape);
    }
}
