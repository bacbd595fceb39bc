//! Synthetic fixed-shape operation used by the test harness to drive a
//! MatMul/PIM-GEMV pair through the whole pipeline without a real model
//! graph (spec_full §3, grounded on `original_source/src/operations/
//! Microbench.cc`).

use crate::common::address::AddressMapping;
use crate::tensor::Dense2D;
use crate::tile::compiler::matmul::{choose_inner_sizes, compile_matmul, MatMulShape};
use crate::tile::compiler::pim::{compile_pim_gemv, PimGemvShape, PimProtocol};
use crate::tile::instruction::Instruction;

/// The fixed shape parameters for a microbenchmark run.
#[derive(Clone, Copy, Debug)]
pub struct MicrobenchShape {
    pub matmul: MatMulShape,
    pub pim: PimGemvShape,
}

/// Lowers a microbenchmark into a MatMul followed by a PIM GEMV batch,
/// reusing the real compiler stages rather than a bespoke shortcut path —
/// the point is to exercise the pipeline end to end.
#[must_use]
pub fn compile_microbench(
    mapping: &AddressMapping,
    shape: MicrobenchShape,
    spad_size: u32,
    precision: u32,
    core_width: u32,
    protocol: PimProtocol,
) -> Vec<Instruction> {
    let activation = Dense2D { base: 0, rows: shape.matmul.m, cols: shape.matmul.k, precision };
    let weight = Dense2D { base: 1 << 20, rows: shape.matmul.k, cols: shape.matmul.n, precision };
    let output = Dense2D { base: 2 << 20, rows: shape.matmul.m, cols: shape.matmul.n, precision };
    let inner = choose_inner_sizes(shape.matmul, spad_size, precision);

    let mut out = compile_matmul(mapping, &activation, &weight, &output, None, inner, core_width);
    out.extend(compile_pim_gemv(mapping, protocol, shape.pim));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn microbench_produces_both_matmul_and_pim_instructions() {
        let mapping = AddressMapping::new("rorabgbachco", 16, 2, 4, 4, 32768, 1024, 8, 2).unwrap();
        let shape = MicrobenchShape {
            matmul: MatMulShape { m: 16, k: 16, n: 16 },
            pim: PimGemvShape { channel: 0, query_row: 0, d_k: 8, heads: 4, page_size: 32 },
        };
        let instrs = compile_microbench(&mapping, shape, 65536, 2, 8, PimProtocol::NeuPims);
        assert!(!instrs.is_empty());
    }
}
