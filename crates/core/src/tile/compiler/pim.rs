//! PIM GEMV tiling for logit-softmax/attend (spec §4.6.3): per request and
//! per head-chunk, broadcast the query row then drive a COMP/READRES batch
//! (Newton) or one fused COMPS_READRES (NeuPIMS).

use crate::common::address::{Address, AddressMapping};
use crate::tile::instruction::{Instruction, Opcode, SramRef};

/// Which protocol variant to lower the batch for (spec §4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PimProtocol {
    Newton,
    NeuPims,
}

/// One request's PIM attend/logit-softmax tiling parameters.
#[derive(Clone, Copy, Debug)]
pub struct PimGemvShape {
    pub channel: u32,
    pub query_row: u32,
    pub d_k: u32,
    pub heads: u32,
    pub page_size: u32,
}

/// Lowers a PIM GEMV batch over all head-chunks of `heads_per_tile =
/// page_size / d_k` (spec §4.6.3). Multiple chunks' partial sums are
/// combined with a vector `ADD` before the final `MOVOUT`.
#[must_use]
pub fn compile_pim_gemv(mapping: &AddressMapping, protocol: PimProtocol, shape: PimGemvShape) -> Vec<Instruction> {
    let mut out = Vec::new();
    let heads_per_tile = (shape.page_size / shape.d_k.max(1)).max(1);
    let num_chunks = shape.heads.div_ceil(heads_per_tile).max(1);

    for chunk in 0..num_chunks {
        let heads_in_tile = heads_per_tile.min(shape.heads.saturating_sub(chunk * heads_per_tile)).max(1);
        let comps_per_head = shape.d_k;

        let gwrite_addr = mapping.make_address(shape.channel, 0, 0, 0, shape.query_row, 0);
        out.push(
            Instruction::new(Opcode::PimGwrite)
                .with_dram_addr(gwrite_addr)
                .with_src(SramRef { buffer: 0, line: chunk })
                .with_size(shape.d_k),
        );

        let num_comps = comps_per_head * heads_in_tile;
        let header_addr =
            mapping.encode_pim_header(shape.channel, shape.query_row, false, num_comps, heads_in_tile);
        out.push(Instruction::new(Opcode::PimHeader).with_dram_addr(header_addr).with_size(num_comps));

        match protocol {
            PimProtocol::Newton => {
                for c in 0..num_comps {
                    let addr = Address::new(header_addr.raw() + u64::from(c));
                    out.push(Instruction::new(Opcode::PimComp).with_dram_addr(addr).with_size(1));
                }
                out.push(
                    Instruction::new(Opcode::PimReadres)
                        .with_dram_addr(header_addr)
                        .with_dst(SramRef { buffer: 1, line: chunk })
                        .with_size(heads_in_tile),
                );
            }
            PimProtocol::NeuPims => {
                let addr = mapping.encode_pim_comps_readres(shape.channel, shape.query_row, num_comps, true);
                out.push(
                    Instruction::new(Opcode::PimCompsReadres)
                        .with_dram_addr(addr)
                        .with_dst(SramRef { buffer: 1, line: chunk })
                        .with_size(heads_in_tile),
                );
            }
        }
    }

    if num_chunks > 1 {
        out.push(
            Instruction::new(Opcode::Add)
                .with_src(SramRef { buffer: 1, line: 0 })
                .with_dst(SramRef { buffer: 2, line: 0 })
                .with_size(num_chunks),
        );
        out.push(
            Instruction::new(Opcode::MovOut)
                .with_src(SramRef { buffer: 2, line: 0 })
                .with_size(shape.heads),
        );
    } else {
        out.push(
            Instruction::new(Opcode::MovOut)
                .with_src(SramRef { buffer: 1, line: 0 })
                .with_size(shape.heads),
        );
    }
    out.push(Instruction::new(Opcode::Softmax).with_size(shape.heads));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neupims_protocol_emits_single_comps_readres_per_chunk() {
        let mapping = AddressMapping::new("rorabgbachco", 16, 2, 4, 4, 32768, 1024, 8, 2).unwrap();
        let shape = PimGemvShape { channel: 0, query_row: 5, d_k: 64, heads: 8, page_size: 512 };
        let instrs = compile_pim_gemv(&mapping, PimProtocol::NeuPims, shape);
        assert_eq!(instrs.iter().filter(|i| i.opcode == Opcode::PimCompsReadres).count(), 1);
        assert!(instrs.iter().any(|i| i.opcode == Opcode::Softmax));
    }

    #[test]
    fn newton_protocol_emits_one_comp_per_element() {
        let mapping = AddressMapping::new("rorabgbachco", 16, 2, 4, 4, 32768, 1024, 8, 2).unwrap();
        let shape = PimGemvShape { channel: 0, query_row: 5, d_k: 4, heads: 2, page_size: 8 };
        let instrs = compile_pim_gemv(&mapping, PimProtocol::Newton, shape);
        assert_eq!(instrs.iter().filter(|i| i.opcode == Opcode::PimComp).count(), 8);
        assert_eq!(instrs.iter().filter(|i| i.opcode == Opcode::PimReadres).count(), 1);
    }
}
