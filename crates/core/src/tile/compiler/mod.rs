//! Lowers operation-graph nodes into [`Instruction`](crate::tile::instruction::Instruction)
//! sequences (spec §4.6): MatMul tiling, vector ops, PIM GEMV batches, and
//! the fused-MHA/skip-tile family.

pub mod matmul;
pub mod mha;
pub mod microbench;
pub mod pim;
pub mod vector;

pub use matmul::{choose_inner_sizes, compile_matmul, MatMulShape};
pub use mha::{compile_skip_tile, split_decoding_add_token, SplitDecodingViews};
pub use microbench::{compile_microbench, MicrobenchShape};
pub use pim::{compile_pim_gemv, PimGemvShape, PimProtocol};
pub use vector::{compile_vector_op, VectorOp};
