//! Operation graph and tile/instruction compiler (spec §4.6, §9).

pub mod compiler;
pub mod handle;
pub mod instruction;
pub mod operation;
pub mod tile;

pub use handle::{Handle, Pool};
pub use instruction::{Instruction, Opcode, SramRef};
pub use operation::{Operation, OperationKind, TensorId};
pub use tile::{BufferSide, Tile, TilePool};
