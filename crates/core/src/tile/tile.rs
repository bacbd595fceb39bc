//! A [`Tile`] is a bounded run of [`Instruction`]s issued and retired as a
//! unit against one half of a core's double-buffered scratchpad (spec
//! §4.8). `TilePool` stores tiles behind generation-checked [`Handle`]s so
//! a tile and its instructions can reference each other without forming an
//! `Rc`/`RefCell` cycle (spec §9).

use crate::tile::handle::{Handle, Pool};
use crate::tile::instruction::Instruction;

/// Which half of a core's double-buffered scratchpad a tile is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferSide {
    A,
    B,
}

impl BufferSide {
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            BufferSide::A => BufferSide::B,
            BufferSide::B => BufferSide::A,
        }
    }
}

/// A bounded run of instructions executed against one scratchpad half.
#[derive(Clone, Debug)]
pub struct Tile {
    pub buffer: BufferSide,
    /// Whether this tile writes the accumulator scratchpad (spec §4.8's
    /// double-buffering rule differs for `accum == false` tiles, which also
    /// gate on outstanding store I/O).
    pub is_accum: bool,
    pub instructions: Vec<Instruction>,
    pub remaining_loads: u32,
    pub remaining_computes: u32,
    pub remaining_accum_io: u32,
}

impl Tile {
    #[must_use]
    pub fn new(buffer: BufferSide, is_accum: bool, instructions: Vec<Instruction>) -> Self {
        let remaining_loads = instructions.iter().filter(|i| i.opcode == crate::tile::instruction::Opcode::MovIn).count() as u32;
        let remaining_computes = instructions
            .iter()
            .filter(|i| i.opcode.is_systolic() || i.opcode.is_vector() || i.opcode.is_pim())
            .count() as u32;
        Self { buffer, is_accum, instructions, remaining_loads, remaining_computes, remaining_accum_io: 0 }
    }

    /// Spec §8: `remaining_loads + remaining_computes + remaining_accum_io
    /// == 0 ⇔ tile ∈ finished_tiles`.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.remaining_loads == 0 && self.remaining_computes == 0 && self.remaining_accum_io == 0
    }
}

/// Generation-checked tile arena for one core.
#[derive(Debug, Default)]
pub struct TilePool {
    pool: Pool<Tile>,
    finished: Vec<Handle<Tile>>,
}

impl TilePool {
    #[must_use]
    pub fn new() -> Self {
        Self { pool: Pool::new(), finished: Vec::new() }
    }

    pub fn insert(&mut self, tile: Tile) -> Handle<Tile> {
        self.pool.insert(tile)
    }

    #[must_use]
    pub fn get(&self, handle: Handle<Tile>) -> Option<&Tile> {
        self.pool.get(handle)
    }

    pub fn get_mut(&mut self, handle: Handle<Tile>) -> Option<&mut Tile> {
        self.pool.get_mut(handle)
    }

    /// Checks `handle`'s finished state and, if just completed, records it
    /// in FIFO retirement order (spec §5's "tiles retire in FIFO order into
    /// `_finished_tiles`").
    pub fn check_finished(&mut self, handle: Handle<Tile>) {
        if let Some(tile) = self.pool.get(handle) {
            if tile.is_finished() && !self.finished.contains(&handle) {
                self.finished.push(handle);
            }
        }
    }

    #[must_use]
    pub fn finished(&self) -> &[Handle<Tile>] {
        &self.finished
    }

    /// Removes and returns the oldest finished tile, freeing its slot.
    pub fn pop_finished(&mut self) -> Option<Tile> {
        if self.finished.is_empty() {
            return None;
        }
        let handle = self.finished.remove(0);
        self.pool.remove(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_with_no_instructions_is_finished_immediately() {
        let tile = Tile::new(BufferSide::A, false, Vec::new());
        assert!(tile.is_finished());
    }

    #[test]
    fn finished_tiles_retire_in_fifo_order() {
        let mut pool = TilePool::new();
        let h1 = pool.insert(Tile::new(BufferSide::A, false, Vec::new()));
        let h2 = pool.insert(Tile::new(BufferSide::B, false, Vec::new()));
        pool.check_finished(h1);
        pool.check_finished(h2);
        assert_eq!(pool.pop_finished().is_some(), true);
        assert_eq!(pool.finished().len(), 1);
    }
}
