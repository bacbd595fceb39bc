//! Bump allocator for activation tensors (spec §4.10): lives in a fixed-size
//! buffer starting just past the weight arena, flushed whole at stage
//! boundaries.

use crate::common::error::SimError;

/// A bump allocator over a fixed-size window of the address space.
#[derive(Clone, Debug)]
pub struct ActivationAllocator {
    base: u64,
    size: u64,
    cursor: u64,
}

impl ActivationAllocator {
    #[must_use]
    pub const fn new(base: u64, size: u64) -> Self {
        Self { base, size, cursor: base }
    }

    /// Bumps the cursor forward by `size` bytes, returning the base
    /// address of the new allocation.
    pub fn allocate(&mut self, size: u64) -> Result<u64, SimError> {
        let addr = self.cursor;
        let end = addr
            .checked_add(size)
            .ok_or_else(|| SimError::fatal("activation_alloc", "allocation size overflowed address space"))?;
        if end > self.base + self.size {
            return Err(SimError::fatal("activation_alloc", "activation arena exhausted"));
        }
        self.cursor = end;
        Ok(addr)
    }

    /// Resets the cursor to the start of the arena (spec §4.10's
    /// "flushable on stage boundary").
    pub fn flush(&mut self) {
        self.cursor = self.base;
    }

    /// First address past the arena, i.e. where the KV-cache arena begins.
    #[must_use]
    pub const fn limit(&self) -> u64 {
        self.base + self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocations_bump_forward_within_the_arena() {
        let mut alloc = ActivationAllocator::new(1000, 100);
        let a = alloc.allocate(40).unwrap();
        let b = alloc.allocate(40).unwrap();
        assert_eq!(a, 1000);
        assert_eq!(b, 1040);
        assert!(alloc.allocate(30).is_err());
    }

    #[test]
    fn flush_resets_the_cursor_so_the_arena_can_be_reused() {
        let mut alloc = ActivationAllocator::new(0, 100);
        alloc.allocate(90).unwrap();
        alloc.flush();
        assert!(alloc.allocate(90).is_ok());
    }
}
