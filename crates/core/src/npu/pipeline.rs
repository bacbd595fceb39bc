//! Systolic and vector compute-pipeline latency formulas and in-flight
//! tracking (spec §4.8).

use crate::tile::instruction::{Instruction, Opcode};

/// Systolic-array compute latency: `core_height + core_width - 2 +
/// max(size, 4)`, with `GEMM_PRELOAD` adding `core_height + core_height -
/// 1` prolog cycles (spec §4.8).
#[must_use]
pub fn systolic_latency(opcode: Opcode, size: u32, core_height: u32, core_width: u32) -> u64 {
    let base = u64::from(core_height) + u64::from(core_width) - 2 + u64::from(size.max(4));
    if opcode == Opcode::GemmPreload {
        base + u64::from(core_height) + u64::from(core_height) - 1
    } else {
        base
    }
}

/// Vector-unit compute latency from the op-specific per-unit constant and
/// the element count, matching the `(add_tree_iter, vec_op_iter)` formula
/// shape named in spec §4.6.2: a fixed per-call constant plus a per-element
/// term.
#[must_use]
pub fn vector_latency(per_call: u64, per_element: u64, size: u32) -> u64 {
    per_call + per_element * u64::from(size.max(1))
}

/// One instruction in flight in a compute pipeline: when it was issued,
/// when it will retire, and whatever payload the caller attached (e.g. the
/// owning tile handle and destination SRAM line).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineEntry<T> {
    pub start_cycle: u64,
    pub finish_cycle: u64,
    pub payload: T,
}

/// A FIFO compute pipeline (systolic or one vector unit): entries retire in
/// issue order once `finish_cycle <= now` (spec §4.8 cycle phase 1/2).
#[derive(Clone, Debug)]
pub struct Pipeline<T> {
    entries: std::collections::VecDeque<PipelineEntry<T>>,
}

impl<T> Default for Pipeline<T> {
    fn default() -> Self {
        Self { entries: std::collections::VecDeque::new() }
    }
}

impl<T: Clone> Pipeline<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new entry. Systolic issues must stack with at least a
    /// 4-cycle spacing from the previous entry's start, and `GEMM_PRELOAD`
    /// reuses the previous tile's `start_cycle + core_height` rather than
    /// `now` (spec §4.8); `min_start` encodes whichever of those applies,
    /// or `now` for vector pipelines where no such spacing rule exists.
    pub fn issue(&mut self, now: u64, latency: u64, min_start: Option<u64>, payload: T) -> PipelineEntry<T> {
        let start = min_start.map_or(now, |floor| floor.max(now));
        let entry = PipelineEntry { start_cycle: start, finish_cycle: start + latency, payload };
        self.entries.push_back(entry.clone());
        entry
    }

    #[must_use]
    pub fn last_start(&self) -> Option<u64> {
        self.entries.back().map(|e| e.start_cycle)
    }

    /// Pops every entry whose `finish_cycle <= now`, in FIFO order.
    pub fn retire_ready(&mut self, now: u64) -> Vec<PipelineEntry<T>> {
        let mut retired = Vec::new();
        while self.entries.front().is_some_and(|e| e.finish_cycle <= now) {
            retired.push(self.entries.pop_front().unwrap());
        }
        retired
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Picks the least-loaded of several vector pipelines by current queue
/// depth (spec §4.8's "least-loaded vector pipeline").
#[must_use]
pub fn least_loaded<T>(pipelines: &[Pipeline<T>]) -> usize {
    pipelines
        .iter()
        .enumerate()
        .min_by_key(|&(_, p)| p.len())
        .map_or(0, |(i, _)| i)
}

/// Whether `inst` is ready to issue into a compute pipeline: every source
/// SRAM line it reads must be valid (spec §4.8 cycle phase 5).
#[must_use]
pub fn instruction_ready(inst: &Instruction, is_line_valid: impl Fn(usize) -> bool) -> bool {
    inst.srcs.iter().all(|s| is_line_valid(s.line as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemm_preload_adds_prolog_cycles() {
        let gemm = systolic_latency(Opcode::Gemm, 8, 16, 16);
        let preload = systolic_latency(Opcode::GemmPreload, 8, 16, 16);
        assert_eq!(preload - gemm, 31);
    }

    #[test]
    fn pipeline_retires_only_finished_entries_in_order() {
        let mut pipe: Pipeline<()> = Pipeline::new();
        pipe.issue(0, 10, None, ());
        pipe.issue(1, 5, None, ());
        assert!(pipe.retire_ready(5).is_empty());
        let retired = pipe.retire_ready(10);
        assert_eq!(retired.len(), 1);
        assert_eq!(pipe.len(), 1);
    }
}
