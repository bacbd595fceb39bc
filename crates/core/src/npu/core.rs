//! One NPU core: double-buffered scratchpad plus load/store/execute FIFOs,
//! advanced one cycle at a time (spec §4.8).

use std::collections::{HashMap, HashSet, VecDeque};

use crate::common::address::Address;
use crate::config::hardware::VectorLatencies;
use crate::dram::transaction::{ReqType, Transaction};
use crate::npu::pipeline::{least_loaded, systolic_latency, vector_latency, Pipeline};
use crate::npu::sram::Scratchpad;
use crate::tile::handle::Handle;
use crate::tile::instruction::{Instruction, Opcode, SramRef};
use crate::tile::tile::{BufferSide, Tile, TilePool};

/// What a queued [`PendingCompletion`] should do once its response lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum PendingKind {
    /// A `MovIn` split, completed by marking its destination line valid.
    Load,
    /// A PIM-classified instruction, completed by decrementing the tile's
    /// `remaining_computes` and freeing the tile's next PIM op to issue.
    PimOp,
}

/// One in-flight request a core is waiting on a DRAM/PIM response for,
/// keyed by its address (spec §4.9: the interconnect's response path only
/// carries a transaction, not the issuing tile, so the core tracks that
/// association itself).
#[derive(Clone, Copy, Debug)]
struct PendingCompletion {
    tile: Handle<Tile>,
    dst: Option<SramRef>,
    kind: PendingKind,
}

fn pim_req_type(opcode: Opcode) -> ReqType {
    match opcode {
        Opcode::PimGwrite => ReqType::Gwrite,
        Opcode::PimHeader => ReqType::PHeader,
        Opcode::PimComp => ReqType::Comp,
        Opcode::PimReadres => ReqType::Readres,
        Opcode::PimCompsReadres => ReqType::CompsReadres,
        _ => unreachable!("pim_req_type called on a non-PIM opcode"),
    }
}

/// A scratchpad-to-DRAM access a `MovIn`/`MovOut` instruction was split
/// into, handed to the interconnect for routing (spec §4.8 cycle phases
/// 3/4, §4.9).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRequest {
    pub tile: Handle<Tile>,
    pub dst: Option<SramRef>,
    pub req_type: ReqType,
    pub address: Address,
}

/// Payload carried by an in-flight compute-pipeline entry: which tile and
/// destination line it will write back to on retirement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComputePayload {
    pub tile: Handle<Tile>,
    pub dst: Option<SramRef>,
    pub is_accum: bool,
}

/// One NPU core.
#[derive(Debug)]
pub struct Core {
    pub id: u32,
    core_width: u32,
    core_height: u32,
    dram_req_size: u32,
    precision: u32,
    vector_latencies: VectorLatencies,
    pub scratchpad: Scratchpad,
    systolic: Pipeline<ComputePayload>,
    vector: Vec<Pipeline<ComputePayload>>,
    load_fifo: VecDeque<(Handle<Tile>, Instruction)>,
    store_fifo: VecDeque<(Handle<Tile>, Instruction)>,
    execute_fifo: VecDeque<(Handle<Tile>, Instruction)>,
    pub tiles: TilePool,
    active_tile: [Option<Handle<Tile>>; 2],
    /// Requests awaiting a DRAM/PIM response, keyed by address.
    pending: HashMap<u64, VecDeque<PendingCompletion>>,
    /// Tiles with a PIM op currently in flight: the protocol's COMP/READRES
    /// sequence issues strictly one command at a time per tile (spec §4.4).
    pending_pim: HashSet<Handle<Tile>>,
}

impl Core {
    #[must_use]
    pub fn new(
        id: u32,
        core_width: u32,
        core_height: u32,
        dram_req_size: u32,
        precision: u32,
        vector_core_count: u32,
        vector_latencies: VectorLatencies,
        activation_lines: usize,
        accum_lines: usize,
    ) -> Self {
        Self {
            id,
            core_width,
            core_height,
            dram_req_size: dram_req_size.max(1),
            precision: precision.max(1),
            vector_latencies,
            scratchpad: Scratchpad::new(activation_lines, accum_lines),
            systolic: Pipeline::new(),
            vector: (0..vector_core_count.max(1)).map(|_| Pipeline::new()).collect(),
            load_fifo: VecDeque::new(),
            store_fifo: VecDeque::new(),
            execute_fifo: VecDeque::new(),
            tiles: TilePool::new(),
            active_tile: [None, None],
            pending: HashMap::new(),
            pending_pim: HashSet::new(),
        }
    }

    /// Double-buffering admission rule (spec §4.8): a new tile may issue
    /// onto `side` iff the alternate buffer's resident tile has no
    /// outstanding loads/computes, and (when the new tile is not an
    /// accumulator write) no outstanding store I/O either.
    #[must_use]
    pub fn can_issue(&self, side: BufferSide, is_accum: bool) -> bool {
        let alt = side.other();
        let slot = match alt {
            BufferSide::A => 0,
            BufferSide::B => 1,
        };
        match self.active_tile[slot] {
            None => true,
            Some(handle) => match self.tiles.get(handle) {
                None => true,
                Some(tile) => {
                    let loads_and_computes_done = tile.remaining_loads == 0 && tile.remaining_computes == 0;
                    if is_accum {
                        loads_and_computes_done
                    } else {
                        loads_and_computes_done && tile.remaining_accum_io == 0
                    }
                }
            },
        }
    }

    /// Admits a new tile, fanning its instructions out into the
    /// load/store/execute FIFOs.
    pub fn issue_tile(&mut self, tile: Tile) -> Handle<Tile> {
        let side_slot = match tile.buffer {
            BufferSide::A => 0,
            BufferSide::B => 1,
        };
        let instructions = tile.instructions.clone();
        let handle = self.tiles.insert(tile);
        self.active_tile[side_slot] = Some(handle);
        for inst in instructions {
            match inst.opcode {
                Opcode::MovIn => self.load_fifo.push_back((handle, inst)),
                Opcode::MovOut => self.store_fifo.push_back((handle, inst)),
                Opcode::Skip => self.tiles.check_finished(handle),
                _ => self.execute_fifo.push_back((handle, inst)),
            }
        }
        handle
    }

    fn scratchpad_half(&mut self, tile: Handle<Tile>, buffer: u32, is_accum: bool) -> Option<&mut crate::npu::sram::ScratchpadHalf> {
        let side = self.tiles.get(tile)?.buffer;
        let idx = match side {
            BufferSide::A => 0,
            BufferSide::B => 1,
        };
        let bank = if is_accum { &mut self.scratchpad.accumulator } else { &mut self.scratchpad.activation };
        Some(&mut bank[(idx + buffer as usize) % 2])
    }

    /// Advances the core by one cycle, per the five phases of spec §4.8.
    /// Returns the memory requests `MovIn`/`MovOut` produced this cycle,
    /// for the interconnect to route to DRAM.
    pub fn step(&mut self, now: u64) -> Vec<MemoryRequest> {
        self.retire_compute(now);
        self.retire_vector(now);
        let mut requests = self.drain_load_fifo(now);
        requests.extend(self.drain_store_fifo());
        requests.extend(self.drain_execute_fifo(now));
        requests
    }

    /// Applies a response the interconnect delivered to this core: resolves
    /// the pending load or PIM-sequence entry queued under its address and
    /// updates scratchpad validity / tile bookkeeping (spec §4.8: a line is
    /// valid only once every producer lands; spec §4.4: a tile's next PIM
    /// op issues only once the previous one's response is in).
    ///
    /// A response with no matching pending entry (e.g. broadcast to a core
    /// that never issued it, spec §4.9) is silently ignored.
    pub fn complete_response(&mut self, response: Transaction) {
        let key = response.address.raw();
        let entry = match self.pending.get_mut(&key) {
            Some(queue) => {
                let entry = queue.pop_front();
                if queue.is_empty() {
                    self.pending.remove(&key);
                }
                entry
            }
            None => None,
        };
        let Some(entry) = entry else { return };
        match entry.kind {
            PendingKind::Load => {
                if let Some(dst) = entry.dst {
                    if let Some(half) = self.scratchpad_half(entry.tile, dst.buffer, false) {
                        if let Some(line) = half.line_mut(dst.line as usize) {
                            line.count_up();
                        }
                    }
                }
                self.tiles.check_finished(entry.tile);
            }
            PendingKind::PimOp => {
                self.pending_pim.remove(&entry.tile);
                if let Some(dst) = entry.dst {
                    if let Some(half) = self.scratchpad_half(entry.tile, dst.buffer, false) {
                        if let Some(line) = half.line_mut(dst.line as usize) {
                            line.count_up();
                        }
                    }
                }
                if let Some(t) = self.tiles.get_mut(entry.tile) {
                    t.remaining_computes = t.remaining_computes.saturating_sub(1);
                }
                self.tiles.check_finished(entry.tile);
            }
        }
    }

    fn retire_compute(&mut self, now: u64) {
        for entry in self.systolic.retire_ready(now) {
            self.complete_compute(entry.payload);
        }
    }

    fn retire_vector(&mut self, now: u64) {
        for pipe in &mut self.vector {
            for entry in pipe.retire_ready(now) {
                let payload = entry.payload;
                Self::complete_compute_static(&mut self.tiles, &mut self.scratchpad, payload);
            }
        }
    }

    fn complete_compute(&mut self, payload: ComputePayload) {
        Self::complete_compute_static(&mut self.tiles, &mut self.scratchpad, payload);
    }

    fn complete_compute_static(tiles: &mut TilePool, scratchpad: &mut crate::npu::sram::Scratchpad, payload: ComputePayload) {
        if let Some(dst) = payload.dst {
            let side = tiles.get(payload.tile).map(|t| t.buffer);
            if let Some(side) = side {
                let idx = match side {
                    BufferSide::A => 0,
                    BufferSide::B => 1,
                };
                let bank = if payload.is_accum { &mut scratchpad.accumulator } else { &mut scratchpad.activation };
                if let Some(line) = bank[(idx + dst.buffer as usize) % 2].line_mut(dst.line as usize) {
                    line.count_up();
                }
            }
        }
        if let Some(tile) = tiles.get_mut(payload.tile) {
            tile.remaining_computes = tile.remaining_computes.saturating_sub(1);
            if payload.is_accum {
                tile.remaining_accum_io = tile.remaining_accum_io.saturating_sub(1);
            }
        }
        tiles.check_finished(payload.tile);
    }

    fn drain_load_fifo(&mut self, _now: u64) -> Vec<MemoryRequest> {
        let mut requests = Vec::new();
        while let Some((tile, inst)) = self.load_fifo.pop_front() {
            let Some(addr) = inst.dram_addr else { continue };
            let bytes = u64::from(inst.size) * u64::from(self.precision);
            let num_accesses = bytes.div_ceil(u64::from(self.dram_req_size)).max(1);
            if let Some(dst) = inst.dst {
                if let Some(half) = self.scratchpad_half(tile, dst.buffer, false) {
                    if let Some(line) = half.line_mut(dst.line as usize) {
                        line.reserve(num_accesses as u32);
                    }
                }
            }
            for i in 0..num_accesses {
                let request_addr = Address::new(addr.raw() + i * u64::from(self.dram_req_size));
                self.pending
                    .entry(request_addr.raw())
                    .or_default()
                    .push_back(PendingCompletion { tile, dst: inst.dst, kind: PendingKind::Load });
                requests.push(MemoryRequest { tile, dst: inst.dst, req_type: ReqType::Read, address: request_addr });
            }
            if let Some(t) = self.tiles.get_mut(tile) {
                t.remaining_loads = t.remaining_loads.saturating_sub(1);
            }
        }
        requests
    }

    fn drain_store_fifo(&mut self) -> Vec<MemoryRequest> {
        let mut requests = Vec::new();
        let mut deferred = VecDeque::new();
        while let Some((tile, inst)) = self.store_fifo.pop_front() {
            let Some(src) = inst.srcs.first().copied() else { continue };
            let ready = self
                .scratchpad_half(tile, src.buffer, false)
                .is_some_and(|half| half.all_valid(&[src.line as usize]));
            if ready {
                if let Some(addr) = inst.dram_addr {
                    requests.push(MemoryRequest { tile, dst: None, req_type: ReqType::Write, address: addr });
                }
            } else {
                deferred.push_back((tile, inst));
            }
        }
        self.store_fifo = deferred;
        requests
    }

    /// Drains compute-ready instructions. `Gemm`/vector ops go straight into
    /// their local pipeline; PIM-classified ops instead become a real
    /// `MemoryRequest` for the interconnect, gated one-in-flight-per-tile by
    /// `pending_pim` so a tile's COMP/READRES sequence never races ahead of
    /// the `P_HEADER` arming it (spec §4.4).
    fn drain_execute_fifo(&mut self, now: u64) -> Vec<MemoryRequest> {
        let mut deferred = VecDeque::new();
        let mut requests = Vec::new();
        while let Some((tile, inst)) = self.execute_fifo.pop_front() {
            let buffer = inst.srcs.first().map_or(0, |s| s.buffer);
            let ready = self
                .scratchpad_half(tile, buffer, false)
                .is_some_and(|half| half.all_valid(&inst.srcs.iter().map(|s| s.line as usize).collect::<Vec<_>>()));
            if !ready {
                deferred.push_back((tile, inst));
                continue;
            }
            if inst.opcode.is_pim() {
                if self.pending_pim.contains(&tile) {
                    deferred.push_back((tile, inst));
                    continue;
                }
                let Some(addr) = inst.dram_addr else {
                    if let Some(t) = self.tiles.get_mut(tile) {
                        t.remaining_computes = t.remaining_computes.saturating_sub(1);
                    }
                    self.tiles.check_finished(tile);
                    continue;
                };
                self.pending_pim.insert(tile);
                self.pending
                    .entry(addr.raw())
                    .or_default()
                    .push_back(PendingCompletion { tile, dst: inst.dst, kind: PendingKind::PimOp });
                requests.push(MemoryRequest { tile, dst: inst.dst, req_type: pim_req_type(inst.opcode), address: addr });
                continue;
            }
            self.issue_compute(now, tile, &inst);
        }
        self.execute_fifo = deferred;
        requests
    }

    /// Issues a systolic or vector instruction into its local pipeline.
    /// Never called for PIM-classified instructions: `drain_execute_fifo`
    /// routes those to the interconnect directly.
    fn issue_compute(&mut self, now: u64, tile: Handle<Tile>, inst: &Instruction) {
        let is_accum = inst.dst.is_some_and(|d| d.buffer == 1) || inst.opcode == Opcode::Gemm || inst.opcode == Opcode::GemmPreload;
        let payload = ComputePayload { tile, dst: inst.dst, is_accum };
        if inst.opcode.is_systolic() {
            let latency = systolic_latency(inst.opcode, inst.size, self.core_height, self.core_width);
            let min_start = if inst.opcode == Opcode::GemmPreload {
                self.systolic.last_start().map(|s| s + u64::from(self.core_height))
            } else {
                self.systolic.last_start().map(|s| s + 4)
            };
            self.systolic.issue(now, latency, min_start, payload);
        } else {
            let (per_call, per_element) = self.vector_cost(inst.opcode);
            let latency = vector_latency(per_call, per_element, inst.size);
            let idx = least_loaded(&self.vector);
            self.vector[idx].issue(now, latency, None, payload);
        }
    }

    fn vector_cost(&self, opcode: Opcode) -> (u64, u64) {
        let l = &self.vector_latencies;
        match opcode {
            Opcode::LayerNorm => (l.layernorm, l.scalar_add),
            Opcode::Softmax => (l.softmax, l.exp),
            Opcode::Add => (l.add, l.scalar_add),
            Opcode::Gelu => (l.gelu, l.scalar_mul),
            _ => (0, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn latencies() -> VectorLatencies {
        VectorLatencies {
            layernorm: 10,
            softmax: 10,
            add: 2,
            gelu: 5,
            exp: 1,
            add_tree: 1,
            scalar_sqrt: 1,
            scalar_add: 1,
            scalar_mul: 1,
        }
    }

    #[test]
    fn double_buffer_blocks_until_prior_tile_drains() {
        let core = Core::new(0, 16, 16, 64, 2, 1, latencies(), 64, 64);
        assert!(core.can_issue(BufferSide::A, false));
    }

    #[test]
    fn load_fifo_splits_movin_into_dram_req_size_chunks() {
        let mut core = Core::new(0, 16, 16, 64, 2, 1, latencies(), 64, 64);
        let tile = Tile::new(
            BufferSide::A,
            false,
            vec![Instruction::new(Opcode::MovIn)
                .with_dram_addr(Address::new(0))
                .with_dst(SramRef { buffer: 0, line: 0 })
                .with_size(128)],
        );
        core.issue_tile(tile);
        let reqs = core.step(0);
        assert_eq!(reqs.len(), 4); // 128 * 2 bytes / 64 = 4
    }

    #[test]
    fn complete_response_marks_load_line_valid_and_finishes_tile() {
        let mut core = Core::new(0, 16, 16, 64, 2, 1, latencies(), 64, 64);
        let tile = Tile::new(
            BufferSide::A,
            false,
            vec![Instruction::new(Opcode::MovIn)
                .with_dram_addr(Address::new(0))
                .with_dst(SramRef { buffer: 0, line: 0 })
                .with_size(64)],
        );
        let handle = core.issue_tile(tile);
        let reqs = core.step(0);
        assert_eq!(reqs.len(), 1);
        assert!(!core.tiles.finished().contains(&handle));

        core.complete_response(Transaction::new(reqs[0].address, ReqType::Read, 0));
        assert!(core.tiles.finished().contains(&handle));
    }

    #[test]
    fn pim_instructions_issue_one_in_flight_per_tile() {
        let mut core = Core::new(0, 16, 16, 64, 2, 1, latencies(), 64, 64);
        let tile = Tile::new(
            BufferSide::A,
            false,
            vec![
                Instruction::new(Opcode::PimHeader).with_dram_addr(Address::new(100)).with_size(1),
                Instruction::new(Opcode::PimComp).with_dram_addr(Address::new(200)).with_size(1),
            ],
        );
        let handle = core.issue_tile(tile);
        let reqs = core.step(0);
        assert_eq!(reqs.len(), 1, "only the first PIM op should issue before its response lands");
        assert_eq!(reqs[0].req_type, ReqType::PHeader);

        let no_new = core.step(1);
        assert!(no_new.is_empty(), "the second PIM op must wait for the first op's response");

        core.complete_response(Transaction::new(reqs[0].address, ReqType::PHeader, 1));
        let second = core.step(2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].req_type, ReqType::Comp);

        core.complete_response(Transaction::new(second[0].address, ReqType::Comp, 2));
        assert!(core.tiles.finished().contains(&handle));
    }
}
