//! The top-level event loop (spec §5): three logical clocks (core,
//! interconnect, DRAM), each with its own period, advanced by always
//! stepping the global cycle counter and ticking whichever domains are due.

use crate::alloc::{ActivationAllocator, WeightAllocator};
use crate::common::address::AddressMapping;
use crate::common::error::SimError;
use crate::config::client::DatasetRecord;
use crate::config::memory::DramType;
use crate::config::system::RunMode;
use crate::config::Config;
use crate::dram::channel_state::ChannelTiming;
use crate::dram::controller::{CompletionLatency, DramController};
use crate::dram::transaction::{ReqType, Transaction};
use crate::interconnect::{Interconnect, StagePlatform};
use crate::npu::core::Core;
use crate::request::client::{Client, InferRequest};
use crate::request::orchestration::Orchestrator;
use crate::sched::stage::{SaWork, SubBatch};
use crate::stats::{ChannelStageStats, EnergyLog, StatLog};
use crate::tensor::Dense2D;
use crate::tile::compiler::matmul::{choose_inner_sizes, compile_matmul, MatMulShape};
use crate::tile::compiler::pim::{compile_pim_gemv, PimGemvShape, PimProtocol};
use crate::tile::handle::Handle;
use crate::tile::instruction::Instruction;
use crate::tile::tile::{BufferSide, Tile};

/// Result of a completed simulation run (spec §6's Logs section, rendered
/// by the CLI crate).
#[derive(Clone, Debug, Default)]
pub struct SimReport {
    pub total_cycles: u64,
    pub completed_requests: Vec<InferRequest>,
    pub op_stats: StatLog,
    pub stage_io: Vec<ChannelStageStats>,
    /// Total accumulated energy units across every issued DRAM/PIM command
    /// (spec.md §1's flat per-command energy increment).
    pub total_energy: u64,
}

/// How many global cycles each logical clock domain waits between ticks,
/// relative to the fastest of the three (spec §5's "cycle mask").
fn domain_period(reference_freq: u64, domain_freq: u64) -> u64 {
    if domain_freq == 0 {
        1
    } else {
        (reference_freq / domain_freq).max(1)
    }
}

/// Which systolic-array operation a [`SaWork`] item stands for, used to
/// pick a matmul shape and which weight tensor it reads (spec §4.5/§4.6.1:
/// `QKVgen` projects the hidden state to Q/K/V, `Proj/FFN` covers the
/// attention-output projection followed by the FFN).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SaPurpose {
    QkvGen,
    ProjFfn,
}

/// Unpacks a stage's [`SaWork`] into the `(purpose, sub_batch)` pairs it
/// covers: `ProjFfnAndQkvGen` runs both concurrently on the SA (spec §4.5's
/// stages C/D).
fn sa_work_items(work: SaWork) -> Vec<(SaPurpose, SubBatch)> {
    match work {
        SaWork::QkvGen(b) => vec![(SaPurpose::QkvGen, b)],
        SaWork::ProjFfn(b) => vec![(SaPurpose::ProjFfn, b)],
        SaWork::ProjFfnAndQkvGen { proj_ffn, qkv_gen } => {
            vec![(SaPurpose::ProjFfn, proj_ffn), (SaPurpose::QkvGen, qkv_gen)]
        }
    }
}

/// Drives cores, DRAM channels, and the interconnect forward in lockstep
/// until the client's dataset is drained and every request has completed.
pub struct Simulator {
    cores: Vec<Core>,
    channels: Vec<DramController>,
    interconnect: Interconnect,
    orchestrator: Orchestrator,
    mapping: AddressMapping,
    run_mode: RunMode,
    global_cycle: u64,
    core_period: u64,
    icnt_period: u64,
    dram_period: u64,
    op_stats: StatLog,
    stage_io: Vec<ChannelStageStats>,
    energy: EnergyLog,

    /// Tiles issued for the current A–F stage, `(core index, handle)`; the
    /// stage sequencer only advances once every one of these has finished
    /// (spec §4.5/§4.8, replacing a fixed per-stage cycle budget with real
    /// tile completion).
    stage_tiles: Vec<(usize, Handle<Tile>)>,
    stage_tiles_issued: bool,
    next_core: usize,
    core_buffer: Vec<BufferSide>,
    protocol: PimProtocol,
    spad_size: u32,
    precision: u32,
    core_width: u32,
    page_size: u32,
    head_dim: u32,
    sharded_heads: u32,
    sharded_embd: u32,
    activation_alloc: ActivationAllocator,
    qkv_weight: Dense2D,
    proj_ffn_weight: Dense2D,
}

impl Simulator {
    /// Builds every core and channel named by `config`, wiring the
    /// interconnect's node count to `num_cores * dram_channels +
    /// dram_channels` (spec §4.9).
    pub fn new(config: &Config, dataset: Vec<DatasetRecord>) -> Result<Self, SimError> {
        let mapping = config.address_mapping()?;
        let timing = ChannelTiming::from_ini(&config.dram_timing);
        let dual_buffer = config.memory.dram_type.is_dual_buffer();

        let channels = (0..config.memory.dram_channels)
            .map(|id| {
                DramController::new(
                    id,
                    mapping.clone(),
                    timing,
                    config.memory.dram_ranks,
                    config.memory.dram_bankgroups,
                    config.memory.dram_banks_per_ch,
                    dual_buffer,
                    timing.t_refi,
                    CompletionLatency::default(),
                )
            })
            .collect();

        let cores = (0..config.hardware.num_cores)
            .map(|id| {
                Core::new(
                    id,
                    config.hardware.core_width,
                    config.hardware.core_height,
                    config.memory.dram_req_size,
                    config.hardware.precision,
                    config.hardware.vector_core_count,
                    config.hardware.vector_latencies,
                    (config.hardware.spad_size / config.hardware.precision.max(1)) as usize,
                    (config.hardware.accum_spad_size / config.hardware.precision.max(1)) as usize,
                )
            })
            .collect();

        let interconnect = Interconnect::new(config.hardware.num_cores, config.memory.dram_channels, config.hardware.icnt_latency);

        let client = Client::new(&config.client, dataset);
        let orchestrator = Orchestrator::new(
            client,
            config.memory.dram_channels,
            config.system.ch_load_balancing,
            config.model.model_n_layer,
            config.system.max_active_reqs,
            config.system.max_batch_size,
        );

        let core_period = domain_period(config.hardware.core_freq, config.hardware.core_freq);
        let icnt_period = domain_period(config.hardware.core_freq, config.hardware.icnt_freq);
        let dram_period = domain_period(config.hardware.core_freq, config.memory.dram_freq);

        let num_cores = config.hardware.num_cores.max(1) as usize;
        let sharded_embd = config.model.sharded_embd();
        let precision = config.hardware.precision.max(1);

        // Weight storage for the two SA matmuls (spec §4.10's weight arena:
        // grow-only, loaded once). No weight values are ever read or
        // computed (spec §1 Non-goals), so only the addresses matter.
        let mut weight_alloc = WeightAllocator::new(config.memory.dram_req_size, config.memory.dram_channels);
        let qkv_cols = sharded_embd * 3;
        let proj_ffn_cols = sharded_embd * 4;
        let qkv_base = weight_alloc.allocate(u64::from(sharded_embd) * u64::from(qkv_cols) * u64::from(precision))?;
        let proj_ffn_base = weight_alloc.allocate(u64::from(sharded_embd) * u64::from(proj_ffn_cols) * u64::from(precision))?;
        let qkv_weight = Dense2D { base: qkv_base, rows: sharded_embd, cols: qkv_cols, precision };
        let proj_ffn_weight = Dense2D { base: proj_ffn_base, rows: sharded_embd, cols: proj_ffn_cols, precision };

        // Activation/output storage for one SA matmul call at a time,
        // flushed at every stage boundary (spec §4.10's "flushable on stage
        // boundary").
        let activation_arena_bytes =
            u64::from(config.system.max_batch_size.max(1)) * u64::from(sharded_embd.max(1)) * 8 * u64::from(precision);
        let activation_alloc = ActivationAllocator::new(weight_alloc.limit(), activation_arena_bytes.max(u64::from(precision)));

        let protocol = match config.memory.dram_type {
            DramType::Newton => PimProtocol::Newton,
            DramType::Dram | DramType::NeuPims => PimProtocol::NeuPims,
        };

        Ok(Self {
            cores,
            channels,
            interconnect,
            orchestrator,
            mapping,
            run_mode: config.system.run_mode,
            global_cycle: 0,
            core_period,
            icnt_period,
            dram_period,
            op_stats: StatLog::new(),
            stage_io: (0..config.memory.dram_channels).map(|_| ChannelStageStats::new()).collect(),
            energy: EnergyLog::new(),
            stage_tiles: Vec::new(),
            stage_tiles_issued: false,
            next_core: 0,
            core_buffer: vec![BufferSide::A; num_cores],
            protocol,
            spad_size: config.hardware.spad_size,
            precision,
            core_width: config.hardware.core_width,
            page_size: config.memory.dram_page_size,
            head_dim: config.model.head_dim(),
            sharded_heads: config.model.model_n_head / config.model.n_tp.max(1),
            sharded_embd,
            activation_alloc,
            qkv_weight,
            proj_ffn_weight,
        })
    }

    #[must_use]
    pub const fn cycle(&self) -> u64 {
        self.global_cycle
    }

    /// Runs until every dataset row has arrived and finished, returning the
    /// accumulated report. This never errors on dataset exhaustion — a
    /// drained client with no active requests is the normal, successful
    /// end of a run (spec_full §4 Open Question #3).
    pub fn run(&mut self, max_cycles: u64) -> SimReport {
        while self.global_cycle < max_cycles {
            self.step();
            if self.orchestrator.is_drained() {
                break;
            }
        }
        SimReport {
            total_cycles: self.global_cycle,
            completed_requests: self.orchestrator.completed_requests().to_vec(),
            op_stats: self.op_stats.clone(),
            stage_io: self.stage_io.clone(),
            total_energy: self.energy.total(),
        }
    }

    /// Advances every due domain by one tick and drives the orchestrator's
    /// stage sequencer forward, gated on the current stage's tiles actually
    /// finishing rather than a fixed cycle budget (spec §5's fixed-order
    /// per-domain ticking; spec §4.5's "Each stage materializes two
    /// `StageProgram`s").
    fn step(&mut self) {
        if self.global_cycle % self.core_period == 0 {
            self.step_cores();
            self.step_stage_sequencer(self.global_cycle);
        }
        if self.global_cycle % self.icnt_period == 0 {
            self.step_interconnect();
        }
        if self.global_cycle % self.dram_period == 0 {
            self.step_dram();
        }
        self.global_cycle += 1;
    }

    fn step_cores(&mut self) {
        for (idx, core) in self.cores.iter_mut().enumerate() {
            for (_channel, response) in self.interconnect.drain_responses(idx as u32, self.global_cycle) {
                core.complete_response(response);
            }
            for req in core.step(self.global_cycle) {
                let decoded = self.mapping.decode(req.address);
                let transaction = Transaction::new(req.address, req.req_type, self.global_cycle);
                let platform = if self.run_mode.uses_pim() && req.req_type.is_pim() { StagePlatform::Pim } else { StagePlatform::Sa };
                self.interconnect.send_request(decoded.channel, platform, transaction, self.global_cycle);
            }
        }
    }

    /// Drives the A–F stage sequencer: compiles and issues the current
    /// stage's `StagePlan` into tiles the first time it is seen, then waits
    /// for every issued tile to finish before retiring it into the
    /// orchestrator and moving to the next stage (spec §4.5, §4.8).
    fn step_stage_sequencer(&mut self, now: u64) {
        if !self.stage_tiles_issued {
            self.issue_stage_tiles();
            self.stage_tiles_issued = true;
        }

        let all_finished = self
            .stage_tiles
            .iter()
            .all(|(core_idx, handle)| self.cores[*core_idx].tiles.get(*handle).map_or(true, Tile::is_finished));
        if !all_finished {
            return;
        }

        for core in &mut self.cores {
            while core.tiles.pop_finished().is_some() {}
        }
        self.stage_tiles.clear();
        self.orchestrator.tick(now);
        self.activation_alloc.flush();
        self.stage_tiles_issued = false;
    }

    /// Compiles the current stage's `StagePlan` (spec §4.5) into tiles and
    /// fans them out across cores round-robin, recording each handle so
    /// `step_stage_sequencer` can wait on it.
    fn issue_stage_tiles(&mut self) {
        let plan = self.orchestrator.stage_plan();

        if let Some(work) = plan.sa {
            for (purpose, batch) in sa_work_items(work) {
                let requests: Vec<InferRequest> = self.orchestrator.requests_in(batch).into_iter().cloned().collect();
                let instructions = self.compile_sa_tile(purpose, &requests);
                if !instructions.is_empty() {
                    self.issue_instructions(instructions);
                }
            }
        }

        if self.run_mode.uses_pim() {
            if let Some(batch) = plan.pim {
                let requests: Vec<InferRequest> = self.orchestrator.requests_in(batch).into_iter().cloned().collect();
                for req in &requests {
                    let instructions = self.compile_pim_instructions(req);
                    if !instructions.is_empty() {
                        self.issue_instructions(instructions);
                    }
                }
            }
        }
    }

    /// Lowers one `SaWork` item into a batched matmul over every request in
    /// its sub-batch (spec §4.6.1): `QkvGen` projects the hidden state to
    /// Q/K/V, `ProjFfn` covers the attention-output projection and FFN.
    /// Activation/output storage is bump-allocated and flushed once the
    /// stage's tiles all retire.
    fn compile_sa_tile(&mut self, purpose: SaPurpose, requests: &[InferRequest]) -> Vec<Instruction> {
        let batch = requests.len() as u32;
        if batch == 0 {
            return Vec::new();
        }
        let (weight, shape) = match purpose {
            SaPurpose::QkvGen => (&self.qkv_weight, MatMulShape { m: batch, k: self.sharded_embd, n: self.sharded_embd * 3 }),
            SaPurpose::ProjFfn => (&self.proj_ffn_weight, MatMulShape { m: batch, k: self.sharded_embd, n: self.sharded_embd * 4 }),
        };
        let Ok(activation_base) = self.activation_alloc.allocate(u64::from(batch) * u64::from(self.sharded_embd) * u64::from(self.precision))
        else {
            return Vec::new();
        };
        let Ok(output_base) = self.activation_alloc.allocate(u64::from(batch) * u64::from(shape.n) * u64::from(self.precision)) else {
            return Vec::new();
        };
        let activation = Dense2D { base: activation_base, rows: batch, cols: self.sharded_embd, precision: self.precision };
        let output = Dense2D { base: output_base, rows: batch, cols: shape.n, precision: self.precision };
        let inner = choose_inner_sizes(shape, self.spad_size, self.precision);
        compile_matmul(&self.mapping, &activation, weight, &output, None, inner, self.core_width)
    }

    /// Lowers one request's PIM logit-softmax/attend batch (spec §4.6.3),
    /// addressed by that request's channel and current decode position.
    fn compile_pim_instructions(&self, req: &InferRequest) -> Vec<Instruction> {
        let shape = PimGemvShape {
            channel: req.channel.unwrap_or(0),
            query_row: req.generated,
            d_k: self.head_dim,
            heads: self.sharded_heads,
            page_size: self.page_size,
        };
        compile_pim_gemv(&self.mapping, self.protocol, shape)
    }

    /// Assigns `instructions` to the next core round-robin, toggling that
    /// core's double buffer side (spec §4.8); safe because the stage
    /// sequencer never issues a new stage's tiles until the previous
    /// stage's have fully finished, so the alternate side is always free.
    fn issue_instructions(&mut self, instructions: Vec<Instruction>) {
        let core_idx = self.next_core % self.cores.len().max(1);
        self.next_core = (self.next_core + 1) % self.cores.len().max(1);
        let side = self.core_buffer[core_idx];
        self.core_buffer[core_idx] = side.other();
        let handle = self.cores[core_idx].issue_tile(Tile::new(side, false, instructions));
        self.stage_tiles.push((core_idx, handle));
    }

    fn step_interconnect(&mut self) {
        for (channel, transaction) in self.interconnect.drain_requests(self.global_cycle) {
            if let Some(controller) = self.channels.get_mut(channel as usize) {
                let _ = controller.enqueue(transaction);
                if let Some(stats) = self.stage_io.get_mut(channel as usize) {
                    match transaction.req_type {
                        ReqType::Read => stats.per_stage[0].reads += 1,
                        ReqType::Write => stats.per_stage[0].writes += 1,
                        ReqType::Comp | ReqType::CompsReadres => stats.per_stage[0].pim_comps += 1,
                        ReqType::Readres => stats.per_stage[0].pim_readres += 1,
                        _ => {}
                    }
                }
            }
        }
    }

    fn step_dram(&mut self) {
        for controller in &mut self.channels {
            let result = controller.step(self.global_cycle);
            for issued in &result.issued {
                self.energy.record(issued.kind);
            }
            for completed in result.completed {
                // The owning core is not tracked per in-flight transaction
                // at this layer; responses fan out to every core's
                // in-buffer for this channel, matching each core's own
                // SRAM-line bookkeeping to decide whether it cares.
                for core_id in 0..self.cores.len() as u32 {
                    self.interconnect.send_response(core_id, controller.channel_id(), completed, self.global_cycle);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_period_never_underflows_to_zero() {
        assert_eq!(domain_period(1_000_000, 1_000_000), 1);
        assert_eq!(domain_period(1_000_000, 0), 1);
        assert_eq!(domain_period(1_000_000, 2_000_000), 1);
    }
}
