//! Top-level per-channel DRAM/PIM controller (spec §4): ties address
//! decoding, the per-bank command queues, the bank/channel state machines,
//! and refresh deadlines together into one `step`-per-cycle interface.

use tracing::{debug, trace};

use crate::common::address::{Address, AddressMapping};
use crate::common::error::SimError;
use crate::dram::bank_state::ReadyCommand;
use crate::dram::channel_state::{ChannelState, ChannelTiming};
use crate::dram::command::{Command, CmdKind};
use crate::dram::command_queue::CommandQueue;
use crate::dram::refresh::RefreshGenerator;
use crate::dram::transaction::{ReqType, Transaction};

/// Read/write data-available latencies, layered on top of the `tRCD`/`tRP`
/// bank timings already tracked by [`ChannelState`].
#[derive(Clone, Copy, Debug)]
pub struct CompletionLatency {
    pub read_cl: u64,
    pub write_cwl: u64,
    pub readres_latency: u64,
}

impl Default for CompletionLatency {
    fn default() -> Self {
        Self { read_cl: 16, write_cwl: 14, readres_latency: 4 }
    }
}

/// What happened on a channel during one [`DramController::step`] call.
#[derive(Clone, Debug, Default)]
pub struct StepResult {
    pub issued: Vec<Command>,
    pub completed: Vec<Transaction>,
}

/// One channel's full controller: address decoding, per-bank queues, bank
/// state machines, and refresh scheduling (spec §4.1–§4.4).
#[derive(Debug)]
pub struct DramController {
    channel_id: u32,
    mapping: AddressMapping,
    ranks: u32,
    bankgroups: u32,
    banks_per_bg: u32,
    state: ChannelState,
    queue: CommandQueue,
    refresh: RefreshGenerator,
    completion: CompletionLatency,
}

impl DramController {
    #[must_use]
    pub fn new(
        channel_id: u32,
        mapping: AddressMapping,
        timing: ChannelTiming,
        ranks: u32,
        bankgroups: u32,
        banks_per_bg: u32,
        dual_buffer: bool,
        t_refi: u64,
        completion: CompletionLatency,
    ) -> Self {
        Self {
            channel_id,
            ranks,
            bankgroups,
            banks_per_bg,
            state: ChannelState::new(timing, ranks, bankgroups, banks_per_bg, dual_buffer),
            queue: CommandQueue::new(ranks, bankgroups, banks_per_bg),
            refresh: RefreshGenerator::new(t_refi, t_refi),
            mapping,
            completion,
        }
    }

    #[must_use]
    pub const fn channel_id(&self) -> u32 {
        self.channel_id
    }

    #[must_use]
    pub const fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    #[must_use]
    pub const fn state(&self) -> &ChannelState {
        &self.state
    }

    /// Decodes `transaction.address` and admits it onto the matching bank's
    /// queue (spec §4.3 front-end classification).
    pub fn enqueue(&mut self, transaction: Transaction) -> Result<(), SimError> {
        let decoded = self.mapping.decode(transaction.address);
        trace!(
            channel = self.channel_id,
            rank = decoded.rank,
            bankgroup = decoded.bankgroup,
            bank = decoded.bank,
            row = decoded.row,
            req_type = ?transaction.req_type,
            "enqueue transaction"
        );
        self.queue.enqueue(decoded.rank, decoded.bankgroup, decoded.bank, decoded.row, transaction)
    }

    /// Advances every bank in the channel by one cycle: tries to issue a
    /// refresh if due, otherwise asks the queue for the head transaction and
    /// consults [`ChannelState::ready_command`].
    pub fn step(&mut self, clk: u64) -> StepResult {
        let mut result = StepResult::default();
        if self.refresh.is_due(clk) {
            let mut all_idle = true;
            for rank in 0..self.ranks {
                for bg in 0..self.bankgroups {
                    for bank in 0..self.banks_per_bg {
                        if !self.queue.is_empty(rank, bg, bank) {
                            all_idle = false;
                        }
                    }
                }
            }
            if all_idle {
                let refresh_cmd = Command::new(CmdKind::Refresh, Address::new(0));
                if let Ok(()) = self.state.issue(0, 0, 0, refresh_cmd, clk) {
                    self.refresh.mark_issued(clk);
                    result.issued.push(refresh_cmd);
                }
            } else {
                debug!(channel = self.channel_id, overdue = self.refresh.overdue_by(clk), "refresh deferred: channel busy");
            }
        }

        for rank in 0..self.ranks {
            for bg in 0..self.bankgroups {
                for bank in 0..self.banks_per_bg {
                    self.step_bank(rank, bg, bank, clk, &mut result);
                }
            }
        }
        result
    }

    fn step_bank(&mut self, rank: u32, bg: u32, bank: u32, clk: u64, result: &mut StepResult) {
        let Some(cmd) = self.queue.peek_command(rank, bg, bank) else {
            return;
        };
        match self.state.ready_command(rank, bg, bank, cmd, clk) {
            ReadyCommand::Ready(ready_cmd) => {
                if self.state.issue(rank, bg, bank, ready_cmd, clk).is_ok() {
                    let transaction = self.queue.pop(rank, bg, bank);
                    if let Some(mut transaction) = transaction {
                        if matches!(transaction.req_type, ReqType::PHeader) {
                            let fields = self.mapping.decode_pim_header(transaction.address);
                            self.queue.arm_pim_header(rank, bg, bank, fields);
                        }
                        transaction.complete_cycle = Some(self.completion_cycle(transaction.req_type, clk));
                        if matches!(transaction.req_type, ReqType::Readres) {
                            self.queue.release_pim_row(rank, bg, bank);
                        }
                        result.completed.push(transaction);
                    }
                    result.issued.push(ready_cmd);
                }
            }
            ReadyCommand::Prerequisite(prereq) => {
                if self.state.issue(rank, bg, bank, prereq, clk).is_ok() {
                    result.issued.push(prereq);
                }
            }
            ReadyCommand::NotYet => {}
        }
    }

    fn completion_cycle(&self, req_type: ReqType, clk: u64) -> u64 {
        match req_type {
            ReqType::Read => clk + self.completion.read_cl,
            ReqType::Write | ReqType::Gwrite | ReqType::Pwrite => clk + self.completion.write_cwl,
            ReqType::Readres => clk + self.completion.readres_latency,
            ReqType::Comp | ReqType::CompsReadres | ReqType::PHeader => clk,
        }
    }
}
