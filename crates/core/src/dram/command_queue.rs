//! Per-bank transaction queues and the PIM row reservation (spec §3
//! `CommandQueue`, §4.3–§4.4).
//!
//! Each bank keeps two FIFOs: a normal-buffer queue for `READ`/`WRITE` and a
//! PIM queue for `G_WRITE`/`COMP`/`READRES`/`COMPS_READRES`/`P_HEADER`. A
//! dequeued `P_HEADER` arms `reserved_pim_row` and its operand counts (spec
//! §4.4, [`CommandQueue::arm_pim_header`]), guarding the PIM queue against
//! interleaving two different rows' COMP sequences on the same bank;
//! [`CommandQueue::enqueue`] rejects any `Comp`/`CompsReadres` for a row
//! that is not the one a `P_HEADER` armed, so no partial reservation is
//! ever inferred from the COMP stream itself.

use std::collections::{HashMap, VecDeque};

use crate::common::address::PimHeaderFields;
use crate::common::error::SimError;
use crate::dram::command::{Command, CmdKind};
use crate::dram::transaction::{ReqType, Transaction};

/// Extra per-command latency floors that are not modeled as fixed `.ini`
/// timing constants (spec §4.4's `remain_slack_`): e.g. additional cycles a
/// `GWRITE` must wait past its `WRITE` counterpart.
#[derive(Clone, Debug, Default)]
pub struct SlackLatencyTable {
    entries: HashMap<CmdKind, u64>,
}

impl SlackLatencyTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, kind: CmdKind, cycles: u64) {
        self.entries.insert(kind, cycles);
    }

    #[must_use]
    pub fn get(&self, kind: CmdKind) -> u64 {
        self.entries.get(&kind).copied().unwrap_or(0)
    }
}

fn req_type_to_cmd_kind(req_type: ReqType) -> CmdKind {
    match req_type {
        ReqType::Read => CmdKind::Read,
        ReqType::Write => CmdKind::Write,
        ReqType::Gwrite => CmdKind::Gwrite,
        ReqType::Comp => CmdKind::Comp,
        ReqType::Readres => CmdKind::Readres,
        ReqType::PHeader => CmdKind::PHeader,
        ReqType::CompsReadres => CmdKind::CompsReadres,
        ReqType::Pwrite => CmdKind::Pwrite,
    }
}

/// One bank's pair of FIFOs plus its PIM row reservation.
#[derive(Clone, Debug, Default)]
struct BankQueue {
    normal: VecDeque<Transaction>,
    pim: VecDeque<Transaction>,
    reserved_pim_row: Option<u32>,
    /// Operand counts armed by the last dequeued `P_HEADER` (spec §4.4),
    /// consulted by the COMP/COMPS_READRES/READRES sequence it precedes.
    pim_header: Option<PimHeaderFields>,
}

/// Front-end command queue for one channel: classifies incoming
/// transactions into per-bank normal/PIM FIFOs and hands out the next
/// issuable [`Command`] per bank (spec §4.3).
#[derive(Clone, Debug)]
pub struct CommandQueue {
    bankgroups: u32,
    banks_per_bg: u32,
    banks: Vec<BankQueue>,
    slack: SlackLatencyTable,
    remain_slack: u64,
}

impl CommandQueue {
    #[must_use]
    pub fn new(ranks: u32, bankgroups: u32, banks_per_bg: u32) -> Self {
        let count = (ranks * bankgroups * banks_per_bg) as usize;
        Self {
            bankgroups,
            banks_per_bg,
            banks: vec![BankQueue::default(); count],
            slack: SlackLatencyTable::new(),
            remain_slack: 0,
        }
    }

    #[must_use]
    pub const fn slack_table(&self) -> &SlackLatencyTable {
        &self.slack
    }

    pub fn slack_table_mut(&mut self) -> &mut SlackLatencyTable {
        &mut self.slack
    }

    fn index(&self, rank: u32, bankgroup: u32, bank: u32) -> usize {
        ((rank * self.bankgroups + bankgroup) * self.banks_per_bg + bank) as usize
    }

    /// Admits `transaction` onto bank `(rank, bankgroup, bank)`, `row` being
    /// the caller's already-decoded row field of `transaction.address`
    /// (decoding needs the channel's [`crate::common::address::AddressMapping`],
    /// which this queue does not itself hold).
    ///
    /// For PIM sequence members (`Comp`/`CompsReadres`) this checks the
    /// bank's row reservation: per spec §4.4, that reservation is armed
    /// only by a dequeued `P_HEADER` (see [`Self::arm_pim_header`]), never
    /// inferred from the `Comp`/`CompsReadres` transaction itself. A
    /// `Comp`/`CompsReadres` for an unreserved or mismatched row is
    /// rejected rather than silently admitted or used to arm the
    /// reservation (spec §4 Open Question: no partial reservation is ever
    /// made — either the whole enqueue succeeds or nothing is mutated).
    pub fn enqueue(&mut self, rank: u32, bankgroup: u32, bank: u32, row: u32, transaction: Transaction) -> Result<(), SimError> {
        let idx = self.index(rank, bankgroup, bank);
        if matches!(transaction.req_type, ReqType::Comp | ReqType::CompsReadres) {
            match self.banks[idx].reserved_pim_row {
                Some(reserved) if reserved == row => {}
                Some(_) => {
                    return Err(SimError::fatal(
                        "command_queue",
                        "PIM row reservation conflict: a COMP sequence for a different row is already in flight",
                    ));
                }
                None => {
                    return Err(SimError::fatal(
                        "command_queue",
                        "COMP/COMPS_READRES enqueued before a P_HEADER armed its row",
                    ));
                }
            }
        }
        if transaction.req_type.is_pim() {
            self.banks[idx].pim.push_back(transaction);
        } else {
            self.banks[idx].normal.push_back(transaction);
        }
        Ok(())
    }

    /// Arms the PIM row reservation and operand counts decoded from a
    /// dequeued `P_HEADER` (spec §4.4): issues no physical command itself,
    /// but licenses the `Comp`/`CompsReadres`/`Readres` sequence that
    /// follows it for `fields.row`.
    pub fn arm_pim_header(&mut self, rank: u32, bankgroup: u32, bank: u32, fields: PimHeaderFields) {
        let idx = self.index(rank, bankgroup, bank);
        self.banks[idx].reserved_pim_row = Some(fields.row);
        self.banks[idx].pim_header = Some(fields);
    }

    /// The operand counts armed by the last dequeued `P_HEADER` for this
    /// bank, if any (spec §4.2's COMP-stream deadline logic).
    #[must_use]
    pub fn pim_header(&self, rank: u32, bankgroup: u32, bank: u32) -> Option<PimHeaderFields> {
        self.banks[self.index(rank, bankgroup, bank)].pim_header
    }

    /// Releases the PIM row reservation on `(rank, bankgroup, bank)`,
    /// called once the final `READRES` of a sequence has drained.
    pub fn release_pim_row(&mut self, rank: u32, bankgroup: u32, bank: u32) {
        let idx = self.index(rank, bankgroup, bank);
        self.banks[idx].reserved_pim_row = None;
        self.banks[idx].pim_header = None;
    }

    #[must_use]
    pub fn reserved_pim_row(&self, rank: u32, bankgroup: u32, bank: u32) -> Option<u32> {
        self.banks[self.index(rank, bankgroup, bank)].reserved_pim_row
    }

    /// The next transaction queued for `(rank, bankgroup, bank)`, PIM queue
    /// taking priority whenever it is non-empty (spec §4.3).
    #[must_use]
    pub fn peek(&self, rank: u32, bankgroup: u32, bank: u32) -> Option<&Transaction> {
        let q = &self.banks[self.index(rank, bankgroup, bank)];
        q.pim.front().or_else(|| q.normal.front())
    }

    /// Builds the [`Command`] for the head transaction, if any.
    #[must_use]
    pub fn peek_command(&self, rank: u32, bankgroup: u32, bank: u32) -> Option<Command> {
        self.peek(rank, bankgroup, bank)
            .map(|t| Command::new(req_type_to_cmd_kind(t.req_type), t.address))
    }

    /// Removes and returns the head transaction for `(rank, bankgroup,
    /// bank)`, preferring the PIM queue (spec §4.3's PIM-priority rule).
    pub fn pop(&mut self, rank: u32, bankgroup: u32, bank: u32) -> Option<Transaction> {
        let idx = self.index(rank, bankgroup, bank);
        let q = &mut self.banks[idx];
        if let Some(t) = q.pim.pop_front() {
            Some(t)
        } else {
            q.normal.pop_front()
        }
    }

    #[must_use]
    pub fn is_empty(&self, rank: u32, bankgroup: u32, bank: u32) -> bool {
        let q = &self.banks[self.index(rank, bankgroup, bank)];
        q.pim.is_empty() && q.normal.is_empty()
    }

    /// Accumulated refresh slack available for opportunistic PIM scheduling
    /// (spec §4.4).
    #[must_use]
    pub const fn remain_slack(&self) -> u64 {
        self.remain_slack
    }

    pub fn replenish_slack(&mut self, cycles: u64) {
        self.remain_slack += cycles;
    }

    /// Consumes up to `cycles` of slack, returning how much was actually
    /// available.
    pub fn consume_slack(&mut self, cycles: u64) -> u64 {
        let used = self.remain_slack.min(cycles);
        self.remain_slack -= used;
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::address::Address;

    #[test]
    fn pim_queue_has_priority_over_normal_queue() {
        let mut q = CommandQueue::new(1, 4, 4);
        q.enqueue(0, 0, 0, 0, Transaction::new(Address::new(1), ReqType::Read, 0)).unwrap();
        q.enqueue(0, 0, 0, 0, Transaction::new(Address::new(1), ReqType::Gwrite, 0)).unwrap();
        let head = q.pop(0, 0, 0).unwrap();
        assert_eq!(head.req_type, ReqType::Gwrite);
    }

    #[test]
    fn comp_before_header_arms_it_is_rejected() {
        let mut q = CommandQueue::new(1, 4, 4);
        let err = q.enqueue(0, 0, 0, 1, Transaction::new(Address::new(1), ReqType::Comp, 0));
        assert!(err.is_err());
        assert_eq!(q.reserved_pim_row(0, 0, 0), None);
    }

    #[test]
    fn conflicting_pim_row_reservation_is_rejected() {
        let mut q = CommandQueue::new(1, 4, 4);
        q.arm_pim_header(0, 0, 0, PimHeaderFields { row: 1, for_gwrite: false, comps_log2: 0, num_readres: 0 });
        q.enqueue(0, 0, 0, 1, Transaction::new(Address::new(1), ReqType::Comp, 0)).unwrap();
        let err = q.enqueue(0, 0, 0, 2, Transaction::new(Address::new(2), ReqType::Comp, 0));
        assert!(err.is_err());
        // rejection must not have mutated the queue
        assert_eq!(q.reserved_pim_row(0, 0, 0), Some(1));
    }

    #[test]
    fn pim_header_arms_reservation_and_operand_counts() {
        let mut q = CommandQueue::new(1, 4, 4);
        let fields = PimHeaderFields { row: 7, for_gwrite: true, comps_log2: 3, num_readres: 2 };
        q.arm_pim_header(0, 0, 0, fields);
        assert_eq!(q.pim_header(0, 0, 0), Some(fields));
        q.enqueue(0, 0, 0, 7, Transaction::new(Address::new(7), ReqType::Comp, 0)).unwrap();
        q.release_pim_row(0, 0, 0);
        assert_eq!(q.reserved_pim_row(0, 0, 0), None);
        assert_eq!(q.pim_header(0, 0, 0), None);
    }

    #[test]
    fn slack_consumption_is_capped_by_balance() {
        let mut q = CommandQueue::new(1, 1, 1);
        q.replenish_slack(10);
        assert_eq!(q.consume_slack(15), 10);
        assert_eq!(q.remain_slack(), 0);
    }
}
