//! Per-channel bank grid and cross-bank timing propagation (spec §3
//! `ChannelState`, §4.2).
//!
//! A channel owns one [`BankState`] per `(rank, bankgroup, bank)` triple.
//! Issuing a command on one bank raises the earliest-issue-cycle floor of
//! related commands on sibling banks (`tRRD`, `tCCD_S`/`tCCD_L`, `tWTR`,
//! `tRTW`) and, channel-wide, enforces the rolling activation window
//! (`tFAW`: at most four `ACTIVATE`s in any `tFAW`-cycle window) plus the
//! GDDR-style 32-`ACT` refresh-slack rule.

use std::collections::VecDeque;

use crate::common::error::SimError;
use crate::config::dram_ini::DramTiming;
use crate::dram::bank_state::{BankState, ReadyCommand};
use crate::dram::command::{Command, CmdKind};

/// Timing constants consulted by cross-bank propagation, read once from the
/// embedded `.ini` table at construction (spec §4.2).
#[derive(Clone, Copy, Debug)]
pub struct ChannelTiming {
    pub t_rcd: u64,
    pub t_rp: u64,
    pub t_ras: u64,
    pub t_rrd: u64,
    pub t_faw: u64,
    pub t_ccd_s: u64,
    pub t_ccd_l: u64,
    pub t_wtr: u64,
    pub t_wr: u64,
    pub t_rfc: u64,
    pub t_refi: u64,
    /// Minimum spacing between consecutive `G_ACT`s channel-wide, the PIM
    /// analogue of `tFAW` (spec §4.2's "32-ACT" rule applied to `G_ACT`).
    pub t_gact_window: u64,
    pub gact_window_limit: usize,
}

impl ChannelTiming {
    /// Reads each constant from `ini`, falling back to a conservative
    /// default (in cycles) when the table omits it.
    #[must_use]
    pub fn from_ini(ini: &DramTiming) -> Self {
        Self {
            t_rcd: ini.get("tRCD", 18),
            t_rp: ini.get("tRP", 18),
            t_ras: ini.get("tRAS", 42),
            t_rrd: ini.get("tRRD", 6),
            t_faw: ini.get("tFAW", 30),
            t_ccd_s: ini.get("tCCD_S", 4),
            t_ccd_l: ini.get("tCCD_L", 6),
            t_wtr: ini.get("tWTR", 8),
            t_wr: ini.get("tWR", 18),
            t_rfc: ini.get("tRFC", 350),
            t_refi: ini.get("tREFI", 7800),
            t_gact_window: ini.get("tFAW", 30),
            gact_window_limit: 4,
        }
    }
}

/// One DRAM channel's bank grid plus cross-bank timing state.
#[derive(Debug)]
pub struct ChannelState {
    ranks: u32,
    bankgroups: u32,
    banks_per_bg: u32,
    banks: Vec<BankState>,
    timing: ChannelTiming,
    act_window: VecDeque<u64>,
    gact_window: VecDeque<u64>,
}

impl ChannelState {
    #[must_use]
    pub fn new(timing: ChannelTiming, ranks: u32, bankgroups: u32, banks_per_bg: u32, dual_buffer: bool) -> Self {
        let count = (ranks * bankgroups * banks_per_bg) as usize;
        Self {
            ranks,
            bankgroups,
            banks_per_bg,
            banks: (0..count).map(|_| BankState::new(dual_buffer)).collect(),
            timing,
            act_window: VecDeque::new(),
            gact_window: VecDeque::new(),
        }
    }

    fn index(&self, rank: u32, bankgroup: u32, bank: u32) -> usize {
        ((rank * self.bankgroups + bankgroup) * self.banks_per_bg + bank) as usize
    }

    #[must_use]
    pub fn bank(&self, rank: u32, bankgroup: u32, bank: u32) -> &BankState {
        &self.banks[self.index(rank, bankgroup, bank)]
    }

    /// Whether `cmd` is issuable on `(rank, bankgroup, bank)` at `clk`,
    /// folding in the channel-wide `tFAW`/32-`G_ACT` windows on top of the
    /// bank's own readiness.
    #[must_use]
    pub fn ready_command(&self, rank: u32, bankgroup: u32, bank: u32, cmd: Command, clk: u64) -> ReadyCommand {
        let outcome = self.bank(rank, bankgroup, bank).ready_command(cmd, clk);
        match (cmd.kind, outcome) {
            (CmdKind::Activate, ReadyCommand::Ready(_)) if self.faw_window_full(clk) => ReadyCommand::NotYet,
            (CmdKind::GAct, ReadyCommand::Ready(_)) if self.gact_window_full(clk) => ReadyCommand::NotYet,
            _ => outcome,
        }
    }

    fn faw_window_full(&self, clk: u64) -> bool {
        self.window_count(&self.act_window, clk, self.timing.t_faw) >= 4
    }

    fn gact_window_full(&self, clk: u64) -> bool {
        self.window_count(&self.gact_window, clk, self.timing.t_gact_window) >= self.timing.gact_window_limit
    }

    fn window_count(&self, window: &VecDeque<u64>, clk: u64, span: u64) -> usize {
        window.iter().filter(|&&t| clk.saturating_sub(t) < span).count()
    }

    /// Commits `cmd` on `(rank, bankgroup, bank)`: applies the bank's own
    /// transition, then propagates timing floors to sibling banks and
    /// updates the channel-wide activation windows.
    pub fn issue(&mut self, rank: u32, bankgroup: u32, bank: u32, cmd: Command, clk: u64) -> Result<(), SimError> {
        let idx = self.index(rank, bankgroup, bank);
        self.banks[idx].update_state(cmd)?;
        self.propagate_timing(rank, bankgroup, bank, cmd, clk);
        Ok(())
    }

    fn propagate_timing(&mut self, rank: u32, bankgroup: u32, bank: u32, cmd: Command, clk: u64) {
        match cmd.kind {
            CmdKind::Activate => {
                self.banks[self.index(rank, bankgroup, bank)].update_timing(CmdKind::Read, clk + self.timing.t_rcd);
                self.banks[self.index(rank, bankgroup, bank)].update_timing(CmdKind::Write, clk + self.timing.t_rcd);
                self.banks[self.index(rank, bankgroup, bank)]
                    .update_timing(CmdKind::Precharge, clk + self.timing.t_ras);
                self.act_window.push_back(clk);
                self.prune_window(clk);
                for sibling in self.same_rank_bank_indices(rank, bankgroup, bank) {
                    let spacing = if sibling.1 == bankgroup {
                        self.timing.t_ccd_l.max(self.timing.t_rrd)
                    } else {
                        self.timing.t_rrd
                    };
                    self.banks[sibling.0].update_timing(CmdKind::Activate, clk + spacing);
                }
            }
            CmdKind::Read | CmdKind::ReadPrecharge => {
                let idx = self.index(rank, bankgroup, bank);
                self.banks[idx].update_timing(CmdKind::Write, clk + self.timing.t_ccd_l);
                for sibling in self.same_rank_bank_indices(rank, bankgroup, bank) {
                    let spacing = if sibling.1 == bankgroup { self.timing.t_ccd_s } else { self.timing.t_ccd_l };
                    self.banks[sibling.0].update_timing(CmdKind::Read, clk + spacing);
                }
            }
            CmdKind::Write | CmdKind::WritePrecharge | CmdKind::Gwrite => {
                let idx = self.index(rank, bankgroup, bank);
                self.banks[idx].update_timing(CmdKind::Read, clk + self.timing.t_wtr);
                for sibling in self.same_rank_bank_indices(rank, bankgroup, bank) {
                    let spacing = if sibling.1 == bankgroup { self.timing.t_ccd_s } else { self.timing.t_ccd_l };
                    self.banks[sibling.0].update_timing(CmdKind::Write, clk + spacing);
                }
            }
            CmdKind::Precharge | CmdKind::PimPrecharge => {
                let idx = self.index(rank, bankgroup, bank);
                self.banks[idx].update_timing(CmdKind::Activate, clk + self.timing.t_rp);
            }
            CmdKind::GAct => {
                self.gact_window.push_back(clk);
                self.prune_window(clk);
                let idx = self.index(rank, bankgroup, bank);
                self.banks[idx].update_timing(CmdKind::Comp, clk + self.timing.t_rcd);
                self.banks[idx].update_timing(CmdKind::CompsReadres, clk + self.timing.t_rcd);
            }
            CmdKind::Comp | CmdKind::CompsReadres => {
                let idx = self.index(rank, bankgroup, bank);
                self.banks[idx].update_timing(cmd.kind, clk + self.timing.t_ccd_s);
            }
            CmdKind::Refresh | CmdKind::RefreshBank => {
                for b in &mut self.banks {
                    b.update_timing(CmdKind::Activate, clk + self.timing.t_rfc);
                }
            }
            CmdKind::Readres | CmdKind::SrefEnter | CmdKind::SrefExit | CmdKind::Pwrite | CmdKind::PHeader => {}
        }
    }

    fn prune_window(&mut self, clk: u64) {
        while self.act_window.front().is_some_and(|&t| clk.saturating_sub(t) >= self.timing.t_faw) {
            self.act_window.pop_front();
        }
        while self.gact_window.front().is_some_and(|&t| clk.saturating_sub(t) >= self.timing.t_gact_window) {
            self.gact_window.pop_front();
        }
    }

    fn same_rank_bank_indices(&self, rank: u32, bankgroup: u32, bank: u32) -> Vec<(usize, u32)> {
        let mut out = Vec::new();
        for bg in 0..self.bankgroups {
            for ba in 0..self.banks_per_bg {
                if bg == bankgroup && ba == bank {
                    continue;
                }
                out.push((self.index(rank, bg, ba), bg));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::address::Address;

    fn channel() -> ChannelState {
        let ini = DramTiming::parse("tFAW = 30\ntRRD = 6\ntRCD = 18\ntRAS = 42\ntRP = 18\n").unwrap();
        ChannelState::new(ChannelTiming::from_ini(&ini), 1, 4, 4, true)
    }

    #[test]
    fn faw_window_blocks_fifth_activate_in_span() {
        let mut ch = channel();
        for bank in 0..4 {
            let cmd = Command::new(CmdKind::Activate, Address::new(u64::from(bank)));
            assert_eq!(ch.ready_command(0, 0, bank, cmd, u64::from(bank) * 2), ReadyCommand::Ready(cmd));
            ch.issue(0, 0, bank, cmd, u64::from(bank) * 2).unwrap();
        }
        let fifth = Command::new(CmdKind::Activate, Address::new(4));
        assert_eq!(ch.ready_command(0, 1, 0, fifth, 10), ReadyCommand::NotYet);
    }

    #[test]
    fn activate_raises_read_floor_by_trcd() {
        let mut ch = channel();
        let act = Command::new(CmdKind::Activate, Address::new(0));
        ch.issue(0, 0, 0, act, 100).unwrap();
        assert_eq!(ch.bank(0, 0, 0).timing_floor(CmdKind::Read), 118);
    }
}
