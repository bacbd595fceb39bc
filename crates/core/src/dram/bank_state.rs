//! Per-bank state machine (spec §3 `BankState`, §4.1).
//!
//! A bank tracks two concurrent finite-state subs: a *normal* DDR buffer
//! (`CLOSED`/`OPEN`/`SREF`) and, in dual-buffer mode, an independent *PIM*
//! buffer (`CLOSED`/`OPEN`). In single-buffer mode there is one shared
//! buffer guarded by a `pim_lock` flag instead.

use crate::common::error::SimError;
use crate::dram::command::{Command, CmdKind};

/// Outcome of [`BankState::ready_command`]: either the requested command
/// can issue now, an earlier prerequisite command must be issued first, or
/// neither is possible yet (spec §4.1's "invalid (meaning not yet)").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadyCommand {
    /// The requested command is issuable this cycle.
    Ready(Command),
    /// `cmd` must be issued first (e.g. `ACTIVATE` before `READ` on a
    /// closed row); the caller issues it and re-asks on a later cycle.
    Prerequisite(Command),
    /// Not issuable this cycle for any reason (timing floor not met, or
    /// the state machine cannot accept it yet); retry later.
    NotYet,
}

/// Normal (DDR) buffer state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NormalBuffer {
    Closed,
    Open { row: u32 },
    Sref,
}

/// PIM buffer state, present only in dual-buffer mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PimBuffer {
    Closed,
    Open { row: u32 },
}

/// Per-bank state: buffer occupancy plus a per-command earliest-issue-cycle
/// floor (spec §4.1, §4.2 `cmd_timing_[T] = max(cmd_timing_[T], floor)`).
#[derive(Clone, Debug)]
pub struct BankState {
    dual_buffer: bool,
    normal: NormalBuffer,
    pim: PimBuffer,
    /// Single-buffer mode only: forbids RD/WR while a COMP/READRES
    /// sequence is mid-flight (spec §4.1 "Single-buffer mode").
    pim_lock: bool,
    cmd_timing: [u64; CmdKind::COUNT],
}

impl BankState {
    /// Creates a bank in the `CLOSED`/`CLOSED` state.
    #[must_use]
    pub fn new(dual_buffer: bool) -> Self {
        Self {
            dual_buffer,
            normal: NormalBuffer::Closed,
            pim: PimBuffer::Closed,
            pim_lock: false,
            cmd_timing: [0; CmdKind::COUNT],
        }
    }

    /// Raises the earliest-issue-cycle floor for `kind` to at least
    /// `floor` (spec §4.2).
    pub fn update_timing(&mut self, kind: CmdKind, floor: u64) {
        let slot = &mut self.cmd_timing[kind.index()];
        *slot = (*slot).max(floor);
    }

    /// The current earliest-issue-cycle floor for `kind`.
    #[must_use]
    pub fn timing_floor(&self, kind: CmdKind) -> u64 {
        self.cmd_timing[kind.index()]
    }

    #[must_use]
    pub const fn normal_state(&self) -> NormalBuffer {
        self.normal
    }

    #[must_use]
    pub const fn pim_state(&self) -> PimBuffer {
        self.pim
    }

    #[must_use]
    pub const fn pim_locked(&self) -> bool {
        self.pim_lock
    }

    /// Determines whether `cmd` is issuable at cycle `clk`, or what
    /// prerequisite command must be issued first (spec §4.1).
    #[must_use]
    pub fn ready_command(&self, cmd: Command, clk: u64) -> ReadyCommand {
        if !self.dual_buffer {
            return self.ready_command_single_buffer(cmd, clk);
        }
        self.ready_command_dual_buffer(cmd, clk)
    }

    fn timing_ok(&self, kind: CmdKind, clk: u64) -> bool {
        clk >= self.cmd_timing[kind.index()]
    }

    fn ready_command_dual_buffer(&self, cmd: Command, clk: u64) -> ReadyCommand {
        // The row field has already been isolated into `cmd.address` by the
        // caller (the command queue decodes the full physical address); the
        // bank state machine only ever compares row tags for equality.
        let row = cmd.address.raw() as u32;
        match cmd.kind {
            CmdKind::Read | CmdKind::ReadPrecharge | CmdKind::Write | CmdKind::WritePrecharge | CmdKind::Gwrite => {
                match self.normal {
                    NormalBuffer::Closed => {
                        if let PimBuffer::Open { row: pim_row } = self.pim {
                            if pim_row == row {
                                return ReadyCommand::Prerequisite(Command::new(
                                    CmdKind::PimPrecharge,
                                    cmd.address,
                                ));
                            }
                        }
                        ReadyCommand::Prerequisite(Command::new(CmdKind::Activate, cmd.address))
                    }
                    NormalBuffer::Open { row: open_row } if open_row != row => {
                        ReadyCommand::Prerequisite(Command::new(CmdKind::Precharge, cmd.address))
                    }
                    NormalBuffer::Open { .. } => {
                        if self.timing_ok(cmd.kind, clk) {
                            ReadyCommand::Ready(cmd)
                        } else {
                            ReadyCommand::NotYet
                        }
                    }
                    NormalBuffer::Sref => ReadyCommand::NotYet,
                }
            }
            CmdKind::Activate => match self.normal {
                NormalBuffer::Closed if self.timing_ok(CmdKind::Activate, clk) => {
                    ReadyCommand::Ready(cmd)
                }
                _ => ReadyCommand::NotYet,
            },
            CmdKind::Precharge => match self.normal {
                NormalBuffer::Open { .. } if self.timing_ok(CmdKind::Precharge, clk) => {
                    ReadyCommand::Ready(cmd)
                }
                _ => ReadyCommand::NotYet,
            },
            CmdKind::Comp | CmdKind::CompsReadres => match self.pim {
                PimBuffer::Closed => {
                    ReadyCommand::Prerequisite(Command::new(CmdKind::GAct, cmd.address))
                }
                PimBuffer::Open { row: open_row } if open_row != row => {
                    ReadyCommand::Prerequisite(Command::new(CmdKind::PimPrecharge, cmd.address))
                }
                PimBuffer::Open { .. } => {
                    if self.timing_ok(cmd.kind, clk) {
                        ReadyCommand::Ready(cmd)
                    } else {
                        ReadyCommand::NotYet
                    }
                }
            },
            CmdKind::GAct => match self.pim {
                PimBuffer::Closed if self.timing_ok(CmdKind::GAct, clk) => ReadyCommand::Ready(cmd),
                _ => ReadyCommand::NotYet,
            },
            CmdKind::PimPrecharge => match self.pim {
                PimBuffer::Open { .. } if self.timing_ok(CmdKind::PimPrecharge, clk) => {
                    ReadyCommand::Ready(cmd)
                }
                _ => ReadyCommand::NotYet,
            },
            CmdKind::Readres | CmdKind::PHeader | CmdKind::Pwrite => {
                if self.timing_ok(cmd.kind, clk) {
                    ReadyCommand::Ready(cmd)
                } else {
                    ReadyCommand::NotYet
                }
            }
            CmdKind::Refresh | CmdKind::RefreshBank => {
                let other_closed = matches!(self.pim, PimBuffer::Closed);
                if matches!(self.normal, NormalBuffer::Closed) && other_closed {
                    ReadyCommand::Ready(cmd)
                } else {
                    ReadyCommand::NotYet
                }
            }
            CmdKind::SrefEnter | CmdKind::SrefExit => ReadyCommand::Ready(cmd),
        }
    }

    fn ready_command_single_buffer(&self, cmd: Command, clk: u64) -> ReadyCommand {
        let row = cmd.address.raw() as u32;
        match cmd.kind {
            CmdKind::Read | CmdKind::ReadPrecharge | CmdKind::Write | CmdKind::WritePrecharge => {
                if self.pim_lock {
                    return ReadyCommand::NotYet;
                }
                match self.normal {
                    NormalBuffer::Closed => {
                        ReadyCommand::Prerequisite(Command::new(CmdKind::Activate, cmd.address))
                    }
                    NormalBuffer::Open { row: open_row } if open_row != row => {
                        ReadyCommand::Prerequisite(Command::new(CmdKind::Precharge, cmd.address))
                    }
                    NormalBuffer::Open { .. } => {
                        if self.timing_ok(cmd.kind, clk) {
                            ReadyCommand::Ready(cmd)
                        } else {
                            ReadyCommand::NotYet
                        }
                    }
                    NormalBuffer::Sref => ReadyCommand::NotYet,
                }
            }
            CmdKind::Activate => match self.normal {
                NormalBuffer::Closed if self.timing_ok(CmdKind::Activate, clk) => {
                    ReadyCommand::Ready(cmd)
                }
                _ => ReadyCommand::NotYet,
            },
            CmdKind::Precharge => match self.normal {
                NormalBuffer::Open { .. } if self.timing_ok(CmdKind::Precharge, clk) && !self.pim_lock => {
                    ReadyCommand::Ready(cmd)
                }
                _ => ReadyCommand::NotYet,
            },
            CmdKind::Comp | CmdKind::Gwrite | CmdKind::Readres | CmdKind::PHeader => {
                match self.normal {
                    NormalBuffer::Closed => {
                        ReadyCommand::Prerequisite(Command::new(CmdKind::Activate, cmd.address))
                    }
                    NormalBuffer::Open { row: open_row } if open_row != row => {
                        ReadyCommand::Prerequisite(Command::new(CmdKind::Precharge, cmd.address))
                    }
                    NormalBuffer::Open { .. } => {
                        if self.timing_ok(cmd.kind, clk) {
                            ReadyCommand::Ready(cmd)
                        } else {
                            ReadyCommand::NotYet
                        }
                    }
                    NormalBuffer::Sref => ReadyCommand::NotYet,
                }
            }
            CmdKind::Refresh | CmdKind::RefreshBank => {
                if matches!(self.normal, NormalBuffer::Closed) && !self.pim_lock {
                    ReadyCommand::Ready(cmd)
                } else {
                    ReadyCommand::NotYet
                }
            }
            CmdKind::SrefEnter | CmdKind::SrefExit => ReadyCommand::Ready(cmd),
            CmdKind::GAct | CmdKind::PimPrecharge | CmdKind::CompsReadres | CmdKind::Pwrite => {
                ReadyCommand::NotYet // not valid combinations in Newton single-buffer mode
            }
        }
    }

    /// Applies the state transition caused by issuing `cmd` (spec §4.1).
    /// Returns [`SimError::Fatal`] if `cmd` is not a legal transition out of
    /// the current state — this indicates a bug in the caller, since
    /// `ready_command` should always have been consulted first.
    pub fn update_state(&mut self, cmd: Command) -> Result<(), SimError> {
        let row = cmd.address.raw() as u32;
        match cmd.kind {
            CmdKind::Activate => {
                if !matches!(self.normal, NormalBuffer::Closed) {
                    return Err(SimError::fatal(
                        "bank_state",
                        "ACTIVATE issued while normal buffer is not CLOSED",
                    ));
                }
                self.normal = NormalBuffer::Open { row };
            }
            CmdKind::Precharge => {
                if !matches!(self.normal, NormalBuffer::Open { .. }) {
                    return Err(SimError::fatal(
                        "bank_state",
                        "PRECHARGE issued while normal buffer is not OPEN",
                    ));
                }
                self.normal = NormalBuffer::Closed;
            }
            CmdKind::Read | CmdKind::Write | CmdKind::Gwrite | CmdKind::Pwrite => {
                if !matches!(self.normal, NormalBuffer::Open { .. }) {
                    return Err(SimError::fatal(
                        "bank_state",
                        "RD/WR/GWRITE issued while normal buffer is not OPEN",
                    ));
                }
                if !self.dual_buffer && matches!(cmd.kind, CmdKind::Gwrite) {
                    self.pim_lock = true;
                }
            }
            CmdKind::ReadPrecharge | CmdKind::WritePrecharge => {
                if !matches!(self.normal, NormalBuffer::Open { .. }) {
                    return Err(SimError::fatal(
                        "bank_state",
                        "RD/WR+PRECHARGE issued while normal buffer is not OPEN",
                    ));
                }
                self.normal = NormalBuffer::Closed;
            }
            CmdKind::GAct => {
                if self.dual_buffer {
                    if !matches!(self.pim, PimBuffer::Closed) {
                        return Err(SimError::fatal(
                            "bank_state",
                            "G_ACT issued while PIM buffer is not CLOSED",
                        ));
                    }
                    self.pim = PimBuffer::Open { row };
                } else {
                    return Err(SimError::fatal(
                        "bank_state",
                        "G_ACT issued in single-buffer mode",
                    ));
                }
            }
            CmdKind::PimPrecharge => {
                if self.dual_buffer {
                    if !matches!(self.pim, PimBuffer::Open { .. }) {
                        return Err(SimError::fatal(
                            "bank_state",
                            "PIM_PRECHARGE issued while PIM buffer is not OPEN",
                        ));
                    }
                    self.pim = PimBuffer::Closed;
                } else {
                    return Err(SimError::fatal(
                        "bank_state",
                        "PIM_PRECHARGE issued in single-buffer mode",
                    ));
                }
            }
            CmdKind::Comp | CmdKind::CompsReadres => {
                if self.dual_buffer {
                    if !matches!(self.pim, PimBuffer::Open { .. }) {
                        return Err(SimError::fatal(
                            "bank_state",
                            "COMP/COMPS_READRES issued while PIM buffer is not OPEN",
                        ));
                    }
                } else {
                    self.pim_lock = true;
                }
            }
            CmdKind::Readres => {
                // READRES releases the single-buffer pim_lock (spec §4.1).
                self.pim_lock = false;
            }
            CmdKind::PHeader => {
                // Arms subsequent PIM commands; does not touch buffer state
                // (spec §4.4's "does not issue a physical DRAM command").
            }
            CmdKind::Refresh | CmdKind::RefreshBank => {
                if !matches!(self.normal, NormalBuffer::Closed) {
                    return Err(SimError::fatal(
                        "bank_state",
                        "REFRESH issued while normal buffer is not CLOSED",
                    ));
                }
            }
            CmdKind::SrefEnter => self.normal = NormalBuffer::Sref,
            CmdKind::SrefExit => self.normal = NormalBuffer::Closed,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::address::Address;

    fn addr_with_row(row: u32) -> crate::common::address::Address {
        Address::new(u64::from(row))
    }

    #[test]
    fn closed_bank_requires_activate_before_read() {
        let bank = BankState::new(true);
        let read = Command::new(CmdKind::Read, addr_with_row(5));
        assert_eq!(
            bank.ready_command(read, 0),
            ReadyCommand::Prerequisite(Command::new(CmdKind::Activate, addr_with_row(5)))
        );
    }

    #[test]
    fn open_same_row_ready_after_timing_floor() {
        let mut bank = BankState::new(true);
        bank.update_state(Command::new(CmdKind::Activate, addr_with_row(5)))
            .unwrap();
        bank.update_timing(CmdKind::Read, 10);
        let read = Command::new(CmdKind::Read, addr_with_row(5));
        assert_eq!(bank.ready_command(read, 5), ReadyCommand::NotYet);
        assert_eq!(bank.ready_command(read, 10), ReadyCommand::Ready(read));
    }

    #[test]
    fn dual_buffer_normal_and_pim_rows_are_independent() {
        let mut bank = BankState::new(true);
        bank.update_state(Command::new(CmdKind::Activate, addr_with_row(1)))
            .unwrap();
        bank.update_state(Command::new(CmdKind::GAct, addr_with_row(2)))
            .unwrap();
        assert_eq!(bank.normal_state(), NormalBuffer::Open { row: 1 });
        assert_eq!(bank.pim_state(), PimBuffer::Open { row: 2 });
    }

    #[test]
    fn newton_pim_lock_blocks_read_until_readres() {
        let mut bank = BankState::new(false);
        bank.update_state(Command::new(CmdKind::Activate, addr_with_row(1)))
            .unwrap();
        bank.update_state(Command::new(CmdKind::Comp, addr_with_row(1)))
            .unwrap();
        assert!(bank.pim_locked());
        let read = Command::new(CmdKind::Read, addr_with_row(1));
        assert_eq!(bank.ready_command(read, 0), ReadyCommand::NotYet);
        bank.update_state(Command::new(CmdKind::Readres, addr_with_row(1)))
            .unwrap();
        assert!(!bank.pim_locked());
    }
}
