//! DRAM/PIM command representation (spec §3 `Command`).

use crate::common::address::Address;

/// The tag of a command issued by the controller to DRAM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmdKind {
    Read,
    ReadPrecharge,
    Write,
    WritePrecharge,
    Activate,
    Precharge,
    Refresh,
    RefreshBank,
    SrefEnter,
    SrefExit,
    Gwrite,
    GAct,
    Comp,
    Readres,
    PimPrecharge,
    Pwrite,
    PHeader,
    CompsReadres,
}

impl CmdKind {
    /// Number of command kinds, for sizing per-kind timing tables.
    pub const COUNT: usize = 18;

    /// A stable index for array-indexed timing tables.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            CmdKind::Read => 0,
            CmdKind::ReadPrecharge => 1,
            CmdKind::Write => 2,
            CmdKind::WritePrecharge => 3,
            CmdKind::Activate => 4,
            CmdKind::Precharge => 5,
            CmdKind::Refresh => 6,
            CmdKind::RefreshBank => 7,
            CmdKind::SrefEnter => 8,
            CmdKind::SrefExit => 9,
            CmdKind::Gwrite => 10,
            CmdKind::GAct => 11,
            CmdKind::Comp => 12,
            CmdKind::Readres => 13,
            CmdKind::PimPrecharge => 14,
            CmdKind::Pwrite => 15,
            CmdKind::PHeader => 16,
            CmdKind::CompsReadres => 17,
        }
    }

    /// Whether this command targets the PIM buffer rather than the normal
    /// DDR buffer of a [`crate::dram::bank_state::BankState`] (spec §4.1).
    #[must_use]
    pub const fn is_pim(self) -> bool {
        matches!(
            self,
            CmdKind::Gwrite
                | CmdKind::GAct
                | CmdKind::Comp
                | CmdKind::Readres
                | CmdKind::PimPrecharge
                | CmdKind::Pwrite
                | CmdKind::PHeader
                | CmdKind::CompsReadres
        )
    }

    /// Whether this command implicitly closes the row it targets.
    #[must_use]
    pub const fn is_precharging(self) -> bool {
        matches!(
            self,
            CmdKind::ReadPrecharge | CmdKind::WritePrecharge | CmdKind::Precharge
        )
    }
}

/// Payload carried by PIM batch commands: batch size and framing flags
/// (spec §3 `Command` `payload`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PimPayload {
    pub num_comps: u32,
    pub num_readres: u32,
    pub is_last_comps: bool,
    pub for_gwrite: bool,
}

/// A command issued by the controller to DRAM (spec §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Command {
    pub kind: CmdKind,
    pub address: Address,
    pub payload: PimPayload,
}

impl Command {
    /// Builds a plain (non-PIM) command with a default payload.
    #[must_use]
    pub const fn new(kind: CmdKind, address: Address) -> Self {
        Self {
            kind,
            address,
            payload: PimPayload {
                num_comps: 0,
                num_readres: 0,
                is_last_comps: false,
                for_gwrite: false,
            },
        }
    }

    /// Builds a PIM command carrying a batch-size payload.
    #[must_use]
    pub const fn with_payload(kind: CmdKind, address: Address, payload: PimPayload) -> Self {
        Self {
            kind,
            address,
            payload,
        }
    }
}
