//! PIM-aware DRAM controller (spec §4): bit-exact bank/channel state
//! machines, per-bank command queues, and refresh scheduling, driven one
//! cycle at a time by [`Simulator`](crate::sim::simulator::Simulator).

pub mod bank_state;
pub mod channel_state;
pub mod command;
pub mod command_queue;
pub mod controller;
pub mod refresh;
pub mod transaction;

pub use bank_state::{BankState, NormalBuffer, PimBuffer, ReadyCommand};
pub use channel_state::{ChannelState, ChannelTiming};
pub use command::{Command, CmdKind, PimPayload};
pub use command_queue::{CommandQueue, SlackLatencyTable};
pub use controller::{CompletionLatency, DramController, StepResult};
pub use refresh::RefreshGenerator;
pub use transaction::{ReqType, Transaction};
