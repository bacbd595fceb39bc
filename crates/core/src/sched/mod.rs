//! Sub-batch scheduler: request-to-channel assignment, `B1`/`B2`
//! partitioning, and the six-stage A–F sequencer (spec §4.5).

pub mod scheduler;
pub mod stage;
pub mod subbatch;

pub use scheduler::{ActiveRequest, Scheduler};
pub use stage::{SaWork, Stage, StagePlan, SubBatch};
pub use subbatch::{partition_by_latency, ChannelAssigner};
