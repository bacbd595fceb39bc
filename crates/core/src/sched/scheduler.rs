//! Top-level sub-batch scheduler (spec §4.5): owns channel assignment, the
//! `B1`/`B2` partition, and the A–F stage cursor.

use crate::config::system::ChLoadBalancing;
use crate::sched::stage::{Stage, StagePlan};
use crate::sched::subbatch::{partition_by_latency, ChannelAssigner};

/// A request actively participating in the stage sequencer, as the
/// scheduler needs to see it: identity, DRAM channel, an estimated MHA
/// latency used for partitioning, and decode progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActiveRequest {
    pub id: u64,
    pub channel: u32,
    pub est_mha_latency: u64,
    pub generated: u32,
    pub output_size: u32,
}

impl ActiveRequest {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.generated >= self.output_size
    }
}

/// Drives the six-stage A–F cycle over the current `B1`/`B2` partition.
#[derive(Clone, Debug)]
pub struct Scheduler {
    assigner: ChannelAssigner,
    stage: Stage,
    n_layer: u32,
    remaining_layers: u32,
    b1: Vec<u64>,
    b2: Vec<u64>,
}

impl Scheduler {
    #[must_use]
    pub fn new(num_channels: u32, ch_load_balancing: ChLoadBalancing, n_layer: u32) -> Self {
        Self {
            assigner: ChannelAssigner::new(num_channels, ch_load_balancing),
            stage: Stage::A,
            n_layer,
            remaining_layers: n_layer,
            b1: Vec::new(),
            b2: Vec::new(),
        }
    }

    /// Assigns a DRAM channel to a newly initiated request and records its
    /// KV footprint (`weight`, in tokens) against that channel's load.
    pub fn assign_channel(&mut self, weight: u64) -> u32 {
        self.assigner.assign(weight)
    }

    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub const fn plan(&self) -> StagePlan {
        self.stage.plan()
    }

    #[must_use]
    pub fn sub_batch_b1(&self) -> &[u64] {
        &self.b1
    }

    #[must_use]
    pub fn sub_batch_b2(&self) -> &[u64] {
        &self.b2
    }

    /// Re-partitions the active set into `B1`/`B2` minimizing the latency
    /// imbalance (spec §4.5, §8 seed scenario 6), resetting the layer
    /// counter for the new cycle. Called once per A–F cycle, at `Finish`.
    pub fn repartition(&mut self, active: &[ActiveRequest]) {
        let latencies: Vec<u64> = active.iter().map(|r| r.est_mha_latency).collect();
        let (b1_idx, b2_idx) = partition_by_latency(&latencies);
        self.b1 = b1_idx.into_iter().map(|i| active[i].id).collect();
        self.b2 = b2_idx.into_iter().map(|i| active[i].id).collect();
        self.remaining_layers = self.n_layer;
    }

    /// Advances to the next stage. Returns the ids of requests whose token
    /// retires this cycle: non-empty only when the sequencer just completed
    /// `Finish` (every request in the current partition advances one token
    /// per full A–F cycle, per spec §4.5).
    pub fn advance(&mut self) -> Vec<u64> {
        if self.stage == Stage::D && self.remaining_layers > 1 {
            self.remaining_layers -= 1;
        }
        let next = self.stage.next(self.remaining_layers);
        let retired = if next == Stage::A && self.stage == Stage::Finish {
            let mut ids = self.b1.clone();
            ids.extend_from_slice(&self.b2);
            ids
        } else {
            Vec::new()
        };
        self.stage = next;
        retired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(id: u64, latency: u64) -> ActiveRequest {
        ActiveRequest { id, channel: 0, est_mha_latency: latency, generated: 0, output_size: 4 }
    }

    #[test]
    fn full_cycle_retires_every_active_request_once() {
        let mut sched = Scheduler::new(2, ChLoadBalancing::RoundRobin, 1);
        sched.repartition(&[req(1, 100), req(2, 200), req(3, 300), req(4, 400)]);
        let mut retired = Vec::new();
        for _ in 0..7 {
            retired = sched.advance();
            if !retired.is_empty() {
                break;
            }
        }
        let mut sorted = retired;
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2, 3, 4]);
    }

    #[test]
    fn multi_layer_loops_c_d_before_reaching_finish() {
        let mut sched = Scheduler::new(1, ChLoadBalancing::RoundRobin, 3);
        sched.repartition(&[req(1, 10)]);
        let stages_seen = {
            let mut seen = Vec::new();
            for _ in 0..12 {
                seen.push(sched.stage());
                sched.advance();
            }
            seen
        };
        let c_count = stages_seen.iter().filter(|&&s| s == Stage::C).count();
        assert_eq!(c_count, 3);
    }
}
