//! Ties the client, sub-batch scheduler, and per-request bookkeeping into
//! the closure spec §1 describes as "Client → scheduler → core → memory →
//! response" — the orchestration layer [`Simulator`](crate::sim::simulator::Simulator)
//! drives once per stage cycle.

use crate::config::system::ChLoadBalancing;
use crate::request::client::{Client, InferRequest};
use crate::sched::scheduler::{ActiveRequest, Scheduler};
use crate::sched::stage::{StagePlan, SubBatch};

/// Admits arrivals, tracks the active-request set, and retires completed
/// requests as the stage sequencer finishes A–F cycles.
#[derive(Debug)]
pub struct Orchestrator {
    client: Client,
    scheduler: Scheduler,
    max_active_reqs: u32,
    max_batch_size: u32,
    active: Vec<InferRequest>,
    completed: Vec<InferRequest>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        client: Client,
        num_channels: u32,
        ch_load_balancing: ChLoadBalancing,
        n_layer: u32,
        max_active_reqs: u32,
        max_batch_size: u32,
    ) -> Self {
        Self {
            client,
            scheduler: Scheduler::new(num_channels, ch_load_balancing, n_layer),
            max_active_reqs,
            max_batch_size,
            active: Vec::new(),
            completed: Vec::new(),
        }
    }

    #[must_use]
    pub fn active_requests(&self) -> &[InferRequest] {
        &self.active
    }

    #[must_use]
    pub fn completed_requests(&self) -> &[InferRequest] {
        &self.completed
    }

    /// Whether there is nothing left to do: the dataset is drained, and no
    /// request is in flight (spec_full §4 Open Question #3's clean-exit
    /// condition).
    #[must_use]
    pub fn is_drained(&self) -> bool {
        self.client.is_exhausted() && self.active.is_empty()
    }

    /// Admits newly arrived requests up to the batching limits, assigning
    /// each a channel and marking it initiated.
    fn admit_arrivals(&mut self, now: u64) {
        while self.active.len() < self.max_active_reqs as usize && self.active.len() < self.max_batch_size as usize {
            let Some(mut req) = self.client.poll(now) else { break };
            let channel = req.channel.unwrap_or_else(|| self.scheduler.assign_channel(u64::from(req.input_size)));
            req.channel = Some(channel);
            req.is_initiated = true;
            self.active.push(req);
        }
    }

    /// Repartitions the scheduler's sub-batches from the current active
    /// set's estimated MHA latencies (spec §4.5).
    fn repartition(&self) -> Vec<ActiveRequest> {
        self.active
            .iter()
            .map(|r| ActiveRequest {
                id: r.id,
                channel: r.channel.unwrap_or(0),
                est_mha_latency: u64::from(r.input_size),
                generated: r.generated,
                output_size: r.output_size,
            })
            .collect()
    }

    #[must_use]
    pub fn stage_plan(&self) -> StagePlan {
        self.scheduler.plan()
    }

    /// The active requests currently assigned to `batch` (spec §4.5's
    /// per-stage `StageProgram` materialization needs the actual request
    /// set, not just the ids the scheduler tracks).
    #[must_use]
    pub fn requests_in(&self, batch: SubBatch) -> Vec<&InferRequest> {
        let ids: &[u64] = match batch {
            SubBatch::B1 => self.scheduler.sub_batch_b1(),
            SubBatch::B2 => self.scheduler.sub_batch_b2(),
        };
        self.active.iter().filter(|r| ids.contains(&r.id)).collect()
    }

    /// Drives one stage-sequencer step: admits arrivals, (re)partitions on
    /// change, and on a Finish→A transition retires one token per active
    /// request, moving fully-generated requests into `completed`.
    pub fn tick(&mut self, now: u64) -> Vec<InferRequest> {
        let had_active = self.active.len();
        self.admit_arrivals(now);
        if self.active.len() != had_active {
            let snapshot = self.repartition();
            self.scheduler.repartition(&snapshot);
        }

        let retired_ids = self.scheduler.advance();
        if retired_ids.is_empty() {
            return Vec::new();
        }

        let mut just_completed = Vec::new();
        self.active.retain_mut(|req| {
            if retired_ids.contains(&req.id) {
                req.record_token(now);
            }
            if req.is_complete() {
                just_completed.push(req.clone());
                false
            } else {
                true
            }
        });
        for req in &just_completed {
            self.completed.push(req.clone());
        }
        just_completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::client::{ClientConfig, DatasetRecord};

    fn orchestrator() -> Orchestrator {
        let config = ClientConfig { request_output_len: 1, request_interval: 0, request_total_cnt: 1 };
        let client = Client::new(&config, vec![DatasetRecord { input_len: 16, channel: Some(0) }]);
        Orchestrator::new(client, 1, ChLoadBalancing::RoundRobin, 1, 4, 4)
    }

    #[test]
    fn single_request_drains_to_completion_over_full_cycles() {
        let mut orch = orchestrator();
        let mut completed = Vec::new();
        for cycle in 0..20 {
            completed.extend(orch.tick(cycle));
            if orch.is_drained() {
                break;
            }
        }
        assert_eq!(completed.len(), 1);
        assert!(orch.is_drained());
    }
}
