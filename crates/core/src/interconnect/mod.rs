//! Round-robin network-on-chip connecting NPU cores to DRAM channels (spec
//! §4.9): flattened node count, per-channel SA/PIM request queues, and
//! per-hop latency.

use std::collections::VecDeque;

use crate::dram::transaction::Transaction;

/// Which sub-batch a message's producing tile belongs to, used to route a
/// request into the channel's SA or PIM queue (spec §4.5's `stage_platform`,
/// §4.9).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StagePlatform {
    Sa,
    Pim,
}

/// One message in flight on the interconnect: a transaction plus the cycle
/// it was enqueued and the node it is headed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct InFlight {
    transaction: Transaction,
    ready_cycle: u64,
}

/// A single-producer/single-consumer FIFO between one `(src, dest)` pair
/// (spec §5's "Interconnect queues are SP/SC FIFOs per (src, dest) pair").
#[derive(Clone, Debug, Default)]
struct HopQueue {
    entries: VecDeque<InFlight>,
}

impl HopQueue {
    fn push(&mut self, transaction: Transaction, ready_cycle: u64) {
        self.entries.push_back(InFlight { transaction, ready_cycle });
    }

    fn pop_ready(&mut self, now: u64) -> Option<Transaction> {
        if self.entries.front().is_some_and(|m| m.ready_cycle <= now) {
            self.entries.pop_front().map(|m| m.transaction)
        } else {
            None
        }
    }
}

/// Per-channel SA/PIM request queues plus the response path back to each
/// core, round-robin arbitrated with a fixed per-hop latency.
///
/// Node count is `num_cores * dram_channels + dram_channels` (spec §4.9):
/// one in/out buffer per core, one per channel.
#[derive(Clone, Debug)]
pub struct Interconnect {
    num_cores: u32,
    num_channels: u32,
    hop_latency: u64,
    /// `mem_req_q_SA` per channel.
    sa_queues: Vec<HopQueue>,
    /// `mem_req_q_PIM` per channel.
    pim_queues: Vec<HopQueue>,
    /// Response path: one queue per `(core, channel)` pair.
    responses: Vec<HopQueue>,
    next_channel_to_drain: u32,
}

impl Interconnect {
    #[must_use]
    pub fn new(num_cores: u32, num_channels: u32, hop_latency: u64) -> Self {
        Self {
            num_cores,
            num_channels,
            hop_latency,
            sa_queues: (0..num_channels.max(1)).map(|_| HopQueue::default()).collect(),
            pim_queues: (0..num_channels.max(1)).map(|_| HopQueue::default()).collect(),
            responses: (0..(num_cores * num_channels).max(1)).map(|_| HopQueue::default()).collect(),
            next_channel_to_drain: 0,
        }
    }

    #[must_use]
    pub const fn node_count(&self) -> u32 {
        self.num_cores * self.num_channels + self.num_channels
    }

    /// Enqueues a request from a core, routed to the target channel's SA or
    /// PIM queue based on `platform`.
    pub fn send_request(&mut self, channel: u32, platform: StagePlatform, transaction: Transaction, now: u64) {
        let queue = match platform {
            StagePlatform::Sa => &mut self.sa_queues[channel as usize],
            StagePlatform::Pim => &mut self.pim_queues[channel as usize],
        };
        queue.push(transaction, now + self.hop_latency);
    }

    /// Enqueues a response destined for `core`'s in-buffer for `channel`.
    pub fn send_response(&mut self, core: u32, channel: u32, transaction: Transaction, now: u64) {
        let idx = (core * self.num_channels + channel) as usize;
        self.responses[idx].push(transaction, now + self.hop_latency);
    }

    /// Drains one ready request per channel this cycle, round-robin
    /// favoring PIM over SA within a channel (mirrors `CommandQueue::pop`'s
    /// PIM priority, spec §4.3) and advancing which channel is served first
    /// next cycle.
    pub fn drain_requests(&mut self, now: u64) -> Vec<(u32, Transaction)> {
        let mut drained = Vec::new();
        for offset in 0..self.num_channels {
            let ch = (self.next_channel_to_drain + offset) % self.num_channels;
            if let Some(t) = self.pim_queues[ch as usize].pop_ready(now) {
                drained.push((ch, t));
            } else if let Some(t) = self.sa_queues[ch as usize].pop_ready(now) {
                drained.push((ch, t));
            }
        }
        if self.num_channels > 0 {
            self.next_channel_to_drain = (self.next_channel_to_drain + 1) % self.num_channels;
        }
        drained
    }

    /// Drains every ready response for `core`, one per channel.
    pub fn drain_responses(&mut self, core: u32, now: u64) -> Vec<(u32, Transaction)> {
        let mut drained = Vec::new();
        for ch in 0..self.num_channels {
            let idx = (core * self.num_channels + ch) as usize;
            if let Some(t) = self.responses[idx].pop_ready(now) {
                drained.push((ch, t));
            }
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::address::Address;
    use crate::dram::transaction::ReqType;

    #[test]
    fn node_count_flattens_core_channel_pairs_plus_channels() {
        let icnt = Interconnect::new(4, 2, 10);
        assert_eq!(icnt.node_count(), 4 * 2 + 2);
    }

    #[test]
    fn pim_request_drains_before_sa_request_on_same_channel() {
        let mut icnt = Interconnect::new(1, 1, 0);
        let sa = Transaction::new(Address::new(0), ReqType::Read, 0);
        let pim = Transaction::new(Address::new(8), ReqType::Comp, 0);
        icnt.send_request(0, StagePlatform::Sa, sa, 0);
        icnt.send_request(0, StagePlatform::Pim, pim, 0);
        let drained = icnt.drain_requests(0);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].1.req_type, ReqType::Comp);
    }

    #[test]
    fn request_is_not_ready_before_hop_latency_elapses() {
        let mut icnt = Interconnect::new(1, 1, 5);
        let t = Transaction::new(Address::new(0), ReqType::Read, 0);
        icnt.send_request(0, StagePlatform::Sa, t, 0);
        assert!(icnt.drain_requests(4).is_empty());
        assert_eq!(icnt.drain_requests(5).len(), 1);
    }
}
