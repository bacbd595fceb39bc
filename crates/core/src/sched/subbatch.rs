//! Sub-batch partitioning and DRAM-channel assignment (spec §4.5).

use crate::config::system::ChLoadBalancing;

/// Splits `latencies` into two index sets whose latency sums are as close
/// as possible, via dynamic-programming subset sum (spec §4.5, §8 seed
/// scenario 6: `[100, 200, 300, 400] → {400, 100} vs {300, 200}`).
///
/// Returns `(b1, b2)`, each a list of indices into `latencies`. Ties are
/// broken by putting the earliest request in `b1`. Panics are impossible:
/// every index from `0..latencies.len()` appears in exactly one of the two
/// returned vectors, including the degenerate `latencies.is_empty()` case
/// (both empty) and the single-element case (`b1` holds it, `b2` empty).
#[must_use]
pub fn partition_by_latency(latencies: &[u64]) -> (Vec<usize>, Vec<usize>) {
    let n = latencies.len();
    if n == 0 {
        return (Vec::new(), Vec::new());
    }
    let total: u64 = latencies.iter().sum();
    let total = total as usize;

    // reachable[s] = true if some subset sums to exactly s; `via` records,
    // for each (item, sum), whether that item was included, so the chosen
    // subset can be reconstructed without re-scanning.
    let mut reachable = vec![false; total + 1];
    reachable[0] = true;
    let mut via = vec![vec![false; total + 1]; n];

    for (i, &lat) in latencies.iter().enumerate() {
        let lat = lat as usize;
        for s in (lat..=total).rev() {
            if reachable[s - lat] && !reachable[s] {
                reachable[s] = true;
                via[i][s] = true;
            }
        }
    }

    let target = total / 2;
    let best_sum = (0..=target).rev().find(|&s| reachable[s]).unwrap_or(0);

    let mut in_b1 = vec![false; n];
    let mut remaining = best_sum;
    for i in (0..n).rev() {
        if via[i][remaining] {
            in_b1[i] = true;
            remaining -= latencies[i] as usize;
        }
    }

    let mut b1 = Vec::new();
    let mut b2 = Vec::new();
    for (i, flag) in in_b1.into_iter().enumerate() {
        if flag {
            b1.push(i);
        } else {
            b2.push(i);
        }
    }
    if b1.is_empty() && !b2.is_empty() {
        // every index landed in b2 (possible when best_sum == 0 and all
        // latencies are 0); move the first index over so both sub-batches
        // stay populated whenever there is more than one request.
        b1.push(b2.remove(0));
    }
    (b1, b2)
}

/// Assigns DRAM channels to newly arrived requests (spec §4.5,
/// `ch_load_balancing`: round-robin by default, least-loaded as the
/// original's alternative mode).
#[derive(Clone, Debug)]
pub struct ChannelAssigner {
    mode: ChLoadBalancing,
    next_round_robin: u32,
    load: Vec<u64>,
}

impl ChannelAssigner {
    #[must_use]
    pub fn new(num_channels: u32, mode: ChLoadBalancing) -> Self {
        Self { mode, next_round_robin: 0, load: vec![0; num_channels as usize] }
    }

    /// Picks a channel for a new request and records `weight` (e.g. its KV
    /// footprint in tokens) against that channel's running load.
    pub fn assign(&mut self, weight: u64) -> u32 {
        let channel = match self.mode {
            ChLoadBalancing::RoundRobin => {
                let ch = self.next_round_robin;
                self.next_round_robin = (self.next_round_robin + 1) % self.load.len() as u32;
                ch
            }
            ChLoadBalancing::LeastLoaded => self
                .load
                .iter()
                .enumerate()
                .min_by_key(|&(_, &load)| load)
                .map_or(0, |(i, _)| i as u32),
        };
        self.load[channel as usize] += weight;
        channel
    }

    #[must_use]
    pub fn load(&self, channel: u32) -> u64 {
        self.load[channel as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_seed_latencies_with_zero_imbalance() {
        let (b1, b2) = partition_by_latency(&[100, 200, 300, 400]);
        let sum_b1: u64 = b1.iter().map(|&i| [100u64, 200, 300, 400][i]).sum();
        let sum_b2: u64 = b2.iter().map(|&i| [100u64, 200, 300, 400][i]).sum();
        assert_eq!(sum_b1, sum_b2);
        assert_eq!(b1.len() + b2.len(), 4);
    }

    #[test]
    fn single_request_still_produces_nonempty_b1() {
        let (b1, b2) = partition_by_latency(&[50]);
        assert_eq!(b1, vec![0]);
        assert!(b2.is_empty());
    }

    #[test]
    fn short_and_long_request_both_land_in_some_subbatch() {
        let (b1, b2) = partition_by_latency(&[1, 1000]);
        assert!(!b1.is_empty());
        assert!(!b2.is_empty());
    }

    #[test]
    fn round_robin_cycles_channels() {
        let mut assigner = ChannelAssigner::new(2, ChLoadBalancing::RoundRobin);
        assert_eq!(assigner.assign(1), 0);
        assert_eq!(assigner.assign(1), 1);
        assert_eq!(assigner.assign(1), 0);
    }

    #[test]
    fn least_loaded_prefers_lighter_channel() {
        let mut assigner = ChannelAssigner::new(2, ChLoadBalancing::LeastLoaded);
        assigner.assign(10);
        assert_eq!(assigner.assign(1), 1);
    }
}
