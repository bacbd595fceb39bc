//! The request-arrival client (spec §1's external collaborator, specified
//! here as a concrete dataset-driven implementation): turns dataset rows
//! into `InferRequest`s at a fixed arrival cadence.

use std::collections::VecDeque;

use crate::config::client::{ClientConfig, DatasetRecord};

/// One in-flight or completed inference request (spec §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InferRequest {
    pub id: u64,
    pub arrival_cycle: u64,
    pub completed_cycle: Option<u64>,
    pub input_size: u32,
    pub output_size: u32,
    pub is_initiated: bool,
    pub generated: u32,
    pub channel: Option<u32>,
}

impl InferRequest {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.generated >= self.output_size
    }

    /// Records one generated token, marking completion at `now` once the
    /// target output length is reached (spec §8: `generated == output_size`
    /// and `completed_cycle >= arrival_cycle`).
    pub fn record_token(&mut self, now: u64) {
        self.generated += 1;
        if self.is_complete() {
            self.completed_cycle = Some(now);
        }
    }
}

/// Emits `InferRequest`s from a parsed dataset at `request_interval`-cycle
/// spacing, assigning sequential ids.
#[derive(Clone, Debug)]
pub struct Client {
    records: VecDeque<DatasetRecord>,
    next_id: u64,
    request_interval: u64,
    default_output_len: u32,
    next_arrival_cycle: u64,
}

impl Client {
    #[must_use]
    pub fn new(config: &ClientConfig, records: Vec<DatasetRecord>) -> Self {
        Self {
            records: records.into_iter().take(config.request_total_cnt as usize).collect(),
            next_id: 0,
            request_interval: config.request_interval,
            default_output_len: config.request_output_len,
            next_arrival_cycle: 0,
        }
    }

    /// Whether the dataset has no more requests to emit (spec_full §4 Open
    /// Question #3: a fully-drained client is a clean end-of-run signal,
    /// not an error).
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.records.is_empty()
    }

    /// Emits the next request if its scheduled arrival cycle has passed.
    pub fn poll(&mut self, now: u64) -> Option<InferRequest> {
        if now < self.next_arrival_cycle {
            return None;
        }
        let record = self.records.pop_front()?;
        let id = self.next_id;
        self.next_id += 1;
        self.next_arrival_cycle = now + self.request_interval;
        Some(InferRequest {
            id,
            arrival_cycle: now,
            completed_cycle: None,
            input_size: record.input_len,
            output_size: self.default_output_len,
            is_initiated: false,
            generated: 0,
            channel: record.channel,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig { request_output_len: 4, request_interval: 10, request_total_cnt: 2 }
    }

    #[test]
    fn client_emits_requests_at_fixed_interval() {
        let records = vec![
            DatasetRecord { input_len: 16, channel: None },
            DatasetRecord { input_len: 32, channel: Some(1) },
        ];
        let mut client = Client::new(&config(), records);
        assert!(client.poll(0).is_some());
        assert!(client.poll(5).is_none());
        assert!(client.poll(10).is_some());
        assert!(client.is_exhausted());
    }

    #[test]
    fn request_completes_once_generated_reaches_output_size() {
        let mut req = InferRequest {
            id: 0,
            arrival_cycle: 0,
            completed_cycle: None,
            input_size: 16,
            output_size: 2,
            is_initiated: true,
            generated: 1,
            channel: None,
        };
        req.record_token(50);
        assert!(req.is_complete());
        assert_eq!(req.completed_cycle, Some(50));
    }
}
