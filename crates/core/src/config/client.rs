//! Client dataset config (spec §6): request arrival parameters and the CSV
//! dataset (`input_len, channel` columns).
//!
//! No CSV crate appears anywhere in the reference corpus for this kind of
//! two-column dataset, so this parses the handful of columns directly
//! rather than reaching for a dependency the corpus never uses for it.

use serde::Deserialize;

use crate::common::error::SimError;

/// Client-side arrival parameters.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// Fixed decode length assumed for every request (spec's
    /// `output_size`), unless overridden per-request by the dataset.
    pub request_output_len: u32,
    /// Cycles between successive request arrivals when the dataset does
    /// not specify its own arrival schedule.
    pub request_interval: u64,
    pub request_total_cnt: u32,
}

/// One row of the client dataset CSV: `input_len, channel`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatasetRecord {
    pub input_len: u32,
    /// Channel hint for the request, or `None` to let the scheduler assign
    /// round-robin (spec §4.5).
    pub channel: Option<u32>,
}

/// Parses the `input_len, channel` CSV dataset described in spec §6.
///
/// The first line is treated as a header and skipped if it does not parse
/// as two integers. An empty `channel` field means "assign at arrival
/// time" (`DatasetRecord::channel == None`).
pub fn parse_dataset(csv_text: &str) -> Result<Vec<DatasetRecord>, SimError> {
    let mut records = Vec::new();
    for (line_no, line) in csv_text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split(',').map(str::trim);
        let input_len_field = fields.next().ok_or_else(|| {
            SimError::config(format!("dataset line {}: missing input_len", line_no + 1))
        })?;
        let channel_field = fields.next();

        let Ok(input_len) = input_len_field.parse::<u32>() else {
            if line_no == 0 {
                continue; // header row
            }
            return Err(SimError::config(format!(
                "dataset line {}: invalid input_len {input_len_field:?}",
                line_no + 1
            )));
        };
        let channel = match channel_field {
            Some(s) if !s.is_empty() => Some(s.parse::<u32>().map_err(|_| {
                SimError::config(format!(
                    "dataset line {}: invalid channel {s:?}",
                    line_no + 1
                ))
            })?),
            _ => None,
        };
        records.push(DatasetRecord { input_len, channel });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let csv = "input_len,channel\n32,0\n128,\n";
        let records = parse_dataset(csv).unwrap();
        assert_eq!(
            records,
            vec![
                DatasetRecord {
                    input_len: 32,
                    channel: Some(0)
                },
                DatasetRecord {
                    input_len: 128,
                    channel: None
                },
            ]
        );
    }
}
