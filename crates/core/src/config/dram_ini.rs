//! DRAM timing `.ini` parser (spec §6): industry-standard per-device timing
//! file (`tCK`, `tRCD`, `tRP`, `tRAS`, `tFAW`, ...), consumed as opaque
//! per-protocol constants (spec §1 out-of-scope boundary — the values
//! themselves are never second-guessed, only looked up by name).

use std::collections::HashMap;

use crate::common::error::SimError;

/// A parsed DRAM timing table: `key = value` pairs (cycles, unless noted),
/// `#`-prefixed comments and blank lines ignored.
#[derive(Clone, Debug, Default)]
pub struct DramTiming {
    values: HashMap<String, u64>,
}

impl DramTiming {
    /// Parses `.ini`-style `KEY = VALUE` lines. Unknown keys are kept but
    /// never consulted; missing keys fail lookup only when asked for via
    /// [`Self::get`], not eagerly at parse time (the embedded timing tables
    /// are an opaque external collaborator per spec §1).
    pub fn parse(text: &str) -> Result<Self, SimError> {
        let mut values = HashMap::new();
        for (line_no, raw_line) in text.lines().enumerate() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(SimError::config(format!(
                    "dram ini line {}: expected KEY = VALUE, got {raw_line:?}",
                    line_no + 1
                )));
            };
            let key = key.trim().to_string();
            let value: u64 = value.trim().parse().map_err(|_| {
                SimError::config(format!(
                    "dram ini line {}: invalid integer value {value:?}",
                    line_no + 1
                ))
            })?;
            values.insert(key, value);
        }
        Ok(Self { values })
    }

    /// Looks up a timing constant by name (e.g. `"tRCD"`), falling back to
    /// `default` if absent.
    #[must_use]
    pub fn get(&self, key: &str, default: u64) -> u64 {
        self.values.get(key).copied().unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comments_and_pairs() {
        let text = "# timing table\ntCK = 1\ntRCD=18\n\ntRP = 18 # precharge\n";
        let timing = DramTiming::parse(text).unwrap();
        assert_eq!(timing.get("tRCD", 0), 18);
        assert_eq!(timing.get("tRP", 0), 18);
        assert_eq!(timing.get("missing", 42), 42);
    }
}
