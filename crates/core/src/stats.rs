//! Per-operation and per-stage statistics (spec §6 Logs, spec_full §3:
//! grounded on `original_source/src/Stat.h`). Written out as the fixed-
//! column TSV the spec's Logs section describes.

use std::fmt::Write as _;

use crate::dram::command::CmdKind;

/// Accumulated statistics for one [`crate::tile::operation::Operation`]
/// (spec_full §3).
#[derive(Clone, Debug, PartialEq)]
pub struct OpStat {
    pub name: &'static str,
    pub start_cycle: Option<u64>,
    pub end_cycle: Option<u64>,
    pub compute_cycles: u64,
    pub memory_reads: u64,
    pub memory_writes: u64,
    pub read_bandwidth_bytes: u64,
    pub write_bandwidth_bytes: u64,
    /// Fraction of core-cycles this operation kept the systolic/vector
    /// pipeline busy, in the `[0.0, 1.0]` range.
    pub npu_utilization: f64,
}

impl OpStat {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            start_cycle: None,
            end_cycle: None,
            compute_cycles: 0,
            memory_reads: 0,
            memory_writes: 0,
            read_bandwidth_bytes: 0,
            write_bandwidth_bytes: 0,
            npu_utilization: 0.0,
        }
    }

    pub fn record_start(&mut self, cycle: u64) {
        self.start_cycle.get_or_insert(cycle);
    }

    pub fn record_end(&mut self, cycle: u64) {
        self.end_cycle = Some(cycle);
    }

    fn tsv_row(&self) -> String {
        let mut row = String::new();
        let _ = write!(
            row,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.4}",
            self.name,
            self.start_cycle.unwrap_or(0),
            self.end_cycle.unwrap_or(0),
            self.compute_cycles,
            self.memory_reads,
            self.memory_writes,
            self.read_bandwidth_bytes,
            self.write_bandwidth_bytes,
            self.npu_utilization
        );
        row
    }
}

const OP_STAT_HEADER: &str =
    "OpName\tStartCycle\tEndCycle\tComputeCycles\tMemoryReads\tMemoryWrites\tReadBandwidth\tWriteBandwidth\tNpuUtilization";

/// Accumulates [`OpStat`] rows for the whole run and renders them as TSV
/// (spec §6's fixed-column Logs).
#[derive(Clone, Debug, Default)]
pub struct StatLog {
    rows: Vec<OpStat>,
}

impl StatLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stat: OpStat) {
        self.rows.push(stat);
    }

    #[must_use]
    pub fn to_tsv(&self) -> String {
        let mut out = String::from(OP_STAT_HEADER);
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.tsv_row());
            out.push('\n');
        }
        out
    }
}

/// Flat per-`CmdKind` energy increment, in arbitrary energy units (spec.md
/// §1's "no power modeling beyond per-command energy increments" — this is
/// the one form of power accounting this simulator carries).
#[must_use]
const fn energy_increment(kind: CmdKind) -> u64 {
    match kind {
        CmdKind::Activate | CmdKind::Precharge | CmdKind::GAct | CmdKind::PimPrecharge => 4,
        CmdKind::Read | CmdKind::ReadPrecharge | CmdKind::Write | CmdKind::WritePrecharge => 2,
        CmdKind::Comp | CmdKind::CompsReadres => 6,
        CmdKind::Gwrite | CmdKind::Pwrite | CmdKind::PHeader | CmdKind::Readres => 3,
        CmdKind::Refresh | CmdKind::RefreshBank => 8,
        CmdKind::SrefEnter | CmdKind::SrefExit => 1,
    }
}

/// Accumulates energy increments per `CmdKind` across a run.
#[derive(Clone, Debug, Default)]
pub struct EnergyLog {
    totals: [u64; CmdKind::COUNT],
}

impl EnergyLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one issued command's flat energy increment.
    pub fn record(&mut self, kind: CmdKind) {
        self.totals[kind.index()] += energy_increment(kind);
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.totals.iter().sum()
    }

    #[must_use]
    pub fn total_for(&self, kind: CmdKind) -> u64 {
        self.totals[kind.index()]
    }
}

/// Per-stage memory-I/O counters for one DRAM channel (spec §6 Logs).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageIoCounters {
    pub reads: u64,
    pub writes: u64,
    pub pim_comps: u64,
    pub pim_readres: u64,
}

impl StageIoCounters {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// One channel's counters across every stage of one A–F cycle, keyed by
/// stage index `0..=5` (`A..=F`).
#[derive(Clone, Debug, Default)]
pub struct ChannelStageStats {
    pub per_stage: [StageIoCounters; 6],
}

impl ChannelStageStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn to_tsv(&self, channel: u32) -> String {
        let mut out = String::new();
        for (i, counters) in self.per_stage.iter().enumerate() {
            let stage = (b'A' + i as u8) as char;
            let _ = writeln!(
                out,
                "{channel}\t{stage}\t{}\t{}\t{}\t{}",
                counters.reads, counters.writes, counters.pim_comps, counters.pim_readres
            );
        }
        out
    }
}

const STAGE_IO_HEADER: &str = "Channel\tStage\tReads\tWrites\tPimComps\tPimReadres";

/// Renders every channel's per-stage counters as one TSV table.
#[must_use]
pub fn stage_io_to_tsv(per_channel: &[ChannelStageStats]) -> String {
    let mut out = String::from(STAGE_IO_HEADER);
    out.push('\n');
    for (channel, stats) in per_channel.iter().enumerate() {
        out.push_str(&stats.to_tsv(channel as u32));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_stat_tsv_row_has_nine_columns() {
        let mut stat = OpStat::new("MatMul");
        stat.record_start(10);
        stat.record_end(20);
        stat.compute_cycles = 5;
        let mut log = StatLog::new();
        log.push(stat);
        let tsv = log.to_tsv();
        let data_row = tsv.lines().nth(1).unwrap();
        assert_eq!(data_row.split('\t').count(), 9);
    }

    #[test]
    fn stage_io_tsv_has_one_row_per_stage_per_channel() {
        let stats = vec![ChannelStageStats::new(), ChannelStageStats::new()];
        let tsv = stage_io_to_tsv(&stats);
        assert_eq!(tsv.lines().count(), 1 + 2 * 6);
    }

    #[test]
    fn energy_log_accumulates_per_kind_and_total() {
        let mut log = EnergyLog::new();
        log.record(CmdKind::Activate);
        log.record(CmdKind::Activate);
        log.record(CmdKind::Read);
        assert_eq!(log.total_for(CmdKind::Activate), 2 * energy_increment(CmdKind::Activate));
        assert_eq!(log.total(), 2 * energy_increment(CmdKind::Activate) + energy_increment(CmdKind::Read));
    }
}
