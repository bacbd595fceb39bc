//! The six-stage A–F sequencer that time-multiplexes the systolic array
//! (SA) and PIM banks across two interleaved sub-batches (spec §4.5).

/// One of the six stages of the sub-batch pipeline. `Finish` is a seventh,
/// synthetic stage: it retires one generated token per request in the
/// outgoing sub-batch and is not part of the A–F cycle itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    A,
    B,
    C,
    D,
    E,
    F,
    Finish,
}

/// Which sub-batch (`B1` or `B2`) a piece of work belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubBatch {
    B1,
    B2,
}

/// What runs on the systolic array and what runs on PIM during a stage
/// (spec §4.5's stage table). `None` means the resource is idle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StagePlan {
    pub sa: Option<SaWork>,
    pub pim: Option<SubBatch>,
}

/// Systolic-array work for a stage: which sub-batch and which operation
/// kind. `C`/`D` run both `Proj/FFN` for one sub-batch and `QKVgen` for the
/// other concurrently on the SA, so both are represented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaWork {
    QkvGen(SubBatch),
    ProjFfn(SubBatch),
    ProjFfnAndQkvGen { proj_ffn: SubBatch, qkv_gen: SubBatch },
}

impl Stage {
    /// The stage plan for this stage (spec §4.5 table).
    #[must_use]
    pub const fn plan(self) -> StagePlan {
        match self {
            Stage::A => StagePlan { sa: Some(SaWork::QkvGen(SubBatch::B1)), pim: None },
            Stage::B => StagePlan { sa: Some(SaWork::QkvGen(SubBatch::B2)), pim: Some(SubBatch::B1) },
            Stage::C => StagePlan {
                sa: Some(SaWork::ProjFfnAndQkvGen { proj_ffn: SubBatch::B1, qkv_gen: SubBatch::B1 }),
                pim: Some(SubBatch::B2),
            },
            Stage::D => StagePlan {
                sa: Some(SaWork::ProjFfnAndQkvGen { proj_ffn: SubBatch::B2, qkv_gen: SubBatch::B2 }),
                pim: Some(SubBatch::B1),
            },
            Stage::E => StagePlan { sa: Some(SaWork::ProjFfn(SubBatch::B1)), pim: Some(SubBatch::B2) },
            Stage::F => StagePlan { sa: Some(SaWork::ProjFfn(SubBatch::B2)), pim: None },
            Stage::Finish => StagePlan { sa: None, pim: None },
        }
    }

    /// The stage that follows this one. Layers beyond the first cycle
    /// `C ↔ D` (spec §4.5's "layers > 1 cycle C↔D") rather than advancing
    /// straight through to `E`; `remaining_layers` is the layer count still
    /// to process for the current sub-batch pair, decremented each time the
    /// sequencer loops back from `D` to `C`.
    #[must_use]
    pub const fn next(self, remaining_layers: u32) -> Stage {
        match self {
            Stage::A => Stage::B,
            Stage::B => Stage::C,
            Stage::C => Stage::D,
            Stage::D => {
                if remaining_layers > 1 {
                    Stage::C
                } else {
                    Stage::E
                }
            }
            Stage::E => Stage::F,
            Stage::F => Stage::Finish,
            Stage::Finish => Stage::A,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_loop_revisits_c_before_advancing_to_e() {
        assert_eq!(Stage::D.next(3), Stage::C);
        assert_eq!(Stage::D.next(1), Stage::E);
    }

    #[test]
    fn stage_b_runs_mha_for_b1_while_sa_starts_b2() {
        let plan = Stage::B.plan();
        assert_eq!(plan.sa, Some(SaWork::QkvGen(SubBatch::B2)));
        assert_eq!(plan.pim, Some(SubBatch::B1));
    }
}
