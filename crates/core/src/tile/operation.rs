//! Operation graph nodes (spec §4.6): each [`Operation`] owns its input/
//! output tensor handles, a queue of compiled tiles, and aggregated stats;
//! it becomes executable once every input is marked produced.

use crate::stats::OpStat;
use crate::tile::handle::Handle;
use crate::tile::tile::Tile;

/// What kind of operation this node lowers to (spec §4.6.1–§4.6.4, plus the
/// supplemented `Microbench` variant from spec_full §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    MatMul,
    LayerNorm,
    Softmax,
    Add,
    Gelu,
    PimLogitSoftmax,
    PimAttend,
    FusedMha,
    Reshape,
    Split,
    Concat,
    SplitDecoding,
    Microbench,
}

/// A symbolic identifier for a tensor produced/consumed by the operation
/// graph (distinct from any one tile's scratchpad addressing).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TensorId(pub u32);

/// One node of the operation graph.
#[derive(Debug)]
pub struct Operation {
    pub kind: OperationKind,
    pub inputs: Vec<TensorId>,
    pub outputs: Vec<TensorId>,
    pub tiles: Vec<Handle<Tile>>,
    pub stat: OpStat,
}

impl Operation {
    #[must_use]
    pub fn new(kind: OperationKind, inputs: Vec<TensorId>, outputs: Vec<TensorId>) -> Self {
        Self { kind, inputs, outputs, tiles: Vec::new(), stat: OpStat::new(kind_name(kind)) }
    }

    /// Whether every input tensor has been marked produced by its upstream
    /// operation (spec §4.6's executability test).
    #[must_use]
    pub fn is_executable(&self, produced: &std::collections::HashSet<TensorId>) -> bool {
        self.inputs.iter().all(|t| produced.contains(t))
    }
}

const fn kind_name(kind: OperationKind) -> &'static str {
    match kind {
        OperationKind::MatMul => "MatMul",
        OperationKind::LayerNorm => "LayerNorm",
        OperationKind::Softmax => "Softmax",
        OperationKind::Add => "Add",
        OperationKind::Gelu => "Gelu",
        OperationKind::PimLogitSoftmax => "PimLogitSoftmax",
        OperationKind::PimAttend => "PimAttend",
        OperationKind::FusedMha => "FusedMha",
        OperationKind::Reshape => "Reshape",
        OperationKind::Split => "Split",
        OperationKind::Concat => "Concat",
        OperationKind::SplitDecoding => "SplitDecoding",
        OperationKind::Microbench => "Microbench",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn operation_is_executable_once_all_inputs_produced() {
        let op = Operation::new(OperationKind::MatMul, vec![TensorId(0), TensorId(1)], vec![TensorId(2)]);
        let mut produced = HashSet::new();
        assert!(!op.is_executable(&produced));
        produced.insert(TensorId(0));
        produced.insert(TensorId(1));
        assert!(op.is_executable(&produced));
    }
}
