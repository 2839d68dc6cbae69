// ============================================================
// Layer 3 — MoleculeDatapoint Domain Type
// ============================================================
// One labelled example: a molecule graph plus the labels and
// optional precomputed vectors that came with it.
//
// Datapoints are built once when a record is loaded and never
// mutated. Tasks and fold lists hold them behind an Arc, so the
// same datapoint can sit in several lists at once at no cost.

use serde::{Deserialize, Serialize};

use crate::domain::graph::GraphData;

/// Which label a batch iterable emits alongside each graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    /// `bool_label` as 1.0 / 0.0.
    #[default]
    Bool,
    /// `numeric_label` as-is (may be NaN).
    Numeric,
}

/// A single labelled molecule.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeDatapoint {
    /// Name of the task (assay) this record belongs to
    pub task_name: String,

    /// Canonical SMILES string, opaque to this crate
    pub smiles: String,

    /// Binary activity label. A placeholder for regression-only tasks.
    pub bool_label: bool,

    /// Regression target, NaN when not applicable
    pub numeric_label: f32,

    pub fingerprint: Option<Vec<f32>>,
    pub descriptors: Option<Vec<f32>>,

    pub graph: GraphData,
}

impl MoleculeDatapoint {
    /// Build a classification datapoint with no numeric target.
    pub fn classification(
        task_name:  impl Into<String>,
        smiles:     impl Into<String>,
        bool_label: bool,
        graph:      GraphData,
    ) -> Self {
        Self {
            task_name:     task_name.into(),
            smiles:        smiles.into(),
            bool_label,
            numeric_label: f32::NAN,
            fingerprint:   None,
            descriptors:   None,
            graph,
        }
    }

    /// Build a regression datapoint. `bool_label` is set to the placeholder `false`.
    pub fn regression(
        task_name:     impl Into<String>,
        smiles:        impl Into<String>,
        numeric_label: f32,
        graph:         GraphData,
    ) -> Self {
        Self {
            task_name:     task_name.into(),
            smiles:        smiles.into(),
            bool_label:    false,
            numeric_label,
            fingerprint:   None,
            descriptors:   None,
            graph,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: Vec<f32>) -> Self {
        self.fingerprint = Some(fingerprint);
        self
    }

    pub fn with_descriptors(mut self, descriptors: Vec<f32>) -> Self {
        self.descriptors = Some(descriptors);
        self
    }

    /// The label this datapoint contributes to a label vector.
    pub fn label(&self, kind: LabelKind) -> f32 {
        match kind {
            LabelKind::Bool    => if self.bool_label { 1.0 } else { 0.0 },
            LabelKind::Numeric => self.numeric_label,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::FeatureMatrix;

    fn graph() -> GraphData {
        GraphData::new(FeatureMatrix::new(vec![0.0; 4], 2).unwrap(), vec![vec![[0, 1]]], None).unwrap()
    }

    #[test]
    fn test_label_kinds() {
        let dp = MoleculeDatapoint::classification("t", "CCO", true, graph());
        assert_eq!(dp.label(LabelKind::Bool), 1.0);
        assert!(dp.label(LabelKind::Numeric).is_nan());

        let dp = MoleculeDatapoint::regression("t", "CCO", -7.5, graph());
        assert_eq!(dp.label(LabelKind::Bool), 0.0);
        assert_eq!(dp.label(LabelKind::Numeric), -7.5);
    }
}
