// ============================================================
// Layer 3 — Task and TaskSample Domain Types
// ============================================================
// A Task is one prediction target (typically one assay) with all
// of its labelled molecules. A TaskSample is what a sampler makes
// of a Task: three fold lists drawn from the task's datapoints.
//
//   Task ──(TaskSampler)──► TaskSample
//                             ├── train_samples  (support set)
//                             ├── valid_samples  (may be empty)
//                             └── test_samples   (query set)
//
// Datapoints are shared through Arc, so building a sample only
// decides list membership; nothing is copied or mutated.
//
// Two task kinds exist. Classification tasks have a meaningful
// positive-label ratio; regression (binding-affinity) tasks do
// not, and asking them for one is a usage error.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::datapoint::MoleculeDatapoint;
use crate::error::{ClassificationProperty, DataError, Result};

/// The three folds a task sample is split into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fold {
    #[default]
    Train,
    Valid,
    Test,
}

impl Fold {
    pub const ALL: [Fold; 3] = [Fold::Train, Fold::Valid, Fold::Test];
}

impl fmt::Display for Fold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Fold::Train => "train",
            Fold::Valid => "valid",
            Fold::Test  => "test",
        })
    }
}

/// One side of a binary label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelClass {
    Positive,
    Negative,
}

impl LabelClass {
    pub fn of(bool_label: bool) -> Self {
        if bool_label { LabelClass::Positive } else { LabelClass::Negative }
    }
}

impl fmt::Display for LabelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LabelClass::Positive => "positive",
            LabelClass::Negative => "negative",
        })
    }
}

/// Whether a task's target is a binary label or a numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskKind {
    #[default]
    Classification,
    /// Binding-affinity style target; `bool_label` is a placeholder.
    Regression,
}

/// A named collection of datapoints sharing one prediction target.
#[derive(Debug, Clone)]
pub struct Task {
    pub name:    String,
    pub kind:    TaskKind,
    pub samples: Vec<Arc<MoleculeDatapoint>>,
}

impl Task {
    pub fn new(name: impl Into<String>, samples: Vec<Arc<MoleculeDatapoint>>) -> Self {
        Self { name: name.into(), kind: TaskKind::Classification, samples }
    }

    /// A binding-affinity task, whose datapoints carry numeric labels only.
    pub fn regression(name: impl Into<String>, samples: Vec<Arc<MoleculeDatapoint>>) -> Self {
        Self { name: name.into(), kind: TaskKind::Regression, samples }
    }

    /// Wrap owned datapoints.
    pub fn from_datapoints(name: impl Into<String>, datapoints: Vec<MoleculeDatapoint>) -> Self {
        Self::new(name, datapoints.into_iter().map(Arc::new).collect())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of positive and negative datapoints, in that order.
    pub fn class_counts(&self) -> (usize, usize) {
        let pos = self.samples.iter().filter(|s| s.bool_label).count();
        (pos, self.samples.len() - pos)
    }

    /// Fraction of positive labels. Fails on regression tasks.
    pub fn pos_label_ratio(&self) -> Result<f64> {
        self.require_classification(ClassificationProperty::PosLabelRatio)?;
        Ok(pos_ratio(&self.samples))
    }

    /// Fails with `UndefinedForRegression` unless this is a classification task.
    pub fn require_classification(&self, property: ClassificationProperty) -> Result<()> {
        match self.kind {
            TaskKind::Classification => Ok(()),
            TaskKind::Regression => Err(DataError::UndefinedForRegression {
                task_name: self.name.clone(),
                property,
            }),
        }
    }
}

/// The train/valid/test split a sampler produced for one task.
#[derive(Debug, Clone)]
pub struct TaskSample {
    pub name:          String,
    pub kind:          TaskKind,
    pub train_samples: Vec<Arc<MoleculeDatapoint>>,
    pub valid_samples: Vec<Arc<MoleculeDatapoint>>,
    pub test_samples:  Vec<Arc<MoleculeDatapoint>>,
}

impl TaskSample {
    /// The datapoints of one fold.
    pub fn fold(&self, fold: Fold) -> &[Arc<MoleculeDatapoint>] {
        match fold {
            Fold::Train => &self.train_samples,
            Fold::Valid => &self.valid_samples,
            Fold::Test  => &self.test_samples,
        }
    }

    pub fn into_fold(self, fold: Fold) -> Vec<Arc<MoleculeDatapoint>> {
        match fold {
            Fold::Train => self.train_samples,
            Fold::Valid => self.valid_samples,
            Fold::Test  => self.test_samples,
        }
    }

    pub fn train_pos_label_ratio(&self) -> Result<f64> {
        self.ratio_of(Fold::Train, ClassificationProperty::TrainPosLabelRatio)
    }

    pub fn valid_pos_label_ratio(&self) -> Result<f64> {
        self.ratio_of(Fold::Valid, ClassificationProperty::ValidPosLabelRatio)
    }

    pub fn test_pos_label_ratio(&self) -> Result<f64> {
        self.ratio_of(Fold::Test, ClassificationProperty::TestPosLabelRatio)
    }

    fn ratio_of(&self, fold: Fold, property: ClassificationProperty) -> Result<f64> {
        if self.kind == TaskKind::Regression {
            return Err(DataError::UndefinedForRegression {
                task_name: self.name.clone(),
                property,
            });
        }
        Ok(pos_ratio(self.fold(fold)))
    }
}

/// Fraction of positives in a list; NaN for an empty list.
fn pos_ratio(samples: &[Arc<MoleculeDatapoint>]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let pos = samples.iter().filter(|s| s.bool_label).count();
    pos as f64 / samples.len() as f64
}
