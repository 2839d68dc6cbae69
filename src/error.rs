// ============================================================
// Error Types
// ============================================================
// Every failure the core can report, split by concern:
//
//   GraphDataError — a molecule graph breaks a structural
//                    invariant (bad index, ragged features).
//                    Always fatal: it means upstream data is
//                    corrupt, so nothing here tries to repair it.
//
//   SamplingError  — a task cannot satisfy the requested fold
//                    sizes or class balance. Always surfaced,
//                    never silently shrunk.
//
//   DataError      — the crate-wide aggregate, plus usage errors
//                    (asking a regression task for a label ratio)
//                    and configuration errors.
//
// All errors are deterministic: the same inputs reproduce the
// same error on every run.

use std::fmt;

use crate::domain::task::{Fold, LabelClass};

/// Structural invariant violations inside a single molecule graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphDataError {
    /// An adjacency pair points outside the node feature matrix.
    #[error(
        "adjacency index {index} out of range in edge type {edge_type} \
         (pair {pair}); graph has {num_nodes} nodes"
    )]
    AdjacencyIndexOutOfRange {
        edge_type: usize,
        pair:      usize,
        index:     usize,
        num_nodes: usize,
    },

    /// Edge features for one edge type do not line up with its adjacency list.
    #[error("edge type {edge_type} has {adjacency_rows} adjacency pairs but {feature_rows} edge feature rows")]
    EdgeFeatureRowMismatch {
        edge_type:      usize,
        adjacency_rows: usize,
        feature_rows:   usize,
    },

    /// Edge features were given for a different number of edge types.
    #[error("expected edge features for {expected} edge types, got {got}")]
    EdgeTypeCountMismatch { expected: usize, got: usize },

    /// A molecule graph with no atoms. Every graph in a batch must own at
    /// least one node row, or node_to_graph loses track of it.
    #[error("graph has no nodes")]
    NoNodes,

    /// A feature matrix row count does not divide its flat buffer.
    #[error("feature buffer of {len} values cannot be split into rows of width {width}")]
    RaggedFeatures { len: usize, width: usize },

    /// A feature matrix was built with zero-width rows but non-empty data.
    #[error("feature matrix width must be positive")]
    ZeroWidth,

    /// A graph's node features do not match the width already in a batch.
    #[error("node feature width mismatch: batch has width {expected}, graph has width {got}")]
    NodeFeatureWidthMismatch { expected: usize, got: usize },

    /// A graph's edge features for one edge type do not match the batch.
    #[error("edge feature width mismatch in edge type {edge_type}: batch has width {expected}, graph has width {got}")]
    EdgeFeatureWidthMismatch {
        edge_type: usize,
        expected:  usize,
        got:       usize,
    },

    /// Fingerprint or descriptor vectors of different lengths in one batch.
    #[error("{vector} length mismatch: batch has length {expected}, datapoint has length {got}")]
    VectorLengthMismatch {
        vector:   &'static str,
        expected: usize,
        got:      usize,
    },
}

/// Raised when a task cannot be split the way a sampler was asked to.
///
/// Every variant carries the task name plus the requested and available
/// counts, so the failure can be diagnosed from the message alone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SamplingError {
    /// The task has fewer datapoints than all folds together require.
    #[error("task {task_name}: {requested} datapoints requested across folds, only {available} available")]
    DatasetTooSmall {
        task_name: String,
        requested: usize,
        available: usize,
    },

    /// One label class lacks enough members.
    #[error("task {task_name}: {class} class needs {requested} datapoints, only {available} available")]
    DatasetClassTooSmall {
        task_name: String,
        class:     LabelClass,
        requested: usize,
        available: usize,
    },

    /// A specific fold cannot be filled to its requested size.
    #[error("task {task_name}: {fold} fold needs {requested} datapoints, only {available} available")]
    FoldTooSmall {
        task_name: String,
        fold:      Fold,
        requested: usize,
        available: usize,
    },
}

impl SamplingError {
    /// The name of the task that failed to sample.
    pub fn task_name(&self) -> &str {
        match self {
            SamplingError::DatasetTooSmall { task_name, .. }
            | SamplingError::DatasetClassTooSmall { task_name, .. }
            | SamplingError::FoldTooSmall { task_name, .. } => task_name,
        }
    }
}

/// Property requested on a regression task that only exists for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationProperty {
    PosLabelRatio,
    TrainPosLabelRatio,
    ValidPosLabelRatio,
    TestPosLabelRatio,
    ClassBalancedSampling,
}

impl fmt::Display for ClassificationProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClassificationProperty::PosLabelRatio         => "pos_label_ratio",
            ClassificationProperty::TrainPosLabelRatio    => "train_pos_label_ratio",
            ClassificationProperty::ValidPosLabelRatio    => "valid_pos_label_ratio",
            ClassificationProperty::TestPosLabelRatio     => "test_pos_label_ratio",
            ClassificationProperty::ClassBalancedSampling => "class-balanced sampling",
        };
        f.write_str(name)
    }
}

/// All errors produced by this crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error(transparent)]
    Graph(#[from] GraphDataError),

    #[error(transparent)]
    Sampling(#[from] SamplingError),

    /// Classification-only property requested on a regression task.
    #[error("{property} is not defined for regression task {task_name}")]
    UndefinedForRegression {
        task_name: String,
        property:  ClassificationProperty,
    },

    /// The multitask iterable met a task missing from the name→id map.
    #[error("task {0} has no entry in the task id mapping")]
    UnknownTask(String),

    /// A tensor batch was requested from zero datapoints.
    #[error("cannot build a tensor batch from zero datapoints")]
    EmptyBatch,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl DataError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        DataError::InvalidConfig(msg.into())
    }
}

/// Convenience Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, DataError>;
