// ============================================================
// molgraph-fewshot
// ============================================================
// Few-shot molecular property prediction data pipeline:
// splitting assay tasks into train / valid / test folds and
// packing molecule graphs of different sizes into batches.
//
//   Layer 2 — application  multitask batch stream
//   Layer 3 — domain       graphs, datapoints, tasks, TaskSampler
//   Layer 4 — data         batcher, batch iterable, samplers, dataset
//   Layer 5 — ml           Burn tensor conversion
//   Layer 6 — infra        configuration persistence
//
// The library never installs a tracing subscriber; the
// application embedding it decides where logs go.

pub mod application;
pub mod data;
pub mod domain;
pub mod error;
pub mod infra;
pub mod ml;

pub use application::multitask::{
    MultitaskBatch, MultitaskBatchIterable, MultitaskConfig, OnSamplingError, TaskSelection,
};
pub use data::batch_iter::{BatchIterable, LabelledBatch, Shuffle};
pub use data::batcher::{AddOutcome, Batch, BatcherConfig, GraphBatcher};
pub use data::dataset::MoleculeDataset;
pub use data::sampler::{
    BalancedTaskSampler, FoldSize, RandomTaskSampler, SamplerConfig, SamplerKind, StratifiedTaskSampler,
};
pub use domain::datapoint::{LabelKind, MoleculeDatapoint};
pub use domain::graph::{FeatureMatrix, GraphData};
pub use domain::task::{Fold, LabelClass, Task, TaskKind, TaskSample};
pub use domain::traits::TaskSampler;
pub use error::{ClassificationProperty, DataError, GraphDataError, Result, SamplingError};
pub use infra::config::{ConfigStore, DataConfig};
pub use ml::tensors::{GraphBatchTensors, GraphTensorBatcher};
