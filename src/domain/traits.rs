// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seam between "what a split looks like" and "how a split is
// drawn". Code that needs task samples (the multitask iterable,
// an evaluation loop) holds a `dyn TaskSampler` and never cares
// which policy sits behind it.
//
// Implementations (Layer 4, data::sampler):
//   - RandomTaskSampler      → uniform shuffle, then slice
//   - BalancedTaskSampler    → fixed positive/negative ratio
//   - StratifiedTaskSampler  → each fold keeps the task's ratio
//
// Why a blanket impl for Box<S>?
//   SamplerConfig::build hands back Box<dyn TaskSampler>. With
//   the blanket impl that box is itself a TaskSampler, so it can
//   go straight into MultitaskBatchIterable<S> like any concrete
//   sampler.
//
// Reference: Rust Book §10 (Traits), §17 (Trait Objects)

use crate::domain::task::{Task, TaskSample};
use crate::error::Result;

// ─── TaskSampler ──────────────────────────────────────────────────────────────
/// Splits a task into train/valid/test folds.
///
/// Implementations must be deterministic for a given seed and task contents,
/// and must never modify the task: only list membership is computed.
pub trait TaskSampler {
    /// The seed used by [`TaskSampler::sample`].
    fn seed(&self) -> u64;

    /// Draw a sample using an explicit seed.
    fn sample_with_seed(&self, task: &Task, seed: u64) -> Result<TaskSample>;

    /// Draw a sample using the sampler's own seed.
    fn sample(&self, task: &Task) -> Result<TaskSample> {
        self.sample_with_seed(task, self.seed())
    }
}

impl<S: TaskSampler + ?Sized> TaskSampler for Box<S> {
    fn seed(&self) -> u64 {
        (**self).seed()
    }

    fn sample_with_seed(&self, task: &Task, seed: u64) -> Result<TaskSample> {
        (**self).sample_with_seed(task, seed)
    }
}
