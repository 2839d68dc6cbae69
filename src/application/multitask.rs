// ============================================================
// Layer 2 — Multitask Batch Iterable
// ============================================================
// Mixes many tasks into one stream of graph batches:
//
//   for each epoch:
//     task order  ← round-robin, or a seeded permutation
//     for each chunk of `num_chunked_tasks` tasks:
//       TaskSampler::sample_with_seed(task, seed(epoch, draw))
//         → datapoints of the configured fold
//         → tagged with the task's integer id
//       pool the chunk (shuffled when it has more than one task)
//       feed the pool into ONE shared GraphBatcher
//
// A single batch can therefore hold molecules from several
// tasks; the task id vector lets the model route each
// molecule's loss to its task head. The batcher's limits are
// the only thing deciding where a batch ends, so every batch
// obeys them no matter how many tasks contributed.
//
// Every random choice is derived from (config seed, epoch,
// draw index): the same seed and epoch give the same batches.
//
// Failure under OnSamplingError::Fail:
//
//   ... ► [a a a] ─ sample("tiny") fails ─► Ok(batch a a a)
//                                          Err(tiny)
//                                          None
//
// Molecules already merged when a task fails (or a molecule
// cannot be merged) are yielded as one last batch, and the
// error comes on the following call. Draws from the failing
// chunk that were not merged yet are dropped with the epoch.
//
// Why return the partial batch first?
//   Those molecules were sampled from tasks that succeeded.
//   A caller that logs the error and keeps what it received
//   sees every such molecule exactly once; throwing the batch
//   away would make the output depend on where the batch
//   boundary happened to fall.
//
// Reference: Rust Book §9 (Error Handling), §13 (Iterators)

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::batch_iter::mix_seed;
use crate::data::batcher::{AddOutcome, Batch, BatcherConfig, GraphBatcher};
use crate::domain::datapoint::{LabelKind, MoleculeDatapoint};
use crate::domain::task::{Fold, Task};
use crate::domain::traits::TaskSampler;
use crate::error::{DataError, Result};

// ─── Configuration ────────────────────────────────────────────────────────────
/// How the next task is chosen within an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSelection {
    /// Tasks in the order they were given, every epoch
    #[default]
    RoundRobin,
    /// A fresh seeded permutation of the tasks per epoch
    Random,
}

/// What to do when a task cannot be sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnSamplingError {
    /// Yield any partially filled batch, then the error, then end the epoch
    #[default]
    Fail,
    /// Log a warning and move on to the next task
    Skip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultitaskConfig {
    /// Which fold of each task sample is batched
    pub fold:              Fold,
    pub selection:         TaskSelection,
    pub seed:              u64,
    pub on_sampling_error: OnSamplingError,
    pub label_kind:        LabelKind,
    /// Consecutive task draws pooled and shuffled together; 1 = no mixing
    pub num_chunked_tasks: usize,
}

impl Default for MultitaskConfig {
    fn default() -> Self {
        Self {
            fold:              Fold::Train,
            selection:         TaskSelection::RoundRobin,
            seed:              0,
            on_sampling_error: OnSamplingError::Fail,
            label_kind:        LabelKind::Bool,
            num_chunked_tasks: 1,
        }
    }
}

impl MultitaskConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_chunked_tasks == 0 {
            return Err(DataError::invalid_config("num_chunked_tasks must be at least 1"));
        }
        Ok(())
    }
}

// ─── MultitaskBatch ───────────────────────────────────────────────────────────
/// A merged batch with one label and one task id per graph.
#[derive(Debug, Clone, PartialEq)]
pub struct MultitaskBatch {
    pub batch:    Batch,
    pub labels:   Vec<f32>,
    pub task_ids: Vec<usize>,
}

// ─── MultitaskBatchIterable ───────────────────────────────────────────────────
/// Restartable multitask batch source. Each call to `iter()` is one epoch.
pub struct MultitaskBatchIterable<S: TaskSampler> {
    tasks:          Vec<Task>,
    task_ids:       Vec<usize>,
    sampler:        S,
    batcher_config: BatcherConfig,
    config:         MultitaskConfig,
    epochs:         Cell<u64>,
}

impl<S: TaskSampler> MultitaskBatchIterable<S> {
    /// Every task name must appear in `task_name_to_id`; a missing one is
    /// reported here rather than halfway through an epoch.
    pub fn new(
        tasks:            Vec<Task>,
        sampler:          S,
        task_name_to_id:  &HashMap<String, usize>,
        batcher_config:   BatcherConfig,
        config:           MultitaskConfig,
    ) -> Result<Self> {
        batcher_config.validate()?;
        config.validate()?;

        let task_ids = tasks
            .iter()
            .map(|t| {
                task_name_to_id
                    .get(&t.name)
                    .copied()
                    .ok_or_else(|| DataError::UnknownTask(t.name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            tasks,
            task_ids,
            sampler,
            batcher_config,
            config,
            epochs: Cell::new(0),
        })
    }

    pub fn num_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn config(&self) -> &MultitaskConfig {
        &self.config
    }

    /// Start the next epoch.
    pub fn iter(&self) -> MultitaskBatchIter<'_, S> {
        let epoch = self.epochs.get();
        self.epochs.set(epoch + 1);
        self.iter_epoch(epoch)
    }

    /// Replay a specific epoch; does not advance `iter()`.
    pub fn iter_epoch(&self, epoch: u64) -> MultitaskBatchIter<'_, S> {
        let mut order: Vec<usize> = (0..self.tasks.len()).collect();
        if self.config.selection == TaskSelection::Random {
            order.shuffle(&mut StdRng::seed_from_u64(mix_seed(self.config.seed, &[epoch])));
        }

        tracing::info!(
            "Multitask epoch {}: {} tasks, {:?} selection, fold {}",
            epoch,
            order.len(),
            self.config.selection,
            self.config.fold,
        );

        MultitaskBatchIter {
            source:    self,
            epoch,
            order,
            next_draw: 0,
            pending:   VecDeque::new(),
            batcher:   GraphBatcher::new(self.batcher_config.clone()),
            labels:    Vec::new(),
            task_ids:  Vec::new(),
            deferred:  None,
            done:      false,
        }
    }
}

impl<'a, S: TaskSampler> IntoIterator for &'a MultitaskBatchIterable<S> {
    type Item     = Result<MultitaskBatch>;
    type IntoIter = MultitaskBatchIter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One epoch over a [`MultitaskBatchIterable`].
pub struct MultitaskBatchIter<'a, S: TaskSampler> {
    source:    &'a MultitaskBatchIterable<S>,
    epoch:     u64,
    order:     Vec<usize>,
    next_draw: usize,
    pending:   VecDeque<(Arc<MoleculeDatapoint>, usize)>,
    batcher:   GraphBatcher,
    labels:    Vec<f32>,
    task_ids:  Vec<usize>,
    deferred:  Option<DataError>,
    done:      bool,
}

impl<S: TaskSampler> MultitaskBatchIter<'_, S> {
    /// End the epoch with `err`, yielded after whatever batch is pending.
    fn fail(&mut self, err: DataError) {
        self.done     = true;
        self.deferred = Some(err);
    }

    /// Draw the next chunk of tasks into `pending`.
    /// Returns false once every task of the epoch has been drawn.
    fn refill(&mut self) -> Result<bool> {
        if self.next_draw >= self.order.len() {
            return Ok(false);
        }

        let source      = self.source;
        let cfg         = &source.config;
        let chunk_start = self.next_draw;
        let chunk_end   = (chunk_start + cfg.num_chunked_tasks).min(self.order.len());
        let mut chunk   = Vec::new();

        for draw in chunk_start..chunk_end {
            let task_idx = self.order[draw];
            let task     = &source.tasks[task_idx];
            let task_id  = source.task_ids[task_idx];
            self.next_draw = draw + 1;

            let seed = mix_seed(cfg.seed, &[self.epoch, draw as u64]);
            match source.sampler.sample_with_seed(task, seed) {
                Ok(sample) => {
                    let fold = sample.into_fold(cfg.fold);
                    tracing::debug!("Drew {} {} datapoints from task {}", fold.len(), cfg.fold, task.name);
                    chunk.extend(fold.into_iter().map(|dp| (dp, task_id)));
                }
                Err(DataError::Sampling(e)) if cfg.on_sampling_error == OnSamplingError::Skip => {
                    tracing::warn!("Skipping task {}: {}", e.task_name(), e);
                }
                Err(e) => return Err(e),
            }
        }

        if chunk_end - chunk_start > 1 {
            let seed = mix_seed(cfg.seed, &[self.epoch, chunk_start as u64, u64::MAX]);
            chunk.shuffle(&mut StdRng::seed_from_u64(seed));
        }
        self.pending.extend(chunk);
        Ok(true)
    }
}

impl<S: TaskSampler> Iterator for MultitaskBatchIter<'_, S> {
    type Item = Result<MultitaskBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.deferred.take() {
            return Some(Err(e));
        }
        if self.done {
            return None;
        }

        loop {
            let Some((datapoint, task_id)) = self.pending.front().cloned() else {
                match self.refill() {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) => {
                        self.fail(e);
                        break;
                    }
                }
            };

            match self.batcher.add_sample(&datapoint) {
                Ok(AddOutcome::Full) => break,
                Ok(outcome) => {
                    self.labels.push(datapoint.label(self.source.config.label_kind));
                    self.task_ids.push(task_id);
                    self.pending.pop_front();
                    if outcome == AddOutcome::Oversized {
                        break;
                    }
                }
                Err(e) => {
                    self.fail(e);
                    break;
                }
            }
        }

        // Molecules merged before a failure still form a batch; the error
        // follows on the next call.
        let Some(batch) = self.batcher.finalize() else {
            return self.deferred.take().map(Err);
        };
        Some(Ok(MultitaskBatch {
            batch,
            labels:   std::mem::take(&mut self.labels),
            task_ids: std::mem::take(&mut self.task_ids),
        }))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::assert_batch_invariants;
    use crate::data::sampler::RandomTaskSampler;
    use crate::domain::graph::{FeatureMatrix, GraphData};
    use crate::error::GraphDataError;

    /// One chain molecule per entry of `sizes`, alternating labels.
    fn sized_task(name: &str, sizes: &[usize]) -> Task {
        let dps = sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let edges = (1..n).map(|j| [j - 1, j]).collect();
                let graph = GraphData::new(FeatureMatrix::new(vec![1.0; n], 1).unwrap(), vec![edges], None).unwrap();
                MoleculeDatapoint::classification(name, format!("{name}-{i}"), i % 2 == 0, graph)
            })
            .collect();
        Task::from_datapoints(name, dps)
    }

    fn task(name: &str, n: usize) -> Task {
        sized_task(name, &vec![1; n])
    }

    fn ids(pairs: &[(&str, usize)]) -> HashMap<String, usize> {
        pairs.iter().map(|&(n, i)| (n.to_string(), i)).collect()
    }

    fn all_task_ids(it: MultitaskBatchIter<'_, RandomTaskSampler>) -> Vec<usize> {
        it.flat_map(|b| b.unwrap().task_ids).collect()
    }

    #[test]
    fn test_round_robin_tags_with_mapped_ids() {
        let it = MultitaskBatchIterable::new(
            vec![task("a", 6), task("b", 6)],
            RandomTaskSampler::new(3, 0, 1),
            &ids(&[("a", 5), ("b", 2)]),
            BatcherConfig::default(),
            MultitaskConfig::default(),
        )
        .unwrap();

        let batches: Vec<_> = it.iter().map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].task_ids, vec![5, 5, 5, 2, 2, 2]);
        assert_eq!(batches[0].labels.len(), 6);
    }

    #[test]
    fn test_batches_span_tasks_within_limits() {
        let it = MultitaskBatchIterable::new(
            vec![task("a", 4), task("b", 4), task("c", 4)],
            RandomTaskSampler::new(3, 0, 1),
            &ids(&[("a", 0), ("b", 1), ("c", 2)]),
            BatcherConfig::new(4, 100),
            MultitaskConfig::default(),
        )
        .unwrap();

        let batches: Vec<_> = it.iter().map(|b| b.unwrap()).collect();
        let sizes: Vec<_> = batches.iter().map(|b| b.batch.num_graphs()).collect();
        assert_eq!(sizes, vec![4, 4, 1]);
        assert_eq!(batches[0].task_ids, vec![0, 0, 0, 1]);
        assert_eq!(batches[1].task_ids, vec![1, 1, 2, 2]);
        for b in &batches {
            assert_eq!(b.task_ids.len(), b.batch.num_graphs());
            assert_eq!(b.labels.len(), b.batch.num_graphs());
        }
    }

    #[test]
    fn test_oversized_molecule_gets_its_own_batch() {
        // Task "a" always puts at least one 9-atom molecule into train.
        let it = MultitaskBatchIterable::new(
            vec![sized_task("a", &[9, 9, 1, 1]), sized_task("b", &[1, 2, 1, 2])],
            RandomTaskSampler::new(3, 0, 1),
            &ids(&[("a", 0), ("b", 1)]),
            BatcherConfig::new(100, 4),
            MultitaskConfig { seed: 4, ..Default::default() },
        )
        .unwrap();

        let batches: Vec<_> = it.iter_epoch(0).map(|b| b.unwrap()).collect();
        let mut oversized = 0;
        for b in &batches {
            assert_batch_invariants(&b.batch);
            assert_eq!(b.labels.len(), b.batch.num_graphs());
            assert_eq!(b.task_ids.len(), b.batch.num_graphs());
            if b.batch.num_nodes() > 4 {
                assert_eq!(b.batch.num_graphs(), 1);
                assert_eq!(b.batch.num_nodes(), 9);
                assert_eq!(b.task_ids, vec![0]);
                oversized += 1;
            }
        }
        assert!(oversized >= 1);

        let total: usize = batches.iter().map(|b| b.batch.num_graphs()).sum();
        assert_eq!(total, 6);
        let mut tagged: Vec<usize> = batches.iter().flat_map(|b| b.task_ids.iter().copied()).collect();
        tagged.sort_unstable();
        assert_eq!(tagged, vec![0, 0, 0, 1, 1, 1]);
    }

    #[test]
    fn test_unmergeable_molecule_ends_epoch_after_pending_batch() {
        let wide = {
            let graph = GraphData::new(FeatureMatrix::new(vec![1.0, 2.0], 2).unwrap(), vec![vec![]], None).unwrap();
            Task::from_datapoints("wide", vec![
                MoleculeDatapoint::classification("wide", "w0", true, graph.clone()),
                MoleculeDatapoint::classification("wide", "w1", false, graph),
            ])
        };
        let it = MultitaskBatchIterable::new(
            vec![task("a", 4), wide, task("c", 4)],
            RandomTaskSampler::new(1, 0, 1),
            &ids(&[("a", 0), ("wide", 1), ("c", 2)]),
            BatcherConfig::default(),
            MultitaskConfig::default(),
        )
        .unwrap();

        let results: Vec<_> = it.iter().collect();
        assert_eq!(results.len(), 2);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.task_ids, vec![0]);
        assert_batch_invariants(&first.batch);
        assert!(matches!(
            results[1],
            Err(DataError::Graph(GraphDataError::NodeFeatureWidthMismatch { expected: 1, got: 2 }))
        ));
    }

    #[test]
    fn test_unknown_task_rejected_up_front() {
        let err = MultitaskBatchIterable::new(
            vec![task("a", 4), task("zzz", 4)],
            RandomTaskSampler::new(1, 0, 1),
            &ids(&[("a", 0)]),
            BatcherConfig::default(),
            MultitaskConfig::default(),
        )
        .err()
        .unwrap();
        assert_eq!(err, DataError::UnknownTask("zzz".into()));
    }

    #[test]
    fn test_sampling_error_policy() {
        let tasks = || vec![task("a", 4), task("tiny", 2), task("c", 4)];
        let map = ids(&[("a", 0), ("tiny", 1), ("c", 2)]);

        let failing = MultitaskBatchIterable::new(
            tasks(),
            RandomTaskSampler::new(3, 0, 1),
            &map,
            BatcherConfig::default(),
            MultitaskConfig::default(),
        )
        .unwrap();
        let results: Vec<_> = failing.iter().collect();
        assert_eq!(results.len(), 2);
        match &results[0] {
            Ok(b) => {
                assert_eq!(b.task_ids, vec![0, 0, 0]);
                assert_eq!(b.labels.len(), 3);
                assert_batch_invariants(&b.batch);
            }
            other => panic!("expected the batch merged before the failure, got {other:?}"),
        }
        match &results[1] {
            Err(DataError::Sampling(e)) => assert_eq!(e.task_name(), "tiny"),
            other => panic!("expected sampling error, got {other:?}"),
        }

        let skipping = MultitaskBatchIterable::new(
            tasks(),
            RandomTaskSampler::new(3, 0, 1),
            &map,
            BatcherConfig::default(),
            MultitaskConfig { on_sampling_error: OnSamplingError::Skip, ..Default::default() },
        )
        .unwrap();
        assert_eq!(all_task_ids(skipping.iter()), vec![0, 0, 0, 2, 2, 2]);
    }

    #[test]
    fn test_random_selection_is_reproducible_per_epoch() {
        let names: Vec<String> = (0..8).map(|i| format!("t{i}")).collect();
        let map: HashMap<String, usize> = names.iter().cloned().zip(0..).collect();
        let it = MultitaskBatchIterable::new(
            names.iter().map(|n| task(n, 2)).collect(),
            RandomTaskSampler::new(1, 0, 1),
            &map,
            BatcherConfig::default(),
            MultitaskConfig { selection: TaskSelection::Random, seed: 11, ..Default::default() },
        )
        .unwrap();

        let epoch2 = all_task_ids(it.iter_epoch(2));
        assert_eq!(epoch2, all_task_ids(it.iter_epoch(2)));
        assert_ne!(epoch2, all_task_ids(it.iter_epoch(3)));

        let mut sorted = epoch2.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_iter_advances_epochs() {
        let names: Vec<String> = (0..8).map(|i| format!("t{i}")).collect();
        let map: HashMap<String, usize> = names.iter().cloned().zip(0..).collect();
        let it = MultitaskBatchIterable::new(
            names.iter().map(|n| task(n, 2)).collect(),
            RandomTaskSampler::new(1, 0, 1),
            &map,
            BatcherConfig::default(),
            MultitaskConfig { selection: TaskSelection::Random, seed: 11, ..Default::default() },
        )
        .unwrap();

        assert_eq!(all_task_ids(it.iter()), all_task_ids(it.iter_epoch(0)));
        assert_eq!(all_task_ids(it.iter()), all_task_ids(it.iter_epoch(1)));
    }

    #[test]
    fn test_chunked_tasks_are_mixed() {
        let it = MultitaskBatchIterable::new(
            vec![task("a", 12), task("b", 12)],
            RandomTaskSampler::new(10, 0, 1),
            &ids(&[("a", 0), ("b", 1)]),
            BatcherConfig::default(),
            MultitaskConfig { num_chunked_tasks: 2, seed: 3, ..Default::default() },
        )
        .unwrap();

        let tagged = all_task_ids(it.iter_epoch(0));
        assert_eq!(tagged.len(), 20);
        assert_eq!(tagged.iter().filter(|&&t| t == 0).count(), 10);
        let mut grouped = tagged.clone();
        grouped.sort_unstable();
        assert_ne!(tagged, grouped);
    }

    #[test]
    fn test_zero_chunk_size_is_invalid() {
        let config = MultitaskConfig { num_chunked_tasks: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(DataError::InvalidConfig(_))));
    }

    #[test]
    fn test_boxed_sampler_is_accepted() {
        let sampler: Box<dyn TaskSampler> = Box::new(RandomTaskSampler::new(1, 0, 1));
        let it = MultitaskBatchIterable::new(
            vec![task("a", 3)],
            sampler,
            &ids(&[("a", 9)]),
            BatcherConfig::default(),
            MultitaskConfig::default(),
        )
        .unwrap();
        let ids: Vec<usize> = it.iter().flat_map(|b| b.unwrap().task_ids).collect();
        assert_eq!(ids, vec![9]);
    }
}
