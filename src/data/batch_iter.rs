// ============================================================
// Layer 4 — Batch Iterable
// ============================================================
// Drives the GraphBatcher over a list of datapoints and yields
// finished batches together with their label vectors:
//
//   datapoints ──► GraphBatcher ──► (Batch, labels)
//                     ▲    │
//                     └────┘ "Full" → finalize, retry molecule
//
// The iterable is restartable: every call to `iter()` starts a
// new pass over the source. Shuffling is optional:
//
//   Shuffle::Off          — source order, every pass
//   Shuffle::Fixed(seed)  — one seeded order, every pass
//   Shuffle::PerEpoch(seed) — a fresh seeded order per pass,
//                           derived from (seed, pass number)
//
// Labels are chosen once per iterable (LabelKind) and line up
// 1:1 with the order molecules were merged, i.e. with the
// node_to_graph groups of the batch.
//
// Why retry a "Full" molecule instead of dropping it?
//   The batcher only says Full when the molecule would push a
//   non-empty batch past a limit. Starting a fresh batch with
//   it keeps every molecule of the pass; a molecule too big
//   even for an empty batch comes back Oversized and is
//   yielded alone.
//
// Why Cell<u64> for the pass counter?
//   `iter()` takes &self so a training loop can hold the
//   iterable by shared reference across epochs. The counter is
//   the only state that changes between passes, and Cell
//   updates it without a &mut borrow.
//
// When a molecule cannot be merged (different feature width,
// different edge-type count), the molecules merged before it
// are yielded as a batch first, then the error, then nothing.
//
// Reference: Rust Book §13 (Iterators), §15 (Interior Mutability)

use std::cell::Cell;
use std::sync::Arc;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::batcher::{AddOutcome, Batch, BatcherConfig, GraphBatcher};
use crate::domain::datapoint::{LabelKind, MoleculeDatapoint};
use crate::error::{DataError, Result};

/// A finished batch and its label vector, one label per graph.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelledBatch {
    pub batch:  Batch,
    pub labels: Vec<f32>,
}

/// How the source is ordered on each pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shuffle {
    #[default]
    Off,
    Fixed(u64),
    PerEpoch(u64),
}

/// Restartable source of [`LabelledBatch`]es.
#[derive(Debug)]
pub struct BatchIterable {
    datapoints: Vec<Arc<MoleculeDatapoint>>,
    config:     BatcherConfig,
    label_kind: LabelKind,
    shuffle:    Shuffle,
    passes:     Cell<u64>,
}

impl BatchIterable {
    pub fn new(datapoints: Vec<Arc<MoleculeDatapoint>>, config: BatcherConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            datapoints,
            config,
            label_kind: LabelKind::Bool,
            shuffle:    Shuffle::Off,
            passes:     Cell::new(0),
        })
    }

    pub fn with_label_kind(mut self, label_kind: LabelKind) -> Self {
        self.label_kind = label_kind;
        self
    }

    pub fn with_shuffle(mut self, shuffle: Shuffle) -> Self {
        self.shuffle = shuffle;
        self
    }

    pub fn len(&self) -> usize {
        self.datapoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datapoints.is_empty()
    }

    /// Start the next pass. With `Shuffle::PerEpoch` each call sees a new order.
    pub fn iter(&self) -> BatchIter<'_> {
        let epoch = self.passes.get();
        self.passes.set(epoch + 1);
        self.iter_epoch(epoch)
    }

    /// The pass for an explicit epoch number; does not advance `iter()`.
    pub fn iter_epoch(&self, epoch: u64) -> BatchIter<'_> {
        let mut order: Vec<usize> = (0..self.datapoints.len()).collect();
        match self.shuffle {
            Shuffle::Off => {}
            Shuffle::Fixed(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
            Shuffle::PerEpoch(seed) => order.shuffle(&mut StdRng::seed_from_u64(mix_seed(seed, &[epoch]))),
        }

        BatchIter {
            source:     &self.datapoints,
            order,
            pos:        0,
            batcher:    GraphBatcher::new(self.config.clone()),
            label_kind: self.label_kind,
            labels:     Vec::new(),
            deferred:   None,
            done:       false,
        }
    }
}

impl<'a> IntoIterator for &'a BatchIterable {
    type Item     = Result<LabelledBatch>;
    type IntoIter = BatchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`BatchIterable`].
///
/// Yields `Err` once if a datapoint cannot be merged (structural mismatch)
/// and then stops. Anything merged before that datapoint is yielded first.
pub struct BatchIter<'a> {
    source:     &'a [Arc<MoleculeDatapoint>],
    order:      Vec<usize>,
    pos:        usize,
    batcher:    GraphBatcher,
    label_kind: LabelKind,
    labels:     Vec<f32>,
    deferred:   Option<DataError>,
    done:       bool,
}

impl Iterator for BatchIter<'_> {
    type Item = Result<LabelledBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(e) = self.deferred.take() {
            return Some(Err(e));
        }
        if self.done {
            return None;
        }

        while let Some(&idx) = self.order.get(self.pos) {
            let datapoint = &self.source[idx];
            match self.batcher.add_sample(datapoint) {
                Ok(AddOutcome::Full) => break,
                Ok(outcome) => {
                    self.labels.push(datapoint.label(self.label_kind));
                    self.pos += 1;
                    if outcome == AddOutcome::Oversized {
                        break;
                    }
                }
                Err(e) => {
                    self.done     = true;
                    self.deferred = Some(e);
                    break;
                }
            }
        }

        let Some(batch) = self.batcher.finalize() else {
            return self.deferred.take().map(Err);
        };
        let labels = std::mem::take(&mut self.labels);
        Some(Ok(LabelledBatch { batch, labels }))
    }
}

/// Derive a child seed from a base seed and a path of counters
/// (epoch, draw index, ...). SplitMix64 finaliser per step.
pub(crate) fn mix_seed(base: u64, parts: &[u64]) -> u64 {
    fn splitmix(mut z: u64) -> u64 {
        z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
    parts.iter().fold(splitmix(base), |acc, &p| splitmix(acc ^ splitmix(p)))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::assert_batch_invariants;
    use crate::domain::graph::{FeatureMatrix, GraphData};
    use crate::error::GraphDataError;

    fn molecules(sizes: &[usize]) -> Vec<Arc<MoleculeDatapoint>> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &n)| {
                let graph = GraphData::new(FeatureMatrix::new(vec![i as f32; n], 1).unwrap(), vec![vec![]], None)
                    .unwrap();
                Arc::new(MoleculeDatapoint::regression("t", format!("m{i}"), i as f32, graph))
            })
            .collect()
    }

    fn graph_counts(iterable: &BatchIterable) -> Vec<usize> {
        iterable
            .iter()
            .map(|b| {
                let b = b.unwrap();
                assert_batch_invariants(&b.batch);
                assert_eq!(b.labels.len(), b.batch.num_graphs());
                b.batch.num_graphs()
            })
            .collect()
    }

    #[test]
    fn test_graph_limit_splits_in_order() {
        let it = BatchIterable::new(molecules(&[1, 1, 1]), BatcherConfig::new(2, 100)).unwrap();
        assert_eq!(graph_counts(&it), vec![2, 1]);
    }

    #[test]
    fn test_labels_align_with_merge_order() {
        let it = BatchIterable::new(molecules(&[2, 3, 1, 4]), BatcherConfig::new(10, 5))
            .unwrap()
            .with_label_kind(LabelKind::Numeric);
        let batches: Vec<_> = it.iter().map(|b| b.unwrap()).collect();
        let labels: Vec<Vec<f32>> = batches.iter().map(|b| b.labels.clone()).collect();
        assert_eq!(labels, vec![vec![0.0, 1.0], vec![2.0, 3.0]]);
        for b in &batches {
            assert_eq!(b.labels.len(), b.batch.num_graphs());
        }
    }

    #[test]
    fn test_oversized_molecule_is_not_dropped() {
        let it = BatchIterable::new(molecules(&[2, 9, 2]), BatcherConfig::new(10, 4)).unwrap();
        assert_eq!(graph_counts(&it), vec![1, 1, 1]);
        let total: usize = it.iter().map(|b| b.unwrap().batch.num_nodes()).sum();
        assert_eq!(total, 13);
    }

    #[test]
    fn test_mismatch_yields_pending_batch_then_error() {
        let mut data = molecules(&[1, 2]);
        let wide = GraphData::new(FeatureMatrix::new(vec![0.0; 3], 3).unwrap(), vec![vec![]], None).unwrap();
        data.push(Arc::new(MoleculeDatapoint::regression("t", "wide", 9.0, wide)));
        data.extend(molecules(&[1]));

        let it = BatchIterable::new(data, BatcherConfig::default())
            .unwrap()
            .with_label_kind(LabelKind::Numeric);
        let mut pass = it.iter();

        let first = pass.next().unwrap().unwrap();
        assert_eq!(first.labels, vec![0.0, 1.0]);
        assert_batch_invariants(&first.batch);
        assert!(matches!(
            pass.next(),
            Some(Err(DataError::Graph(GraphDataError::NodeFeatureWidthMismatch { expected: 1, got: 3 })))
        ));
        assert!(pass.next().is_none());
    }

    #[test]
    fn test_passes_are_restartable() {
        let it = BatchIterable::new(molecules(&[1; 7]), BatcherConfig::new(3, 100)).unwrap();
        assert_eq!(graph_counts(&it), vec![3, 3, 1]);
        assert_eq!(graph_counts(&it), vec![3, 3, 1]);
    }

    #[test]
    fn test_shuffle_modes() {
        let order = |it: &BatchIterable, epoch| -> Vec<f32> {
            it.iter_epoch(epoch).flat_map(|b| b.unwrap().labels).collect()
        };
        let data = molecules(&[1; 20]);

        let fixed = BatchIterable::new(data.clone(), BatcherConfig::new(4, 100))
            .unwrap()
            .with_label_kind(LabelKind::Numeric)
            .with_shuffle(Shuffle::Fixed(7));
        assert_eq!(order(&fixed, 0), order(&fixed, 1));

        let per_epoch = BatchIterable::new(data, BatcherConfig::new(4, 100))
            .unwrap()
            .with_label_kind(LabelKind::Numeric)
            .with_shuffle(Shuffle::PerEpoch(7));
        assert_eq!(order(&per_epoch, 3), order(&per_epoch, 3));
        assert_ne!(order(&per_epoch, 0), order(&per_epoch, 1));
        let mut sorted = order(&per_epoch, 0);
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sorted, (0..20).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_source_yields_nothing() {
        let it = BatchIterable::new(Vec::new(), BatcherConfig::default()).unwrap();
        assert!(it.iter().next().is_none());
    }

    #[test]
    fn test_mix_seed_depends_on_every_part() {
        assert_ne!(mix_seed(1, &[0, 1]), mix_seed(1, &[1, 0]));
        assert_ne!(mix_seed(1, &[0]), mix_seed(2, &[0]));
        assert_eq!(mix_seed(5, &[3, 4]), mix_seed(5, &[3, 4]));
    }
}
