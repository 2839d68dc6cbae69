// ============================================================
// Layer 4 — Task Samplers
// ============================================================
// Split one task's datapoints into train / valid / test folds.
//
// Three policies share the TaskSampler trait (Layer 3):
//
//   RandomTaskSampler     — shuffle everything, slice off
//                           train, then valid, then test
//   BalancedTaskSampler   — every fold drawn with a fixed
//                           positive fraction (default 1:1)
//   StratifiedTaskSampler — every fold keeps the task's own
//                           positive fraction, within a tolerance
//
// Requests that cannot be met raise a SamplingError. A fold is
// never silently shrunk: two runs asking for the same sizes must
// get the same sizes, or comparisons between them are invalid.
// The one exception is `allow_smaller_test`, an explicit opt-in
// that lets the test fold take whatever remains.
//
// Rounding rules (applied identically everywhere):
//   - fold sizes given as ratios use floor(ratio * task_size)
//   - per-fold class counts use largest-remainder apportionment
//     of round(total * ratio) positives; ties go to train, then
//     valid, then test; negatives fill the rest of each fold
//
// All randomness comes from a StdRng seeded per call, so the same
// seed and the same task always give the same split.
//
// Why largest-remainder apportionment for class counts?
//   Rounding each fold's positive count on its own can make the
//   folds ask for one positive more (or less) than the target in
//   total. Handing out the floors first and the leftover units by
//   largest fractional part keeps the sum exact, and the fixed
//   tie order keeps it reproducible.
//
// Why does the multitask iterable call sample_with_seed?
//   A sampler's own seed fixes one split per task. The multitask
//   stream wants a fresh split per (epoch, draw) that can still be
//   replayed, so it passes a derived seed and leaves the sampler
//   itself untouched.
//
// Why a trait instead of an enum of samplers?
//   SamplerConfig::build returns Box<dyn TaskSampler>, and the
//   multitask iterable is generic over the trait, so a caller can
//   plug in a sampler of its own without touching this module.
//
// Reference: Rust Book §10 (Traits), §17 (Trait Objects)

use std::sync::Arc;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::domain::datapoint::MoleculeDatapoint;
use crate::domain::task::{Fold, LabelClass, Task, TaskSample};
use crate::domain::traits::TaskSampler;
use crate::error::{ClassificationProperty, DataError, Result, SamplingError};

// ─── FoldSize ─────────────────────────────────────────────────────────────────
/// A requested fold size: an absolute count, or a fraction of the task.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FoldSize {
    Count(usize),
    Ratio(f64),
}

impl FoldSize {
    /// Number of datapoints this size means for a task of `task_size`.
    pub fn resolve(&self, task_size: usize) -> usize {
        match *self {
            FoldSize::Count(n)     => n,
            FoldSize::Ratio(ratio) => (ratio * task_size as f64 + 1e-9).floor() as usize,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if let FoldSize::Ratio(r) = *self {
            if !(0.0..=1.0).contains(&r) {
                return Err(DataError::invalid_config(format!("{name} ratio {r} is outside [0, 1]")));
            }
        }
        Ok(())
    }
}

impl From<usize> for FoldSize {
    fn from(n: usize) -> Self {
        FoldSize::Count(n)
    }
}

impl From<f64> for FoldSize {
    fn from(r: f64) -> Self {
        FoldSize::Ratio(r)
    }
}

// ─── FoldSpec ─────────────────────────────────────────────────────────────────
// Requested sizes shared by all three samplers.
#[derive(Debug, Clone, PartialEq)]
struct FoldSpec {
    train_size:         FoldSize,
    valid_size:         FoldSize,
    test_size:          FoldSize,
    allow_smaller_test: bool,
}

impl FoldSpec {
    fn new(train_size: FoldSize, valid_size: FoldSize, test_size: FoldSize) -> Self {
        Self { train_size, valid_size, test_size, allow_smaller_test: false }
    }

    /// Resolve the three fold sizes for one task.
    ///
    /// Train and test must come out non-empty. When the request overshoots
    /// the task and `allow_smaller_test` is set, test takes what is left
    /// (still at least one). The result may still overshoot; each sampler
    /// reports that in its own terms.
    fn resolve(&self, task: &Task) -> std::result::Result<[usize; 3], SamplingError> {
        let n = task.len();
        let mut sizes = [
            self.train_size.resolve(n),
            self.valid_size.resolve(n),
            self.test_size.resolve(n),
        ];

        for (fold, idx) in [(Fold::Train, 0), (Fold::Test, 2)] {
            if sizes[idx] == 0 {
                return Err(SamplingError::FoldTooSmall {
                    task_name: task.name.clone(),
                    fold,
                    requested: 1,
                    available: 0,
                });
            }
        }

        // Counts are unbounded; saturate so an absurd request is reported
        // as too large instead of wrapping.
        let before_test = sizes[0].saturating_add(sizes[1]);
        if self.allow_smaller_test && before_test.saturating_add(sizes[2]) > n && before_test < n {
            tracing::info!(
                "Task {}: test fold shrunk from {} to {} datapoints",
                task.name,
                sizes[2],
                n - before_test,
            );
            sizes[2] = n - before_test;
        }
        Ok(sizes)
    }

    fn dataset_check(&self, task: &Task, sizes: &[usize; 3]) -> std::result::Result<(), SamplingError> {
        let requested = sizes.iter().fold(0usize, |acc, &s| acc.saturating_add(s));
        if requested > task.len() {
            return Err(SamplingError::DatasetTooSmall {
                task_name: task.name.clone(),
                requested,
                available: task.len(),
            });
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.train_size.validate("train_size")?;
        self.valid_size.validate("valid_size")?;
        self.test_size.validate("test_size")
    }
}

// ─── RandomTaskSampler ────────────────────────────────────────────────────────
/// Uniform random split: shuffle, then take train, valid and test in order.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomTaskSampler {
    folds: FoldSpec,
    seed:  u64,
}

impl RandomTaskSampler {
    /// Sampler with absolute fold sizes.
    pub fn new(train_size: usize, valid_size: usize, test_size: usize) -> Self {
        Self::with_fold_sizes(train_size.into(), valid_size.into(), test_size.into())
    }

    /// Sampler with fold sizes given as counts or task fractions.
    pub fn with_fold_sizes(train_size: FoldSize, valid_size: FoldSize, test_size: FoldSize) -> Self {
        Self {
            folds: FoldSpec::new(train_size, valid_size, test_size),
            seed: 0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn allow_smaller_test(mut self, allow: bool) -> Self {
        self.folds.allow_smaller_test = allow;
        self
    }
}

impl TaskSampler for RandomTaskSampler {
    fn seed(&self) -> u64 {
        self.seed
    }

    fn sample_with_seed(&self, task: &Task, seed: u64) -> Result<TaskSample> {
        let sizes = self.folds.resolve(task)?;

        // Walk the folds in order; the first one that cannot be filled
        // from what remains is reported.
        let mut remaining = task.len();
        for (fold, &size) in Fold::ALL.iter().zip(&sizes) {
            if size > remaining {
                return Err(SamplingError::FoldTooSmall {
                    task_name: task.name.clone(),
                    fold:      *fold,
                    requested: size,
                    available: remaining,
                }
                .into());
            }
            remaining -= size;
        }

        // Folds are consecutive slices of one shuffled copy.
        let mut rng  = StdRng::seed_from_u64(seed);
        let mut pool = task.samples.clone();
        pool.shuffle(&mut rng);

        let [train, valid, test] = sizes;
        let mut rest          = pool.into_iter();
        let train_samples: Vec<_> = rest.by_ref().take(train).collect();
        let valid_samples: Vec<_> = rest.by_ref().take(valid).collect();
        let test_samples:  Vec<_> = rest.take(test).collect();

        tracing::debug!(
            "Task {}: random split {}/{}/{} of {}",
            task.name, train, valid, test, task.len(),
        );

        Ok(TaskSample {
            name: task.name.clone(),
            kind: task.kind,
            train_samples,
            valid_samples,
            test_samples,
        })
    }
}

// ─── BalancedTaskSampler ──────────────────────────────────────────────────────
/// Every fold is drawn with the same fixed positive fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedTaskSampler {
    folds:            FoldSpec,
    target_pos_ratio: f64,
    seed:             u64,
}

impl BalancedTaskSampler {
    /// Sampler with absolute fold sizes.
    pub fn new(train_size: usize, valid_size: usize, test_size: usize) -> Self {
        Self::with_fold_sizes(train_size.into(), valid_size.into(), test_size.into())
    }

    /// Sampler with fold sizes given as counts or task fractions.
    pub fn with_fold_sizes(train_size: FoldSize, valid_size: FoldSize, test_size: FoldSize) -> Self {
        Self {
            folds: FoldSpec::new(train_size, valid_size, test_size),
            target_pos_ratio: 0.5,
            seed:             0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fraction of each fold that should be positive (default 0.5).
    pub fn with_pos_ratio(mut self, ratio: f64) -> Self {
        self.target_pos_ratio = ratio;
        self
    }

    pub fn allow_smaller_test(mut self, allow: bool) -> Self {
        self.folds.allow_smaller_test = allow;
        self
    }
}

impl TaskSampler for BalancedTaskSampler {
    fn seed(&self) -> u64 {
        self.seed
    }

    fn sample_with_seed(&self, task: &Task, seed: u64) -> Result<TaskSample> {
        task.require_classification(ClassificationProperty::ClassBalancedSampling)?;
        let sizes = self.folds.resolve(task)?;
        self.folds.dataset_check(task, &sizes)?;

        // Positive quota per fold; negatives make up the rest of each fold.
        let total = sizes.iter().sum::<usize>();
        let pos_counts = apportion(&sizes, self.target_pos_ratio, 0, total);
        let (num_pos, num_neg) = task.class_counts();
        check_class(task, LabelClass::Positive, pos_counts.iter().sum(), num_pos)?;
        check_class(task, LabelClass::Negative, total - pos_counts.iter().sum::<usize>(), num_neg)?;

        tracing::debug!(
            "Task {}: balanced split sizes {:?}, positives per fold {:?}",
            task.name, sizes, pos_counts,
        );
        Ok(draw_by_class(task, &sizes, &pos_counts, seed))
    }
}

// ─── StratifiedTaskSampler ────────────────────────────────────────────────────
/// Every fold keeps the task's own positive fraction, within `tolerance`.
#[derive(Debug, Clone, PartialEq)]
pub struct StratifiedTaskSampler {
    folds:     FoldSpec,
    tolerance: f64,
    seed:      u64,
}

impl StratifiedTaskSampler {
    /// Sampler with absolute fold sizes.
    pub fn new(train_size: usize, valid_size: usize, test_size: usize) -> Self {
        Self::with_fold_sizes(train_size.into(), valid_size.into(), test_size.into())
    }

    /// Sampler with fold sizes given as counts or task fractions.
    pub fn with_fold_sizes(train_size: FoldSize, valid_size: FoldSize, test_size: FoldSize) -> Self {
        Self {
            folds: FoldSpec::new(train_size, valid_size, test_size),
            tolerance: 0.05,
            seed:      0,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Largest allowed gap between a fold's positive fraction and the task's.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn allow_smaller_test(mut self, allow: bool) -> Self {
        self.folds.allow_smaller_test = allow;
        self
    }
}

impl TaskSampler for StratifiedTaskSampler {
    fn seed(&self) -> u64 {
        self.seed
    }

    fn sample_with_seed(&self, task: &Task, seed: u64) -> Result<TaskSample> {
        task.require_classification(ClassificationProperty::ClassBalancedSampling)?;
        let sizes = self.folds.resolve(task)?;
        self.folds.dataset_check(task, &sizes)?;

        // The rarer class is the one that runs out first, so it is the one
        // named when stratification is impossible.
        let (num_pos, num_neg) = task.class_counts();
        let ratio = num_pos as f64 / task.len() as f64;
        let (minority, minority_count, minority_ratio) = if num_pos <= num_neg {
            (LabelClass::Positive, num_pos, ratio)
        } else {
            (LabelClass::Negative, num_neg, 1.0 - ratio)
        };

        // Every non-empty fold needs at least one minority member.
        let class_error = || SamplingError::DatasetClassTooSmall {
            task_name: task.name.clone(),
            class:     minority,
            requested: sizes
                .iter()
                .filter(|&&s| s > 0)
                .map(|&s| (s as f64 * minority_ratio - 1e-9).ceil().max(1.0) as usize)
                .sum(),
            available: minority_count,
        };

        if minority_count == 0 {
            return Err(class_error().into());
        }

        // Clamp the positive total so neither class is overdrawn.
        let total = sizes.iter().sum::<usize>();
        let min_pos = total.saturating_sub(num_neg);
        let max_pos = total.min(num_pos);
        let pos_counts = apportion(&sizes, ratio, min_pos, max_pos);

        for (&size, &pos) in sizes.iter().zip(&pos_counts) {
            if size > 0 && (pos as f64 / size as f64 - ratio).abs() > self.tolerance + 1e-12 {
                return Err(class_error().into());
            }
        }

        tracing::debug!(
            "Task {}: stratified split sizes {:?}, positives per fold {:?} (task ratio {:.3})",
            task.name, sizes, pos_counts, ratio,
        );
        Ok(draw_by_class(task, &sizes, &pos_counts, seed))
    }
}

// ─── Sampler Configuration ────────────────────────────────────────────────────
/// Which sampling policy a [`SamplerConfig`] builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    Random,
    Balanced,
    #[default]
    Stratified,
}

/// Serialisable description of a task sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub kind:               SamplerKind,
    pub train_size:         FoldSize,
    pub valid_size:         FoldSize,
    pub test_size:          FoldSize,
    pub seed:               u64,
    /// Positive fraction for balanced sampling
    pub target_pos_ratio:   f64,
    /// Allowed ratio drift for stratified sampling
    pub tolerance:          f64,
    pub allow_smaller_test: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            kind:               SamplerKind::Stratified,
            train_size:         FoldSize::Count(16),
            valid_size:         FoldSize::Count(0),
            test_size:          FoldSize::Count(256),
            seed:               0,
            target_pos_ratio:   0.5,
            tolerance:          0.05,
            allow_smaller_test: false,
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<()> {
        self.fold_spec().validate()?;
        if !(0.0..=1.0).contains(&self.target_pos_ratio) {
            return Err(DataError::invalid_config(format!(
                "target_pos_ratio {} is outside [0, 1]",
                self.target_pos_ratio
            )));
        }
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(DataError::invalid_config(format!(
                "tolerance {} is outside [0, 1]",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Build the configured sampler behind the common trait.
    pub fn build(&self) -> Result<Box<dyn TaskSampler>> {
        self.validate()?;
        let spec = self.fold_spec();
        Ok(match self.kind {
            SamplerKind::Random => Box::new(RandomTaskSampler { folds: spec, seed: self.seed }),
            SamplerKind::Balanced => Box::new(BalancedTaskSampler {
                folds:            spec,
                target_pos_ratio: self.target_pos_ratio,
                seed:             self.seed,
            }),
            SamplerKind::Stratified => Box::new(StratifiedTaskSampler {
                folds:     spec,
                tolerance: self.tolerance,
                seed:      self.seed,
            }),
        })
    }

    fn fold_spec(&self) -> FoldSpec {
        FoldSpec {
            train_size:         self.train_size,
            valid_size:         self.valid_size,
            test_size:          self.test_size,
            allow_smaller_test: self.allow_smaller_test,
        }
    }
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn check_class(
    task:      &Task,
    class:     LabelClass,
    requested: usize,
    available: usize,
) -> std::result::Result<(), SamplingError> {
    if requested > available {
        return Err(SamplingError::DatasetClassTooSmall {
            task_name: task.name.clone(),
            class,
            requested,
            available,
        });
    }
    Ok(())
}

/// Split `round(total * ratio)` positives (clamped to `[min_pos, max_pos]`)
/// over the folds by largest remainder. Ties go to the earlier fold.
fn apportion(sizes: &[usize; 3], ratio: f64, min_pos: usize, max_pos: usize) -> [usize; 3] {
    let total: usize = sizes.iter().sum();
    let target = ((total as f64 * ratio).round() as usize).clamp(min_pos, max_pos.max(min_pos)).min(total);

    let exact: Vec<f64> = sizes.iter().map(|&s| s as f64 * ratio).collect();
    let mut counts = [0usize; 3];
    for k in 0..3 {
        counts[k] = ((exact[k] + 1e-9).floor() as usize).min(sizes[k]);
    }

    // Largest fractional part first; the sort is stable, so ties keep fold order.
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        let fa = exact[a] - counts[a] as f64;
        let fb = exact[b] - counts[b] as f64;
        fb.partial_cmp(&fa).unwrap_or(std::cmp::Ordering::Equal)
    });

    while counts.iter().sum::<usize>() < target {
        match order.iter().find(|&&k| counts[k] < sizes[k]) {
            Some(&k) => counts[k] += 1,
            None => break,
        }
        // Spread: the next increment goes to the next fold in order.
        order.rotate_left(1);
    }
    while counts.iter().sum::<usize>() > target {
        match order.iter().rev().find(|&&k| counts[k] > 0) {
            Some(&k) => counts[k] -= 1,
            None => break,
        }
        order.rotate_right(1);
    }
    counts
}

/// Fill each fold with its positive and negative quota from per-class
/// shuffles, then shuffle within the fold so classes are interleaved.
fn draw_by_class(task: &Task, sizes: &[usize; 3], pos_counts: &[usize; 3], seed: u64) -> TaskSample {
    let mut rng = StdRng::seed_from_u64(seed);

    let (mut pos, mut neg): (Vec<_>, Vec<_>) =
        task.samples.iter().cloned().partition(|s| s.bool_label);
    pos.shuffle(&mut rng);
    neg.shuffle(&mut rng);

    let mut pos = pos.into_iter();
    let mut neg = neg.into_iter();
    let mut folds: Vec<Vec<Arc<MoleculeDatapoint>>> = Vec::with_capacity(3);
    for (&size, &num_pos) in sizes.iter().zip(pos_counts) {
        let mut fold: Vec<_> = pos.by_ref().take(num_pos).collect();
        fold.extend(neg.by_ref().take(size - num_pos));
        fold.shuffle(&mut rng);
        folds.push(fold);
    }

    let test_samples  = folds.pop().unwrap_or_default();
    let valid_samples = folds.pop().unwrap_or_default();
    let train_samples = folds.pop().unwrap_or_default();
    TaskSample {
        name: task.name.clone(),
        kind: task.kind,
        train_samples,
        valid_samples,
        test_samples,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{FeatureMatrix, GraphData};
    use std::collections::HashSet;

    fn task(num_pos: usize, num_neg: usize) -> Task {
        let dps = (0..num_pos + num_neg)
            .map(|i| {
                let graph = GraphData::new(FeatureMatrix::new(vec![i as f32], 1).unwrap(), vec![vec![]], None)
                    .unwrap();
                MoleculeDatapoint::classification("CHEMBL1", format!("mol{i}"), i < num_pos, graph)
            })
            .collect();
        Task::from_datapoints("CHEMBL1", dps)
    }

    fn smiles(list: &[Arc<MoleculeDatapoint>]) -> Vec<String> {
        list.iter().map(|d| d.smiles.clone()).collect()
    }

    #[test]
    fn test_random_is_reproducible() {
        let t = task(5, 10);
        let sampler = RandomTaskSampler::new(10, 0, 5).with_seed(42);
        let a = sampler.sample(&t).unwrap();
        let b = sampler.sample(&t).unwrap();
        assert_eq!(smiles(&a.train_samples), smiles(&b.train_samples));
        assert_eq!(smiles(&a.test_samples), smiles(&b.test_samples));
        assert_eq!(a.train_samples.len(), 10);
        assert!(a.valid_samples.is_empty());
        assert_eq!(a.test_samples.len(), 5);

        // Disjoint folds covering the whole task.
        let all: HashSet<_> = smiles(&a.train_samples).into_iter().chain(smiles(&a.test_samples)).collect();
        assert_eq!(all.len(), 15);
    }

    #[test]
    fn test_random_fold_too_small() {
        let t = task(4, 10);
        let err = RandomTaskSampler::new(10, 0, 5).sample(&t).unwrap_err();
        assert_eq!(
            err,
            DataError::Sampling(SamplingError::FoldTooSmall {
                task_name: "CHEMBL1".into(),
                fold:      Fold::Test,
                requested: 5,
                available: 4,
            })
        );
    }

    #[test]
    fn test_huge_counts_report_instead_of_overflowing() {
        let t = task(4, 10);

        let err = RandomTaskSampler::new(usize::MAX, 1, 1).sample(&t).unwrap_err();
        assert_eq!(
            err,
            DataError::Sampling(SamplingError::FoldTooSmall {
                task_name: "CHEMBL1".into(),
                fold:      Fold::Train,
                requested: usize::MAX,
                available: 14,
            })
        );

        let err = RandomTaskSampler::new(1, usize::MAX, usize::MAX)
            .allow_smaller_test(true)
            .sample(&t)
            .unwrap_err();
        assert!(matches!(err, DataError::Sampling(SamplingError::FoldTooSmall { fold: Fold::Valid, .. })));

        for sampler in [
            Box::new(BalancedTaskSampler::new(usize::MAX, 1, 1)) as Box<dyn TaskSampler>,
            Box::new(StratifiedTaskSampler::new(1, usize::MAX, 1)) as Box<dyn TaskSampler>,
        ] {
            let err = sampler.sample(&t).unwrap_err();
            assert_eq!(
                err,
                DataError::Sampling(SamplingError::DatasetTooSmall {
                    task_name: "CHEMBL1".into(),
                    requested: usize::MAX,
                    available: 14,
                })
            );
        }
    }

    #[test]
    fn test_random_allow_smaller_test() {
        let t = task(4, 10);
        let sample = RandomTaskSampler::new(10, 0, 5).allow_smaller_test(true).sample(&t).unwrap();
        assert_eq!(sample.test_samples.len(), 4);
    }

    #[test]
    fn test_ratio_sizes() {
        let t = task(10, 10);
        let sampler = RandomTaskSampler::with_fold_sizes(FoldSize::Ratio(0.5), FoldSize::Ratio(0.25), FoldSize::Ratio(0.25));
        let sample = sampler.sample(&t).unwrap();
        assert_eq!(
            (sample.train_samples.len(), sample.valid_samples.len(), sample.test_samples.len()),
            (10, 5, 5)
        );
        assert!(matches!(
            RandomTaskSampler::with_fold_sizes(FoldSize::Ratio(0.01), FoldSize::Count(0), FoldSize::Count(5)).sample(&t),
            Err(DataError::Sampling(SamplingError::FoldTooSmall { fold: Fold::Train, .. }))
        ));
    }

    #[test]
    fn test_balanced_class_too_small() {
        let t = task(3, 100);
        let err = BalancedTaskSampler::new(20, 0, 10).sample(&t).unwrap_err();
        assert!(matches!(
            err,
            DataError::Sampling(SamplingError::DatasetClassTooSmall {
                class: LabelClass::Positive,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_balanced_dataset_too_small() {
        let t = task(3, 10);
        let err = BalancedTaskSampler::new(10, 0, 10).sample(&t).unwrap_err();
        assert_eq!(
            err,
            DataError::Sampling(SamplingError::DatasetTooSmall {
                task_name: "CHEMBL1".into(),
                requested: 20,
                available: 13,
            })
        );
    }

    #[test]
    fn test_balanced_folds_are_balanced() {
        let t = task(30, 70);
        let s = BalancedTaskSampler::new(20, 0, 16).with_seed(3).sample(&t).unwrap();
        assert_eq!(s.train_samples.len(), 20);
        assert_eq!(s.train_pos_label_ratio().unwrap(), 0.5);
        assert_eq!(s.test_pos_label_ratio().unwrap(), 0.5);
    }

    #[test]
    fn test_stratified_preserves_ratio() {
        let t = task(20, 80);
        let s = StratifiedTaskSampler::new(20, 10, 20).with_tolerance(0.05).with_seed(9).sample(&t).unwrap();
        for r in [
            s.train_pos_label_ratio().unwrap(),
            s.valid_pos_label_ratio().unwrap(),
            s.test_pos_label_ratio().unwrap(),
        ] {
            assert!((r - 0.2).abs() <= 0.05, "ratio {r}");
        }
    }

    #[test]
    fn test_stratified_fails_without_minority() {
        let t = task(0, 50);
        assert!(matches!(
            StratifiedTaskSampler::new(10, 0, 10).sample(&t),
            Err(DataError::Sampling(SamplingError::DatasetClassTooSmall { class: LabelClass::Positive, .. }))
        ));
    }

    #[test]
    fn test_stratified_fails_when_tolerance_unreachable() {
        // A 2-element fold can only be 0%, 50% or 100% positive.
        let t = task(20, 80);
        assert!(StratifiedTaskSampler::new(2, 0, 10).with_tolerance(0.05).sample(&t).is_err());
    }

    #[test]
    fn test_class_samplers_reject_regression() {
        let t = Task::regression("aff", task(5, 5).samples);
        assert!(matches!(
            StratifiedTaskSampler::new(2, 0, 2).sample(&t),
            Err(DataError::UndefinedForRegression { .. })
        ));
        assert!(RandomTaskSampler::new(2, 0, 2).sample(&t).is_ok());
    }

    #[test]
    fn test_apportion_largest_remainder() {
        // 0.5 * [3, 0, 3] = [1.5, 0, 1.5]; total 3 → tie goes to train.
        assert_eq!(apportion(&[3, 0, 3], 0.5, 0, 6), [2, 0, 1]);
        assert_eq!(apportion(&[20, 10, 20], 0.2, 0, 50), [4, 2, 4]);
        assert_eq!(apportion(&[5, 5, 5], 1.0, 0, 15), [5, 5, 5]);
    }

    #[test]
    fn test_input_task_untouched() {
        let t = task(10, 10);
        let before = smiles(&t.samples);
        let _ = StratifiedTaskSampler::new(4, 2, 4).sample(&t).unwrap();
        assert_eq!(smiles(&t.samples), before);
    }

    #[test]
    fn test_config_build() {
        let cfg = SamplerConfig {
            kind:       SamplerKind::Random,
            train_size: FoldSize::Count(2),
            test_size:  FoldSize::Count(2),
            ..Default::default()
        };
        let sampler = cfg.build().unwrap();
        assert_eq!(sampler.sample(&task(2, 2)).unwrap().train_samples.len(), 2);

        let bad = SamplerConfig { tolerance: 2.0, ..Default::default() };
        assert!(bad.build().is_err());
    }
}
