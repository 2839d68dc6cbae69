use std::sync::Arc;

use burn::data::dataset::Dataset;

use crate::domain::datapoint::MoleculeDatapoint;
use crate::domain::task::{Fold, Task, TaskSample};

/// Random-access view over a list of molecules.
///
/// Datapoints are shared, so `get` only bumps a reference count.
#[derive(Debug, Clone, Default)]
pub struct MoleculeDataset {
    datapoints: Vec<Arc<MoleculeDatapoint>>,
}

impl MoleculeDataset {
    pub fn new(datapoints: Vec<Arc<MoleculeDatapoint>>) -> Self { Self { datapoints } }

    /// Every datapoint of a task, in task order.
    pub fn from_task(task: &Task) -> Self {
        Self::new(task.samples.clone())
    }

    /// One fold of a sampled task.
    pub fn from_fold(sample: &TaskSample, fold: Fold) -> Self {
        Self::new(sample.fold(fold).to_vec())
    }

    pub fn datapoints(&self) -> &[Arc<MoleculeDatapoint>] { &self.datapoints }

    pub fn into_datapoints(self) -> Vec<Arc<MoleculeDatapoint>> { self.datapoints }
}

impl Dataset<Arc<MoleculeDatapoint>> for MoleculeDataset {
    fn get(&self, index: usize) -> Option<Arc<MoleculeDatapoint>> {
        self.datapoints.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.datapoints.len()
    }
}
