// ============================================================
// Layer 5 — Graph Batch Tensors
// ============================================================
// Converts a merged Batch into Burn tensors on a device.
//
// Shapes (N = nodes, E_t = pairs of edge type t, G = graphs):
//
//   node_features   [N, F]      float
//   adjacency_lists [E_t, 2]    int, one tensor per edge type
//   edge_features   [E_t, D_t]  float, when every graph had them
//   node_to_graph   [N]         int, values in 0..G
//   labels          [G]         float
//   task_ids        [G]         int, multitask batches only
//
// A graph network scatters per-node results back to graphs
// with node_to_graph; num_graphs is kept as a plain usize so
// callers never need to read it back from the device.
//
// GraphTensorBatcher implements Burn's Batcher trait, so a
// MoleculeDataset can be fed through Burn's DataLoader. Each
// DataLoader chunk becomes exactly one merged graph batch: size
// limits are the DataLoader's batch size, not BatcherConfig.
//
// Reference: Burn Book §4 (Batcher)

use std::sync::Arc;

use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Int, Tensor, TensorData},
};

use crate::data::batcher::{Batch, BatcherConfig, GraphBatcher};
use crate::domain::datapoint::{LabelKind, MoleculeDatapoint};
use crate::domain::graph::FeatureMatrix;
use crate::error::{DataError, Result};

// ─── GraphBatchTensors ────────────────────────────────────────────────────────
/// A merged graph batch living on a Burn device.
#[derive(Debug, Clone)]
pub struct GraphBatchTensors<B: Backend> {
    /// Node feature rows of every graph, concatenated, shape: [N, F]
    pub node_features: Tensor<B, 2>,

    /// Global node index pairs per edge type, shape: [E_t, 2]
    pub adjacency_lists: Vec<Tensor<B, 2, Int>>,

    /// Edge feature rows per edge type, shape: [E_t, D_t]
    pub edge_features: Option<Vec<Tensor<B, 2>>>,

    /// Owning graph of each node, shape: [N]
    pub node_to_graph: Tensor<B, 1, Int>,

    /// Number of graphs in the batch (G)
    pub num_graphs: usize,

    /// One label per graph, shape: [G]
    pub labels: Tensor<B, 1>,

    /// Task id per graph, shape: [G]
    pub task_ids: Option<Tensor<B, 1, Int>>,
}

impl<B: Backend> GraphBatchTensors<B> {
    /// Copy a host-side batch onto `device`.
    ///
    /// `labels` (and `task_ids`, when given) must hold one entry per graph.
    pub fn from_batch(
        batch:    &Batch,
        labels:   &[f32],
        task_ids: Option<&[usize]>,
        device:   &B::Device,
    ) -> Result<Self> {
        let num_graphs = batch.num_graphs();
        if labels.len() != num_graphs {
            return Err(DataError::invalid_config(format!(
                "{} labels given for a batch of {} graphs",
                labels.len(),
                num_graphs
            )));
        }
        if let Some(ids) = task_ids {
            if ids.len() != num_graphs {
                return Err(DataError::invalid_config(format!(
                    "{} task ids given for a batch of {} graphs",
                    ids.len(),
                    num_graphs
                )));
            }
        }

        let adjacency_lists: Vec<Tensor<B, 2, Int>> = batch
            .adjacency_lists()
            .iter()
            .map(|pairs| {
                let flat: Vec<i64> = pairs
                    .iter()
                    .flat_map(|&[src, dst]| [src as i64, dst as i64])
                    .collect();
                Tensor::<B, 2, Int>::from_data(TensorData::new(flat, [pairs.len(), 2]), device)
            })
            .collect();

        let edge_features: Option<Vec<Tensor<B, 2>>> = batch
            .edge_features()
            .map(|feats| feats.iter().map(|m| float_matrix::<B>(m, device)).collect());

        let node_to_graph: Vec<i64> = batch.node_to_graph().iter().map(|&g| g as i64).collect();
        let num_nodes = node_to_graph.len();

        let task_ids = task_ids.map(|ids| {
            let ids: Vec<i64> = ids.iter().map(|&t| t as i64).collect();
            Tensor::<B, 1, Int>::from_data(TensorData::new(ids, [num_graphs]), device)
        });

        Ok(Self {
            node_features: float_matrix::<B>(batch.node_features(), device),
            adjacency_lists,
            edge_features,
            node_to_graph: Tensor::<B, 1, Int>::from_data(TensorData::new(node_to_graph, [num_nodes]), device),
            num_graphs,
            labels: Tensor::<B, 1>::from_data(TensorData::new(labels.to_vec(), [num_graphs]), device),
            task_ids,
        })
    }
}

fn float_matrix<B: Backend>(matrix: &FeatureMatrix, device: &B::Device) -> Tensor<B, 2> {
    let shape = [matrix.num_rows(), matrix.width()];
    Tensor::<B, 2>::from_data(TensorData::new(matrix.as_slice().to_vec(), shape), device)
}

// ─── GraphTensorBatcher ───────────────────────────────────────────────────────
/// Burn Batcher that merges a DataLoader chunk of molecules into one
/// [`GraphBatchTensors`].
#[derive(Clone, Debug, Default)]
pub struct GraphTensorBatcher {
    /// Which label of each datapoint becomes the target
    pub label_kind: LabelKind,
}

impl GraphTensorBatcher {
    pub fn new(label_kind: LabelKind) -> Self {
        Self { label_kind }
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
// The DataLoader calls .batch(items, device) with each chunk of
// datapoints. Errors (incompatible feature widths, empty chunk)
// are returned as the batch value rather than panicking inside
// a loader worker.
impl<B: Backend> Batcher<B, Arc<MoleculeDatapoint>, Result<GraphBatchTensors<B>>> for GraphTensorBatcher {
    fn batch(&self, items: Vec<Arc<MoleculeDatapoint>>, device: &B::Device) -> Result<GraphBatchTensors<B>> {
        let mut batcher = GraphBatcher::new(BatcherConfig::unbounded());
        let mut labels  = Vec::with_capacity(items.len());

        for item in &items {
            batcher.add_sample(item)?;
            labels.push(item.label(self.label_kind));
        }

        let batch = batcher.finalize().ok_or(DataError::EmptyBatch)?;
        tracing::debug!("Converting batch of {} graphs to tensors", batch.num_graphs());
        GraphBatchTensors::from_batch(&batch, &labels, None, device)
    }
}
