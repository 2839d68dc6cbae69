// ============================================================
// Layer 4 — Graph Batcher
// ============================================================
// Merges molecules of different sizes into one Batch.
//
// Molecules have different node and edge counts, so they cannot
// be stacked into a [batch, ...] tensor like fixed-size samples.
// Instead every graph in the batch becomes one disconnected
// component of a single large graph:
//
//   molecule 0: 3 nodes, edges (0,1) (1,2)
//   molecule 1: 2 nodes, edge  (1,0)
//
//   merged node rows:  n0 n1 n2 | n3 n4
//   merged edges:      (0,1) (1,2) | (4,3)   ← molecule 1 offset by 3
//   node_to_graph:     0  0  0  | 1  1
//
// The node matrix is an arena; each molecule's local indices
// are translated by the running node count at merge time.
//
// Limits (max graphs / nodes / edges) are checked BEFORE a
// molecule is merged. If it would not fit, `add_sample` returns
// `AddOutcome::Full` without touching any state, so the caller
// can finalize and retry the same molecule on a fresh batch.
//
// A molecule that alone exceeds the node or edge limit is still
// accepted when the batcher is empty, and flagged as Oversized,
// so it can never starve every batch.
//
// Reference: Burn Book §4 (Batcher)

use serde::{Deserialize, Serialize};

use crate::domain::datapoint::MoleculeDatapoint;
use crate::domain::graph::FeatureMatrix;
use crate::error::{DataError, GraphDataError, Result};

// ─── BatcherConfig ────────────────────────────────────────────────────────────
/// Size limits for one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatcherConfig {
    /// Maximum number of molecules in one batch
    pub max_num_graphs: usize,

    /// Maximum total atoms across all molecules in one batch
    pub max_num_nodes: usize,

    /// Maximum total adjacency pairs (all edge types); None = no limit
    #[serde(default)]
    pub max_num_edges: Option<usize>,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            max_num_graphs: 256,
            max_num_nodes:  10_000,
            max_num_edges:  None,
        }
    }
}

impl BatcherConfig {
    pub fn new(max_num_graphs: usize, max_num_nodes: usize) -> Self {
        Self { max_num_graphs, max_num_nodes, max_num_edges: None }
    }

    pub fn with_max_num_edges(mut self, max_num_edges: usize) -> Self {
        self.max_num_edges = Some(max_num_edges);
        self
    }

    /// No limits at all: everything offered goes into one batch.
    pub fn unbounded() -> Self {
        Self { max_num_graphs: usize::MAX, max_num_nodes: usize::MAX, max_num_edges: None }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_num_graphs == 0 {
            return Err(DataError::invalid_config("max_num_graphs must be at least 1"));
        }
        if self.max_num_nodes == 0 {
            return Err(DataError::invalid_config("max_num_nodes must be at least 1"));
        }
        if self.max_num_edges == Some(0) {
            return Err(DataError::invalid_config("max_num_edges must be at least 1 when set"));
        }
        Ok(())
    }
}

// ─── AddOutcome ───────────────────────────────────────────────────────────────
/// What happened to a molecule offered to [`GraphBatcher::add_sample`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Merged into the current batch.
    Added,
    /// Merged into an empty batch although it alone exceeds a limit.
    /// The batch should be finalized before anything else is added.
    Oversized,
    /// Not merged; the batch has no room for it. State is unchanged.
    Full,
}

// ─── Batch ────────────────────────────────────────────────────────────────────
/// Several molecule graphs merged into one disconnected graph.
///
/// Invariants:
///   - `node_to_graph.len()` equals the node row count
///   - `node_to_graph` is non-decreasing with values `0..num_graphs`,
///     each a contiguous run
///   - every adjacency index is below the node row count
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    num_graphs:          usize,
    node_features:       FeatureMatrix,
    adjacency_lists:     Vec<Vec<[usize; 2]>>,
    edge_features:       Option<Vec<FeatureMatrix>>,
    node_to_graph:       Vec<usize>,
    num_nodes_per_graph: Vec<usize>,
    num_edges_per_graph: Vec<usize>,
    fingerprints:        Option<FeatureMatrix>,
    descriptors:         Option<FeatureMatrix>,
}

impl Batch {
    pub fn num_graphs(&self) -> usize {
        self.num_graphs
    }

    pub fn num_nodes(&self) -> usize {
        self.node_to_graph.len()
    }

    pub fn num_edges(&self) -> usize {
        self.adjacency_lists.iter().map(Vec::len).sum()
    }

    pub fn num_edge_types(&self) -> usize {
        self.adjacency_lists.len()
    }

    /// Concatenated node features, one row per node.
    pub fn node_features(&self) -> &FeatureMatrix {
        &self.node_features
    }

    /// Per-edge-type adjacency pairs, indices into `node_features`.
    pub fn adjacency_lists(&self) -> &[Vec<[usize; 2]>] {
        &self.adjacency_lists
    }

    /// Per-edge-type edge features; present only if every graph had them.
    pub fn edge_features(&self) -> Option<&[FeatureMatrix]> {
        self.edge_features.as_deref()
    }

    /// Index of the originating molecule for each node row.
    pub fn node_to_graph(&self) -> &[usize] {
        &self.node_to_graph
    }

    pub fn num_nodes_per_graph(&self) -> &[usize] {
        &self.num_nodes_per_graph
    }

    pub fn num_edges_per_graph(&self) -> &[usize] {
        &self.num_edges_per_graph
    }

    /// One fingerprint row per graph; present only if every datapoint had one.
    pub fn fingerprints(&self) -> Option<&FeatureMatrix> {
        self.fingerprints.as_ref()
    }

    /// One descriptor row per graph; present only if every datapoint had one.
    pub fn descriptors(&self) -> Option<&FeatureMatrix> {
        self.descriptors.as_ref()
    }
}

// ─── Accumulators ─────────────────────────────────────────────────────────────
// Optional per-batch data: stays Some while every merged item has it,
// collapses to None for the rest of the batch as soon as one lacks it.
#[derive(Debug)]
enum Partial<T> {
    Empty,
    Some(T),
    Missing,
}

impl<T> Default for Partial<T> {
    fn default() -> Self {
        Partial::Empty
    }
}

impl<T> Partial<T> {
    fn into_option(self) -> Option<T> {
        match self {
            Partial::Some(v) => Some(v),
            _ => None,
        }
    }
}

/// Flat rows of fixed length (fingerprints, descriptors).
#[derive(Debug)]
struct RowBuffer {
    data:  Vec<f32>,
    width: usize,
}

impl RowBuffer {
    fn into_matrix(self) -> Option<FeatureMatrix> {
        FeatureMatrix::new(self.data, self.width).ok()
    }
}

// ─── GraphBatcher ─────────────────────────────────────────────────────────────
/// Accumulates molecules into a [`Batch`] under size limits.
///
/// Owned by exactly one iteration loop; `finalize` hands out the finished
/// batch and leaves the batcher empty and ready for reuse.
#[derive(Debug)]
pub struct GraphBatcher {
    config:              BatcherConfig,
    num_graphs:          usize,
    node_feature_dim:    Option<usize>,
    node_data:           Vec<f32>,
    adjacency_lists:     Vec<Vec<[usize; 2]>>,
    edge_features:       Partial<Vec<RowBuffer>>,
    node_to_graph:       Vec<usize>,
    num_nodes_per_graph: Vec<usize>,
    num_edges_per_graph: Vec<usize>,
    fingerprints:        Partial<RowBuffer>,
    descriptors:         Partial<RowBuffer>,
}

impl GraphBatcher {
    pub fn new(config: BatcherConfig) -> Self {
        Self {
            config,
            num_graphs:          0,
            node_feature_dim:    None,
            node_data:           Vec::new(),
            adjacency_lists:     Vec::new(),
            edge_features:       Partial::Empty,
            node_to_graph:       Vec::new(),
            num_nodes_per_graph: Vec::new(),
            num_edges_per_graph: Vec::new(),
            fingerprints:        Partial::Empty,
            descriptors:         Partial::Empty,
        }
    }

    pub fn config(&self) -> &BatcherConfig {
        &self.config
    }

    pub fn num_graphs(&self) -> usize {
        self.num_graphs
    }

    pub fn num_nodes(&self) -> usize {
        self.node_to_graph.len()
    }

    pub fn num_edges(&self) -> usize {
        self.num_edges_per_graph.iter().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.num_graphs == 0
    }

    /// Whether a graph of the given size fits next to what is already merged.
    pub fn can_fit(&self, num_nodes: usize, num_edges: usize) -> bool {
        let cfg = &self.config;
        self.num_graphs < cfg.max_num_graphs
            && self.num_nodes().saturating_add(num_nodes) <= cfg.max_num_nodes
            && cfg
                .max_num_edges
                .map_or(true, |max| self.num_edges().saturating_add(num_edges) <= max)
    }

    /// Offer one molecule to the batch.
    ///
    /// Returns `Full` (state untouched) when it does not fit. An empty
    /// batcher always accepts; if the molecule alone exceeds a limit the
    /// result is `Oversized`. Errors mean the molecule is structurally
    /// incompatible with the batch (feature widths, edge-type count); the
    /// batcher is left unchanged in that case too.
    pub fn add_sample(&mut self, datapoint: &MoleculeDatapoint) -> Result<AddOutcome> {
        let graph     = &datapoint.graph;
        let num_nodes = graph.num_nodes();
        let num_edges = graph.num_edges();

        let fits = self.can_fit(num_nodes, num_edges);
        if !fits && !self.is_empty() {
            return Ok(AddOutcome::Full);
        }

        self.check_compatible(datapoint)?;
        self.merge(datapoint);

        if fits {
            Ok(AddOutcome::Added)
        } else {
            tracing::warn!(
                "Molecule '{}' ({} nodes, {} edges) exceeds batch limits; placed in its own batch",
                datapoint.smiles,
                num_nodes,
                num_edges,
            );
            Ok(AddOutcome::Oversized)
        }
    }

    /// Hand out the merged batch and reset for reuse.
    ///
    /// Returns None when nothing was merged: empty batches are never
    /// handed to consumers.
    pub fn finalize(&mut self) -> Option<Batch> {
        if self.is_empty() {
            return None;
        }

        let width = self.node_feature_dim.unwrap_or(0);
        let fresh = GraphBatcher::new(self.config.clone());
        let done  = std::mem::replace(self, fresh);

        let edge_features = done.edge_features.into_option().map(|buffers| {
            buffers
                .into_iter()
                .map(|b| b.into_matrix().unwrap_or_else(|| FeatureMatrix::empty(0)))
                .collect()
        });

        let batch = Batch {
            num_graphs:          done.num_graphs,
            node_features:       FeatureMatrix::new(done.node_data, width)
                .unwrap_or_else(|_| FeatureMatrix::empty(width)),
            adjacency_lists:     done.adjacency_lists,
            edge_features,
            node_to_graph:       done.node_to_graph,
            num_nodes_per_graph: done.num_nodes_per_graph,
            num_edges_per_graph: done.num_edges_per_graph,
            fingerprints:        done.fingerprints.into_option().and_then(RowBuffer::into_matrix),
            descriptors:         done.descriptors.into_option().and_then(RowBuffer::into_matrix),
        };

        tracing::debug!(
            "Finalized batch: {} graphs, {} nodes, {} edges",
            batch.num_graphs(),
            batch.num_nodes(),
            batch.num_edges(),
        );
        Some(batch)
    }

    // Everything that can fail is checked here, before any state changes.
    fn check_compatible(&self, datapoint: &MoleculeDatapoint) -> Result<()> {
        let graph = &datapoint.graph;
        if self.is_empty() {
            return Ok(());
        }

        if let Some(expected) = self.node_feature_dim {
            if graph.node_feature_dim() != expected {
                return Err(GraphDataError::NodeFeatureWidthMismatch {
                    expected,
                    got: graph.node_feature_dim(),
                }
                .into());
            }
        }

        if graph.num_edge_types() != self.adjacency_lists.len() {
            return Err(GraphDataError::EdgeTypeCountMismatch {
                expected: self.adjacency_lists.len(),
                got:      graph.num_edge_types(),
            }
            .into());
        }

        if let (Partial::Some(buffers), Some(feats)) = (&self.edge_features, graph.edge_features()) {
            for (edge_type, (buf, f)) in buffers.iter().zip(feats).enumerate() {
                if !f.is_empty() && !buf.data.is_empty() && f.width() != buf.width {
                    return Err(GraphDataError::EdgeFeatureWidthMismatch {
                        edge_type,
                        expected: buf.width,
                        got:      f.width(),
                    }
                    .into());
                }
            }
        }

        check_vector_len("fingerprint", &self.fingerprints, datapoint.fingerprint.as_deref())?;
        check_vector_len("descriptors", &self.descriptors, datapoint.descriptors.as_deref())?;
        Ok(())
    }

    fn merge(&mut self, datapoint: &MoleculeDatapoint) {
        let graph       = &datapoint.graph;
        let offset      = self.num_nodes();
        let graph_index = self.num_graphs;

        if self.is_empty() {
            self.adjacency_lists = vec![Vec::new(); graph.num_edge_types()];
        }
        if self.node_feature_dim.is_none() {
            self.node_feature_dim = Some(graph.node_feature_dim());
        }

        // Node rows: plain concatenation.
        self.node_data.extend_from_slice(graph.node_features().as_slice());

        // Adjacency: shift every local index by the nodes already merged.
        for (merged, local) in self.adjacency_lists.iter_mut().zip(graph.adjacency_lists()) {
            merged.extend(local.iter().map(|&[src, dst]| [src + offset, dst + offset]));
        }

        self.edge_features = match (std::mem::take(&mut self.edge_features), graph.edge_features()) {
            (Partial::Missing, _) | (_, None) => Partial::Missing,
            (Partial::Empty, Some(feats)) => Partial::Some(
                feats
                    .iter()
                    .map(|f| RowBuffer { data: f.as_slice().to_vec(), width: f.width() })
                    .collect(),
            ),
            (Partial::Some(mut buffers), Some(feats)) => {
                for (buf, f) in buffers.iter_mut().zip(feats) {
                    if buf.data.is_empty() {
                        buf.width = f.width();
                    }
                    buf.data.extend_from_slice(f.as_slice());
                }
                Partial::Some(buffers)
            }
        };

        self.node_to_graph.extend(std::iter::repeat(graph_index).take(graph.num_nodes()));
        self.num_nodes_per_graph.push(graph.num_nodes());
        self.num_edges_per_graph.push(graph.num_edges());
        append_row(&mut self.fingerprints, datapoint.fingerprint.as_deref());
        append_row(&mut self.descriptors, datapoint.descriptors.as_deref());
        self.num_graphs += 1;
    }
}

fn check_vector_len(vector: &'static str, acc: &Partial<RowBuffer>, row: Option<&[f32]>) -> Result<()> {
    if let (Partial::Some(buf), Some(row)) = (acc, row) {
        if row.len() != buf.width {
            return Err(GraphDataError::VectorLengthMismatch {
                vector,
                expected: buf.width,
                got:      row.len(),
            }
            .into());
        }
    }
    Ok(())
}

fn append_row(acc: &mut Partial<RowBuffer>, row: Option<&[f32]>) {
    *acc = match (std::mem::take(acc), row) {
        (Partial::Missing, _) | (_, None) => Partial::Missing,
        (Partial::Empty, Some(row)) => Partial::Some(RowBuffer { data: row.to_vec(), width: row.len() }),
        (Partial::Some(mut buf), Some(row)) => {
            buf.data.extend_from_slice(row);
            Partial::Some(buf)
        }
    };
}

// ─── Test Support ─────────────────────────────────────────────────────────────
/// Panics unless `batch` satisfies every structural invariant of [`Batch`].
/// Shared by the tests of everything that produces batches.
#[cfg(test)]
pub(crate) fn assert_batch_invariants(batch: &Batch) {
    let n = batch.node_features().num_rows();
    assert_eq!(batch.node_to_graph().len(), n);
    assert!(batch.node_to_graph().windows(2).all(|w| w[0] <= w[1]));
    let mut distinct = batch.node_to_graph().to_vec();
    distinct.dedup();
    assert_eq!(distinct, (0..batch.num_graphs()).collect::<Vec<_>>());
    assert_eq!(batch.num_nodes_per_graph().len(), batch.num_graphs());
    assert_eq!(batch.num_nodes_per_graph().iter().sum::<usize>(), n);
    assert_eq!(batch.num_edges_per_graph().iter().sum::<usize>(), batch.num_edges());
    for pairs in batch.adjacency_lists() {
        assert!(pairs.iter().all(|&[s, d]| s < n && d < n));
    }
}
