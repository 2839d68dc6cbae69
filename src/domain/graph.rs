// ============================================================
// Layer 3 — Molecule Graph Domain Type
// ============================================================
// One molecule as a typed graph:
//
//   node_features    — one row per atom, fixed width F
//   adjacency_lists  — one list of (source, target) pairs per
//                      edge type (bond type); indices are local
//                      to this molecule
//   edge_features    — optional, one matrix per edge type with
//                      one row per adjacency pair
//
// Example (ethanol heavy atoms, single bonds only):
//
//   nodes:      C0  C1  O2
//   edge type 0 (single): [(0,1), (1,2)]
//   edge type 1 (double): []          ← empty, never absent
//
// A GraphData is validated once in `GraphData::new` and is
// immutable afterwards, so every consumer can trust that it has
// at least one node and that all adjacency indices are
// < num_nodes.
//
// Why reject empty graphs?
//   A batch identifies each merged molecule only through the
//   node_to_graph ids of its nodes. A molecule without nodes
//   would be counted but invisible, and every label after it
//   would line up with the wrong node group.
//
// Reference: Rust Book §5 (Structs), §9 (Error Handling)

use crate::error::GraphDataError;

/// Row-major matrix of `f32` features stored as one flat buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    data:  Vec<f32>,
    width: usize,
}

impl FeatureMatrix {
    /// Build a matrix from a flat row-major buffer.
    ///
    /// Fails if `data.len()` is not a multiple of `width`, or if `width` is
    /// zero while `data` is not empty.
    pub fn new(data: Vec<f32>, width: usize) -> Result<Self, GraphDataError> {
        if width == 0 {
            if data.is_empty() {
                return Ok(Self { data, width });
            }
            return Err(GraphDataError::ZeroWidth);
        }
        if data.len() % width != 0 {
            return Err(GraphDataError::RaggedFeatures { len: data.len(), width });
        }
        Ok(Self { data, width })
    }

    /// Build a matrix from nested rows. All rows must share one width.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, GraphDataError> {
        let width = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * width);
        for row in rows {
            if row.len() != width {
                return Err(GraphDataError::RaggedFeatures {
                    len: data.len() + row.len(),
                    width,
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(data, width)
    }

    /// A matrix with no rows.
    pub fn empty(width: usize) -> Self {
        Self { data: Vec::new(), width }
    }

    pub fn num_rows(&self) -> usize {
        if self.width == 0 { 0 } else { self.data.len() / self.width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.width)?;
        self.data.get(start..start + self.width)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Immutable, validated graph of a single molecule.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphData {
    node_features:   FeatureMatrix,
    adjacency_lists: Vec<Vec<[usize; 2]>>,
    edge_features:   Option<Vec<FeatureMatrix>>,
}

impl GraphData {
    /// Validate and build a graph.
    ///
    /// The node count is the row count of `node_features` and must be at
    /// least one. Every adjacency index must be below it, and when edge
    /// features are present there must be one matrix per edge type with one
    /// row per adjacency pair.
    pub fn new(
        node_features:   FeatureMatrix,
        adjacency_lists: Vec<Vec<[usize; 2]>>,
        edge_features:   Option<Vec<FeatureMatrix>>,
    ) -> Result<Self, GraphDataError> {
        let num_nodes = node_features.num_rows();
        if num_nodes == 0 {
            return Err(GraphDataError::NoNodes);
        }

        for (edge_type, pairs) in adjacency_lists.iter().enumerate() {
            for (pair, &[src, dst]) in pairs.iter().enumerate() {
                if let Some(index) = [src, dst].into_iter().find(|&i| i >= num_nodes) {
                    return Err(GraphDataError::AdjacencyIndexOutOfRange {
                        edge_type,
                        pair,
                        index,
                        num_nodes,
                    });
                }
            }
        }

        if let Some(features) = &edge_features {
            if features.len() != adjacency_lists.len() {
                return Err(GraphDataError::EdgeTypeCountMismatch {
                    expected: adjacency_lists.len(),
                    got:      features.len(),
                });
            }
            for (edge_type, (pairs, feats)) in adjacency_lists.iter().zip(features).enumerate() {
                if pairs.len() != feats.num_rows() {
                    return Err(GraphDataError::EdgeFeatureRowMismatch {
                        edge_type,
                        adjacency_rows: pairs.len(),
                        feature_rows:   feats.num_rows(),
                    });
                }
            }
        }

        Ok(Self { node_features, adjacency_lists, edge_features })
    }

    /// Authoritative node count.
    pub fn num_nodes(&self) -> usize {
        self.node_features.num_rows()
    }

    /// Total adjacency pairs across all edge types.
    pub fn num_edges(&self) -> usize {
        self.adjacency_lists.iter().map(Vec::len).sum()
    }

    pub fn num_edge_types(&self) -> usize {
        self.adjacency_lists.len()
    }

    pub fn node_feature_dim(&self) -> usize {
        self.node_features.width()
    }

    pub fn node_features(&self) -> &FeatureMatrix {
        &self.node_features
    }

    pub fn adjacency_lists(&self) -> &[Vec<[usize; 2]>] {
        &self.adjacency_lists
    }

    pub fn edge_features(&self) -> Option<&[FeatureMatrix]> {
        self.edge_features.as_deref()
    }
}
