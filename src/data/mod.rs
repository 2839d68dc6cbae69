// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a task's molecule list and a merged
// graph batch:
//
//   Task
//     │
//     ▼
//   TaskSampler       → train / valid / test fold lists
//     │
//     ▼
//   BatchIterable     → walks one fold in (optionally shuffled) order
//     │
//     ▼
//   GraphBatcher      → merges molecules into one disjoint graph
//     │
//     ▼
//   Batch + labels
//
// MoleculeDataset exposes the same datapoints through Burn's
// Dataset trait for callers that prefer Burn's DataLoader.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Accumulates molecule graphs into one merged batch
pub mod batcher;

/// Restartable iteration over finished batches
pub mod batch_iter;

/// Random, balanced and stratified few-shot task samplers
pub mod sampler;

/// Implements Burn's Dataset trait for molecule lists
pub mod dataset;
