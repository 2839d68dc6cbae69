// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types describing what the data IS:
//
//   graph      — one molecule's graph (nodes, typed edges)
//   datapoint  — a labelled molecule
//   task       — tasks, task samples, folds, label classes
//   traits     — the TaskSampler abstraction
//
// Rules for this layer:
//   - NO Burn framework types
//   - NO file I/O
//   - NO randomness (sampling policies live in Layer 4)
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A validated molecule graph
pub mod graph;

// A labelled molecule with its graph
pub mod datapoint;

// Tasks and the fold lists drawn from them
pub mod task;

// Core abstractions that other layers implement
pub mod traits;
