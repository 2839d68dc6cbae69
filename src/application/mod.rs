// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the lower layers for a training workflow:
// task samplers (Layer 4) decide which molecules are drawn,
// the graph batcher (Layer 4) decides where batches end, and
// this layer only decides which task goes next.
//
// Rules for this layer:
//   - No sampling policy or batching logic of its own
//   - No Burn tensors (that's Layer 5)
//   - No file I/O (that's Layer 6)
//
// Reference: Clean Architecture pattern

// Mixing many tasks into one batch stream
pub mod multitask;
