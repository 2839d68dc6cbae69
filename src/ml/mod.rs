// ============================================================
// Layer 5 — ML Layer (Burn)
// ============================================================
// The only layer that builds Burn tensors. Layers 3 and 4 work
// on plain Vec-backed types so they stay testable without a
// device; this layer copies a finished Batch onto one.
//
// Reference: Burn Book §4 (Batcher)

/// Batch → tensor conversion and the Burn Batcher adapter
pub mod tensors;
