// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong to one business
// layer:
//
//   config.rs — the aggregate DataConfig and its JSON store.
//               Lets a training run record exactly which
//               limits, fold sizes and seeds produced its
//               batches.
//
// Reference: Rust Book §9 (Error Handling with anyhow)

/// DataConfig persistence
pub mod config;
