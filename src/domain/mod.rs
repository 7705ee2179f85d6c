// ============================================================
// Layer 3 - Domain Layer
// ============================================================
// Plain Rust types that describe a training run without any
// ML framework in sight:
//
//   meter.rs    - running averages of per-batch statistics
//   scores.rs   - the per-epoch scores and best-score selector
//   progress.rs - epoch counter and best score of a run
//   traits.rs   - the CheckpointWriter seam
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

pub mod meter;

pub mod scores;

pub mod progress;

pub mod traits;
