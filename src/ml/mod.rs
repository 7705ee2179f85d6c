// ============================================================
// Layer 5 - ML Layer (Burn)
// ============================================================
// Everything that touches tensors, modules or optimizers:
//
//   models/        - CNN families behind one `Network` enum
//   registry.rs    - model name → architecture config
//   accuracy.rs    - top-k hit counting
//   lr_schedule.rs - warmup + step / poly / cosine learning rate
//   optimizer.rs   - SGD and Nesterov SGD
//   evaluator.rs   - validation pass
//   trainer.rs     - the epoch loop
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)

/// CNN architectures
pub mod models;

/// Name → network lookup
pub mod registry;

pub mod accuracy;

pub mod lr_schedule;

pub mod optimizer;

/// Validation pass returning top-1 / top-5 error
pub mod evaluator;

/// Train + validate loop with checkpoint callbacks
pub mod trainer;
