// ============================================================
// Layer 6 - Infrastructure Layer
// ============================================================
// File system and process-wide concerns:
//
//   checkpoint.rs - checkpoint files, rolling saver, resume
//   metrics.rs    - score.log and best_map.log
//   logging.rs    - tracing subscriber with optional log file
//   env_stats.rs  - environment summary for the run log
//
// Reference: Burn Book §5 (Checkpointing)

pub mod checkpoint;

pub mod metrics;

pub mod logging;

pub mod env_stats;
