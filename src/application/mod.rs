// ============================================================
// Layer 2 - Application / Use Cases
// ============================================================
// Sequences the other layers for one user-facing job:
//
//   train_use_case.rs    - train, optionally resuming
//   evaluate_use_case.rs - single validation pass
//
// No tensor math and no argument parsing here.

pub mod train_use_case;

pub mod evaluate_use_case;
