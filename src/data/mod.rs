// ============================================================
// Layer 4 - Data Pipeline
// ============================================================
// Everything between an image directory on disk and a tensor
// batch on the device:
//
//   train/ and val/ directories
//       │
//       ▼
//   ImageFolder   → indexes (path, label) records
//       │
//       ▼
//   DataLoader    → shuffles, splits into batches, runs workers
//       │
//       ▼
//   ImageBatcher  → decodes, applies Transform, stacks tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Image-folder dataset over train/ and val/ splits
pub mod dataset;

/// Augmentation and evaluation transforms
pub mod transform;

/// Implements Burn's Batcher trait for image records
pub mod batcher;
