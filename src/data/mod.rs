/// Data layer: core types, loading, transforms and export.
///
/// Architecture:
/// ```text
///  .txt / .csv / .json / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse + clean (optionally chunked) → Dataset
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  Dataset  │  title, x, y
///   └──────────┘
///        │
///        ▼
///   ┌───────────────────┐
///   │ transform / fit    │  slice, combine, polynomial fit → new Dataset
///   └───────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  .csv / .parquet
///   └──────────┘
/// ```

pub mod export;
pub mod fit;
pub mod loader;
pub mod model;
pub mod transform;
