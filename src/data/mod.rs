/// Data layer: core types, file formats, and filtering.
///
/// Architecture:
/// ```text
///  trace .csv / .json        table .csv        profile .csv
///        │                       │                  │
///        ▼                       ▼                  ▼
///   ┌──────────┐          ┌────────────┐     ┌───────────┐
///   │  loader   │          │  loader     │     │  profile   │  selections → tables
///   └──────────┘          └────────────┘     └───────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  model    │  Trace: raw columns + correction / mask overlays
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐          ┌──────────┐
///   │  filter   │ ───────► │  export   │  series / trace / peak table CSV
///   └──────────┘          └──────────┘
/// ```

pub mod export;
pub mod filter;
pub mod loader;
pub mod model;
pub mod profile;
