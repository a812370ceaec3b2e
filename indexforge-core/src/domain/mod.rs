//! Domain types for the index engine

pub mod company;
pub mod composition;
pub mod ids;
pub mod performance;

pub use company::{Company, FundamentalsSnapshot, UniverseEntry, UniverseSnapshot};
pub use composition::{
    Composition, Constituent, Exclusion, ExclusionReason, FactorSnapshot, SolverReport,
    SCHEMA_VERSION,
};
pub use ids::{ConfigHash, RunId, UniverseHash};
pub use performance::IndexPerformancePoint;
