// Performance tracking domain
pub mod degradation;
pub mod performance_snapshot;
pub mod summary;

pub use degradation::{DegradationReason, DegradationReport};
pub use performance_snapshot::PerformanceSnapshot;
pub use summary::{PerformanceSummary, Trend};
