mod comparison;
mod finding;
mod report;
mod snapshot;

pub use comparison::{
    ChangeDirection, ComparisonReport, FindingChange, FindingStatus, IndexChange, IndexStatus,
    MetricChange, ReportRef, Trend,
};
pub use finding::{Category, Finding, FindingFix, Severity};
pub use report::{IndexAnalysis, Report, SourceInfo, Summary};
pub use snapshot::{
    DEFAULT_RANKING_RULES, Faceting, IndexData, IndexSettings, IndexStats, LaunchConfig,
    MinWordSizeForTypos, Pagination, ProbeKind, ProbeResult, Snapshot, SnapshotSource, Task,
    TaskError, TaskStatus, TypoTolerance,
};
