use crate::core::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    Improvement,
    Regression,
    Neutral,
}

impl ChangeDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            ChangeDirection::Improvement => "improvement",
            ChangeDirection::Regression => "regression",
            ChangeDirection::Neutral => "neutral",
        }
    }
}

impl fmt::Display for ChangeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricChange {
    pub metric: String,
    pub old_value: i64,
    pub new_value: i64,
    pub delta: i64,
    pub direction: ChangeDirection,
}

impl MetricChange {
    /// `higher_is_better = None` marks a neutral metric (counts that are
    /// neither good nor bad on their own, like total documents).
    pub fn calculate(
        metric: &str,
        old_value: i64,
        new_value: i64,
        higher_is_better: Option<bool>,
    ) -> Self {
        let delta = new_value - old_value;
        let direction = match higher_is_better {
            _ if delta == 0 => ChangeDirection::Neutral,
            None => ChangeDirection::Neutral,
            Some(true) if delta > 0 => ChangeDirection::Improvement,
            Some(true) => ChangeDirection::Regression,
            Some(false) if delta > 0 => ChangeDirection::Regression,
            Some(false) => ChangeDirection::Improvement,
        };
        Self {
            metric: metric.to_string(),
            old_value,
            new_value,
            delta,
            direction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    New,
    Resolved,
    Persisting,
}

impl FindingStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            FindingStatus::New => "new",
            FindingStatus::Resolved => "resolved",
            FindingStatus::Persisting => "persisting",
        }
    }
}

impl fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one finding identifier across the two compared reports.
/// Identity is (id, index scope); object contents are never compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingChange {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_uid: Option<String>,
    pub status: FindingStatus,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_severity: Option<Severity>,
    #[serde(default)]
    pub severity_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    Added,
    Removed,
    Present,
}

impl IndexStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            IndexStatus::Added => "added",
            IndexStatus::Removed => "removed",
            IndexStatus::Present => "present",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexChange {
    pub uid: String,
    pub status: IndexStatus,
    pub finding_delta: i64,
    pub document_delta: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improved,
    Degraded,
    Stable,
}

impl Trend {
    pub const fn as_str(self) -> &'static str {
        match self {
            Trend::Improved => "improved",
            Trend::Degraded => "degraded",
            Trend::Stable => "stable",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRef {
    pub generated_at: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub old_report: ReportRef,
    pub new_report: ReportRef,
    pub trend: Trend,
    pub metric_changes: Vec<MetricChange>,
    pub finding_changes: Vec<FindingChange>,
    pub index_changes: Vec<IndexChange>,
    pub recommendations: Vec<String>,
}

impl ComparisonReport {
    pub fn changes_with_status(&self, status: FindingStatus) -> Vec<&FindingChange> {
        self.finding_changes
            .iter()
            .filter(|c| c.status == status)
            .collect()
    }
}
