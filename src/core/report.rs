use crate::core::Finding;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub total_indexes: u64,
    pub total_documents: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_size_bytes: Option<u64>,
    pub health_score: u32,
    pub health_band: String,
    pub critical: u64,
    pub warning: u64,
    pub suggestion: u64,
    pub info: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexAnalysis {
    pub document_count: u64,
    pub field_count: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<Finding>,
}

/// Full output of one analysis run. Immutable once assembled: summary
/// counts are the exact tally of the finding lists, and the score is a
/// pure function of those same lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: String,
    pub tool_version: String,
    pub generated_at: String,
    pub source: SourceInfo,
    pub summary: Summary,
    pub indexes: BTreeMap<String, IndexAnalysis>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub global_findings: Vec<Finding>,
}

impl Report {
    /// Every finding with its index scope, global findings first, then
    /// per-index in uid order. Scopes are `None` for instance-global.
    pub fn scoped_findings(&self) -> Vec<(Option<&str>, &Finding)> {
        let mut out: Vec<(Option<&str>, &Finding)> =
            self.global_findings.iter().map(|f| (None, f)).collect();
        for (uid, analysis) in &self.indexes {
            out.extend(analysis.findings.iter().map(|f| (Some(uid.as_str()), f)));
        }
        out
    }

    pub fn all_findings(&self) -> Vec<&Finding> {
        self.scoped_findings().into_iter().map(|(_, f)| f).collect()
    }

    pub fn finding_count(&self) -> usize {
        self.global_findings.len()
            + self.indexes.values().map(|a| a.findings.len()).sum::<usize>()
    }
}
