use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Where a snapshot came from. One snapshot corresponds to exactly one
/// point-in-time source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotSource {
    Instance {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
    Dump {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        version: Option<String>,
    },
}

impl SnapshotSource {
    pub fn version(&self) -> Option<&str> {
        match self {
            SnapshotSource::Instance { version, .. } | SnapshotSource::Dump { version, .. } => {
                version.as_deref()
            }
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            SnapshotSource::Instance { .. } => "instance",
            SnapshotSource::Dump { .. } => "dump",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinWordSizeForTypos {
    #[serde(alias = "oneTypo")]
    pub one_typo: u32,
    #[serde(alias = "twoTypos")]
    pub two_typos: u32,
}

impl Default for MinWordSizeForTypos {
    fn default() -> Self {
        Self {
            one_typo: 5,
            two_typos: 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypoTolerance {
    pub enabled: bool,
    #[serde(alias = "minWordSizeForTypos")]
    pub min_word_size_for_typos: MinWordSizeForTypos,
}

impl Default for TypoTolerance {
    fn default() -> Self {
        Self {
            enabled: true,
            min_word_size_for_typos: MinWordSizeForTypos::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Faceting {
    #[serde(alias = "maxValuesPerFacet")]
    pub max_values_per_facet: u64,
}

impl Default for Faceting {
    fn default() -> Self {
        Self {
            max_values_per_facet: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pagination {
    #[serde(alias = "maxTotalHits")]
    pub max_total_hits: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            max_total_hits: 1000,
        }
    }
}

pub const DEFAULT_RANKING_RULES: [&str; 6] =
    ["words", "typo", "proximity", "attribute", "sort", "exactness"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    #[serde(alias = "displayedAttributes")]
    pub displayed_attributes: Vec<String>,
    #[serde(alias = "searchableAttributes")]
    pub searchable_attributes: Vec<String>,
    #[serde(alias = "filterableAttributes")]
    pub filterable_attributes: Vec<String>,
    #[serde(alias = "sortableAttributes")]
    pub sortable_attributes: Vec<String>,
    #[serde(alias = "rankingRules")]
    pub ranking_rules: Vec<String>,
    #[serde(alias = "stopWords")]
    pub stop_words: Vec<String>,
    pub synonyms: BTreeMap<String, Vec<String>>,
    #[serde(alias = "distinctAttribute")]
    pub distinct_attribute: Option<String>,
    #[serde(alias = "typoTolerance")]
    pub typo_tolerance: TypoTolerance,
    pub faceting: Faceting,
    pub pagination: Pagination,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            displayed_attributes: vec!["*".to_string()],
            searchable_attributes: vec!["*".to_string()],
            filterable_attributes: Vec::new(),
            sortable_attributes: Vec::new(),
            ranking_rules: DEFAULT_RANKING_RULES.iter().map(|s| s.to_string()).collect(),
            stop_words: Vec::new(),
            synonyms: BTreeMap::new(),
            distinct_attribute: None,
            typo_tolerance: TypoTolerance::default(),
            faceting: Faceting::default(),
            pagination: Pagination::default(),
        }
    }
}

impl IndexSettings {
    pub fn searchable_is_wildcard(&self) -> bool {
        self.searchable_attributes.len() == 1 && self.searchable_attributes[0] == "*"
    }

    pub fn displayed_is_wildcard(&self) -> bool {
        self.displayed_attributes.len() == 1 && self.displayed_attributes[0] == "*"
    }

    pub fn is_all_default(&self) -> bool {
        *self == IndexSettings::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexStats {
    #[serde(alias = "numberOfDocuments")]
    pub number_of_documents: u64,
    #[serde(alias = "isIndexing")]
    pub is_indexing: bool,
    /// Field name to occurrence count. BTreeMap so JSON output and rule
    /// iteration order are stable.
    #[serde(alias = "fieldDistribution")]
    pub field_distribution: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexData {
    pub uid: String,
    #[serde(alias = "primaryKey", skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(alias = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub settings: IndexSettings,
    pub stats: IndexStats,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_documents: Vec<Value>,
}

impl IndexData {
    pub fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            primary_key: None,
            created_at: None,
            updated_at: None,
            settings: IndexSettings::default(),
            stats: IndexStats::default(),
            sample_documents: Vec::new(),
        }
    }

    /// Field names known for this index, in stable order.
    pub fn field_names(&self) -> Vec<&str> {
        self.stats.field_distribution.keys().map(String::as_str).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Enqueued,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Enqueued => "enqueued",
            TaskStatus::Processing => "processing",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "enqueued" => Ok(TaskStatus::Enqueued),
            "processing" => Ok(TaskStatus::Processing),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            "canceled" => Ok(TaskStatus::Canceled),
            other => Err(format!("invalid task status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskError {
    pub message: String,
    pub code: String,
}

/// One entry of the operation history. Timestamps stay RFC 3339 strings
/// in the model; rules parse them on demand and skip a check when a
/// timestamp it needs is absent or malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub uid: u64,
    #[serde(alias = "indexUid", skip_serializing_if = "Option::is_none")]
    pub index_uid: Option<String>,
    pub status: TaskStatus,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(alias = "enqueuedAt", skip_serializing_if = "Option::is_none")]
    pub enqueued_at: Option<String>,
    #[serde(alias = "startedAt", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(alias = "finishedAt", skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TaskError>,
}

impl Task {
    pub fn new(uid: u64, kind: &str, status: TaskStatus) -> Self {
        Self {
            uid,
            index_uid: None,
            status,
            kind: kind.to_string(),
            enqueued_at: None,
            started_at: None,
            finished_at: None,
            batch_size: None,
            error: None,
        }
    }
}

/// How the analyzed process was launched, read from its config TOML.
/// Absent entirely when no config was supplied; the launch-config rules
/// then emit nothing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    pub env: Option<String>,
    pub master_key: Option<String>,
    pub http_addr: Option<String>,
    pub http_payload_size_limit: Option<u64>,
    pub max_indexing_memory: Option<u64>,
    pub max_indexing_threads: Option<u32>,
    pub ssl_configured: bool,
    pub snapshot_scheduled: bool,
    pub log_level: Option<String>,
}

impl LaunchConfig {
    pub fn is_production(&self) -> bool {
        self.env.as_deref() == Some("production")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    Basic,
    Sort,
    Filter,
}

impl ProbeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ProbeKind::Basic => "basic",
            ProbeKind::Sort => "sort",
            ProbeKind::Filter => "filter",
        }
    }
}

/// Outcome of one read-only search probe executed by the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub index_uid: String,
    pub kind: ProbeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_size_bytes: Option<u64>,
}

/// Normalized point-in-time capture of the analyzed deployment.
/// Produced by a collector, read-only to the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source: SnapshotSource,
    pub indexes: Vec<IndexData>,
    #[serde(default)]
    pub database_size_bytes: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_config: Option<LaunchConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probes: Vec<ProbeResult>,
    #[serde(default)]
    pub sensitive_scan: bool,
}

impl Snapshot {
    pub fn new(source: SnapshotSource) -> Self {
        Self {
            source,
            indexes: Vec::new(),
            database_size_bytes: 0,
            tasks: Vec::new(),
            launch_config: None,
            probes: Vec::new(),
            sensitive_scan: false,
        }
    }

    pub fn total_documents(&self) -> u64 {
        self.indexes
            .iter()
            .map(|i| i.stats.number_of_documents)
            .sum()
    }

    pub fn tasks_for_index<'a>(&'a self, uid: &str) -> Vec<&'a Task> {
        self.tasks
            .iter()
            .filter(|t| t.index_uid.as_deref() == Some(uid))
            .collect()
    }

    pub fn probes_for_index<'a>(&'a self, uid: &str) -> Vec<&'a ProbeResult> {
        self.probes
            .iter()
            .filter(|p| p.index_uid == uid)
            .collect()
    }
}
