use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Suggestion,
    Info,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Suggestion => "suggestion",
            Severity::Info => "info",
        }
    }

    /// 0 for critical, 3 for info. Used for the deterministic report sort.
    pub const fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::Warning => 1,
            Severity::Suggestion => 2,
            Severity::Info => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "warning" => Ok(Severity::Warning),
            "suggestion" => Ok(Severity::Suggestion),
            "info" => Ok(Severity::Info),
            other => Err(format!(
                "invalid severity: {other} (expected critical|warning|suggestion|info)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Schema,
    Content,
    Performance,
    Practice,
    Launch,
    Probe,
}

impl Category {
    /// ID namespace prefix. A finding's ID always starts with its
    /// category's prefix.
    pub const fn prefix(self) -> char {
        match self {
            Category::Schema => 'S',
            Category::Content => 'D',
            Category::Performance => 'P',
            Category::Practice => 'B',
            Category::Launch => 'I',
            Category::Probe => 'Q',
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Schema => "schema",
            Category::Content => "content",
            Category::Performance => "performance",
            Category::Practice => "practice",
            Category::Launch => "launch",
            Category::Probe => "probe",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-actionable remediation: an API call that would address the
/// finding. The payload is syntactically valid for the endpoint; nothing
/// ever executes it here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingFix {
    pub fix_type: String,
    pub endpoint: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub category: Category,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub impact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix: Option<FindingFix>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

impl Finding {
    pub fn new(
        id: &str,
        category: Category,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        impact: impl Into<String>,
    ) -> Self {
        Self {
            id: id.to_string(),
            category,
            severity,
            title: title.into(),
            description: description.into(),
            impact: impact.into(),
            index_uid: None,
            current_value: None,
            recommended_value: None,
            fix: None,
            references: Vec::new(),
        }
    }

    pub fn for_index(mut self, uid: &str) -> Self {
        self.index_uid = Some(uid.to_string());
        self
    }

    pub fn current(mut self, value: Value) -> Self {
        self.current_value = Some(value);
        self
    }

    pub fn recommended(mut self, value: Value) -> Self {
        self.recommended_value = Some(value);
        self
    }

    pub fn with_fix(mut self, fix_type: &str, endpoint: String, payload: Value) -> Self {
        self.fix = Some(FindingFix {
            fix_type: fix_type.to_string(),
            endpoint,
            payload,
        });
        self
    }

    pub fn reference(mut self, url: &str) -> Self {
        self.references.push(url.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_critical_first() {
        assert!(Severity::Critical < Severity::Warning);
        assert!(Severity::Warning < Severity::Suggestion);
        assert!(Severity::Suggestion < Severity::Info);
        assert_eq!(Severity::Critical.rank(), 0);
        assert_eq!(Severity::Info.rank(), 3);
    }

    #[test]
    fn severity_parses_case_insensitively() {
        assert_eq!("Warning".parse::<Severity>(), Ok(Severity::Warning));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn category_prefixes_are_distinct() {
        use std::collections::HashSet;
        let prefixes: HashSet<char> = [
            Category::Schema,
            Category::Content,
            Category::Performance,
            Category::Practice,
            Category::Launch,
            Category::Probe,
        ]
        .iter()
        .map(|c| c.prefix())
        .collect();
        assert_eq!(prefixes.len(), 6);
    }
}
