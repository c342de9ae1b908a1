use anyhow::{Result, bail};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{Finding, Snapshot};

mod content;
mod launch;
mod patterns;
mod performance;
mod practice;
mod probe;
mod schema;

pub use patterns::{Patterns, Thresholds};

/// Read-only view handed to every rule module. Rules do no I/O and hold
/// no state; passing thresholds and patterns in lets tests substitute
/// alternates without touching process globals.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub snapshot: &'a Snapshot,
    pub thresholds: &'a Thresholds,
    pub patterns: &'a Patterns,
}

/// Runs the whole rule catalog over one snapshot and returns the final,
/// deterministically ordered finding list. A duplicate finding ID within
/// one index scope is a contract violation and aborts the run.
pub fn evaluate(ctx: &RuleContext) -> Result<Vec<Finding>> {
    let mut out = Vec::new();

    for index in &ctx.snapshot.indexes {
        out.extend(schema::index_rules(ctx, index));
        out.extend(content::index_rules(ctx, index));
        out.extend(performance::index_rules(ctx, index));
        out.extend(practice::index_rules(ctx, index));
        out.extend(probe::index_rules(ctx, index));
    }
    out.extend(performance::instance_rules(ctx));
    out.extend(practice::instance_rules(ctx));
    out.extend(launch::instance_rules(ctx));

    sort_findings(&mut out);
    check_unique_ids(&out)?;
    Ok(out)
}

/// Severity first, then index scope (instance-global ahead of indexed),
/// then ID. Two identical snapshots always yield byte-identical order.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        (a.severity.rank(), &a.index_uid, &a.id).cmp(&(b.severity.rank(), &b.index_uid, &b.id))
    });
}

/// RFC 3339 parse that swallows malformed input; a bad timestamp is
/// treated like an absent one and the depending check stays silent.
fn parse_timestamp(value: Option<&str>) -> Option<OffsetDateTime> {
    value.and_then(|s| OffsetDateTime::parse(s, &Rfc3339).ok())
}

fn check_unique_ids(findings: &[Finding]) -> Result<()> {
    use std::collections::HashSet;
    let mut seen: HashSet<(Option<&str>, &str)> = HashSet::new();
    for f in findings {
        if !seen.insert((f.index_uid.as_deref(), f.id.as_str())) {
            let scope = f.index_uid.as_deref().unwrap_or("<instance>");
            bail!("duplicate finding id {} within scope {scope}", f.id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        IndexData, IndexSettings, LaunchConfig, Snapshot, SnapshotSource, Task, TaskError,
        TaskStatus,
    };
    use serde_json::json;

    fn snapshot_with(indexes: Vec<IndexData>) -> Snapshot {
        let mut snap = Snapshot::new(SnapshotSource::Instance {
            url: "http://localhost:7700".to_string(),
            version: Some("1.12.0".to_string()),
        });
        snap.indexes = indexes;
        snap
    }

    fn eval(snap: &Snapshot) -> Vec<Finding> {
        let thresholds = Thresholds::default();
        let patterns = Patterns::compile().expect("compile patterns");
        evaluate(&RuleContext {
            snapshot: snap,
            thresholds: &thresholds,
            patterns: &patterns,
        })
        .expect("evaluate")
    }

    fn populated_index(uid: &str) -> IndexData {
        let mut index = IndexData::new(uid);
        index.stats.number_of_documents = 5000;
        for field in ["title", "overview", "release_date", "genre", "director",
                      "runtime", "poster", "tagline", "budget", "revenue", "homepage"] {
            index.stats.field_distribution.insert(field.to_string(), 5000);
        }
        index
    }

    #[test]
    fn id_prefix_always_matches_category() {
        let mut index = populated_index("movies");
        index.settings = IndexSettings::default();
        let mut snap = snapshot_with(vec![index]);
        snap.launch_config = Some(LaunchConfig {
            env: Some("production".to_string()),
            ..LaunchConfig::default()
        });
        let mut failed = Task::new(1, "documentAdditionOrUpdate", TaskStatus::Failed);
        failed.index_uid = Some("movies".to_string());
        failed.error = Some(TaskError {
            message: "payload too large".to_string(),
            code: "payload_too_large".to_string(),
        });
        snap.tasks = (0..12).map(|n| {
            let mut t = failed.clone();
            t.uid = n;
            t
        }).collect();

        let findings = eval(&snap);
        assert!(!findings.is_empty());
        for f in &findings {
            assert!(
                f.id.starts_with(f.category.prefix()),
                "{} does not carry prefix of {}",
                f.id,
                f.category
            );
        }
    }

    #[test]
    fn findings_come_out_sorted_and_unique() {
        let mut index = populated_index("movies");
        index.sample_documents = vec![json!({"title": "Dune", "overview": "<p>html</p>"})];
        let snap = snapshot_with(vec![index, populated_index("books")]);
        let findings = eval(&snap);

        let keys: Vec<(u8, Option<&str>, &str)> = findings
            .iter()
            .map(|f| (f.severity.rank(), f.index_uid.as_deref(), f.id.as_str()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        use std::collections::HashSet;
        let unique: HashSet<_> = keys.iter().map(|(_, uid, id)| (*uid, *id)).collect();
        assert_eq!(unique.len(), keys.len());
    }

    #[test]
    fn identical_snapshots_produce_identical_findings() {
        let mut index = populated_index("movies");
        index.sample_documents = vec![
            json!({"title": "Dune", "year": "1965"}),
            json!({"title": "Arrival", "year": "2016"}),
        ];
        let snap = snapshot_with(vec![index]);
        let a = eval(&snap);
        let b = eval(&snap.clone());
        assert_eq!(a, b);
    }

    #[test]
    fn absent_launch_config_only_silences_launch_rules() {
        let index = populated_index("movies");
        let with_config = {
            let mut snap = snapshot_with(vec![index.clone()]);
            snap.launch_config = Some(LaunchConfig {
                env: Some("production".to_string()),
                ..LaunchConfig::default()
            });
            snap
        };
        let without_config = snapshot_with(vec![index]);

        let a = eval(&with_config);
        let b = eval(&without_config);

        assert!(b.iter().all(|f| !f.id.starts_with('I')));
        let non_launch = |findings: &[Finding]| -> Vec<Finding> {
            findings.iter().filter(|f| !f.id.starts_with('I')).cloned().collect()
        };
        assert_eq!(non_launch(&a), non_launch(&b));
        assert!(a.iter().any(|f| f.id.starts_with('I')));
    }

    #[test]
    fn wildcard_searchable_without_primary_key_yields_two_criticals() {
        // Wildcard searchable over a wide index with no primary key and
        // no filterable attributes.
        let mut index = populated_index("movies");
        index.primary_key = None;
        index.settings.searchable_attributes = vec!["*".to_string()];
        index.settings.filterable_attributes = Vec::new();
        let snap = snapshot_with(vec![index]);

        let findings = eval(&snap);
        let criticals: Vec<&Finding> = findings
            .iter()
            .filter(|f| f.severity == crate::core::Severity::Critical)
            .collect();
        assert!(criticals.iter().any(|f| f.id == "S001"));
        assert!(criticals.iter().any(|f| f.id == "S002"));
        assert!(criticals.len() >= 2);

        let refs: Vec<&Finding> = findings.iter().collect();
        assert!(crate::score::score(&refs) < crate::score::score(&[]));
    }
}
