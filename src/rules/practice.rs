use serde_json::json;

use crate::core::{Category, Finding, IndexData, Severity, TaskStatus};
use crate::rules::{RuleContext, parse_timestamp};

const CAT: Category = Category::Practice;

pub fn index_rules(ctx: &RuleContext, index: &IndexData) -> Vec<Finding> {
    let mut out = Vec::new();
    out.extend(settings_after_documents(ctx, index));
    out.extend(searchable_and_filterable_overlap(index));
    out.extend(unscoped_long_text(ctx, index));
    out
}

pub fn instance_rules(ctx: &RuleContext) -> Vec<Finding> {
    outdated_version(ctx).into_iter().collect()
}

/// Settings applied after the data arrived force a full reindex of
/// everything already ingested. The idiomatic order is settings first,
/// documents second.
fn settings_after_documents(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    let finished = |kind: &str| {
        ctx.snapshot
            .tasks_for_index(&index.uid)
            .into_iter()
            .filter(|t| t.kind == kind && t.status == TaskStatus::Succeeded)
            .filter_map(|t| parse_timestamp(t.finished_at.as_deref()))
            .max()
    };
    let last_settings = finished("settingsUpdate")?;
    let last_documents = finished("documentAdditionOrUpdate")?;
    if last_settings <= last_documents {
        return None;
    }
    Some(
        Finding::new(
            "B001",
            CAT,
            Severity::Warning,
            "Settings changed after documents were loaded",
            "The latest settings update finished after the last document batch, so the whole index was rebuilt in place.",
            "Every late settings change reprocesses the full dataset.",
        )
        .for_index(&index.uid),
    )
}

fn searchable_and_filterable_overlap(index: &IndexData) -> Option<Finding> {
    if index.settings.searchable_is_wildcard() {
        return None;
    }
    let overlap: Vec<&str> = index
        .settings
        .searchable_attributes
        .iter()
        .map(String::as_str)
        .filter(|a| index.settings.filterable_attributes.iter().any(|f| f == a))
        .collect();
    if overlap.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "B002",
            CAT,
            Severity::Warning,
            "Attributes doing double duty",
            format!(
                "{} are both searchable and filterable. Usually a field is prose (search it) or a facet (filter it), not both.",
                overlap.join(", ")
            ),
            "Both index structures are maintained for the same data.",
        )
        .for_index(&index.uid)
        .current(json!(overlap)),
    )
}

fn unscoped_long_text(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if !index.settings.searchable_is_wildcard()
        || index.stats.number_of_documents <= ctx.thresholds.text_indicator_docs
    {
        return None;
    }
    let long_text: Vec<&str> = index
        .field_names()
        .into_iter()
        .filter(|name| ctx.patterns.text_indicator_field.is_match(name))
        .collect();
    if long_text.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "B003",
            CAT,
            Severity::Suggestion,
            "Long-text fields ranked like everything else",
            format!(
                "Fields {} hold the real content, yet wildcard searchable ranks them equal to every metadata field.",
                long_text.join(", ")
            ),
            "Relevancy cannot prefer the fields users actually search.",
        )
        .for_index(&index.uid)
        .current(json!(["*"]))
        .recommended(json!(long_text)),
    )
}

fn outdated_version(ctx: &RuleContext) -> Option<Finding> {
    let version = ctx.snapshot.source.version()?;
    if !version_is_older(version, ctx.thresholds.current_stable_version) {
        return None;
    }
    Some(
        Finding::new(
            "B004",
            CAT,
            Severity::Info,
            "Engine version behind current stable",
            format!(
                "Running {version}; current stable is {}.",
                ctx.thresholds.current_stable_version
            ),
            "Missing performance work and bug fixes from newer releases.",
        )
        .current(json!(version))
        .recommended(json!(ctx.thresholds.current_stable_version)),
    )
}

/// Lenient semver-ish comparison: numeric fields left to right, missing
/// fields count as zero, unparseable versions are never "older".
fn version_is_older(candidate: &str, stable: &str) -> bool {
    let parse = |v: &str| -> Option<Vec<u64>> {
        v.trim_start_matches('v')
            .split('-')
            .next()?
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect()
    };
    match (parse(candidate), parse(stable)) {
        (Some(a), Some(b)) => {
            let len = a.len().max(b.len());
            for i in 0..len {
                let x = a.get(i).copied().unwrap_or(0);
                let y = b.get(i).copied().unwrap_or(0);
                if x != y {
                    return x < y;
                }
            }
            false
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Snapshot, SnapshotSource, Task};
    use crate::rules::{Patterns, Thresholds};

    struct Fixture {
        snapshot: Snapshot,
        thresholds: Thresholds,
        patterns: Patterns,
    }

    impl Fixture {
        fn with_version(version: Option<&str>) -> Self {
            Self {
                snapshot: Snapshot::new(SnapshotSource::Instance {
                    url: "http://localhost:7700".to_string(),
                    version: version.map(str::to_string),
                }),
                thresholds: Thresholds::default(),
                patterns: Patterns::compile().expect("compile"),
            }
        }

        fn new() -> Self {
            Self::with_version(None)
        }

        fn ctx(&self) -> RuleContext<'_> {
            RuleContext {
                snapshot: &self.snapshot,
                thresholds: &self.thresholds,
                patterns: &self.patterns,
            }
        }
    }

    fn finished_task(uid: u64, index: &str, kind: &str, finished_at: &str) -> Task {
        let mut t = Task::new(uid, kind, TaskStatus::Succeeded);
        t.index_uid = Some(index.to_string());
        t.finished_at = Some(finished_at.to_string());
        t
    }

    #[test]
    fn settings_after_documents_uses_finish_order() {
        let mut fx = Fixture::new();
        let mut index = IndexData::new("movies");
        index.primary_key = Some("id".to_string());

        // Settings first, then documents: the good order.
        fx.snapshot.tasks = vec![
            finished_task(1, "movies", "settingsUpdate", "2026-08-01T10:00:00Z"),
            finished_task(2, "movies", "documentAdditionOrUpdate", "2026-08-01T11:00:00Z"),
        ];
        assert!(settings_after_documents(&fx.ctx(), &index).is_none());

        // A later settings task flips it.
        fx.snapshot.tasks.push(finished_task(3, "movies", "settingsUpdate", "2026-08-01T12:00:00Z"));
        assert!(settings_after_documents(&fx.ctx(), &index).is_some());
    }

    #[test]
    fn chronology_check_is_scoped_to_the_index() {
        let mut fx = Fixture::new();
        let index = IndexData::new("movies");
        fx.snapshot.tasks = vec![
            finished_task(1, "movies", "documentAdditionOrUpdate", "2026-08-01T10:00:00Z"),
            // Another index's settings churn is not this index's problem.
            finished_task(2, "books", "settingsUpdate", "2026-08-01T12:00:00Z"),
        ];
        assert!(settings_after_documents(&fx.ctx(), &index).is_none());
    }

    #[test]
    fn overlap_needs_an_explicit_searchable_list() {
        let mut index = IndexData::new("movies");
        index.settings.filterable_attributes = vec!["genre".to_string()];
        // Wildcard searchable technically overlaps everything; stay quiet.
        assert!(searchable_and_filterable_overlap(&index).is_none());

        index.settings.searchable_attributes = vec!["title".to_string(), "genre".to_string()];
        let finding = searchable_and_filterable_overlap(&index).expect("finding");
        assert!(finding.description.contains("genre"));
        assert!(!finding.description.contains("title,"));
    }

    #[test]
    fn version_comparison_handles_common_shapes() {
        assert!(version_is_older("1.11.3", "1.12.0"));
        assert!(version_is_older("v1.2", "1.12.0"));
        assert!(!version_is_older("1.12.0", "1.12.0"));
        assert!(!version_is_older("1.13.0-rc.1", "1.12.0"));
        assert!(!version_is_older("prototype", "1.12.0"));
    }

    #[test]
    fn outdated_version_needs_a_known_version() {
        let fx = Fixture::new();
        assert!(outdated_version(&fx.ctx()).is_none());

        let fx = Fixture::with_version(Some("1.10.0"));
        let finding = outdated_version(&fx.ctx()).expect("finding");
        assert_eq!(finding.severity, Severity::Info);
    }
}
