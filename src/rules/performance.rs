use std::collections::BTreeMap;

use serde_json::json;

use crate::core::{Category, Finding, IndexData, Severity, Task, TaskStatus};
use crate::rules::{RuleContext, parse_timestamp};

const CAT: Category = Category::Performance;

pub fn index_rules(ctx: &RuleContext, index: &IndexData) -> Vec<Finding> {
    let mut out = Vec::new();
    out.extend(huge_unfilterable_index(ctx, index));
    out.extend(indexing_in_progress(index));
    out
}

pub fn instance_rules(ctx: &RuleContext) -> Vec<Finding> {
    let tasks = &ctx.snapshot.tasks;
    let mut out = Vec::new();
    out.extend(failed_task_ratio(ctx, tasks));
    out.extend(recurring_error_codes(ctx, tasks));
    out.extend(indexing_backlog(ctx, tasks));
    out.extend(slow_settings_updates(ctx, tasks));
    out.extend(settings_churn(ctx, tasks));
    out.extend(bytes_per_document(ctx));
    out.extend(canceled_task_ratio(ctx, tasks));
    out.extend(single_document_additions(ctx, tasks));
    out
}

fn huge_unfilterable_index(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if index.stats.number_of_documents <= ctx.thresholds.huge_index_docs
        || !index.settings.filterable_attributes.is_empty()
    {
        return None;
    }
    Some(
        Finding::new(
            "P001",
            CAT,
            Severity::Warning,
            "Huge index with no way to narrow queries",
            format!(
                "{} documents and no filterable attributes. Every query ranks the whole corpus.",
                index.stats.number_of_documents
            ),
            "Query latency scales with index size and nothing bounds it.",
        )
        .for_index(&index.uid)
        .current(json!(index.stats.number_of_documents)),
    )
}

fn indexing_in_progress(index: &IndexData) -> Option<Finding> {
    if !index.stats.is_indexing {
        return None;
    }
    Some(
        Finding::new(
            "P008",
            CAT,
            Severity::Info,
            "Indexing in progress",
            "The index was mid-indexing when captured; stats and settings findings may describe a moving target.",
            "Document counts and search results are briefly inconsistent.",
        )
        .for_index(&index.uid),
    )
}

fn failed_task_ratio(ctx: &RuleContext, tasks: &[Task]) -> Option<Finding> {
    if tasks.len() < ctx.thresholds.min_tasks_for_ratio {
        return None;
    }
    let failed = tasks.iter().filter(|t| t.status == TaskStatus::Failed).count();
    let ratio = failed as f64 / tasks.len() as f64;
    if ratio <= ctx.thresholds.max_failed_ratio {
        return None;
    }
    Some(
        Finding::new(
            "P002",
            CAT,
            Severity::Critical,
            "High task failure rate",
            format!(
                "{failed} of {} recent tasks failed ({:.0}%).",
                tasks.len(),
                ratio * 100.0
            ),
            "Writes are being dropped; the index is drifting from the source of truth.",
        )
        .current(json!(format!("{:.2}", ratio)))
        .recommended(json!(format!("<= {:.2}", ctx.thresholds.max_failed_ratio))),
    )
}

/// One finding for the whole batch, carrying every recurring code with
/// its count. Finding IDs are unique per scope, so per-code findings
/// would collide.
fn recurring_error_codes(ctx: &RuleContext, tasks: &[Task]) -> Option<Finding> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for task in tasks {
        if let Some(error) = &task.error {
            *counts.entry(error.code.as_str()).or_default() += 1;
        }
    }
    counts.retain(|_, count| *count >= ctx.thresholds.recurring_error_count);
    if counts.is_empty() {
        return None;
    }
    let listed: Vec<String> = counts.iter().map(|(code, n)| format!("{code} ×{n}")).collect();
    Some(
        Finding::new(
            "P003",
            CAT,
            Severity::Warning,
            "Recurring task error codes",
            format!("The same errors keep coming back: {}.", listed.join(", ")),
            "A systematic problem in the ingestion pipeline, not a one-off.",
        )
        .current(json!(counts)),
    )
}

fn indexing_backlog(ctx: &RuleContext, tasks: &[Task]) -> Option<Finding> {
    // Trailing window by task uid; uids are monotonically assigned.
    let mut recent: Vec<&Task> = tasks.iter().collect();
    recent.sort_by_key(|t| std::cmp::Reverse(t.uid));
    recent.truncate(ctx.thresholds.backlog_window);

    let latencies: Vec<f64> = recent
        .iter()
        .filter_map(|t| {
            let enqueued = parse_timestamp(t.enqueued_at.as_deref())?;
            let started = parse_timestamp(t.started_at.as_deref())?;
            Some((started - enqueued).as_seconds_f64())
        })
        .filter(|secs| *secs >= 0.0)
        .collect();
    if latencies.is_empty() {
        return None;
    }
    let avg = latencies.iter().sum::<f64>() / latencies.len() as f64;
    if avg <= ctx.thresholds.max_backlog_latency_secs {
        return None;
    }
    Some(
        Finding::new(
            "P004",
            CAT,
            Severity::Warning,
            "Task queue is backing up",
            format!("Recent tasks waited {avg:.0}s on average before starting."),
            "Writes are visible in search long after they were submitted.",
        )
        .current(json!(format!("{avg:.0}s")))
        .recommended(json!(format!("<= {:.0}s", ctx.thresholds.max_backlog_latency_secs))),
    )
}

fn slow_settings_updates(ctx: &RuleContext, tasks: &[Task]) -> Option<Finding> {
    let durations: Vec<f64> = tasks
        .iter()
        .filter(|t| t.kind == "settingsUpdate")
        .filter_map(|t| {
            let started = parse_timestamp(t.started_at.as_deref())?;
            let finished = parse_timestamp(t.finished_at.as_deref())?;
            Some((finished - started).as_seconds_f64())
        })
        .filter(|secs| *secs >= 0.0)
        .collect();
    if durations.is_empty() {
        return None;
    }
    let avg = durations.iter().sum::<f64>() / durations.len() as f64;
    if avg <= ctx.thresholds.max_settings_task_secs {
        return None;
    }
    Some(
        Finding::new(
            "P005",
            CAT,
            Severity::Suggestion,
            "Settings updates trigger long reindexes",
            format!("Settings tasks took {avg:.0}s on average. Each one rebuilds index data structures."),
            "Settings experiments on this dataset are expensive.",
        )
        .current(json!(format!("{avg:.0}s"))),
    )
}

fn settings_churn(ctx: &RuleContext, tasks: &[Task]) -> Option<Finding> {
    let count = tasks.iter().filter(|t| t.kind == "settingsUpdate").count();
    if count <= ctx.thresholds.max_settings_updates {
        return None;
    }
    Some(
        Finding::new(
            "P006",
            CAT,
            Severity::Warning,
            "Frequent settings updates",
            format!("{count} settings updates in the recent task history; every one forces a reindex."),
            "Repeated reindexing competes with document ingestion.",
        )
        .current(json!(count)),
    )
}

fn bytes_per_document(ctx: &RuleContext) -> Option<Finding> {
    let docs = ctx.snapshot.total_documents();
    if docs == 0 {
        return None;
    }
    let per_doc = ctx.snapshot.database_size_bytes / docs;
    if per_doc <= ctx.thresholds.max_bytes_per_document {
        return None;
    }
    Some(
        Finding::new(
            "P007",
            CAT,
            Severity::Suggestion,
            "Large on-disk footprint per document",
            format!(
                "The database averages {} KiB per document. Oversized payloads or over-indexed fields are the usual cause.",
                per_doc / 1024
            ),
            "Disk, memory-mapping, and snapshot costs grow with every write.",
        )
        .current(json!(per_doc)),
    )
}

fn canceled_task_ratio(ctx: &RuleContext, tasks: &[Task]) -> Option<Finding> {
    if tasks.len() < ctx.thresholds.min_tasks_for_ratio {
        return None;
    }
    let canceled = tasks.iter().filter(|t| t.status == TaskStatus::Canceled).count();
    let ratio = canceled as f64 / tasks.len() as f64;
    if ratio <= ctx.thresholds.max_canceled_ratio {
        return None;
    }
    Some(
        Finding::new(
            "P009",
            CAT,
            Severity::Warning,
            "Many canceled tasks",
            format!("{canceled} of {} recent tasks were canceled.", tasks.len()),
            "Something repeatedly enqueues work it then abandons.",
        )
        .current(json!(format!("{:.2}", ratio))),
    )
}

fn single_document_additions(ctx: &RuleContext, tasks: &[Task]) -> Option<Finding> {
    let count = tasks
        .iter()
        .filter(|t| t.kind == "documentAdditionOrUpdate" && t.batch_size == Some(1))
        .count();
    if count < ctx.thresholds.max_single_doc_tasks {
        return None;
    }
    Some(
        Finding::new(
            "P010",
            CAT,
            Severity::Suggestion,
            "Documents pushed one at a time",
            format!("{count} recent addition tasks carried a single document each."),
            "Per-task overhead dominates; batching cuts indexing time dramatically.",
        )
        .current(json!(count))
        .reference("https://www.meilisearch.com/docs/learn/indexing/indexing_best_practices"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Snapshot, SnapshotSource, TaskError};
    use crate::rules::{Patterns, Thresholds};

    struct Fixture {
        snapshot: Snapshot,
        thresholds: Thresholds,
        patterns: Patterns,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                snapshot: Snapshot::new(SnapshotSource::Instance {
                    url: "http://localhost:7700".to_string(),
                    version: None,
                }),
                thresholds: Thresholds::default(),
                patterns: Patterns::compile().expect("compile"),
            }
        }

        fn ctx(&self) -> RuleContext<'_> {
            RuleContext {
                snapshot: &self.snapshot,
                thresholds: &self.thresholds,
                patterns: &self.patterns,
            }
        }
    }

    fn failed_task(uid: u64, code: &str) -> Task {
        let mut t = Task::new(uid, "documentAdditionOrUpdate", TaskStatus::Failed);
        t.error = Some(TaskError {
            message: format!("error {code}"),
            code: code.to_string(),
        });
        t
    }

    fn succeeded_task(uid: u64) -> Task {
        Task::new(uid, "documentAdditionOrUpdate", TaskStatus::Succeeded)
    }

    #[test]
    fn failure_ratio_bound_is_strict() {
        let mut fx = Fixture::new();
        // 1 of 10 failed: exactly 0.1, compliant.
        fx.snapshot.tasks = (0..9).map(succeeded_task).collect();
        fx.snapshot.tasks.push(failed_task(9, "internal"));
        assert!(failed_task_ratio(&fx.ctx(), &fx.snapshot.tasks).is_none());

        // 2 of 10 failed: over the bound, critical.
        fx.snapshot.tasks[8] = failed_task(8, "internal");
        let finding = failed_task_ratio(&fx.ctx(), &fx.snapshot.tasks).expect("finding");
        assert_eq!(finding.severity, Severity::Critical);
        assert!(finding.index_uid.is_none());
    }

    #[test]
    fn ratio_rules_need_enough_tasks() {
        let mut fx = Fixture::new();
        // 9 tasks, all failed: ratio huge but sample too small.
        fx.snapshot.tasks = (0..9).map(|n| failed_task(n, "internal")).collect();
        assert!(failed_task_ratio(&fx.ctx(), &fx.snapshot.tasks).is_none());
        assert!(canceled_task_ratio(&fx.ctx(), &fx.snapshot.tasks).is_none());
    }

    #[test]
    fn recurring_code_fires_at_three_not_two() {
        let fx = Fixture::new();
        let two: Vec<Task> = (0..2).map(|n| failed_task(n, "index_not_found")).collect();
        assert!(recurring_error_codes(&fx.ctx(), &two).is_none());

        let three: Vec<Task> = (0..3).map(|n| failed_task(n, "index_not_found")).collect();
        let finding = recurring_error_codes(&fx.ctx(), &three).expect("finding");
        assert!(finding.description.contains("index_not_found"));
    }

    #[test]
    fn recurring_codes_collapse_into_one_finding() {
        let fx = Fixture::new();
        let mut tasks: Vec<Task> = (0..3).map(|n| failed_task(n, "payload_too_large")).collect();
        tasks.extend((3..7).map(|n| failed_task(n, "index_not_found")));

        let finding = recurring_error_codes(&fx.ctx(), &tasks).expect("finding");
        assert!(finding.description.contains("payload_too_large ×3"));
        assert!(finding.description.contains("index_not_found ×4"));
    }

    #[test]
    fn backlog_ignores_tasks_without_timestamps() {
        let fx = Fixture::new();
        // No timestamps at all: silent, not a panic or a zero-latency claim.
        let tasks: Vec<Task> = (0..30).map(succeeded_task).collect();
        assert!(indexing_backlog(&fx.ctx(), &tasks).is_none());

        // Five-minute waits: flagged.
        let tasks: Vec<Task> = (0..30)
            .map(|n| {
                let mut t = succeeded_task(n);
                t.enqueued_at = Some("2026-08-01T10:00:00Z".to_string());
                t.started_at = Some("2026-08-01T10:05:00Z".to_string());
                t
            })
            .collect();
        assert!(indexing_backlog(&fx.ctx(), &tasks).is_some());
    }

    #[test]
    fn settings_churn_counts_updates() {
        let fx = Fixture::new();
        let five: Vec<Task> = (0..5).map(|n| Task::new(n, "settingsUpdate", TaskStatus::Succeeded)).collect();
        assert!(settings_churn(&fx.ctx(), &five).is_none());

        let six: Vec<Task> = (0..6).map(|n| Task::new(n, "settingsUpdate", TaskStatus::Succeeded)).collect();
        assert!(settings_churn(&fx.ctx(), &six).is_some());
    }

    #[test]
    fn bytes_per_document_averages_over_instance() {
        let mut fx = Fixture::new();
        let mut index = IndexData::new("movies");
        index.stats.number_of_documents = 100;
        fx.snapshot.indexes = vec![index];
        fx.snapshot.database_size_bytes = 100 * 100 * 1024; // exactly 100 KiB/doc
        assert!(bytes_per_document(&fx.ctx()).is_none());

        fx.snapshot.database_size_bytes += 100 * 1024; // nudge past the bound
        assert!(bytes_per_document(&fx.ctx()).is_some());
    }

    #[test]
    fn single_document_pushes_need_batch_size_evidence() {
        let fx = Fixture::new();
        // batch_size unknown: not counted.
        let unknown: Vec<Task> = (0..20).map(succeeded_task).collect();
        assert!(single_document_additions(&fx.ctx(), &unknown).is_none());

        let singles: Vec<Task> = (0..10)
            .map(|n| {
                let mut t = succeeded_task(n);
                t.batch_size = Some(1);
                t
            })
            .collect();
        assert!(single_document_additions(&fx.ctx(), &singles).is_some());
    }
}
