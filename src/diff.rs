use std::collections::BTreeMap;

use crate::core::{
    ChangeDirection, ComparisonReport, Finding, FindingChange, FindingStatus, IndexChange,
    IndexStatus, MetricChange, Report, ReportRef, Severity, Trend,
};

/// Scope key for finding identity: (index uid or None for global, id).
type ScopeKey = (Option<String>, String);

fn finding_map(report: &Report) -> BTreeMap<ScopeKey, &Finding> {
    let mut map = BTreeMap::new();
    for (scope, finding) in report.scoped_findings() {
        map.insert((scope.map(str::to_string), finding.id.clone()), finding);
    }
    map
}

fn source_label(report: &Report) -> String {
    match (&report.source.url, &report.source.dump_path) {
        (Some(url), _) => url.clone(),
        (None, Some(path)) => path.clone(),
        (None, None) => report.source.kind.clone(),
    }
}

/// Compares two independently-generated reports. Matching is by stable
/// identifier (index uid, finding id), never by list position. The
/// inputs are read-only; a report is never mutated by comparison.
pub fn compare(old: &Report, new: &Report) -> ComparisonReport {
    let old_findings = finding_map(old);
    let new_findings = finding_map(new);

    let mut finding_changes = Vec::new();
    for (key, finding) in &new_findings {
        match old_findings.get(key) {
            None => finding_changes.push(FindingChange {
                id: key.1.clone(),
                index_uid: key.0.clone(),
                status: FindingStatus::New,
                title: finding.title.clone(),
                old_severity: None,
                new_severity: Some(finding.severity),
                severity_changed: false,
            }),
            Some(old_finding) => finding_changes.push(FindingChange {
                id: key.1.clone(),
                index_uid: key.0.clone(),
                status: FindingStatus::Persisting,
                title: finding.title.clone(),
                old_severity: Some(old_finding.severity),
                new_severity: Some(finding.severity),
                severity_changed: old_finding.severity != finding.severity,
            }),
        }
    }
    for (key, finding) in &old_findings {
        if !new_findings.contains_key(key) {
            finding_changes.push(FindingChange {
                id: key.1.clone(),
                index_uid: key.0.clone(),
                status: FindingStatus::Resolved,
                title: finding.title.clone(),
                old_severity: Some(finding.severity),
                new_severity: None,
                severity_changed: false,
            });
        }
    }
    finding_changes.sort_by(|a, b| (&a.index_uid, &a.id).cmp(&(&b.index_uid, &b.id)));

    let mut index_changes = Vec::new();
    for (uid, analysis) in &new.indexes {
        match old.indexes.get(uid) {
            None => index_changes.push(IndexChange {
                uid: uid.clone(),
                status: IndexStatus::Added,
                finding_delta: analysis.findings.len() as i64,
                document_delta: analysis.document_count as i64,
            }),
            Some(old_analysis) => index_changes.push(IndexChange {
                uid: uid.clone(),
                status: IndexStatus::Present,
                finding_delta: analysis.findings.len() as i64 - old_analysis.findings.len() as i64,
                document_delta: analysis.document_count as i64
                    - old_analysis.document_count as i64,
            }),
        }
    }
    for (uid, old_analysis) in &old.indexes {
        if !new.indexes.contains_key(uid) {
            index_changes.push(IndexChange {
                uid: uid.clone(),
                status: IndexStatus::Removed,
                finding_delta: -(old_analysis.findings.len() as i64),
                document_delta: -(old_analysis.document_count as i64),
            });
        }
    }
    index_changes.sort_by(|a, b| a.uid.cmp(&b.uid));

    let metric_changes = vec![
        MetricChange::calculate(
            "health_score",
            i64::from(old.summary.health_score),
            i64::from(new.summary.health_score),
            Some(true),
        ),
        MetricChange::calculate(
            "total_indexes",
            old.summary.total_indexes as i64,
            new.summary.total_indexes as i64,
            None,
        ),
        MetricChange::calculate(
            "total_documents",
            old.summary.total_documents as i64,
            new.summary.total_documents as i64,
            None,
        ),
        MetricChange::calculate(
            "critical",
            old.summary.critical as i64,
            new.summary.critical as i64,
            Some(false),
        ),
        MetricChange::calculate(
            "warning",
            old.summary.warning as i64,
            new.summary.warning as i64,
            Some(false),
        ),
        MetricChange::calculate(
            "suggestion",
            old.summary.suggestion as i64,
            new.summary.suggestion as i64,
            Some(false),
        ),
        MetricChange::calculate(
            "info",
            old.summary.info as i64,
            new.summary.info as i64,
            Some(false),
        ),
        MetricChange::calculate(
            "database_size_bytes",
            old.summary.database_size_bytes.unwrap_or(0) as i64,
            new.summary.database_size_bytes.unwrap_or(0) as i64,
            None,
        ),
    ];

    let trend = overall_trend(old, new);
    let recommendations = build_recommendations(&finding_changes, &metric_changes);

    ComparisonReport {
        old_report: ReportRef {
            generated_at: old.generated_at.clone(),
            source: source_label(old),
        },
        new_report: ReportRef {
            generated_at: new.generated_at.clone(),
            source: source_label(new),
        },
        trend,
        metric_changes,
        finding_changes,
        index_changes,
        recommendations,
    }
}

fn overall_trend(old: &Report, new: &Report) -> Trend {
    if new.summary.health_score > old.summary.health_score {
        return Trend::Improved;
    }
    if new.summary.health_score < old.summary.health_score {
        return Trend::Degraded;
    }
    if new.summary.critical < old.summary.critical {
        return Trend::Improved;
    }
    if new.summary.critical > old.summary.critical {
        return Trend::Degraded;
    }
    Trend::Stable
}

fn scope_label(index_uid: Option<&str>) -> String {
    match index_uid {
        Some(uid) => format!("index `{uid}`"),
        None => "instance".to_string(),
    }
}

/// Ranked: newly-introduced criticals, then new warnings, then metric
/// regressions, then criticals that persist across both reports.
fn build_recommendations(
    finding_changes: &[FindingChange],
    metric_changes: &[MetricChange],
) -> Vec<String> {
    let mut out = Vec::new();

    for change in finding_changes {
        if change.status == FindingStatus::New
            && change.new_severity == Some(Severity::Critical)
        {
            out.push(format!(
                "Fix new critical {} ({}): {}",
                change.id,
                scope_label(change.index_uid.as_deref()),
                change.title
            ));
        }
    }
    for change in finding_changes {
        if change.status == FindingStatus::New && change.new_severity == Some(Severity::Warning) {
            out.push(format!(
                "Address new warning {} ({}): {}",
                change.id,
                scope_label(change.index_uid.as_deref()),
                change.title
            ));
        }
    }
    for metric in metric_changes {
        if metric.direction == ChangeDirection::Regression {
            out.push(format!(
                "Investigate regression in {}: {} -> {}",
                metric.metric, metric.old_value, metric.new_value
            ));
        }
    }
    for change in finding_changes {
        if change.status == FindingStatus::Persisting
            && change.new_severity == Some(Severity::Critical)
        {
            out.push(format!(
                "Still unresolved critical {} ({}): {}",
                change.id,
                scope_label(change.index_uid.as_deref()),
                change.title
            ));
        }
    }

    out
}
