use std::fmt::Write;

use crate::core::{Finding, Report, Severity};
use crate::ui::format_bytes;

/// Human-readable report for sharing outside the terminal.
pub fn render(report: &Report) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# Meilisearch Analysis Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "Generated: {}", report.generated_at);
    match (&report.source.url, &report.source.dump_path) {
        (Some(url), _) => {
            let _ = writeln!(out, "Source: `{url}`");
        }
        (None, Some(path)) => {
            let _ = writeln!(out, "Source: dump at `{path}`");
        }
        _ => {}
    }
    if let Some(version) = &report.source.version {
        let _ = writeln!(out, "Version: {version}");
    }
    let _ = writeln!(out);

    let summary = &report.summary;
    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|--------|-------|");
    let _ = writeln!(
        out,
        "| Health score | {} / 100 ({}) |",
        summary.health_score, summary.health_band
    );
    let _ = writeln!(out, "| Indexes | {} |", summary.total_indexes);
    let _ = writeln!(out, "| Documents | {} |", summary.total_documents);
    if let Some(size) = summary.database_size_bytes {
        let _ = writeln!(out, "| Database size | {} |", format_bytes(size));
    }
    let _ = writeln!(
        out,
        "| Findings | {} critical, {} warnings, {} suggestions, {} info |",
        summary.critical, summary.warning, summary.suggestion, summary.info
    );
    let _ = writeln!(out);

    for severity in [
        Severity::Critical,
        Severity::Warning,
        Severity::Suggestion,
        Severity::Info,
    ] {
        let matching: Vec<(Option<&str>, &Finding)> = report
            .scoped_findings()
            .into_iter()
            .filter(|(_, f)| f.severity == severity)
            .collect();
        if matching.is_empty() {
            continue;
        }
        let _ = writeln!(out, "## {} ({})", section_title(severity), matching.len());
        let _ = writeln!(out);
        for (scope, finding) in matching {
            write_finding(&mut out, scope, finding);
        }
    }

    out
}

fn section_title(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "Critical",
        Severity::Warning => "Warnings",
        Severity::Suggestion => "Suggestions",
        Severity::Info => "Informational",
    }
}

fn write_finding(out: &mut String, scope: Option<&str>, finding: &Finding) {
    let _ = writeln!(out, "### {}: {}", finding.id, finding.title);
    let _ = writeln!(out);
    match scope {
        Some(uid) => {
            let _ = writeln!(out, "- Index: `{uid}`");
        }
        None => {
            let _ = writeln!(out, "- Scope: instance");
        }
    }
    let _ = writeln!(out, "- {}", finding.description);
    let _ = writeln!(out, "- Impact: {}", finding.impact);
    if let Some(current) = &finding.current_value {
        let _ = writeln!(out, "- Current: `{current}`");
    }
    if let Some(recommended) = &finding.recommended_value {
        let _ = writeln!(out, "- Recommended: `{recommended}`");
    }
    for reference in &finding.references {
        let _ = writeln!(out, "- See: {reference}");
    }
    let _ = writeln!(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, Snapshot, SnapshotSource};
    use crate::engine::assemble_report;

    fn report() -> Report {
        let mut snap = Snapshot::new(SnapshotSource::Instance {
            url: "http://localhost:7700".to_string(),
            version: Some("1.12.0".to_string()),
        });
        snap.indexes = vec![crate::core::IndexData::new("movies")];
        let findings = vec![
            Finding::new(
                "S001",
                Category::Schema,
                Severity::Critical,
                "No primary key configured",
                "desc",
                "impact",
            )
            .for_index("movies"),
            Finding::new("B004", Category::Practice, Severity::Info, "Old version", "d", "i"),
        ];
        assemble_report(&snap, findings, "2026-08-01T00:00:00Z".to_string())
    }

    #[test]
    fn sections_appear_in_severity_order() {
        let md = render(&report());
        let critical = md.find("## Critical (1)").expect("critical section");
        let info = md.find("## Informational (1)").expect("info section");
        assert!(critical < info);
        assert!(md.contains("### S001: No primary key configured"));
        assert!(md.contains("- Index: `movies`"));
        assert!(md.contains("- Scope: instance"));
    }

    #[test]
    fn empty_severities_are_omitted() {
        let md = render(&report());
        assert!(!md.contains("## Warnings"));
        assert!(!md.contains("## Suggestions"));
    }
}
