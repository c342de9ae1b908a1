use std::fmt::Write;

use crate::core::{Finding, Report, Severity};

/// Markdown tuned for coding-agent consumption: prioritized sections,
/// explicit fix commands, nothing decorative.
pub fn render(report: &Report) -> String {
    let mut out = String::new();
    let base_url = report.source.url.as_deref();

    let _ = writeln!(out, "# Meilisearch Analysis Context");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Analysis results for a Meilisearch deployment. Apply fixes top to bottom."
    );
    let _ = writeln!(out);

    write_summary(&mut out, report);

    let scoped = report.scoped_findings();
    let sections = [
        (Severity::Critical, "Critical Issues (Fix First)"),
        (Severity::Warning, "Warnings (Should Address)"),
        (Severity::Suggestion, "Suggestions (Consider When Convenient)"),
        (Severity::Info, "Informational Notes"),
    ];
    for (severity, title) in sections {
        let matching: Vec<&(Option<&str>, &Finding)> =
            scoped.iter().filter(|(_, f)| f.severity == severity).collect();
        if matching.is_empty() {
            continue;
        }
        let _ = writeln!(out, "## {title}");
        let _ = writeln!(out);
        for (scope, finding) in matching {
            write_finding(&mut out, *scope, finding, base_url);
        }
    }

    write_index_overview(&mut out, report);
    out
}

fn write_summary(out: &mut String, report: &Report) {
    let summary = &report.summary;
    let _ = writeln!(out, "## Current State Summary");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "- **Instance:** {} indexes, {} documents",
        summary.total_indexes, summary.total_documents
    );
    let _ = writeln!(
        out,
        "- **Health Score:** {}/100 ({})",
        summary.health_score, summary.health_band
    );
    let _ = writeln!(
        out,
        "- **Issues Found:** {} critical, {} warnings, {} suggestions",
        summary.critical, summary.warning, summary.suggestion
    );
    if let Some(url) = &report.source.url {
        let _ = writeln!(out, "- **URL:** `{url}`");
    }
    if let Some(version) = &report.source.version {
        let _ = writeln!(out, "- **Version:** {version}");
    }
    let _ = writeln!(out);
}

fn write_finding(out: &mut String, scope: Option<&str>, finding: &Finding, base_url: Option<&str>) {
    let _ = writeln!(out, "### {}: {}", finding.id, finding.title);
    let _ = writeln!(out);
    if let Some(uid) = scope {
        let _ = writeln!(out, "**Index:** `{uid}`");
        let _ = writeln!(out);
    }
    let _ = writeln!(out, "**Problem:** {}", finding.description);
    let _ = writeln!(out);
    let _ = writeln!(out, "**Impact:** {}", finding.impact);
    let _ = writeln!(out);
    if let Some(current) = &finding.current_value {
        let _ = writeln!(out, "**Current:** `{current}`");
        let _ = writeln!(out);
    }
    if let Some(recommended) = &finding.recommended_value {
        let _ = writeln!(out, "**Recommended:** `{recommended}`");
        let _ = writeln!(out);
    }
    if let Some(fix) = &finding.fix {
        let url = base_url.unwrap_or("http://localhost:7700");
        let _ = writeln!(out, "**Fix Command:**");
        let _ = writeln!(out, "```bash");
        let _ = writeln!(out, "curl -X {} '{url}{}' \\", super::fix_method(fix), fix.endpoint);
        let _ = writeln!(out, "  -H 'Content-Type: application/json' \\");
        let _ = writeln!(out, "  -H 'Authorization: Bearer YOUR_API_KEY' \\");
        let _ = writeln!(out, "  --data-binary '{}'", fix.payload);
        let _ = writeln!(out, "```");
        let _ = writeln!(out);
    }
    for reference in &finding.references {
        let _ = writeln!(out, "- {reference}");
    }
    if !finding.references.is_empty() {
        let _ = writeln!(out);
    }
}

fn write_index_overview(out: &mut String, report: &Report) {
    if report.indexes.is_empty() {
        return;
    }
    let _ = writeln!(out, "## Index Overview");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Index | Documents | Findings | Top Issue |");
    let _ = writeln!(out, "|-------|-----------|----------|-----------|");
    for (uid, analysis) in &report.indexes {
        let top = analysis
            .findings
            .iter()
            .min_by_key(|f| f.severity.rank())
            .map(|f| format!("{}: {}", f.id, f.title))
            .unwrap_or_else(|| "None".to_string());
        let _ = writeln!(
            out,
            "| `{uid}` | {} | {} | {top} |",
            analysis.document_count,
            analysis.findings.len()
        );
    }
    let _ = writeln!(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, IndexData, Snapshot, SnapshotSource};
    use crate::engine::assemble_report;
    use serde_json::json;

    fn report() -> Report {
        let mut snap = Snapshot::new(SnapshotSource::Instance {
            url: "http://localhost:7700".to_string(),
            version: None,
        });
        snap.indexes = vec![IndexData::new("movies")];
        let findings = vec![
            Finding::new("S001", Category::Schema, Severity::Critical, "No primary key", "d", "i")
                .for_index("movies")
                .with_fix(
                    "update_index",
                    "/indexes/movies".to_string(),
                    json!({"primaryKey": "id"}),
                ),
            Finding::new("S010", Category::Schema, Severity::Info, "No synonyms", "d", "i")
                .for_index("movies"),
        ];
        assemble_report(&snap, findings, "2026-08-01T00:00:00Z".to_string())
    }

    #[test]
    fn critical_section_comes_before_info() {
        let md = render(&report());
        let critical = md.find("## Critical Issues (Fix First)").expect("critical");
        let info = md.find("## Informational Notes").expect("info");
        assert!(critical < info);
        assert!(!md.contains("## Warnings"));
    }

    #[test]
    fn fix_commands_are_runnable_curl() {
        let md = render(&report());
        assert!(md.contains("curl -X PATCH 'http://localhost:7700/indexes/movies'"));
        assert!(md.contains(r#"--data-binary '{"primaryKey":"id"}'"#));
    }

    #[test]
    fn overview_names_the_most_severe_finding() {
        let md = render(&report());
        assert!(md.contains("| `movies` | 0 | 2 | S001: No primary key |"));
    }
}
