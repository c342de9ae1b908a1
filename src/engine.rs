use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::core::{
    IndexAnalysis, Report, Severity, Snapshot, SnapshotSource, SourceInfo, Summary,
};
use crate::rules::{Patterns, RuleContext, Thresholds};
use crate::score;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub timeout: Duration,
    pub show_progress: bool,
}

/// Runs the rule catalog over a snapshot and assembles the report.
/// Holds the compiled classifiers so repeated runs (compare, tests)
/// do not recompile them.
#[derive(Clone)]
pub struct Engine {
    opts: EngineOptions,
    thresholds: Thresholds,
    patterns: Patterns,
}

impl Engine {
    pub fn new(opts: EngineOptions) -> Result<Self> {
        Ok(Self {
            opts,
            thresholds: Thresholds::default(),
            patterns: Patterns::compile()?,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.opts.timeout
    }

    pub fn analyze(&self, snapshot: &Snapshot) -> Result<Report> {
        use std::io::IsTerminal;
        let progress_enabled = self.opts.show_progress && std::io::stderr().is_terminal();
        let pb = if progress_enabled {
            let pb = indicatif::ProgressBar::new_spinner();
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
            pb.set_message("evaluating rules...");
            pb.enable_steady_tick(Duration::from_millis(120));
            Some(pb)
        } else {
            None
        };

        let findings = crate::rules::evaluate(&RuleContext {
            snapshot,
            thresholds: &self.thresholds,
            patterns: &self.patterns,
        });

        if let Some(pb) = pb {
            pb.finish_and_clear();
        }

        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());
        Ok(assemble_report(snapshot, findings?, generated_at))
    }
}

/// Pure assembly: the report is fully determined by the snapshot, the
/// finding list, and the timestamp. Counts are tallied from the list
/// itself and the score is recomputed from the same findings, so the
/// two can never drift apart.
pub fn assemble_report(
    snapshot: &Snapshot,
    findings: Vec<crate::core::Finding>,
    generated_at: String,
) -> Report {
    let refs: Vec<&crate::core::Finding> = findings.iter().collect();
    let health_score = score::score(&refs);

    let mut summary = Summary {
        total_indexes: snapshot.indexes.len() as u64,
        total_documents: snapshot.total_documents(),
        database_size_bytes: (snapshot.database_size_bytes > 0)
            .then_some(snapshot.database_size_bytes),
        health_score,
        health_band: score::band(health_score).to_string(),
        ..Summary::default()
    };
    for finding in &findings {
        match finding.severity {
            Severity::Critical => summary.critical += 1,
            Severity::Warning => summary.warning += 1,
            Severity::Suggestion => summary.suggestion += 1,
            Severity::Info => summary.info += 1,
        }
    }

    let mut indexes: std::collections::BTreeMap<String, IndexAnalysis> = snapshot
        .indexes
        .iter()
        .map(|i| {
            (
                i.uid.clone(),
                IndexAnalysis {
                    document_count: i.stats.number_of_documents,
                    field_count: i.stats.field_distribution.len() as u64,
                    findings: Vec::new(),
                },
            )
        })
        .collect();

    let mut global_findings = Vec::new();
    for finding in findings {
        match finding.index_uid.as_deref() {
            Some(uid) => {
                indexes
                    .entry(uid.to_string())
                    .or_default()
                    .findings
                    .push(finding);
            }
            None => global_findings.push(finding),
        }
    }

    Report {
        schema_version: "1.0".to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        generated_at,
        source: source_info(&snapshot.source),
        summary,
        indexes,
        global_findings,
    }
}

fn source_info(source: &SnapshotSource) -> SourceInfo {
    match source {
        SnapshotSource::Instance { url, version } => SourceInfo {
            kind: source.kind().to_string(),
            url: Some(url.clone()),
            dump_path: None,
            version: version.clone(),
        },
        SnapshotSource::Dump { path, version } => SourceInfo {
            kind: source.kind().to_string(),
            url: None,
            dump_path: Some(path.clone()),
            version: version.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Category, Finding, IndexData};

    fn snapshot() -> Snapshot {
        let mut snap = Snapshot::new(SnapshotSource::Instance {
            url: "http://localhost:7700".to_string(),
            version: Some("1.12.0".to_string()),
        });
        let mut movies = IndexData::new("movies");
        movies.stats.number_of_documents = 100;
        movies.stats.field_distribution.insert("title".to_string(), 100);
        snap.indexes = vec![movies, IndexData::new("books")];
        snap
    }

    fn finding(id: &str, severity: Severity, uid: Option<&str>) -> Finding {
        let mut f = Finding::new(id, Category::Schema, severity, "t", "d", "i");
        if let Some(uid) = uid {
            f = f.for_index(uid);
        }
        f
    }

    #[test]
    fn summary_counts_tally_the_findings_exactly() {
        let findings = vec![
            finding("S001", Severity::Critical, Some("movies")),
            finding("S004", Severity::Warning, Some("movies")),
            finding("S004", Severity::Warning, Some("books")),
            finding("S020", Severity::Info, Some("books")),
        ];
        let report = assemble_report(&snapshot(), findings, "2026-08-01T00:00:00Z".to_string());

        assert_eq!(report.summary.critical, 1);
        assert_eq!(report.summary.warning, 2);
        assert_eq!(report.summary.suggestion, 0);
        assert_eq!(report.summary.info, 1);
        assert_eq!(report.finding_count(), 4);
        assert_eq!(report.summary.total_indexes, 2);
        assert_eq!(report.summary.total_documents, 100);
    }

    #[test]
    fn findings_land_in_their_index_bucket() {
        let findings = vec![
            finding("P002", Severity::Critical, None),
            finding("S001", Severity::Critical, Some("movies")),
        ];
        let report = assemble_report(&snapshot(), findings, "2026-08-01T00:00:00Z".to_string());

        assert_eq!(report.global_findings.len(), 1);
        assert_eq!(report.global_findings[0].id, "P002");
        assert_eq!(report.indexes["movies"].findings.len(), 1);
        assert!(report.indexes["books"].findings.is_empty());
        assert_eq!(report.indexes["movies"].document_count, 100);
        assert_eq!(report.indexes["movies"].field_count, 1);
    }

    #[test]
    fn score_matches_a_fresh_computation() {
        let findings = vec![
            finding("S001", Severity::Critical, Some("movies")),
            finding("S012", Severity::Warning, Some("movies")),
        ];
        let report = assemble_report(&snapshot(), findings, "2026-08-01T00:00:00Z".to_string());
        let refs = report.all_findings();
        assert_eq!(report.summary.health_score, crate::score::score(&refs));
        assert_eq!(
            report.summary.health_band,
            crate::score::band(report.summary.health_score)
        );
    }

    #[test]
    fn empty_snapshot_scores_perfect() {
        let snap = Snapshot::new(SnapshotSource::Dump {
            path: "/tmp/dump".to_string(),
            version: None,
        });
        let report = assemble_report(&snap, Vec::new(), "2026-08-01T00:00:00Z".to_string());
        assert_eq!(report.summary.health_score, 100);
        assert_eq!(report.summary.health_band, "Excellent");
        assert_eq!(report.source.kind, "dump");
        assert_eq!(report.source.dump_path.as_deref(), Some("/tmp/dump"));
    }
}
