use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::core::{
    ComparisonReport, Finding, FindingChange, FindingStatus, Report, Severity, Task, TaskStatus,
};

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next steps:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for more detail");
    let _ = writeln!(
        stderr,
        "  - see `meiliscan --help` for available commands and options"
    );
}

pub fn print_report(report: &Report, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let source = match report.source.url.as_deref() {
        Some(url) => url.to_string(),
        None => report
            .source
            .dump_path
            .clone()
            .unwrap_or_else(|| report.source.kind.clone()),
    };
    let version = report.source.version.as_deref().unwrap_or("unknown");
    let _ = writeln!(out, "source: {source} (Meilisearch {version})");

    let score = format_score(report.summary.health_score, cfg.color);
    let _ = writeln!(
        out,
        "health: {score}/100 ({})  indexes={}  documents={}",
        report.summary.health_band, report.summary.total_indexes, report.summary.total_documents
    );
    if let Some(db) = report.summary.database_size_bytes {
        let _ = writeln!(out, "database size: {}", format_bytes(db));
    }
    let _ = writeln!(
        out,
        "findings: {} critical, {} warning, {} suggestion, {} info",
        report.summary.critical,
        report.summary.warning,
        report.summary.suggestion,
        report.summary.info
    );

    let findings: Vec<&Finding> = report.all_findings();
    if findings.is_empty() {
        let _ = writeln!(out, "\nno findings.");
        return;
    }

    let total = findings.len();
    let rows = cfg.max_table_rows.min(total);
    let _ = writeln!(out);
    if total > rows {
        let _ = writeln!(out, "top findings ({rows} shown / {total} total):");
    } else {
        let _ = writeln!(out, "findings ({total}):");
    }
    print_findings_table(&mut out, &findings, rows, cfg.color);

    if cfg.verbose {
        let _ = writeln!(out);
        for finding in findings.iter().take(rows) {
            let _ = writeln!(out, "{}: {}", finding.id, finding.description);
        }
    }
}

pub fn print_comparison(comparison: &ComparisonReport, cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    let _ = writeln!(
        out,
        "{} -> {}  trend: {}",
        comparison.old_report.generated_at, comparison.new_report.generated_at, comparison.trend
    );

    let new = comparison.changes_with_status(FindingStatus::New);
    let resolved = comparison.changes_with_status(FindingStatus::Resolved);
    let persisting = comparison.changes_with_status(FindingStatus::Persisting);
    let _ = writeln!(
        out,
        "findings: {} new, {} resolved, {} persisting",
        new.len(),
        resolved.len(),
        persisting.len()
    );

    if !comparison.metric_changes.is_empty() {
        let _ = writeln!(out, "\nmetrics:");
        for change in &comparison.metric_changes {
            let _ = writeln!(
                out,
                "- {}: {} -> {} ({})",
                change.metric, change.old_value, change.new_value, change.direction
            );
        }
    }

    if !new.is_empty() {
        let _ = writeln!(out, "\nnew:");
        for change in new.iter().take(cfg.max_table_rows.max(1)) {
            let _ = writeln!(out, "- {}", format_change(change, cfg.color));
        }
    }

    if !resolved.is_empty() {
        let _ = writeln!(out, "\nresolved:");
        for change in resolved.iter().take(cfg.max_table_rows.max(1)) {
            let _ = writeln!(out, "- {} {}", change.id, change.title);
        }
    }

    if cfg.verbose && !persisting.is_empty() {
        let _ = writeln!(out, "\npersisting:");
        for change in &persisting {
            let _ = writeln!(out, "- {}", format_change(change, cfg.color));
        }
    }

    if !comparison.recommendations.is_empty() {
        let _ = writeln!(out, "\nrecommendations:");
        for rec in &comparison.recommendations {
            let _ = writeln!(out, "- {rec}");
        }
    }
}

fn format_change(change: &FindingChange, color: bool) -> String {
    let severity = change
        .new_severity
        .or(change.old_severity)
        .map(|s| format!(" [{}]", format_severity(s, color)))
        .unwrap_or_default();
    let scope = change
        .index_uid
        .as_deref()
        .map(|uid| format!(" ({uid})"))
        .unwrap_or_default();
    format!("{}{severity}{scope} {}", change.id, change.title)
}

pub fn print_tasks(tasks: &[Task], cfg: &UiConfig) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    if tasks.is_empty() {
        let _ = writeln!(out, "no tasks in history.");
        return;
    }

    let failed = tasks.iter().filter(|t| t.status == TaskStatus::Failed).count();
    let canceled = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Canceled)
        .count();
    let _ = writeln!(
        out,
        "tasks: {} total, {} failed, {} canceled",
        tasks.len(),
        failed,
        canceled
    );

    let mut error_counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
    for task in tasks {
        if let Some(error) = &task.error {
            *error_counts.entry(error.code.as_str()).or_insert(0) += 1;
        }
    }
    if !error_counts.is_empty() {
        let _ = writeln!(out, "error codes:");
        for (code, count) in &error_counts {
            let _ = writeln!(out, "- {code} x{count}");
        }
    }

    let rows = cfg.max_table_rows.min(tasks.len());
    let _ = writeln!(out);
    if tasks.len() > rows {
        let _ = writeln!(out, "recent tasks ({rows} shown / {} total):", tasks.len());
    } else {
        let _ = writeln!(out, "recent tasks ({rows}):");
    }

    let label_uid = "UID";
    let label_index = "Index";
    let label_type = "Type";
    let label_status = "Status";

    let uid_w = tasks
        .iter()
        .take(rows)
        .map(|t| t.uid.to_string().len())
        .max()
        .unwrap_or(0)
        .max(label_uid.len());
    let index_w = tasks
        .iter()
        .take(rows)
        .map(|t| visible_width_ansi(t.index_uid.as_deref().unwrap_or("-")))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_index));
    let type_w = tasks
        .iter()
        .take(rows)
        .map(|t| visible_width_ansi(&t.kind))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_type));

    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        pad_end_display(label_uid, uid_w),
        pad_end_display(label_index, index_w),
        pad_end_display(label_type, type_w),
        label_status
    );
    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        "-".repeat(uid_w),
        "-".repeat(index_w),
        "-".repeat(type_w),
        "-".repeat(label_status.len())
    );
    for task in tasks.iter().take(rows) {
        let status = format_task_status(task.status, cfg.color);
        let _ = writeln!(
            out,
            "{}  {}  {}  {}",
            pad_end_display(&task.uid.to_string(), uid_w),
            pad_end_display(task.index_uid.as_deref().unwrap_or("-"), index_w),
            pad_end_display(&task.kind, type_w),
            status
        );
        if cfg.verbose {
            if let Some(error) = &task.error {
                let _ = writeln!(out, "    {}: {}", error.code, error.message);
            }
        }
    }
}

fn format_task_status(status: TaskStatus, color: bool) -> String {
    let s = status.as_str();
    if !color {
        return s.to_string();
    }

    let code = match status {
        TaskStatus::Failed => "31",
        TaskStatus::Canceled => "33",
        TaskStatus::Succeeded => "32",
        TaskStatus::Enqueued | TaskStatus::Processing => "90",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn print_findings_table(out: &mut dyn Write, findings: &[&Finding], rows: usize, color: bool) {
    let label_id = "ID";
    let label_sev = "Severity";
    let label_index = "Index";
    let label_title = "Title";

    let id_w = findings
        .iter()
        .take(rows)
        .map(|f| visible_width_ansi(&f.id))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_id));
    let sev_w = findings
        .iter()
        .take(rows)
        .map(|f| visible_width_ansi(f.severity.as_str()))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_sev));
    let index_w = findings
        .iter()
        .take(rows)
        .map(|f| visible_width_ansi(f.index_uid.as_deref().unwrap_or("-")))
        .max()
        .unwrap_or(0)
        .max(visible_width_ansi(label_index));
    let title_w = visible_width_ansi(label_title).max(5);

    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        pad_end_display(label_id, id_w),
        pad_end_display(label_sev, sev_w),
        pad_end_display(label_index, index_w),
        label_title
    );
    let _ = writeln!(
        out,
        "{}  {}  {}  {}",
        "-".repeat(id_w),
        "-".repeat(sev_w),
        "-".repeat(index_w),
        "-".repeat(title_w)
    );

    for finding in findings.iter().take(rows) {
        let id = pad_end_display(&finding.id, id_w);
        let sev = pad_end_ansi(&format_severity(finding.severity, color), sev_w);
        let index = pad_end_display(finding.index_uid.as_deref().unwrap_or("-"), index_w);
        let _ = writeln!(out, "{id}  {sev}  {index}  {}", finding.title);
    }
}

fn format_severity(severity: Severity, color: bool) -> String {
    let s = severity.as_str();
    if !color {
        return s.to_string();
    }

    let code = match severity {
        Severity::Critical => "31",
        Severity::Warning => "33",
        Severity::Suggestion => "36",
        Severity::Info => "90",
    };
    format!("\x1b[{code}m{s}\x1b[0m")
}

fn format_score(score: u32, color: bool) -> String {
    if !color {
        return score.to_string();
    }

    let code = if score >= 75 {
        "32"
    } else if score >= 50 {
        "33"
    } else {
        "31"
    };
    format!("\x1b[{code}m{score}\x1b[0m")
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn pad_end_display(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.peek() == Some(&'[') {
                let _ = chars.next();
                for ch2 in chars.by_ref() {
                    if ch2 == 'm' {
                        break;
                    }
                }
                continue;
            }
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        return format!("{bytes} B");
    }
    if b < MB {
        return format!("{:.1} KiB", b / KB);
    }
    if b < GB {
        return format!("{:.1} MiB", b / MB);
    }
    if b < TB {
        return format!("{:.1} GiB", b / GB);
    }
    format!("{:.1} TiB", b / TB)
}
