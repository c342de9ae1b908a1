use std::fmt::Write;

use crate::core::Report;

/// POSIX shell script applying every fix descriptor in the report, one
/// curl per finding with the payload in a heredoc. The script is inert
/// until the operator fills in the API key.
pub fn render(report: &Report, base_url: Option<&str>) -> String {
    let url = base_url
        .or(report.source.url.as_deref())
        .unwrap_or("http://localhost:7700");

    let mut out = String::new();
    let _ = writeln!(out, "#!/bin/sh");
    let _ = writeln!(out, "# Generated by meiliscan {} on {}", report.tool_version, report.generated_at);
    let _ = writeln!(out, "# Review each fix before running; settings updates trigger reindexing.");
    let _ = writeln!(out, "set -eu");
    let _ = writeln!(out);
    let _ = writeln!(out, "MEILI_URL=\"${{MEILI_URL:-{url}}}\"");
    let _ = writeln!(out, "MEILI_API_KEY=\"${{MEILI_API_KEY:?set MEILI_API_KEY first}}\"");
    let _ = writeln!(out);

    let mut fix_count = 0;
    for (scope, finding) in report.scoped_findings() {
        let Some(fix) = &finding.fix else { continue };
        fix_count += 1;
        let _ = writeln!(out, "# {}: {}", finding.id, finding.title);
        if let Some(uid) = scope {
            let _ = writeln!(out, "# index: {uid}");
        }
        let _ = writeln!(
            out,
            "curl -sS -X {} \"$MEILI_URL{}\" \\",
            super::fix_method(fix),
            fix.endpoint
        );
        let _ = writeln!(out, "  -H 'Content-Type: application/json' \\");
        let _ = writeln!(out, "  -H \"Authorization: Bearer $MEILI_API_KEY\" \\");
        let _ = writeln!(out, "  --data-binary @- <<'EOF'");
        let payload =
            serde_json::to_string_pretty(&fix.payload).unwrap_or_else(|_| fix.payload.to_string());
        let _ = writeln!(out, "{payload}");
        let _ = writeln!(out, "EOF");
        let _ = writeln!(out);
    }

    if fix_count == 0 {
        let _ = writeln!(out, "echo 'no automatable fixes in this report'");
    } else {
        let _ = writeln!(out, "echo 'applied {fix_count} fixes'");
    }
    out
}
