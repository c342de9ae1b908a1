use anyhow::{Context, Result};

use crate::core::{ComparisonReport, Report};

/// Pretty JSON with a trailing newline. Field order is fixed by the
/// struct definitions and BTreeMap keys, so output is byte-stable for
/// identical input.
pub fn render(report: &Report) -> Result<String> {
    let mut out = serde_json::to_string_pretty(report).context("serialize report")?;
    out.push('\n');
    Ok(out)
}

pub fn render_comparison(comparison: &ComparisonReport) -> Result<String> {
    let mut out = serde_json::to_string_pretty(comparison).context("serialize comparison")?;
    out.push('\n');
    Ok(out)
}
