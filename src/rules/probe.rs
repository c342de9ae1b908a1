use serde_json::json;

use crate::core::{Category, Finding, IndexData, ProbeKind, ProbeResult, Severity};
use crate::rules::RuleContext;

const CAT: Category = Category::Probe;

/// Probe rules judge the recorded outcomes only; no requests are made
/// here. An index with no recorded probes yields nothing.
pub fn index_rules(ctx: &RuleContext, index: &IndexData) -> Vec<Finding> {
    let probes = ctx.snapshot.probes_for_index(&index.uid);
    if probes.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    out.extend(basic_probe_failed(index, &probes));
    out.extend(attribute_probe_failed(index, &probes));
    out.extend(oversized_responses(ctx, index, &probes));
    out
}

fn basic_probe_failed(index: &IndexData, probes: &[&ProbeResult]) -> Option<Finding> {
    let failed = probes
        .iter()
        .find(|p| p.kind == ProbeKind::Basic && !p.success)?;
    Some(
        Finding::new(
            "Q001",
            CAT,
            Severity::Critical,
            "Plain search does not work",
            format!(
                "A basic search against this index failed: {}.",
                failed.error_message.as_deref().unwrap_or("no error detail")
            ),
            "The index is effectively down for every client.",
        )
        .for_index(&index.uid),
    )
}

fn attribute_probe_failed(index: &IndexData, probes: &[&ProbeResult]) -> Option<Finding> {
    let failures: Vec<String> = probes
        .iter()
        .filter(|p| matches!(p.kind, ProbeKind::Sort | ProbeKind::Filter) && !p.success)
        .map(|p| {
            format!(
                "{} on {}",
                p.kind.as_str(),
                p.field.as_deref().unwrap_or("<unknown field>")
            )
        })
        .collect();
    if failures.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "Q002",
            CAT,
            Severity::Warning,
            "Declared attributes fail in practice",
            format!(
                "Probes using configured attributes failed: {}. Settings promise what queries cannot deliver.",
                failures.join("; ")
            ),
            "Clients relying on these attributes get errors, not results.",
        )
        .for_index(&index.uid)
        .current(json!(failures)),
    )
}

fn oversized_responses(ctx: &RuleContext, index: &IndexData, probes: &[&ProbeResult]) -> Option<Finding> {
    let largest = probes
        .iter()
        .filter(|p| p.success)
        .filter_map(|p| p.response_size_bytes)
        .max()?;
    if largest <= ctx.thresholds.max_probe_response_bytes {
        return None;
    }
    Some(
        Finding::new(
            "Q003",
            CAT,
            Severity::Suggestion,
            "Search responses are heavyweight",
            format!(
                "A probe response weighed {} KiB. Trimming displayed attributes would shrink every result page.",
                largest / 1024
            ),
            "Bandwidth and client parse time paid on every query.",
        )
        .for_index(&index.uid)
        .current(json!(largest)),
    )
}
