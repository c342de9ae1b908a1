use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use crate::core::{Finding, Report, Severity};

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const INFO_URI: &str = "https://github.com/meilisearch/meiliscan";

/// SARIF 2.1.0 for GitHub Code Scanning and friends. Findings become
/// results; each distinct finding ID becomes a rule. Locations are
/// logical (index uid) since there is no source file to point at.
pub fn render(report: &Report) -> Result<String> {
    let scoped = report.scoped_findings();

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut rules = Vec::new();
    for (_, finding) in &scoped {
        if seen.insert(finding.id.as_str()) {
            rules.push(rule_for(finding));
        }
    }

    let results: Vec<Value> = scoped
        .iter()
        .map(|(scope, finding)| result_for(*scope, finding))
        .collect();

    let mut invocation = json!({
        "executionSuccessful": true,
        "endTimeUtc": report.generated_at,
    });
    let mut arguments = vec![format!("--source-type={}", report.source.kind)];
    if let Some(url) = &report.source.url {
        arguments.push(format!("--url={url}"));
    }
    invocation["arguments"] = json!(arguments);

    let doc = json!({
        "$schema": SARIF_SCHEMA,
        "version": SARIF_VERSION,
        "runs": [{
            "tool": {
                "driver": {
                    "name": "meiliscan",
                    "version": report.tool_version,
                    "informationUri": INFO_URI,
                    "rules": rules,
                }
            },
            "results": results,
            "invocations": [invocation],
        }],
    });

    let mut out = serde_json::to_string_pretty(&doc).context("serialize SARIF")?;
    out.push('\n');
    Ok(out)
}

fn rule_for(finding: &Finding) -> Value {
    let mut rule = json!({
        "id": finding.id,
        "name": pascal_case(&finding.title),
        "shortDescription": {"text": finding.title},
        "fullDescription": {"text": finding.description},
        "defaultConfiguration": {"level": level(finding.severity)},
        "properties": {
            "category": finding.category.as_str(),
            "tags": [finding.category.as_str(), finding.severity.as_str()],
        },
    });
    if let Some(reference) = finding.references.first() {
        rule["helpUri"] = json!(reference);
    }
    rule
}

fn result_for(scope: Option<&str>, finding: &Finding) -> Value {
    let logical = match scope {
        Some(uid) => format!("indexes/{uid}/settings"),
        None => "instance/global".to_string(),
    };

    let mut message = finding.description.clone();
    if let Some(uid) = scope {
        message.push_str(&format!(" | Index: {uid}"));
    }
    message.push_str(&format!(" | Impact: {}", finding.impact));

    let mut properties = json!({"impact": finding.impact});
    if let Some(current) = &finding.current_value {
        properties["currentValue"] = current.clone();
    }
    if let Some(recommended) = &finding.recommended_value {
        properties["recommendedValue"] = recommended.clone();
    }

    let mut result = json!({
        "ruleId": finding.id,
        "level": level(finding.severity),
        "message": {"text": message},
        "locations": [{
            "logicalLocations": [{
                "name": scope.unwrap_or("global"),
                "fullyQualifiedName": logical,
                "kind": "database",
            }]
        }],
        "properties": properties,
    });

    if let Some(fix) = &finding.fix {
        result["fixes"] = json!([{
            "description": {
                "text": format!("{} {} with the attached payload", super::fix_method(fix), fix.endpoint),
            },
            "artifactChanges": [{
                "artifactLocation": {"uri": fix.endpoint},
                "replacements": [{
                    "deletedRegion": {"startLine": 1, "startColumn": 1},
                    "insertedContent": {"text": fix.payload.to_string()},
                }],
            }],
        }]);
    }

    result
}

fn level(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "error",
        Severity::Warning => "warning",
        Severity::Suggestion => "note",
        Severity::Info => "none",
    }
}

fn pascal_case(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect()
}
