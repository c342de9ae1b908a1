use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::{Value, json};

use crate::core::{IndexData, ProbeKind, ProbeResult, Snapshot, SnapshotSource};
use crate::exit;

/// Documents fetched per index for the content heuristics.
pub const DEFAULT_SAMPLE_DOCS: usize = 20;

const TASK_HISTORY_LIMIT: usize = 1000;
const MAX_PROBES_PER_INDEX: usize = 3;

#[derive(Debug, Clone)]
pub struct LiveOptions {
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub sample_documents: usize,
    pub probe_search: bool,
}

/// Captures a snapshot of a running instance over its HTTP API. Every
/// request is read-only; even the probes are plain searches.
pub fn collect(url: &str, opts: &LiveOptions) -> Result<Snapshot> {
    let base = url.trim_end_matches('/').to_string();
    let client = build_client(opts)?;

    // Health first: an unreachable instance is a network failure, not
    // an analysis failure.
    let health = client
        .get(format!("{base}/health"))
        .send()
        .map_err(|e| exit::network_err(anyhow!(e).context(format!("connect to {base}"))))?;
    if !health.status().is_success() {
        return Err(exit::network(format!(
            "{base}/health returned {}",
            health.status()
        )));
    }

    let version = get_json(&client, &format!("{base}/version"))
        .ok()
        .and_then(|v| v.get("pkgVersion").and_then(Value::as_str).map(str::to_string));

    let mut snapshot = Snapshot::new(SnapshotSource::Instance {
        url: base.clone(),
        version,
    });

    if let Ok(stats) = get_json(&client, &format!("{base}/stats")) {
        snapshot.database_size_bytes = stats
            .get("databaseSize")
            .and_then(Value::as_u64)
            .unwrap_or(0);
    }

    snapshot.indexes = fetch_indexes(&client, &base, opts)?;
    snapshot.tasks = fetch_tasks(&client, &base);

    if opts.probe_search {
        for index in &snapshot.indexes {
            snapshot.probes.extend(probe_index(&client, &base, index));
        }
    }

    Ok(snapshot)
}

/// Task history only, for the `tasks` command. Unlike the snapshot
/// path, a failing tasks endpoint is a hard error here.
pub fn collect_tasks(url: &str, opts: &LiveOptions) -> Result<Vec<crate::core::Task>> {
    let base = url.trim_end_matches('/').to_string();
    let client = build_client(opts)?;

    let health = client
        .get(format!("{base}/health"))
        .send()
        .map_err(|e| exit::network_err(anyhow!(e).context(format!("connect to {base}"))))?;
    if !health.status().is_success() {
        return Err(exit::network(format!(
            "{base}/health returned {}",
            health.status()
        )));
    }

    let listing = get_json(&client, &format!("{base}/tasks?limit={TASK_HISTORY_LIMIT}"))?;
    Ok(results_array(listing)
        .into_iter()
        .filter_map(super::task_from_value)
        .collect())
}

fn build_client(opts: &LiveOptions) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(key) = &opts.api_key {
        let value = HeaderValue::from_str(&format!("Bearer {key}"))
            .context("API key contains characters not allowed in a header")?;
        headers.insert(AUTHORIZATION, value);
    }
    Client::builder()
        .timeout(opts.timeout)
        .default_headers(headers)
        .build()
        .context("build HTTP client")
}

fn results_array(value: Value) -> Vec<Value> {
    match value {
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(entries)) => entries,
            _ => Vec::new(),
        },
        Value::Array(entries) => entries,
        _ => Vec::new(),
    }
}

fn fetch_indexes(client: &Client, base: &str, opts: &LiveOptions) -> Result<Vec<IndexData>> {
    let listing = get_json(client, &format!("{base}/indexes?limit=1000"))?;
    let entries = results_array(listing);

    let mut indexes = Vec::new();
    for entry in entries {
        let Some(uid) = entry.get("uid").and_then(Value::as_str) else {
            continue;
        };
        let mut index = IndexData::new(uid);
        index.primary_key = entry
            .get("primaryKey")
            .and_then(Value::as_str)
            .map(str::to_string);
        index.created_at = entry
            .get("createdAt")
            .and_then(Value::as_str)
            .map(str::to_string);
        index.updated_at = entry
            .get("updatedAt")
            .and_then(Value::as_str)
            .map(str::to_string);

        let settings = get_json(client, &format!("{base}/indexes/{uid}/settings"))
            .with_context(|| format!("fetch settings for index {uid}"))?;
        index.settings = serde_json::from_value(settings)
            .with_context(|| format!("parse settings for index {uid}"))?;

        let stats = get_json(client, &format!("{base}/indexes/{uid}/stats"))
            .with_context(|| format!("fetch stats for index {uid}"))?;
        index.stats = serde_json::from_value(stats)
            .with_context(|| format!("parse stats for index {uid}"))?;

        // Sampling is best-effort; an index whose documents endpoint is
        // denied still gets its settings checked.
        if let Ok(docs) = get_json(
            client,
            &format!(
                "{base}/indexes/{uid}/documents?limit={}",
                opts.sample_documents
            ),
        ) {
            index.sample_documents = results_array(docs);
        }

        indexes.push(index);
    }
    indexes.sort_by(|a, b| a.uid.cmp(&b.uid));
    Ok(indexes)
}

fn fetch_tasks(client: &Client, base: &str) -> Vec<crate::core::Task> {
    let Ok(listing) = get_json(client, &format!("{base}/tasks?limit={TASK_HISTORY_LIMIT}")) else {
        return Vec::new();
    };
    results_array(listing)
        .into_iter()
        .filter_map(super::task_from_value)
        .collect()
}

/// Up to three read-only searches per index: one basic, then sort and
/// filter probes over the declared attributes.
fn probe_index(client: &Client, base: &str, index: &IndexData) -> Vec<ProbeResult> {
    let mut probes = Vec::new();

    probes.push(run_probe(client, base, index, ProbeKind::Basic, None, json!({"q": ""})));

    for field in index.settings.sortable_attributes.iter().take(2) {
        if probes.len() >= MAX_PROBES_PER_INDEX {
            break;
        }
        probes.push(run_probe(
            client,
            base,
            index,
            ProbeKind::Sort,
            Some(field),
            json!({"q": "", "sort": [format!("{field}:asc")]}),
        ));
    }

    for field in index.settings.filterable_attributes.iter().take(2) {
        if probes.len() >= MAX_PROBES_PER_INDEX {
            break;
        }
        let Some(value) = filter_value(index, field) else {
            continue;
        };
        probes.push(run_probe(
            client,
            base,
            index,
            ProbeKind::Filter,
            Some(field),
            json!({"q": "", "filter": format!("{field} = {value}")}),
        ));
    }

    probes
}

fn run_probe(
    client: &Client,
    base: &str,
    index: &IndexData,
    kind: ProbeKind,
    field: Option<&str>,
    body: Value,
) -> ProbeResult {
    let mut result = ProbeResult {
        index_uid: index.uid.clone(),
        kind,
        field: field.map(str::to_string),
        success: false,
        error_message: None,
        hit_count: None,
        response_size_bytes: None,
    };

    let response = client
        .post(format!("{base}/indexes/{}/search", index.uid))
        .json(&body)
        .send();
    let response = match response {
        Ok(r) => r,
        Err(e) => {
            result.error_message = Some(e.to_string());
            return result;
        }
    };

    let status = response.status();
    let text = response.text().unwrap_or_default();
    if !status.is_success() {
        result.error_message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
            .or_else(|| Some(status.to_string()));
        return result;
    }

    result.success = true;
    result.response_size_bytes = Some(text.len() as u64);
    result.hit_count = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get("hits").and_then(Value::as_array).map(|h| h.len() as u64));
    result
}

/// A concrete value for a filter probe, taken from the sampled
/// documents. Strings are quoted; anything unquotable is skipped.
fn filter_value(index: &IndexData, field: &str) -> Option<String> {
    for doc in &index.sample_documents {
        match doc.get(field) {
            Some(Value::String(s)) if !s.is_empty() && !s.contains('"') => {
                return Some(format!("\"{s}\""));
            }
            Some(Value::Number(n)) => return Some(n.to_string()),
            Some(Value::Bool(b)) => return Some(b.to_string()),
            _ => continue,
        }
    }
    None
}

fn get_json(client: &Client, url: &str) -> Result<Value> {
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("request {url}"))?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("{url} returned {status}");
    }
    response.json().with_context(|| format!("decode {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn index_with_doc(doc: Value) -> IndexData {
        let mut index = IndexData::new("movies");
        index.sample_documents = vec![doc];
        index
    }

    #[test]
    fn filter_values_are_quoted_by_type() {
        let index = index_with_doc(json!({"genre": "drama", "year": 1999, "adult": false}));
        assert_eq!(filter_value(&index, "genre").as_deref(), Some("\"drama\""));
        assert_eq!(filter_value(&index, "year").as_deref(), Some("1999"));
        assert_eq!(filter_value(&index, "adult").as_deref(), Some("false"));
        assert_eq!(filter_value(&index, "missing"), None);
    }

    #[test]
    fn embedded_quotes_are_not_interpolated() {
        let index = index_with_doc(json!({"title": "say \"hi\""}));
        assert_eq!(filter_value(&index, "title"), None);
    }
}
