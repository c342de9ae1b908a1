use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::core::LaunchConfig;

/// Reads a Meilisearch launch configuration (`config.toml`) into the
/// flattened model the launch rules consume. Keys arrive in kebab-case
/// or snake_case depending on how the file was written; both are
/// accepted.
pub fn from_toml_file(path: &Path) -> Result<LaunchConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read launch config: {}", path.display()))?;
    from_toml_str(&text).with_context(|| format!("parse launch config: {}", path.display()))
}

pub fn from_toml_str(text: &str) -> Result<LaunchConfig> {
    let table: toml::Table = text.parse().context("invalid TOML")?;
    let values: BTreeMap<String, toml::Value> = table
        .into_iter()
        .map(|(key, value)| (key.replace('-', "_").to_lowercase(), value))
        .collect();

    let string = |key: &str| -> Option<String> {
        values.get(key).and_then(|v| v.as_str()).map(str::to_string)
    };
    let byte_size = |key: &str| -> Option<u64> {
        match values.get(key) {
            Some(toml::Value::Integer(n)) => u64::try_from(*n).ok(),
            Some(toml::Value::String(s)) => parse_byte_size(s),
            _ => None,
        }
    };

    let ssl_configured = ["ssl_cert_path", "ssl_key_path"]
        .iter()
        .any(|key| string(key).is_some_and(|v| !v.is_empty()));

    let snapshot_scheduled = match values.get("schedule_snapshot") {
        Some(toml::Value::Boolean(b)) => *b,
        Some(toml::Value::Integer(n)) => *n > 0,
        _ => false,
    };

    let max_indexing_threads = values
        .get("max_indexing_threads")
        .and_then(|v| v.as_integer())
        .and_then(|n| u32::try_from(n).ok());

    Ok(LaunchConfig {
        env: string("env"),
        master_key: string("master_key"),
        http_addr: string("http_addr"),
        http_payload_size_limit: byte_size("http_payload_size_limit"),
        max_indexing_memory: byte_size("max_indexing_memory"),
        max_indexing_threads,
        ssl_configured,
        snapshot_scheduled,
        log_level: string("log_level"),
    })
}

/// `"2 GiB"`, `"100MB"`, `"104857600"`. Decimal suffixes are treated as
/// binary, matching how the engine itself reads them.
fn parse_byte_size(input: &str) -> Option<u64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let upper = trimmed.to_uppercase();
    // Longest suffixes first so "MIB" is not consumed as "B".
    const SUFFIXES: [(&str, u64); 9] = [
        ("KIB", 1024),
        ("MIB", 1024 * 1024),
        ("GIB", 1024 * 1024 * 1024),
        ("TIB", 1024_u64.pow(4)),
        ("KB", 1024),
        ("MB", 1024 * 1024),
        ("GB", 1024 * 1024 * 1024),
        ("TB", 1024_u64.pow(4)),
        ("B", 1),
    ];
    for (suffix, multiplier) in SUFFIXES {
        if let Some(number) = upper.strip_suffix(suffix) {
            let number: f64 = number.trim().parse().ok()?;
            if number < 0.0 {
                return None;
            }
            return Some((number * multiplier as f64) as u64);
        }
    }
    upper.parse::<u64>().ok()
}
