use serde_json::json;

use crate::core::{Category, Finding, LaunchConfig, Severity};
use crate::rules::RuleContext;

const CAT: Category = Category::Launch;

/// Launch rules only run when a launch configuration was captured;
/// without one there is nothing to judge and nothing fires.
pub fn instance_rules(ctx: &RuleContext) -> Vec<Finding> {
    let Some(config) = &ctx.snapshot.launch_config else {
        return Vec::new();
    };
    let mut out = Vec::new();
    out.extend(production_without_master_key(config));
    out.extend(short_master_key(ctx, config));
    out.extend(bound_to_all_interfaces(config));
    out.extend(payload_limit_out_of_range(ctx, config));
    out.extend(indexing_memory_out_of_range(ctx, config));
    out.extend(too_many_indexing_threads(ctx, config));
    out.extend(production_without_ssl(config));
    out.extend(no_scheduled_snapshots(config));
    out
}

fn production_without_master_key(config: &LaunchConfig) -> Option<Finding> {
    if !config.is_production() || config.master_key.is_some() {
        return None;
    }
    Some(
        Finding::new(
            "I001",
            CAT,
            Severity::Critical,
            "Production instance without a master key",
            "MEILI_ENV is production but no master key is set; every endpoint, including index deletion, is open.",
            "Anyone who can reach the port owns the data.",
        )
        .reference("https://www.meilisearch.com/docs/learn/security/basic_security"),
    )
}

fn short_master_key(ctx: &RuleContext, config: &LaunchConfig) -> Option<Finding> {
    let key = config.master_key.as_deref()?;
    if key.len() >= ctx.thresholds.min_master_key_len {
        return None;
    }
    Some(
        Finding::new(
            "I002",
            CAT,
            Severity::Critical,
            "Master key is too short",
            format!(
                "The master key is {} characters; fewer than {} is brute-forceable.",
                key.len(),
                ctx.thresholds.min_master_key_len
            ),
            "API keys derived from a weak master key inherit its weakness.",
        )
        .current(json!(key.len()))
        .recommended(json!(ctx.thresholds.min_master_key_len)),
    )
}

fn bound_to_all_interfaces(config: &LaunchConfig) -> Option<Finding> {
    let addr = config.http_addr.as_deref()?;
    if !addr.starts_with("0.0.0.0") {
        return None;
    }
    Some(
        Finding::new(
            "I003",
            CAT,
            Severity::Warning,
            "Listening on every interface",
            format!("http_addr is {addr}. The engine is reachable from any network the host sits on."),
            "Exposure surface includes networks you did not intend.",
        )
        .current(json!(addr))
        .recommended(json!("127.0.0.1:7700 behind a reverse proxy")),
    )
}

fn payload_limit_out_of_range(ctx: &RuleContext, config: &LaunchConfig) -> Option<Finding> {
    let limit = config.http_payload_size_limit?;
    if (ctx.thresholds.min_payload_bytes..=ctx.thresholds.max_payload_bytes).contains(&limit) {
        return None;
    }
    let (what, why) = if limit < ctx.thresholds.min_payload_bytes {
        ("small", "legitimate document batches will be rejected")
    } else {
        ("large", "one oversized request can stall the task queue")
    };
    Some(
        Finding::new(
            "I004",
            CAT,
            Severity::Warning,
            "Unusual HTTP payload limit",
            format!("http_payload_size_limit is {limit} bytes, unusually {what}; {why}."),
            "Ingestion either fails outright or becomes a DoS vector.",
        )
        .current(json!(limit)),
    )
}

fn indexing_memory_out_of_range(ctx: &RuleContext, config: &LaunchConfig) -> Option<Finding> {
    let memory = config.max_indexing_memory?;
    if (ctx.thresholds.min_indexing_memory..=ctx.thresholds.max_indexing_memory).contains(&memory) {
        return None;
    }
    Some(
        Finding::new(
            "I005",
            CAT,
            Severity::Warning,
            "Indexing memory budget out of the usual range",
            format!("max_indexing_memory is {} MiB.", memory / (1024 * 1024)),
            "Too little starves indexing; an enormous budget can OOM the host.",
        )
        .current(json!(memory)),
    )
}

fn too_many_indexing_threads(ctx: &RuleContext, config: &LaunchConfig) -> Option<Finding> {
    let threads = config.max_indexing_threads?;
    if threads <= ctx.thresholds.max_indexing_threads {
        return None;
    }
    Some(
        Finding::new(
            "I006",
            CAT,
            Severity::Suggestion,
            "Very high indexing thread count",
            format!("max_indexing_threads is {threads}; returns diminish well before that and search threads get starved."),
            "Search latency spikes during indexing.",
        )
        .current(json!(threads))
        .recommended(json!(ctx.thresholds.max_indexing_threads)),
    )
}

fn production_without_ssl(config: &LaunchConfig) -> Option<Finding> {
    if !config.is_production() || config.ssl_configured {
        return None;
    }
    Some(
        Finding::new(
            "I007",
            CAT,
            Severity::Warning,
            "No TLS in production",
            "No SSL certificate or key is configured. Fine behind a terminating proxy, fatal if the port is exposed directly.",
            "API keys and documents travel in cleartext.",
        ),
    )
}

fn no_scheduled_snapshots(config: &LaunchConfig) -> Option<Finding> {
    if !config.is_production() || config.snapshot_scheduled {
        return None;
    }
    Some(
        Finding::new(
            "I008",
            CAT,
            Severity::Suggestion,
            "No scheduled snapshots",
            "Production data with no snapshot schedule; recovery after corruption means reingesting from source.",
            "Recovery time is bounded by a full reindex, not a restore.",
        )
        .reference("https://www.meilisearch.com/docs/learn/data_backup/snapshots"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Snapshot, SnapshotSource};
    use crate::rules::{Patterns, Thresholds};

    fn eval(config: LaunchConfig) -> Vec<Finding> {
        let mut snapshot = Snapshot::new(SnapshotSource::Instance {
            url: "http://localhost:7700".to_string(),
            version: None,
        });
        snapshot.launch_config = Some(config);
        let thresholds = Thresholds::default();
        let patterns = Patterns::compile().expect("compile");
        instance_rules(&RuleContext {
            snapshot: &snapshot,
            thresholds: &thresholds,
            patterns: &patterns,
        })
    }

    fn ids(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.id.as_str()).collect()
    }

    fn production() -> LaunchConfig {
        LaunchConfig {
            env: Some("production".to_string()),
            master_key: Some("a".repeat(32)),
            ssl_configured: true,
            snapshot_scheduled: true,
            ..LaunchConfig::default()
        }
    }

    #[test]
    fn hardened_production_config_is_clean() {
        assert!(eval(production()).is_empty());
    }

    #[test]
    fn open_production_instance_is_critical() {
        let config = LaunchConfig {
            env: Some("production".to_string()),
            ..LaunchConfig::default()
        };
        let found = eval(config);
        assert!(ids(&found).contains(&"I001"));
        assert!(ids(&found).contains(&"I007"));
        assert!(ids(&found).contains(&"I008"));
    }

    #[test]
    fn development_env_skips_production_only_rules() {
        let config = LaunchConfig {
            env: Some("development".to_string()),
            ..LaunchConfig::default()
        };
        let found = eval(config);
        assert!(!ids(&found).contains(&"I001"));
        assert!(!ids(&found).contains(&"I007"));
        assert!(!ids(&found).contains(&"I008"));
    }

    #[test]
    fn master_key_length_is_checked_wherever_set() {
        let mut config = production();
        config.master_key = Some("shortkey".to_string());
        let found = eval(config);
        assert!(ids(&found).contains(&"I002"));

        let mut config = LaunchConfig::default();
        config.env = Some("development".to_string());
        config.master_key = Some("shortkey".to_string());
        assert!(ids(&eval(config)).contains(&"I002"));
    }

    #[test]
    fn payload_limit_range_is_inclusive() {
        let mut config = production();
        config.http_payload_size_limit = Some(1024 * 1024);
        assert!(!ids(&eval(config.clone())).contains(&"I004"));

        config.http_payload_size_limit = Some(1024 * 1024 - 1);
        assert!(ids(&eval(config.clone())).contains(&"I004"));

        config.http_payload_size_limit = Some(500 * 1024 * 1024 + 1);
        assert!(ids(&eval(config)).contains(&"I004"));
    }

    #[test]
    fn wildcard_bind_is_flagged() {
        let mut config = production();
        config.http_addr = Some("0.0.0.0:7700".to_string());
        assert!(ids(&eval(config)).contains(&"I003"));

        let mut config = production();
        config.http_addr = Some("127.0.0.1:7700".to_string());
        assert!(!ids(&eval(config)).contains(&"I003"));
    }
}
