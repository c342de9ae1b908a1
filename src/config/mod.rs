use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub ui: UiConfig,
    pub connection: ConnectionConfig,
    pub analyze: AnalyzeConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub color: bool,
    pub max_table_rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeConfig {
    pub sample_documents: usize,
    pub probe_search: bool,
    pub detect_sensitive: bool,
    pub fail_on_warnings: bool,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            ui: UiConfig {
                color: true,
                max_table_rows: 20,
            },
            connection: ConnectionConfig {
                url: None,
                timeout_secs: 30,
            },
            analyze: AnalyzeConfig {
                sample_documents: crate::collect::live::DEFAULT_SAMPLE_DOCS,
                probe_search: false,
                detect_sensitive: false,
                fail_on_warnings: false,
            },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    ui: Option<RawUiConfig>,
    connection: Option<RawConnectionConfig>,
    analyze: Option<RawAnalyzeConfig>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    color: Option<bool>,
    max_table_rows: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawConnectionConfig {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawAnalyzeConfig {
    sample_documents: Option<usize>,
    probe_search: Option<bool>,
    detect_sensitive: Option<bool>,
    fail_on_warnings: Option<bool>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/meiliscan/config.toml")
}

/// Precedence: built-in defaults, then the TOML file, then MEILISCAN_*
/// environment variables.
pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s).context("failed to parse config file (TOML)")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(ui) = raw.ui {
        if let Some(color) = ui.color {
            cfg.ui.color = color;
        }
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }

    if let Some(connection) = raw.connection {
        if let Some(url) = connection.url {
            cfg.connection.url = Some(url);
        }
        if let Some(timeout_secs) = connection.timeout_secs {
            cfg.connection.timeout_secs = timeout_secs;
        }
    }

    if let Some(analyze) = raw.analyze {
        if let Some(sample_documents) = analyze.sample_documents {
            cfg.analyze.sample_documents = sample_documents;
        }
        if let Some(probe_search) = analyze.probe_search {
            cfg.analyze.probe_search = probe_search;
        }
        if let Some(detect_sensitive) = analyze.detect_sensitive {
            cfg.analyze.detect_sensitive = detect_sensitive;
        }
        if let Some(fail_on_warnings) = analyze.fail_on_warnings {
            cfg.analyze.fail_on_warnings = fail_on_warnings;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("MEILISCAN_UI_COLOR") {
        cfg.ui.color = parse_bool(&v).with_context(|| "MEILISCAN_UI_COLOR")?;
    }
    if let Ok(v) = std::env::var("MEILISCAN_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "MEILISCAN_UI_MAX_TABLE_ROWS")?;
    }
    if let Ok(v) = std::env::var("MEILISCAN_URL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.connection.url = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("MEILISCAN_TIMEOUT_SECS") {
        cfg.connection.timeout_secs = v
            .trim()
            .parse::<u64>()
            .with_context(|| "MEILISCAN_TIMEOUT_SECS")?;
    }
    if let Ok(v) = std::env::var("MEILISCAN_SAMPLE_DOCUMENTS") {
        cfg.analyze.sample_documents = v
            .trim()
            .parse::<usize>()
            .with_context(|| "MEILISCAN_SAMPLE_DOCUMENTS")?;
    }
    if let Ok(v) = std::env::var("MEILISCAN_PROBE_SEARCH") {
        cfg.analyze.probe_search = parse_bool(&v).with_context(|| "MEILISCAN_PROBE_SEARCH")?;
    }
    if let Ok(v) = std::env::var("MEILISCAN_DETECT_SENSITIVE") {
        cfg.analyze.detect_sensitive =
            parse_bool(&v).with_context(|| "MEILISCAN_DETECT_SENSITIVE")?;
    }
    if let Ok(v) = std::env::var("MEILISCAN_FAIL_ON_WARNINGS") {
        cfg.analyze.fail_on_warnings =
            parse_bool(&v).with_context(|| "MEILISCAN_FAIL_ON_WARNINGS")?;
    }

    Ok(())
}

fn parse_bool(s: &str) -> Result<bool> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!(
            "invalid boolean: {s} (expected true|false|1|0|yes|no|on|off)"
        )),
    }
}
