use anyhow::{Context, Result};
use regex::Regex;

/// Compiled name/value classifiers used by the rule modules. Kept as one
/// immutable value passed into the rules so tests can evaluate the
/// classifiers in isolation.
#[derive(Debug, Clone)]
pub struct Patterns {
    /// Identifier-like field names: `id`, `_id`, `user_id`, `userId`,
    /// `uuid`, `guid`. Deliberately case-sensitive on the camel-case
    /// suffix so `paid`/`valid` do not match.
    pub identifier_field: Regex,
    pub sort_candidate_field: Regex,
    pub numeric_field: Regex,
    pub high_cardinality_field: Regex,
    pub sensitive_field: Regex,
    pub distinct_candidate_field: Regex,
    pub text_indicator_field: Regex,
    pub geo_field: Regex,
    pub iso_date_value: Regex,
    pub markup_value: Regex,
    pub numeric_string_value: Regex,
    pub pii_values: Vec<(&'static str, Regex)>,
}

impl Patterns {
    pub fn compile() -> Result<Self> {
        let rx = |pattern: &str| {
            Regex::new(pattern).with_context(|| format!("compile pattern: {pattern}"))
        };

        Ok(Self {
            identifier_field: rx(r"^(id|_id|uuid|guid)$|_id$|Id$|ID$")?,
            sort_candidate_field: rx(
                r"(?i)\b(price|date|rank|score|count|rating|created|updated|timestamp)",
            )?,
            numeric_field: rx(r"(?i)\b(price|count|qty|quantity|amount|total|age|year)\b")?,
            high_cardinality_field: rx(r"(?i)\b(uuid|guid|hash|token|session)")?,
            sensitive_field: rx(
                r"(?i)\b(password|passwd|secret|token|api_?key|private_?key|ssn|social_security|credit_?card|card_number|cvv)",
            )?,
            distinct_candidate_field: rx(r"(?i)\b(sku|slug|url|isbn)\b")?,
            text_indicator_field: rx(r"(?i)^(content|body|text|description|article|post)$")?,
            geo_field: rx(r"(?i)^(lat|lng|lon|latitude|longitude|geo_lat|geo_lng)$")?,
            iso_date_value: rx(r"^\d{4}-\d{2}-\d{2}([T ]\d{2}:\d{2}(:\d{2})?(\.\d+)?(Z|[+-]\d{2}:\d{2})?)?$")?,
            markup_value: rx(r"<\s*(p|div|span|br|a|img|h[1-6]|ul|ol|li|strong|em)[\s/>]")?,
            numeric_string_value: rx(r"^-?\d+(\.\d+)?$")?,
            pii_values: vec![
                ("email", rx(r"^[\w.+-]+@[\w-]+\.[\w.-]+$")?),
                ("phone", rx(r"^\+?\d[\d\s().-]{6,14}\d$")?),
                ("ssn", rx(r"^\d{3}-\d{2}-\d{4}$")?),
                ("credit_card", rx(r"^(\d[ -]?){13,16}$")?),
                ("ip_address", rx(r"^(\d{1,3}\.){3}\d{1,3}$")?),
            ],
        })
    }
}

/// Fixed bounds for every threshold comparison in the rule catalog.
/// A value exactly at a `max_*`/`min_*` bound is compliant; the
/// recurring-error count is the one inclusive bound.
#[derive(Debug, Clone)]
pub struct Thresholds {
    pub wildcard_searchable_fields: usize,
    pub filterable_needed_docs: u64,
    pub stop_words_docs: u64,
    pub synonyms_docs: u64,
    pub min_one_typo_word_size: u32,
    pub max_values_per_facet: u64,
    pub max_total_hits: u64,
    pub max_searchable_attributes: usize,
    pub max_field_count: usize,
    pub default_settings_docs: u64,

    pub min_sample: usize,
    pub max_nesting_depth: usize,
    pub max_avg_array_len: f64,
    pub max_null_ratio: f64,
    pub max_text_len: usize,
    pub max_empty_ratio: f64,
    pub numeric_string_ratio: f64,
    pub text_indicator_docs: u64,

    pub huge_index_docs: u64,
    pub min_tasks_for_ratio: usize,
    pub max_failed_ratio: f64,
    pub recurring_error_count: usize,
    pub backlog_window: usize,
    pub max_backlog_latency_secs: f64,
    pub max_settings_task_secs: f64,
    pub max_settings_updates: usize,
    pub max_bytes_per_document: u64,
    pub max_canceled_ratio: f64,
    pub max_single_doc_tasks: usize,

    pub current_stable_version: &'static str,

    pub min_master_key_len: usize,
    pub min_payload_bytes: u64,
    pub max_payload_bytes: u64,
    pub min_indexing_memory: u64,
    pub max_indexing_memory: u64,
    pub max_indexing_threads: u32,

    pub max_probe_response_bytes: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            wildcard_searchable_fields: 10,
            filterable_needed_docs: 1000,
            stop_words_docs: 10_000,
            synonyms_docs: 10_000,
            min_one_typo_word_size: 4,
            max_values_per_facet: 1000,
            max_total_hits: 10_000,
            max_searchable_attributes: 20,
            max_field_count: 100,
            default_settings_docs: 1000,

            min_sample: 5,
            max_nesting_depth: 5,
            max_avg_array_len: 100.0,
            max_null_ratio: 0.5,
            max_text_len: 65_535,
            max_empty_ratio: 0.3,
            numeric_string_ratio: 0.8,
            text_indicator_docs: 100,

            huge_index_docs: 1_000_000,
            min_tasks_for_ratio: 10,
            max_failed_ratio: 0.1,
            recurring_error_count: 3,
            backlog_window: 20,
            max_backlog_latency_secs: 60.0,
            max_settings_task_secs: 30.0,
            max_settings_updates: 5,
            max_bytes_per_document: 100 * 1024,
            max_canceled_ratio: 0.2,
            max_single_doc_tasks: 10,

            current_stable_version: "1.12.0",

            min_master_key_len: 16,
            min_payload_bytes: 1024 * 1024,
            max_payload_bytes: 500 * 1024 * 1024,
            min_indexing_memory: 256 * 1024 * 1024,
            max_indexing_memory: 64 * 1024 * 1024 * 1024,
            max_indexing_threads: 16,

            max_probe_response_bytes: 100 * 1024,
        }
    }
}
