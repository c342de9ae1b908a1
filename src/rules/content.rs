use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Value, json};

use crate::core::{Category, Finding, IndexData, IndexSettings, Severity};
use crate::rules::RuleContext;

const CAT: Category = Category::Content;

/// Per-field aggregate built from the sampled documents. Field keys are
/// dot paths (`author.name`); array elements contribute to the array's
/// own path.
#[derive(Debug, Default)]
struct FieldProfile {
    present: usize,
    nulls: usize,
    empties: usize,
    /// JSON types seen for this path, nulls excluded.
    types: BTreeSet<&'static str>,
    array_count: usize,
    array_len_sum: u64,
    strings: Vec<String>,
}

struct SampleProfile {
    doc_count: usize,
    max_depth: usize,
    fields: BTreeMap<String, FieldProfile>,
}

pub fn index_rules(ctx: &RuleContext, index: &IndexData) -> Vec<Finding> {
    let samples = &index.sample_documents;

    if samples.is_empty() {
        return empty_sample(index).into_iter().collect();
    }
    // Every sample heuristic below shares the same minimum; a smaller
    // sample stays silent rather than guessing.
    if samples.len() < ctx.thresholds.min_sample {
        return Vec::new();
    }

    let profile = profile_samples(samples);
    let mut out = Vec::new();
    out.extend(inconsistent_types(index, &profile));
    out.extend(deep_nesting(ctx, index, &profile));
    out.extend(long_arrays(ctx, index, &profile));
    out.extend(null_heavy_searchable(ctx, index, &profile));
    out.extend(oversized_text(ctx, index, &profile));
    out.extend(markup_in_searchable(ctx, index, &profile));
    out.extend(unsortable_date_strings(ctx, index, &profile));
    out.extend(loose_geo_fields(ctx, index, &profile));
    if ctx.snapshot.sensitive_scan {
        out.extend(sensitive_field_names(ctx, index, &profile));
        out.extend(pii_values_in_displayed(ctx, index, &profile));
    }
    out.extend(mostly_empty_fields(ctx, index, &profile));
    out.extend(numeric_strings(ctx, index, &profile));
    out
}

fn profile_samples(samples: &[Value]) -> SampleProfile {
    let mut profile = SampleProfile {
        doc_count: samples.len(),
        max_depth: 0,
        fields: BTreeMap::new(),
    };
    for doc in samples {
        if let Value::Object(map) = doc {
            for (key, value) in map {
                walk(&mut profile, key.clone(), value, 1);
            }
        }
    }
    profile
}

fn walk(profile: &mut SampleProfile, path: String, value: &Value, depth: usize) {
    profile.max_depth = profile.max_depth.max(depth);

    if let Value::Object(map) = value {
        // The object itself counts as present so empty objects are not
        // invisible to the emptiness heuristic.
        record_leaf(profile, &path, value);
        for (key, child) in map {
            walk(profile, format!("{path}.{key}"), child, depth + 1);
        }
        return;
    }
    record_leaf(profile, &path, value);
}

fn record_leaf(profile: &mut SampleProfile, path: &str, value: &Value) {
    let entry = profile.fields.entry(path.to_string()).or_default();
    entry.present += 1;

    match value {
        Value::Null => {
            entry.nulls += 1;
            entry.empties += 1;
        }
        Value::String(s) => {
            entry.types.insert("string");
            if s.is_empty() {
                entry.empties += 1;
            }
            entry.strings.push(s.clone());
        }
        Value::Array(items) => {
            entry.types.insert("array");
            entry.array_count += 1;
            entry.array_len_sum += items.len() as u64;
            if items.is_empty() {
                entry.empties += 1;
            }
            for item in items {
                if let Value::String(s) = item {
                    entry.strings.push(s.clone());
                }
            }
        }
        Value::Object(_) => {
            entry.types.insert("object");
        }
        Value::Bool(_) => {
            entry.types.insert("boolean");
        }
        Value::Number(_) => {
            entry.types.insert("number");
        }
    }
}

fn top_segment(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

fn is_searchable(settings: &IndexSettings, path: &str) -> bool {
    if settings.searchable_is_wildcard() {
        return true;
    }
    settings
        .searchable_attributes
        .iter()
        .any(|a| a == path || a == top_segment(path))
}

fn is_displayed(settings: &IndexSettings, path: &str) -> bool {
    if settings.displayed_is_wildcard() {
        return true;
    }
    settings
        .displayed_attributes
        .iter()
        .any(|a| a == path || a == top_segment(path))
}

fn empty_sample(index: &IndexData) -> Option<Finding> {
    if index.stats.number_of_documents == 0 {
        return None;
    }
    Some(
        Finding::new(
            "D012",
            CAT,
            Severity::Info,
            "No documents could be sampled",
            format!(
                "Stats report {} documents but the sample came back empty, so content heuristics were skipped.",
                index.stats.number_of_documents
            ),
            "Content-level issues in this index go unchecked.",
        )
        .for_index(&index.uid),
    )
}

fn inconsistent_types(index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    let offenders: Vec<String> = profile
        .fields
        .iter()
        .filter(|(_, f)| f.types.len() >= 2)
        .map(|(path, f)| {
            let types: Vec<&str> = f.types.iter().copied().collect();
            format!("{path} ({})", types.join(", "))
        })
        .collect();
    if offenders.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "D001",
            CAT,
            Severity::Warning,
            "Field types vary across documents",
            format!("Sampled documents disagree on the type of: {}.", offenders.join("; ")),
            "Filtering and sorting on these fields behaves unpredictably.",
        )
        .for_index(&index.uid)
        .current(json!(offenders)),
    )
}

fn deep_nesting(ctx: &RuleContext, index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    if profile.max_depth <= ctx.thresholds.max_nesting_depth {
        return None;
    }
    Some(
        Finding::new(
            "D002",
            CAT,
            Severity::Warning,
            "Deeply nested documents",
            format!(
                "Sampled documents nest {} levels deep. Nested values cannot be targeted precisely by settings.",
                profile.max_depth
            ),
            "Settings apply to whole subtrees; relevancy control is lost.",
        )
        .for_index(&index.uid)
        .current(json!(profile.max_depth))
        .recommended(json!(ctx.thresholds.max_nesting_depth)),
    )
}

fn long_arrays(ctx: &RuleContext, index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    let offenders: Vec<String> = profile
        .fields
        .iter()
        .filter(|(_, f)| {
            f.array_count > 0
                && (f.array_len_sum as f64 / f.array_count as f64) > ctx.thresholds.max_avg_array_len
        })
        .map(|(path, f)| {
            format!("{path} (avg {:.0})", f.array_len_sum as f64 / f.array_count as f64)
        })
        .collect();
    if offenders.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "D003",
            CAT,
            Severity::Suggestion,
            "Very long arrays in documents",
            format!("Arrays at {} average beyond {} elements.", offenders.join(", "), ctx.thresholds.max_avg_array_len as u64),
            "Each element is indexed; long arrays inflate indexing cost.",
        )
        .for_index(&index.uid)
        .current(json!(offenders)),
    )
}

fn null_heavy_searchable(ctx: &RuleContext, index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    let n = profile.doc_count as f64;
    let offenders: Vec<&str> = profile
        .fields
        .iter()
        .filter(|(path, f)| {
            is_searchable(&index.settings, path) && (f.nulls as f64 / n) > ctx.thresholds.max_null_ratio
        })
        .map(|(path, _)| path.as_str())
        .collect();
    if offenders.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "D004",
            CAT,
            Severity::Warning,
            "Searchable fields are mostly null",
            format!("More than half of sampled values are null for: {}.", offenders.join(", ")),
            "Indexing overhead with almost nothing to match against.",
        )
        .for_index(&index.uid)
        .current(json!(offenders)),
    )
}

fn oversized_text(ctx: &RuleContext, index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    let offenders: Vec<&str> = profile
        .fields
        .iter()
        .filter(|(_, f)| f.strings.iter().any(|s| s.chars().count() > ctx.thresholds.max_text_len))
        .map(|(path, _)| path.as_str())
        .collect();
    if offenders.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "D005",
            CAT,
            Severity::Suggestion,
            "Oversized text values",
            format!(
                "Values longer than {} characters found in: {}.",
                ctx.thresholds.max_text_len,
                offenders.join(", ")
            ),
            "Huge values slow indexing and bloat responses.",
        )
        .for_index(&index.uid)
        .current(json!(offenders)),
    )
}

fn markup_in_searchable(ctx: &RuleContext, index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    let offenders: Vec<&str> = profile
        .fields
        .iter()
        .filter(|(path, f)| {
            is_searchable(&index.settings, path)
                && f.strings.iter().any(|s| ctx.patterns.markup_value.is_match(s))
        })
        .map(|(path, _)| path.as_str())
        .collect();
    if offenders.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "D006",
            CAT,
            Severity::Warning,
            "HTML markup inside searchable text",
            format!("Tags detected in: {}. Tag names and attributes become searchable tokens.", offenders.join(", ")),
            "Queries like `div` or `href` match markup, not content.",
        )
        .for_index(&index.uid)
        .current(json!(offenders)),
    )
}

fn unsortable_date_strings(ctx: &RuleContext, index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    let offenders: Vec<&str> = profile
        .fields
        .iter()
        .filter(|(path, f)| {
            let dated: Vec<&String> = f.strings.iter().filter(|s| !s.is_empty()).collect();
            if dated.is_empty() {
                return false;
            }
            let matching = dated.iter().filter(|s| ctx.patterns.iso_date_value.is_match(s)).count();
            let declared = index.settings.sortable_attributes.iter().any(|a| a == *path)
                || index.settings.filterable_attributes.iter().any(|a| a == *path);
            matching as f64 / dated.len() as f64 >= 0.8 && !declared
        })
        .map(|(path, _)| path.as_str())
        .collect();
    if offenders.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "D007",
            CAT,
            Severity::Suggestion,
            "Date fields not declared sortable",
            format!("ISO-formatted values in {} but nothing declares them sortable or filterable.", offenders.join(", ")),
            "Chronological ordering and date-range filters are unavailable.",
        )
        .for_index(&index.uid)
        .current(json!(offenders))
        .recommended(json!(offenders)),
    )
}

fn loose_geo_fields(ctx: &RuleContext, index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    let has_geo = profile.fields.contains_key("_geo")
        || index.stats.field_distribution.contains_key("_geo");
    if has_geo {
        return None;
    }
    let offenders: Vec<&str> = profile
        .fields
        .keys()
        .map(String::as_str)
        .filter(|path| ctx.patterns.geo_field.is_match(top_segment(path)))
        .collect();
    if offenders.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "D008",
            CAT,
            Severity::Suggestion,
            "Coordinates stored outside `_geo`",
            format!("Fields {} look like coordinates but no `_geo` field exists.", offenders.join(", ")),
            "Geosearch (`_geoRadius`, geo sorting) cannot be used.",
        )
        .for_index(&index.uid)
        .current(json!(offenders))
        .reference("https://www.meilisearch.com/docs/learn/fine_tuning_results/geosearch"),
    )
}

fn sensitive_field_names(ctx: &RuleContext, index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    let offenders: Vec<String> = profile
        .fields
        .iter()
        .filter(|(path, f)| f.present > f.nulls && ctx.patterns.sensitive_field.is_match(path))
        .map(|(path, _)| format!("{path} [redacted]"))
        .collect();
    if offenders.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "D009",
            CAT,
            Severity::Critical,
            "Sensitive-looking fields stored in documents",
            format!("Populated fields with credential-style names: {}.", offenders.join(", ")),
            "Secrets in a search engine are one misconfigured key away from public.",
        )
        .for_index(&index.uid),
    )
}

fn pii_values_in_displayed(ctx: &RuleContext, index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    let mut offenders: Vec<String> = Vec::new();
    for (path, f) in &profile.fields {
        if !is_displayed(&index.settings, path) {
            continue;
        }
        for (kind, pattern) in &ctx.patterns.pii_values {
            if f.strings.iter().any(|s| pattern.is_match(s)) {
                offenders.push(format!("{path} ({kind}) [redacted]"));
                break;
            }
        }
    }
    if offenders.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "D010",
            CAT,
            Severity::Critical,
            "PII-shaped values in displayed fields",
            format!("Sampled values match personal-data patterns: {}.", offenders.join("; ")),
            "Search responses hand out personal data to any caller.",
        )
        .for_index(&index.uid),
    )
}

fn mostly_empty_fields(ctx: &RuleContext, index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    if profile.fields.is_empty() {
        return None;
    }
    let n = profile.doc_count as f64;
    let empty_fields: Vec<&str> = profile
        .fields
        .iter()
        .filter(|(_, f)| (f.empties as f64 / n) > 0.5)
        .map(|(path, _)| path.as_str())
        .collect();
    let ratio = empty_fields.len() as f64 / profile.fields.len() as f64;
    if ratio <= ctx.thresholds.max_empty_ratio {
        return None;
    }
    Some(
        Finding::new(
            "D011",
            CAT,
            Severity::Suggestion,
            "Documents are mostly empty fields",
            format!(
                "{} of {} fields are empty (null, \"\" or []) in most sampled documents.",
                empty_fields.len(),
                profile.fields.len()
            ),
            "Sparse payloads waste index space and suggest unpruned source data.",
        )
        .for_index(&index.uid)
        .current(json!(empty_fields)),
    )
}

fn numeric_strings(ctx: &RuleContext, index: &IndexData, profile: &SampleProfile) -> Option<Finding> {
    let offenders: Vec<&str> = profile
        .fields
        .iter()
        .filter(|(_, f)| {
            if f.types.len() != 1 || !f.types.contains("string") {
                return false;
            }
            let non_empty: Vec<&String> = f.strings.iter().filter(|s| !s.is_empty()).collect();
            if non_empty.is_empty() {
                return false;
            }
            let matching = non_empty
                .iter()
                .filter(|s| ctx.patterns.numeric_string_value.is_match(s))
                .count();
            matching as f64 / non_empty.len() as f64 >= ctx.thresholds.numeric_string_ratio
        })
        .map(|(path, _)| path.as_str())
        .collect();
    if offenders.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "D013",
            CAT,
            Severity::Suggestion,
            "Numbers stored as strings",
            format!("Values in {} are numeric but typed as strings.", offenders.join(", ")),
            "Range filters and numeric sorting compare lexicographically.",
        )
        .for_index(&index.uid)
        .current(json!(offenders)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Snapshot, SnapshotSource};
    use crate::rules::{Patterns, Thresholds};

    struct Fixture {
        snapshot: Snapshot,
        thresholds: Thresholds,
        patterns: Patterns,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                snapshot: Snapshot::new(SnapshotSource::Instance {
                    url: "http://localhost:7700".to_string(),
                    version: None,
                }),
                thresholds: Thresholds::default(),
                patterns: Patterns::compile().expect("compile"),
            }
        }

        fn sensitive() -> Self {
            let mut fx = Self::new();
            fx.snapshot.sensitive_scan = true;
            fx
        }

        fn ctx(&self) -> RuleContext<'_> {
            RuleContext {
                snapshot: &self.snapshot,
                thresholds: &self.thresholds,
                patterns: &self.patterns,
            }
        }
    }

    fn index_with_samples(samples: Vec<Value>) -> IndexData {
        let mut index = IndexData::new("movies");
        index.primary_key = Some("id".to_string());
        index.stats.number_of_documents = samples.len() as u64;
        index.sample_documents = samples;
        index
    }

    fn ids(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn small_samples_stay_silent() {
        let fx = Fixture::new();
        // Four documents full of issues, one short of the minimum.
        let index = index_with_samples(vec![
            json!({"overview": "<p>html</p>", "year": "1999"});
            4
        ]);
        assert!(index_rules(&fx.ctx(), &index).is_empty());
    }

    #[test]
    fn empty_sample_with_documents_reports_info_only() {
        let fx = Fixture::new();
        let mut index = index_with_samples(Vec::new());
        index.stats.number_of_documents = 500;
        let findings = index_rules(&fx.ctx(), &index);
        assert_eq!(ids(&findings), vec!["D012"]);

        index.stats.number_of_documents = 0;
        assert!(index_rules(&fx.ctx(), &index).is_empty());
    }

    #[test]
    fn type_disagreement_is_reported_once_with_both_types() {
        let fx = Fixture::new();
        let mut samples: Vec<Value> = vec![json!({"year": 1999}); 4];
        samples.push(json!({"year": "1999"}));
        let index = index_with_samples(samples);
        let findings = index_rules(&fx.ctx(), &index);
        let d001 = findings.iter().find(|f| f.id == "D001").expect("D001");
        assert!(d001.description.contains("number"));
        assert!(d001.description.contains("string"));
    }

    #[test]
    fn markup_flags_searchable_fields_only() {
        let fx = Fixture::new();
        let mut index = index_with_samples(vec![
            json!({"title": "Dune", "raw_html": "<div>x</div>"});
            5
        ]);
        index.settings.searchable_attributes = vec!["title".to_string()];
        let findings = index_rules(&fx.ctx(), &index);
        assert!(!ids(&findings).contains(&"D006"));

        index.settings.searchable_attributes = vec!["*".to_string()];
        let findings = index_rules(&fx.ctx(), &index);
        assert!(ids(&findings).contains(&"D006"));
    }

    #[test]
    fn pii_rules_are_opt_in_and_redact_values() {
        let samples = vec![json!({"email": "someone@example.com", "password": "hunter2"}); 5];

        let off = Fixture::new();
        let findings = index_rules(&off.ctx(), &index_with_samples(samples.clone()));
        assert!(!ids(&findings).contains(&"D009"));
        assert!(!ids(&findings).contains(&"D010"));

        let on = Fixture::sensitive();
        let findings = index_rules(&on.ctx(), &index_with_samples(samples));
        let d009 = findings.iter().find(|f| f.id == "D009").expect("D009");
        let d010 = findings.iter().find(|f| f.id == "D010").expect("D010");
        for f in [d009, d010] {
            assert!(!f.description.contains("hunter2"));
            assert!(!f.description.contains("someone@example.com"));
            assert!(f.description.contains("[redacted]"));
        }
        assert!(d010.description.contains("email"));
    }

    #[test]
    fn numeric_strings_need_eighty_percent() {
        let fx = Fixture::new();
        // 4 of 5 numeric: exactly at the 0.8 bound, which is inclusive.
        let mut samples: Vec<Value> = vec![json!({"year": "1999"}); 4];
        samples.push(json!({"year": "unknown"}));
        let findings = index_rules(&fx.ctx(), &index_with_samples(samples));
        assert!(ids(&findings).contains(&"D013"));

        // 3 of 5: below the bound.
        let mut samples: Vec<Value> = vec![json!({"year": "1999"}); 3];
        samples.push(json!({"year": "unknown"}));
        samples.push(json!({"year": "n/a"}));
        let findings = index_rules(&fx.ctx(), &index_with_samples(samples));
        assert!(!ids(&findings).contains(&"D013"));
    }

    #[test]
    fn date_strings_without_sortable_declaration() {
        let fx = Fixture::new();
        let mut index = index_with_samples(vec![json!({"released": "2024-05-01"}); 5]);
        let findings = index_rules(&fx.ctx(), &index);
        assert!(ids(&findings).contains(&"D007"));

        index.settings.sortable_attributes = vec!["released".to_string()];
        let findings = index_rules(&fx.ctx(), &index);
        assert!(!ids(&findings).contains(&"D007"));
    }

    #[test]
    fn geo_fields_without_geo_object() {
        let fx = Fixture::new();
        let index = index_with_samples(vec![json!({"lat": 48.85, "lng": 2.35}); 5]);
        let findings = index_rules(&fx.ctx(), &index);
        assert!(ids(&findings).contains(&"D008"));

        let index = index_with_samples(vec![
            json!({"_geo": {"lat": 48.85, "lng": 2.35}});
            5
        ]);
        let findings = index_rules(&fx.ctx(), &index);
        assert!(!ids(&findings).contains(&"D008"));
    }

    #[test]
    fn nesting_depth_counts_levels() {
        let fx = Fixture::new();
        let shallow = index_with_samples(vec![json!({"a": {"b": {"c": 1}}}); 5]);
        assert!(!ids(&index_rules(&fx.ctx(), &shallow)).contains(&"D002"));

        let deep = index_with_samples(vec![
            json!({"a": {"b": {"c": {"d": {"e": {"f": 1}}}}}});
            5
        ]);
        assert!(ids(&index_rules(&fx.ctx(), &deep)).contains(&"D002"));
    }
}
