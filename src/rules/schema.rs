use serde_json::{Value, json};

use crate::core::{Category, Finding, IndexData, Severity};
use crate::rules::RuleContext;

const CAT: Category = Category::Schema;

pub fn index_rules(ctx: &RuleContext, index: &IndexData) -> Vec<Finding> {
    let mut out = Vec::new();
    out.extend(missing_primary_key(ctx, index));
    out.extend(wildcard_searchable(ctx, index));
    out.extend(identifier_in_searchable(ctx, index));
    out.extend(no_filterable_attributes(ctx, index));
    out.extend(no_sortable_attributes(ctx, index));
    out.extend(ranking_rules_missing_defaults(index));
    out.extend(custom_rule_before_words(index));
    out.extend(wildcard_displayed_with_sensitive_field(ctx, index));
    out.extend(no_stop_words(ctx, index));
    out.extend(no_synonyms(ctx, index));
    out.extend(no_distinct_attribute(ctx, index));
    out.extend(typo_tolerance_disabled(index));
    out.extend(aggressive_typo_tolerance(ctx, index));
    out.extend(oversized_facet_limit(ctx, index));
    out.extend(oversized_pagination_limit(ctx, index));
    out.extend(numeric_field_in_searchable(ctx, index));
    out.extend(too_many_searchable_attributes(ctx, index));
    out.extend(too_many_fields(ctx, index));
    out.extend(high_cardinality_filterable(ctx, index));
    out.extend(entirely_default_settings(ctx, index));
    out
}

fn settings_endpoint(uid: &str) -> String {
    format!("/indexes/{uid}/settings")
}

fn missing_primary_key(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if index.primary_key.is_some() {
        return None;
    }
    let detected = index
        .field_names()
        .into_iter()
        .find(|name| ctx.patterns.identifier_field.is_match(name));
    let mut finding = Finding::new(
        "S001",
        CAT,
        Severity::Critical,
        "No primary key configured",
        "The index has no explicit primary key, so document updates rely on inference and can silently create duplicates.",
        "Document upserts may fail or duplicate records under concurrent writes.",
    )
    .for_index(&index.uid)
    .current(Value::Null)
    .reference("https://www.meilisearch.com/docs/learn/getting_started/primary_key");
    if let Some(field) = detected {
        finding = finding
            .recommended(json!(field))
            .with_fix(
                "update_index",
                format!("/indexes/{}", index.uid),
                json!({ "primaryKey": field }),
            );
    }
    Some(finding)
}

fn wildcard_searchable(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if !index.settings.searchable_is_wildcard() {
        return None;
    }
    let field_count = index.stats.field_distribution.len();
    if field_count <= ctx.thresholds.wildcard_searchable_fields {
        return None;
    }
    let candidates: Vec<&str> = index
        .field_names()
        .into_iter()
        .filter(|name| {
            !ctx.patterns.identifier_field.is_match(name)
                && !ctx.patterns.numeric_field.is_match(name)
        })
        .take(10)
        .collect();
    let mut finding = Finding::new(
        "S002",
        CAT,
        Severity::Critical,
        "Wildcard searchable attributes on a wide index",
        format!(
            "All {field_count} fields are searchable. Indexing every field inflates the index and ranks irrelevant fields equal to real content."
        ),
        "Larger index, slower indexing, and degraded relevancy.",
    )
    .for_index(&index.uid)
    .current(json!(["*"]));
    if !candidates.is_empty() {
        finding = finding.recommended(json!(candidates)).with_fix(
            "update_settings",
            settings_endpoint(&index.uid),
            json!({ "searchableAttributes": candidates }),
        );
    }
    Some(finding)
}

fn identifier_in_searchable(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if index.settings.searchable_is_wildcard() {
        return None;
    }
    let matched: Vec<&str> = index
        .settings
        .searchable_attributes
        .iter()
        .map(String::as_str)
        .filter(|name| ctx.patterns.identifier_field.is_match(name))
        .collect();
    if matched.is_empty() {
        return None;
    }
    let keep: Vec<&str> = index
        .settings
        .searchable_attributes
        .iter()
        .map(String::as_str)
        .filter(|name| !ctx.patterns.identifier_field.is_match(name))
        .collect();
    Some(
        Finding::new(
            "S003",
            CAT,
            Severity::Warning,
            "Identifier fields in searchable attributes",
            format!(
                "Fields {} look like identifiers. Users do not search by internal IDs; filtering is the right role for them.",
                matched.join(", ")
            ),
            "Wasted index space and noise in typo-tolerant matching.",
        )
        .for_index(&index.uid)
        .current(json!(matched))
        .recommended(json!(keep))
        .with_fix(
            "update_settings",
            settings_endpoint(&index.uid),
            json!({ "searchableAttributes": keep }),
        ),
    )
}

fn no_filterable_attributes(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if !index.settings.filterable_attributes.is_empty() {
        return None;
    }
    if index.stats.number_of_documents <= ctx.thresholds.filterable_needed_docs {
        return None;
    }
    Some(
        Finding::new(
            "S004",
            CAT,
            Severity::Warning,
            "No filterable attributes",
            format!(
                "{} documents but no filterable attributes. Clients cannot narrow results or build facets.",
                index.stats.number_of_documents
            ),
            "Every query scans the full result space; faceted UIs are impossible.",
        )
        .for_index(&index.uid)
        .current(json!([])),
    )
}

fn no_sortable_attributes(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if !index.settings.sortable_attributes.is_empty() {
        return None;
    }
    let candidates: Vec<&str> = index
        .field_names()
        .into_iter()
        .filter(|name| ctx.patterns.sort_candidate_field.is_match(name))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "S005",
            CAT,
            Severity::Suggestion,
            "Sortable candidates left unsortable",
            format!(
                "Fields {} look sortable but are not declared, so `sort` queries against them fail.",
                candidates.join(", ")
            ),
            "Clients cannot order results by these fields.",
        )
        .for_index(&index.uid)
        .current(json!([]))
        .recommended(json!(candidates))
        .with_fix(
            "update_settings",
            settings_endpoint(&index.uid),
            json!({ "sortableAttributes": candidates }),
        ),
    )
}

fn ranking_rules_missing_defaults(index: &IndexData) -> Option<Finding> {
    use crate::core::DEFAULT_RANKING_RULES;
    let missing: Vec<&str> = DEFAULT_RANKING_RULES
        .iter()
        .copied()
        .filter(|rule| !index.settings.ranking_rules.iter().any(|r| r == rule))
        .collect();
    if missing.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "S006",
            CAT,
            Severity::Warning,
            "Default ranking rules removed",
            format!(
                "Built-in rules {} are missing from the ranking configuration.",
                missing.join(", ")
            ),
            "Relevancy degrades in ways that are hard to diagnose later.",
        )
        .for_index(&index.uid)
        .current(json!(index.settings.ranking_rules))
        .recommended(json!(DEFAULT_RANKING_RULES))
        .with_fix(
            "update_settings",
            settings_endpoint(&index.uid),
            json!({ "rankingRules": DEFAULT_RANKING_RULES }),
        ),
    )
}

fn custom_rule_before_words(index: &IndexData) -> Option<Finding> {
    let words_pos = index.settings.ranking_rules.iter().position(|r| r == "words")?;
    let custom: Vec<&str> = index.settings.ranking_rules[..words_pos]
        .iter()
        .map(String::as_str)
        .filter(|r| r.contains(':'))
        .collect();
    if custom.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "S007",
            CAT,
            Severity::Suggestion,
            "Custom ranking rule placed before `words`",
            format!(
                "Custom rules {} run before word matching, so exact text matches can lose to attribute ordering.",
                custom.join(", ")
            ),
            "Surprising result order for plain text queries.",
        )
        .for_index(&index.uid)
        .current(json!(index.settings.ranking_rules)),
    )
}

fn wildcard_displayed_with_sensitive_field(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if !index.settings.displayed_is_wildcard() {
        return None;
    }
    let sensitive: Vec<&str> = index
        .field_names()
        .into_iter()
        .filter(|name| ctx.patterns.sensitive_field.is_match(name))
        .collect();
    if sensitive.is_empty() {
        return None;
    }
    let keep: Vec<&str> = index
        .field_names()
        .into_iter()
        .filter(|name| !ctx.patterns.sensitive_field.is_match(name))
        .collect();
    Some(
        Finding::new(
            "S008",
            CAT,
            Severity::Warning,
            "Sensitive-looking fields exposed by wildcard display",
            format!(
                "displayedAttributes is `*` while the index carries fields named {}. Search responses return them verbatim.",
                sensitive.join(", ")
            ),
            "Credentials or personal data may leak through the search API.",
        )
        .for_index(&index.uid)
        .current(json!(["*"]))
        .recommended(json!(keep))
        .with_fix(
            "update_settings",
            settings_endpoint(&index.uid),
            json!({ "displayedAttributes": keep }),
        ),
    )
}

fn no_stop_words(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if !index.settings.stop_words.is_empty() {
        return None;
    }
    if index.stats.number_of_documents <= ctx.thresholds.stop_words_docs {
        return None;
    }
    Some(
        Finding::new(
            "S009",
            CAT,
            Severity::Suggestion,
            "No stop words configured",
            "A large index with no stop-word list matches filler words like articles and conjunctions.",
            "Slower queries and diluted relevancy on common words.",
        )
        .for_index(&index.uid)
        .current(json!([])),
    )
}

fn no_synonyms(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if !index.settings.synonyms.is_empty() {
        return None;
    }
    if index.stats.number_of_documents <= ctx.thresholds.synonyms_docs {
        return None;
    }
    Some(
        Finding::new(
            "S010",
            CAT,
            Severity::Info,
            "No synonyms configured",
            "Large catalogs usually benefit from a synonym map for domain vocabulary.",
            "Queries using alternative wording miss relevant documents.",
        )
        .for_index(&index.uid)
        .current(json!({})),
    )
}

fn no_distinct_attribute(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if index.settings.distinct_attribute.is_some() {
        return None;
    }
    let candidates: Vec<&str> = index
        .field_names()
        .into_iter()
        .filter(|name| ctx.patterns.distinct_candidate_field.is_match(name))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "S011",
            CAT,
            Severity::Suggestion,
            "Possible duplicate results without a distinct attribute",
            format!(
                "Fields {} suggest documents describe variants of the same item, but no distinct attribute deduplicates them.",
                candidates.join(", ")
            ),
            "Near-identical documents crowd the first result page.",
        )
        .for_index(&index.uid)
        .current(Value::Null)
        .recommended(json!(candidates[0])),
    )
}

fn typo_tolerance_disabled(index: &IndexData) -> Option<Finding> {
    if index.settings.typo_tolerance.enabled {
        return None;
    }
    Some(
        Finding::new(
            "S012",
            CAT,
            Severity::Warning,
            "Typo tolerance disabled",
            "Typo tolerance is turned off entirely, so any misspelling returns zero hits.",
            "Users with imperfect queries get empty result pages.",
        )
        .for_index(&index.uid)
        .current(json!(false))
        .recommended(json!(true))
        .with_fix(
            "update_settings",
            settings_endpoint(&index.uid),
            json!({ "typoTolerance": { "enabled": true } }),
        ),
    )
}

fn aggressive_typo_tolerance(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    let one_typo = index.settings.typo_tolerance.min_word_size_for_typos.one_typo;
    if !index.settings.typo_tolerance.enabled || one_typo >= ctx.thresholds.min_one_typo_word_size {
        return None;
    }
    Some(
        Finding::new(
            "S013",
            CAT,
            Severity::Suggestion,
            "Typo tolerance applies to very short words",
            format!(
                "oneTypo kicks in from {one_typo}-letter words. Short tokens like `cat`/`car` start matching each other."
            ),
            "False-positive matches on short query terms.",
        )
        .for_index(&index.uid)
        .current(json!(one_typo))
        .recommended(json!(5)),
    )
}

fn oversized_facet_limit(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    let limit = index.settings.faceting.max_values_per_facet;
    if limit <= ctx.thresholds.max_values_per_facet {
        return None;
    }
    Some(
        Finding::new(
            "S014",
            CAT,
            Severity::Suggestion,
            "Very high facet value limit",
            format!("maxValuesPerFacet is {limit}; facet distributions of that size are expensive to compute and ship."),
            "Slow faceted queries and large responses.",
        )
        .for_index(&index.uid)
        .current(json!(limit))
        .recommended(json!(100)),
    )
}

fn oversized_pagination_limit(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    let limit = index.settings.pagination.max_total_hits;
    if limit <= ctx.thresholds.max_total_hits {
        return None;
    }
    Some(
        Finding::new(
            "S015",
            CAT,
            Severity::Warning,
            "Deep pagination enabled",
            format!(
                "maxTotalHits is {limit}. Exhaustive deep paging forces the engine to rank far more candidates per query."
            ),
            "Latency grows with page depth; scraping becomes cheap.",
        )
        .for_index(&index.uid)
        .current(json!(limit))
        .recommended(json!(1000))
        .with_fix(
            "update_settings",
            settings_endpoint(&index.uid),
            json!({ "pagination": { "maxTotalHits": 1000 } }),
        ),
    )
}

fn numeric_field_in_searchable(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if index.settings.searchable_is_wildcard() {
        return None;
    }
    let matched: Vec<&str> = index
        .settings
        .searchable_attributes
        .iter()
        .map(String::as_str)
        .filter(|name| ctx.patterns.numeric_field.is_match(name))
        .collect();
    if matched.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "S016",
            CAT,
            Severity::Warning,
            "Numeric fields in searchable attributes",
            format!(
                "Fields {} look numeric. Full-text search over numbers rarely helps; filtering and sorting do.",
                matched.join(", ")
            ),
            "Index bloat and meaningless typo matching over digits.",
        )
        .for_index(&index.uid)
        .current(json!(matched)),
    )
}

fn too_many_searchable_attributes(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if index.settings.searchable_is_wildcard() {
        return None;
    }
    let count = index.settings.searchable_attributes.len();
    if count <= ctx.thresholds.max_searchable_attributes {
        return None;
    }
    Some(
        Finding::new(
            "S017",
            CAT,
            Severity::Suggestion,
            "Long searchable attribute list",
            format!("{count} searchable attributes. Attribute ranking loses meaning across that many fields."),
            "Harder relevancy tuning and slower indexing.",
        )
        .for_index(&index.uid)
        .current(json!(count)),
    )
}

fn too_many_fields(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    let count = index.stats.field_distribution.len();
    if count <= ctx.thresholds.max_field_count {
        return None;
    }
    Some(
        Finding::new(
            "S018",
            CAT,
            Severity::Warning,
            "Very wide documents",
            format!("Documents carry {count} distinct fields. Schemaless width at this scale usually hides unpruned payloads."),
            "Memory, disk, and indexing time grow with every field.",
        )
        .for_index(&index.uid)
        .current(json!(count)),
    )
}

fn high_cardinality_filterable(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    let matched: Vec<&str> = index
        .settings
        .filterable_attributes
        .iter()
        .map(String::as_str)
        .filter(|name| ctx.patterns.high_cardinality_field.is_match(name))
        .collect();
    if matched.is_empty() {
        return None;
    }
    Some(
        Finding::new(
            "S019",
            CAT,
            Severity::Suggestion,
            "High-cardinality fields declared filterable",
            format!(
                "Fields {} look unique-per-document. A filterable index over them is as large as the data itself.",
                matched.join(", ")
            ),
            "Filter index bloat with no practical facet value.",
        )
        .for_index(&index.uid)
        .current(json!(matched)),
    )
}

fn entirely_default_settings(ctx: &RuleContext, index: &IndexData) -> Option<Finding> {
    if !index.settings.is_all_default() {
        return None;
    }
    if index.stats.number_of_documents <= ctx.thresholds.default_settings_docs {
        return None;
    }
    Some(
        Finding::new(
            "S020",
            CAT,
            Severity::Info,
            "Index running on untouched defaults",
            format!(
                "{} documents with every setting at its default. Deliberate configuration usually pays off at this size.",
                index.stats.number_of_documents
            ),
            "Relevancy and performance are left to generic defaults.",
        )
        .for_index(&index.uid)
        .current(Value::Null),
    )
}
