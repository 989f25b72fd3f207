//! Pipeline operations over JSON documents.
//!
//! Each `op_*` function is a pure, synchronous wrapper around one or more
//! `algo` modules. Input is a batch of documents as `serde_json::Value`, the
//! way they come out of a store query; output is either the annotated batch
//! or an aggregate object. Nothing here touches the store.
//!
//! Insufficient data never fails an operation: it is logged and, for
//! aggregate outputs, carried in a `warning` field.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDateTime;
use rayon::prelude::*;
use serde_json::{json, Map, Value};

use crate::algo::{
    clustering, engagement, forecast, ranking, sentiment, tfidf, timestamp, tokenizer, trends,
};
use crate::config::PipelineConfig;

/// Fields the pipeline writes back onto stored documents.
pub const DERIVED_FIELDS: [&str; 5] = [
    "cleaned_content",
    "engagement_score",
    "sentiment",
    "sentiment_score",
    "cluster",
];

const CLUSTER_TOP_CATEGORIES: usize = 3;
const CLUSTER_TOP_TERMS: usize = 5;
const PLATFORMS_PER_CATEGORY: usize = 3;
const TOP_CATEGORY_MENTIONS: usize = 5;
const MONTHLY_CATEGORY_MENTIONS: usize = 3;

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Extract a text field from a JSON object, returning "" if missing.
pub fn get_text(row: &Value, field: &str) -> String {
    row.get(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn record_label(row: &Value) -> &str {
    row.get("record_id").and_then(Value::as_str).unwrap_or("<no record_id>")
}

fn platform_of(row: &Value) -> Option<&str> {
    row.get("platform").and_then(Value::as_str)
}

fn score_of(row: &Value) -> Option<f64> {
    row.get("engagement_score").and_then(Value::as_f64)
}

/// Unwrap an op's array output back into documents.
pub fn into_rows(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        _ => Vec::new(),
    }
}

fn annotate(rows: &[Value], fields: Vec<Option<Map<String, Value>>>) -> Value {
    let output: Vec<Value> = rows
        .iter()
        .cloned()
        .zip(fields)
        .map(|(mut row, extra)| {
            if let (Some(obj), Some(extra)) = (row.as_object_mut(), extra) {
                obj.extend(extra);
            }
            row
        })
        .collect();
    Value::Array(output)
}

fn with_warning(mut out: Value, warning: Option<String>) -> Value {
    if let (Some(obj), Some(w)) = (out.as_object_mut(), warning) {
        tracing::warn!("{w}");
        obj.insert("warning".into(), Value::String(w));
    }
    out
}

/// Documents paired with their normalized timestamp. Documents whose
/// timestamp is missing or unparseable are logged and counted as skipped.
fn timestamped<'a>(
    rows: impl IntoIterator<Item = &'a Value>,
    stage: &str,
) -> (Vec<(&'a Value, NaiveDateTime)>, usize) {
    let mut kept = Vec::new();
    let mut skipped = 0;
    for row in rows {
        match timestamp::normalize_json(row.get("timestamp").unwrap_or(&Value::Null)) {
            Ok(ts) => kept.push((row, ts)),
            Err(e) => {
                skipped += 1;
                tracing::warn!(stage, record_id = record_label(row), error = %e, "skipping document");
            }
        }
    }
    (kept, skipped)
}

fn counts_json(counts: &[(String, usize)], key: &str) -> Value {
    Value::Array(
        counts
            .iter()
            .map(|(name, n)| json!({ key: name, "mentions": n }))
            .collect(),
    )
}

/// Derived-field updates keyed by `record_id`, ready for the store. Documents
/// without a `record_id` or without any derived field are left out.
pub fn derived_updates(rows: &[Value]) -> Vec<(String, Map<String, Value>)> {
    rows.iter()
        .filter_map(|row| {
            let id = row.get("record_id")?.as_str()?;
            let fields: Map<String, Value> = DERIVED_FIELDS
                .iter()
                .filter_map(|&f| row.get(f).map(|v| (f.to_string(), v.clone())))
                .collect();
            (!fields.is_empty()).then(|| (id.to_string(), fields))
        })
        .collect()
}

// ── Per-document operations ──────────────────────────────────────────────────

/// Write `cleaned_content` for every document with non-empty `content`.
pub fn op_clean(rows: &[Value]) -> Value {
    let cleaned: Vec<Option<String>> = rows
        .par_iter()
        .map(|row| {
            let content = row.get("content").and_then(Value::as_str)?;
            (!content.trim().is_empty()).then(|| tokenizer::clean_text(content))
        })
        .collect();
    let n = cleaned.iter().filter(|c| c.is_some()).count();
    tracing::info!(documents = rows.len(), cleaned = n, "cleaned content");

    let fields = cleaned
        .into_iter()
        .map(|c| {
            c.map(|text| {
                let mut m = Map::new();
                m.insert("cleaned_content".into(), Value::String(text));
                m
            })
        })
        .collect();
    annotate(rows, fields)
}

const EMPTY_BATCH_WARNING: &str = "insufficient data: the batch holds no documents";

/// Summary of a per-document op once its output has been persisted:
/// `{documents, warning?}`, warning when the batch was empty.
pub fn batch_report(docs: &[Value]) -> Value {
    let warning = docs.is_empty().then(|| EMPTY_BATCH_WARNING.to_string());
    with_warning(json!({ "documents": docs.len() }), warning)
}

/// Write the batch-relative `engagement_score` on every document. An empty
/// batch yields an empty array and a warn log; callers reporting on the
/// batch carry the warning through [`batch_report`] or [`run_pipeline`].
pub fn op_engagement(rows: &[Value]) -> Value {
    if rows.is_empty() {
        tracing::warn!("no documents to score for engagement");
        return Value::Array(Vec::new());
    }
    let metrics: Vec<engagement::EngagementMetrics> =
        rows.iter().map(engagement::EngagementMetrics::from_document).collect();
    let scores = engagement::score_batch(&metrics);
    tracing::info!(documents = rows.len(), "scored engagement");

    let fields = scores
        .into_iter()
        .map(|s| {
            let mut m = Map::new();
            m.insert("engagement_score".into(), json!(s));
            Some(m)
        })
        .collect();
    annotate(rows, fields)
}

/// Write `sentiment` and `sentiment_score` from `cleaned_content`. Documents
/// without usable text get `null` for both.
pub fn op_sentiment(rows: &[Value]) -> Value {
    let analyzer = sentiment::SentimentAnalyzer::new();
    let texts: Vec<Option<&str>> = rows
        .iter()
        .map(|r| r.get("cleaned_content").and_then(Value::as_str))
        .collect();
    let scores = analyzer.analyze_batch(&texts);
    let scored = scores.iter().filter(|s| s.is_some()).count();
    tracing::info!(
        documents = rows.len(),
        scored,
        lexicon = sentiment::LEXICON_VERSION,
        "scored sentiment"
    );

    let fields = scores
        .into_iter()
        .map(|s| {
            let mut m = Map::new();
            match s {
                Some(score) => {
                    m.insert("sentiment".into(), json!(score.label.as_str()));
                    m.insert("sentiment_score".into(), json!(score.compound));
                }
                None => {
                    m.insert("sentiment".into(), Value::Null);
                    m.insert("sentiment_score".into(), Value::Null);
                }
            }
            Some(m)
        })
        .collect();
    annotate(rows, fields)
}

/// Cluster documents that have both `cleaned_content` and a numeric
/// `sentiment_score`, writing `cluster` on them.
///
/// Returns `{documents, num_clusters, clusters, warning?}` where `clusters`
/// summarizes each cluster's size, dominant categories, sentiment mix and
/// heaviest terms.
pub fn op_cluster(rows: &[Value], config: &PipelineConfig) -> Value {
    let eligible: Vec<(usize, &str, f64)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let text = r.get("cleaned_content")?.as_str()?;
            let score = r.get("sentiment_score")?.as_f64()?;
            Some((i, text, score))
        })
        .collect();

    if eligible.is_empty() {
        let out = json!({
            "documents": rows,
            "num_clusters": 0,
            "clusters": [],
        });
        return with_warning(
            out,
            Some("insufficient data for clustering: no document has cleaned_content and sentiment_score".into()),
        );
    }

    let token_lists: Vec<Vec<String>> = eligible
        .par_iter()
        .map(|(_, text, _)| tokenizer::split_clean(text))
        .collect();
    let corpus = tfidf::Corpus::from_token_lists(&token_lists);
    let vocabulary = corpus.vocabulary(config.max_features);
    let mut features = corpus.tfidf_matrix(&vocabulary);
    for (row, (_, _, score)) in features.iter_mut().zip(&eligible) {
        row.push(*score);
    }

    let km = clustering::kmeans(
        &features,
        &clustering::KMeansConfig {
            k: config.clusters,
            seed: config.seed,
            ..Default::default()
        },
    );
    tracing::info!(
        documents = eligible.len(),
        vocabulary = vocabulary.len(),
        k = km.k,
        inertia = km.inertia,
        "clustered content"
    );

    let mut fields: Vec<Option<Map<String, Value>>> = vec![None; rows.len()];
    for ((i, _, _), &label) in eligible.iter().zip(&km.labels) {
        let mut m = Map::new();
        m.insert("cluster".into(), json!(label));
        fields[*i] = Some(m);
    }

    let summaries: Vec<Value> = (0..km.k)
        .map(|c| {
            let members: Vec<usize> = km
                .labels
                .iter()
                .enumerate()
                .filter(|&(_, &l)| l == c)
                .map(|(j, _)| j)
                .collect();
            cluster_summary(c, &members, rows, &eligible, &features, &vocabulary)
        })
        .collect();

    json!({
        "documents": annotate(rows, fields),
        "num_clusters": km.k,
        "clusters": summaries,
    })
}

/// `members` index into `eligible` and `features`.
fn cluster_summary(
    id: usize,
    members: &[usize],
    rows: &[Value],
    eligible: &[(usize, &str, f64)],
    features: &[Vec<f64>],
    vocabulary: &[String],
) -> Value {
    let mut categories: HashMap<String, usize> = HashMap::new();
    let mut sentiments: BTreeMap<&str, usize> =
        [("negative", 0), ("neutral", 0), ("positive", 0)].into_iter().collect();
    let mut weights = vec![0.0f64; vocabulary.len()];

    for &j in members {
        let (i, _, score) = eligible[j];
        let category = get_text(&rows[i], "product_category");
        if !category.is_empty() {
            *categories.entry(category).or_insert(0) += 1;
        }
        *sentiments
            .entry(sentiment::Polarity::from_compound(score).as_str())
            .or_insert(0) += 1;
        for (w, x) in weights.iter_mut().zip(&features[j]) {
            *w += x;
        }
    }

    let mut top_categories: Vec<(String, usize)> = categories.into_iter().collect();
    top_categories.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top_categories.truncate(CLUSTER_TOP_CATEGORIES);

    let mut top_terms: Vec<(&String, f64)> = vocabulary
        .iter()
        .zip(weights)
        .filter(|(_, w)| *w > 0.0)
        .collect();
    top_terms.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    top_terms.truncate(CLUSTER_TOP_TERMS);

    json!({
        "cluster": id,
        "size": members.len(),
        "top_categories": top_categories
            .iter()
            .map(|(name, n)| json!({"category": name, "count": n}))
            .collect::<Vec<_>>(),
        "sentiment": sentiments,
        "top_terms": top_terms.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>(),
    })
}

// ── Aggregates ───────────────────────────────────────────────────────────────

/// Mean engagement per suggested community.
pub fn op_rank_communities(rows: &[Value], config: &PipelineConfig) -> Value {
    let items: Vec<(&str, f64)> = rows
        .iter()
        .filter_map(|r| Some((r.get("product_category")?.as_str()?, score_of(r)?)))
        .collect();
    let ranked = ranking::rank_communities(&items, &config.communities);
    tracing::info!(documents = items.len(), communities = ranked.len(), "ranked communities");

    let warning = if items.is_empty() {
        Some("no document carries both engagement_score and product_category".to_string())
    } else if ranked.is_empty() {
        Some("no document has a category mapped to a community".to_string())
    } else {
        None
    };
    with_warning(json!({ "communities": ranked }), warning)
}

/// Mean engagement per platform, overall and within each configured category.
pub fn op_rank_platforms(rows: &[Value], config: &PipelineConfig) -> Value {
    let scored: Vec<(&Value, f64)> = rows
        .iter()
        .filter_map(|r| Some((r, score_of(r)?)))
        .collect();
    let overall = ranking::rank_by_key(scored.iter().filter_map(|(r, s)| Some((platform_of(r)?, *s))));

    let mut by_category = Map::new();
    for category in &config.categories {
        let mut ranked = ranking::rank_by_key(
            scored
                .iter()
                .filter(|(r, _)| r.get("product_category").and_then(Value::as_str) == Some(category.as_str()))
                .filter_map(|(r, s)| Some((platform_of(r)?, *s))),
        );
        if ranked.is_empty() {
            continue;
        }
        ranked.truncate(PLATFORMS_PER_CATEGORY);
        by_category.insert(category.clone(), json!(ranked));
    }

    let warning = overall
        .is_empty()
        .then(|| "no document carries both engagement_score and platform".to_string());
    with_warning(json!({ "platforms": overall, "by_category": by_category }), warning)
}

/// Monthly mention counts of the configured keyword in `cleaned_content`.
///
/// Documents without `cleaned_content` are not searched; documents with an
/// unusable timestamp are skipped.
pub fn op_trends(rows: &[Value], config: &PipelineConfig) -> Value {
    let with_text = rows
        .iter()
        .filter(|r| r.get("cleaned_content").and_then(Value::as_str).is_some());
    let (dated, skipped) = timestamped(with_text, "trends");
    let docs: Vec<(&str, NaiveDateTime)> = dated
        .iter()
        .filter_map(|(r, ts)| Some((r.get("cleaned_content")?.as_str()?, *ts)))
        .collect();

    let monthly = trends::keyword_mentions(&docs, &config.trend_keyword);
    tracing::info!(
        keyword = %config.trend_keyword,
        searched = docs.len(),
        months = monthly.len(),
        skipped,
        "computed keyword trend"
    );

    let warning = monthly
        .is_empty()
        .then(|| format!("no mentions of '{}' found", config.trend_keyword));
    with_warning(
        json!({
            "keyword": config.trend_keyword,
            "monthly": monthly,
            "skipped": skipped,
        }),
        warning,
    )
}

/// Overall and per-month mention counts of the configured categories.
pub fn op_category_mentions(rows: &[Value], config: &PipelineConfig) -> Value {
    let with_text = rows
        .iter()
        .filter(|r| r.get("cleaned_content").and_then(Value::as_str).is_some());
    let (dated, skipped) = timestamped(with_text, "category_mentions");
    let docs: Vec<(&str, NaiveDateTime)> = dated
        .iter()
        .filter_map(|(r, ts)| Some((r.get("cleaned_content")?.as_str()?, *ts)))
        .collect();

    let mentions = trends::category_mentions(&docs, &config.categories, MONTHLY_CATEGORY_MENTIONS);
    let monthly: Map<String, Value> = mentions
        .monthly
        .iter()
        .map(|(month, counts)| (month.clone(), counts_json(counts, "category")))
        .collect();

    let warning = mentions
        .totals
        .is_empty()
        .then(|| "no configured category is mentioned".to_string());
    with_warning(
        json!({
            "top_categories": counts_json(mentions.top(TOP_CATEGORY_MENTIONS), "category"),
            "monthly": monthly,
            "skipped": skipped,
        }),
        warning,
    )
}

/// Forecast monthly document counts per configured category.
///
/// `forecasts` maps each category present in the data to its next
/// `forecast_horizon` values, or `null` when its model could not be fitted
/// (the reason is under `errors`).
pub fn op_forecast(rows: &[Value], config: &PipelineConfig) -> Value {
    let (dated, skipped) = timestamped(rows, "forecast");
    let entries: Vec<(NaiveDateTime, &str)> = dated
        .iter()
        .filter_map(|(r, ts)| Some((*ts, r.get("product_category")?.as_str()?)))
        .collect();

    let matrix = forecast::MonthlyMatrix::build(&entries);
    let results = forecast::forecast_categories(&matrix, &config.categories, config.forecast_horizon);

    let mut forecasts = Map::new();
    let mut errors = Map::new();
    for (category, result) in results {
        match result {
            Ok(f) => {
                forecasts.insert(category, json!(f.values));
            }
            Err(e) => {
                errors.insert(category.clone(), Value::String(e.to_string()));
                forecasts.insert(category, Value::Null);
            }
        }
    }
    tracing::info!(
        documents = entries.len(),
        months = matrix.months.len(),
        categories = forecasts.len(),
        failed = errors.len(),
        skipped,
        "forecast category trends"
    );

    let warning = entries
        .is_empty()
        .then(|| "insufficient data for forecasting: no dated, categorized documents".to_string());
    with_warning(
        json!({
            "horizon": config.forecast_horizon,
            "history": matrix.month_keys(),
            "periods": matrix.future_keys(config.forecast_horizon),
            "forecasts": forecasts,
            "errors": errors,
            "skipped": skipped,
        }),
        warning,
    )
}

/// The `n` highest-scoring documents, highest first. Equal scores keep their
/// input order. Documents without a numeric `engagement_score` are ignored.
pub fn op_top_engagement(rows: &[Value], n: usize) -> Value {
    let mut scored: Vec<(&Value, f64)> = rows
        .iter()
        .filter_map(|r| Some((r, score_of(r)?)))
        .collect();
    if scored.is_empty() {
        tracing::warn!("no documents carry an engagement_score");
        return Value::Array(Vec::new());
    }
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(n);
    Value::Array(scored.into_iter().map(|(r, _)| r.clone()).collect())
}

/// Merge source collections into new documents for the target collection.
///
/// Sources are taken in order and the first document seen for a `record_id`
/// wins. Documents without a `record_id` are skipped; documents already in
/// the target (`existing_ids`) or with empty `content` are not returned.
/// A missing `product_category` is inferred from `content`.
///
/// Returns `{documents, found, unique, inserted, skipped_missing_id}`.
pub fn op_merge(
    sources: &[(String, Vec<Value>)],
    existing_ids: &HashSet<String>,
    config: &PipelineConfig,
) -> Value {
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique: Vec<Value> = Vec::new();
    let mut found = Map::new();
    let mut skipped_missing_id = 0;

    for (name, docs) in sources {
        found.insert(name.clone(), json!(docs.len()));
        tracing::info!(source = %name, documents = docs.len(), "reading source collection");
        for doc in docs {
            let Some(id) = doc.get("record_id").and_then(Value::as_str) else {
                skipped_missing_id += 1;
                tracing::warn!(source = %name, "document without record_id skipped");
                continue;
            };
            if !seen.insert(id.to_string()) {
                continue;
            }
            let mut doc = doc.clone();
            if let Some(obj) = doc.as_object_mut() {
                if obj.get("product_category").and_then(Value::as_str).is_none() {
                    let category =
                        config.infer_category(obj.get("content").and_then(Value::as_str).unwrap_or(""));
                    obj.insert("product_category".into(), Value::String(category));
                }
            }
            unique.push(doc);
        }
    }

    let unique_count = unique.len();
    let documents: Vec<Value> = unique
        .into_iter()
        .filter(|d| {
            let id = get_text(d, "record_id");
            !existing_ids.contains(&id) && !get_text(d, "content").trim().is_empty()
        })
        .collect();
    tracing::info!(unique = unique_count, new = documents.len(), "merged sources");

    json!({
        "found": found,
        "unique": unique_count,
        "inserted": documents.len(),
        "skipped_missing_id": skipped_missing_id,
        "documents": documents,
    })
}

/// Run every analysis stage over one batch.
///
/// Returns `{documents, clusters, communities, platforms, trends,
/// category_mentions, forecast, warning?}` where `documents` carries all
/// derived fields and `warning` is set for an empty batch.
pub fn run_pipeline(rows: &[Value], config: &PipelineConfig) -> Value {
    tracing::info!(documents = rows.len(), "running pipeline");
    let docs = into_rows(op_clean(rows));
    let docs = into_rows(op_engagement(&docs));
    let docs = into_rows(op_sentiment(&docs));

    let mut clustered = op_cluster(&docs, config);
    let docs = into_rows(clustered["documents"].take());

    let warning = docs.is_empty().then(|| EMPTY_BATCH_WARNING.to_string());
    let out = json!({
        "communities": op_rank_communities(&docs, config),
        "platforms": op_rank_platforms(&docs, config),
        "trends": op_trends(&docs, config),
        "category_mentions": op_category_mentions(&docs, config),
        "forecast": op_forecast(&docs, config),
        "clusters": {
            "num_clusters": clustered["num_clusters"].take(),
            "summaries": clustered["clusters"].take(),
            "warning": clustered.get("warning").cloned().unwrap_or(Value::Null),
        },
        "documents": docs,
    });
    with_warning(out, warning)
}
