use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::Serialize;

use super::timestamp::month_key;
use super::tokenizer;

/// Lowercased phrase with every word lemmatized, the form cleaned text is
/// stored in.
fn lemma_phrase(phrase: &str) -> String {
    phrase
        .to_lowercase()
        .split_whitespace()
        .map(tokenizer::lemmatize)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Count, per calendar month, the texts that contain `keyword`
/// (case-insensitive substring, on its own spelling or its lemmatized form).
/// Months with no mention are absent.
pub fn keyword_mentions(docs: &[(&str, NaiveDateTime)], keyword: &str) -> BTreeMap<String, usize> {
    let needle = keyword.to_lowercase();
    let lemma = lemma_phrase(keyword);
    let mut monthly: BTreeMap<String, usize> = BTreeMap::new();
    for (text, ts) in docs {
        let lower = text.to_lowercase();
        if lower.contains(&needle) || (!lemma.is_empty() && lower.contains(&lemma)) {
            *monthly.entry(month_key(ts)).or_insert(0) += 1;
        }
    }
    monthly
}

/// Mentions of configured categories across a batch of cleaned texts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryMentions {
    /// Overall mention count per category, most mentioned first.
    pub totals: Vec<(String, usize)>,
    /// Month -> categories mentioned that month, most mentioned first.
    pub monthly: BTreeMap<String, Vec<(String, usize)>>,
}

impl CategoryMentions {
    pub fn top(&self, n: usize) -> &[(String, usize)] {
        &self.totals[..n.min(self.totals.len())]
    }
}

/// Count how often each category occurs in cleaned text. A category matches on
/// its own spelling or on its lemmatized form, since cleaned text is lemmatized
/// ("toys" is stored as "toy").
pub fn category_mentions(
    docs: &[(&str, NaiveDateTime)],
    categories: &[String],
    per_month: usize,
) -> CategoryMentions {
    let patterns: Vec<(&str, String)> = categories
        .iter()
        .map(|c| (c.as_str(), lemma_phrase(c)))
        .collect();

    let mut totals: HashMap<&str, usize> = HashMap::new();
    let mut monthly: BTreeMap<String, HashMap<&str, usize>> = BTreeMap::new();

    for (text, ts) in docs {
        let lower = text.to_lowercase();
        for &(category, ref lemma) in &patterns {
            if lower.contains(category) || lower.contains(lemma.as_str()) {
                *totals.entry(category).or_insert(0) += 1;
                *monthly
                    .entry(month_key(ts))
                    .or_default()
                    .entry(category)
                    .or_insert(0) += 1;
            }
        }
    }

    CategoryMentions {
        totals: sorted_counts(totals, usize::MAX),
        monthly: monthly
            .into_iter()
            .map(|(month, counts)| (month, sorted_counts(counts, per_month)))
            .collect(),
    }
}

fn sorted_counts(counts: HashMap<&str, usize>, limit: usize) -> Vec<(String, usize)> {
    let mut v: Vec<(String, usize)> = counts.into_iter().map(|(k, c)| (k.to_string(), c)).collect();
    v.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    v.truncate(limit);
    v
}
