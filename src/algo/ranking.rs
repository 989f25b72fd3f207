use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

/// Mean engagement for one ranked key (a community or a platform).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub name: String,
    pub mean_engagement: f64,
    /// Number of (document, key) pairs that contributed.
    pub documents: usize,
}

/// Mean score per key, sorted by mean descending then name ascending.
pub fn rank_by_key<'a>(items: impl IntoIterator<Item = (&'a str, f64)>) -> Vec<RankedEntry> {
    let mut acc: HashMap<&str, (f64, usize)> = HashMap::new();
    for (key, score) in items {
        let entry = acc.entry(key).or_insert((0.0, 0));
        entry.0 += score;
        entry.1 += 1;
    }

    let mut ranked: Vec<RankedEntry> = acc
        .into_iter()
        .map(|(name, (sum, count))| RankedEntry {
            name: name.to_string(),
            mean_engagement: sum / count as f64,
            documents: count,
        })
        .collect();
    ranked.sort_by(|a, b| {
        b.mean_engagement
            .total_cmp(&a.mean_engagement)
            .then_with(|| a.name.cmp(&b.name))
    });
    ranked
}

/// Rank suggested communities by the mean engagement of posts in the
/// categories that map to them.
///
/// `items` are (category, engagement_score) pairs. A post expands to one pair
/// per distinct community of its category; unmapped categories contribute
/// nothing.
pub fn rank_communities(
    items: &[(&str, f64)],
    mapping: &BTreeMap<String, Vec<String>>,
) -> Vec<RankedEntry> {
    let communities: HashMap<&str, BTreeSet<&str>> = mapping
        .iter()
        .map(|(cat, names)| (cat.as_str(), names.iter().map(String::as_str).collect()))
        .collect();

    let pairs = items.iter().flat_map(|&(category, score)| {
        communities
            .get(category)
            .into_iter()
            .flat_map(move |names| names.iter().map(move |&name| (name, score)))
    });
    rank_by_key(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
        pairs
            .iter()
            .map(|(c, names)| (c.to_string(), names.iter().map(|n| n.to_string()).collect()))
            .collect()
    }

    #[test]
    fn storage_mean_to_minimalism() {
        let m = mapping(&[("storage", &["r/minimalism"])]);
        let ranked = rank_communities(&[("storage", 0.8), ("storage", 0.2)], &m);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].name, "r/minimalism");
        assert!((ranked[0].mean_engagement - 0.5).abs() < 1e-12);
        assert_eq!(ranked[0].documents, 2);
    }

    #[test]
    fn unmapped_categories_ignored() {
        let m = mapping(&[("storage", &["r/minimalism"])]);
        let ranked = rank_communities(&[("general", 0.9), ("toys", 0.7)], &m);
        assert!(ranked.is_empty());
    }

    #[test]
    fn sorted_descending_with_shared_communities() {
        let m = mapping(&[
            ("storage", &["r/minimalism", "r/frugal"]),
            ("cosmetics", &["r/beauty", "r/frugal"]),
        ]);
        let ranked = rank_communities(&[("storage", 0.2), ("cosmetics", 0.9)], &m);
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["r/beauty", "r/frugal", "r/minimalism"]);
        assert!((ranked[1].mean_engagement - 0.55).abs() < 1e-12);
    }

    #[test]
    fn duplicate_community_in_mapping_counted_once() {
        let m = mapping(&[("toys", &["r/plushies", "r/plushies"])]);
        let ranked = rank_communities(&[("toys", 0.4)], &m);
        assert_eq!(ranked[0].documents, 1);
    }

    #[test]
    fn rank_by_key_ties_break_by_name() {
        let ranked = rank_by_key([("reddit", 0.5), ("discord", 0.5), ("quora", 0.1)]);
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["discord", "reddit", "quora"]);
    }
}
