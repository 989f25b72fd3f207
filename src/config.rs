//! Pipeline configuration: category vocabulary, community suggestions and
//! the tunables of each stage.
//!
//! Defaults reproduce the production constants. A TOML file may override any
//! subset of fields; missing fields keep their defaults.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Product categories recognized by the ranker, trend analyzer and forecaster.
    pub categories: Vec<String>,
    /// Category -> suggested community names.
    pub communities: BTreeMap<String, Vec<String>>,
    /// Keyword counted per month by the trend analyzer.
    pub trend_keyword: String,
    pub clusters: usize,
    /// Vocabulary cap for the clustering TF-IDF space.
    pub max_features: usize,
    pub seed: u64,
    /// Number of future months forecast per category.
    pub forecast_horizon: usize,
    /// Number of documents kept by the top-engagement snapshot.
    pub top_n: usize,
    pub collections: CollectionNames,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionNames {
    pub sources: Vec<String>,
    pub target: String,
    pub top_posts: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            sources: vec![
                "reddit_data".into(),
                "discord_data".into(),
                "quora_data".into(),
            ],
            target: "engagement_data".into(),
            top_posts: "top_engagement_posts".into(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let categories = [
            "earbuds",
            "skincare",
            "storage",
            "plushies",
            "cosmetics",
            "stationery",
            "toys",
            "home goods",
            "electronics",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();

        let communities = [
            ("storage", vec!["r/minimalism", "r/frugal"]),
            ("cosmetics", vec!["r/beauty"]),
            ("toys", vec!["r/plushies"]),
            ("electronics", vec!["r/gadgets"]),
        ]
        .into_iter()
        .map(|(cat, names)| {
            (
                cat.to_string(),
                names.into_iter().map(String::from).collect(),
            )
        })
        .collect();

        Self {
            categories,
            communities,
            trend_keyword: "miniso".into(),
            clusters: 5,
            max_features: 1000,
            seed: 42,
            forecast_horizon: 3,
            top_n: 20,
            collections: CollectionNames::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a TOML document, filling unspecified fields from the defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.clusters == 0 {
            return Err(ConfigError::Invalid("clusters must be at least 1".into()));
        }
        if self.max_features == 0 {
            return Err(ConfigError::Invalid(
                "max_features must be at least 1".into(),
            ));
        }
        if self.trend_keyword.trim().is_empty() {
            return Err(ConfigError::Invalid("trend_keyword must not be empty".into()));
        }
        Ok(())
    }

    /// First configured category that occurs in `content` (case-insensitive), else "general".
    pub fn infer_category(&self, content: &str) -> String {
        let lower = content.to_lowercase();
        self.categories
            .iter()
            .find(|cat| lower.contains(cat.as_str()))
            .cloned()
            .unwrap_or_else(|| "general".into())
    }
}
