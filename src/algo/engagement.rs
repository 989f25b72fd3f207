use serde::{Deserialize, Serialize};
use serde_json::Value;

const UPVOTE_WEIGHT: f64 = 0.4;
const COMMENT_WEIGHT: f64 = 0.4;
const SHARE_WEIGHT: f64 = 0.2;

/// Raw interaction counts for one post. Counts stay `f64` so fractional
/// values reported by a source keep their weight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementMetrics {
    #[serde(default)]
    pub upvotes: f64,
    #[serde(default)]
    pub comments: f64,
    #[serde(default)]
    pub shares: f64,
}

impl EngagementMetrics {
    pub fn new(upvotes: f64, comments: f64, shares: f64) -> Self {
        Self {
            upvotes,
            comments,
            shares,
        }
    }

    /// Read `engagement_metrics` from a document. Missing keys, a missing object,
    /// and negative or non-numeric counts all read as 0.
    pub fn from_document(doc: &Value) -> Self {
        let metrics = doc.get("engagement_metrics");
        let count = |key: &str| -> f64 {
            metrics
                .and_then(|m| m.get(key))
                .and_then(Value::as_f64)
                .filter(|f| f.is_finite() && *f > 0.0)
                .unwrap_or(0.0)
        };
        Self {
            upvotes: count("upvotes"),
            comments: count("comments"),
            shares: count("shares"),
        }
    }
}

/// Score each post relative to the maxima of its batch.
///
/// Each max is replaced by 1 when the whole batch is zero for that metric, so
/// an all-zero batch scores 0 everywhere. Output order matches input order.
pub fn score_batch(batch: &[EngagementMetrics]) -> Vec<f64> {
    let max_of = |f: fn(&EngagementMetrics) -> f64| -> f64 {
        let max = batch.iter().map(f).fold(0.0, f64::max);
        if max > 0.0 {
            max
        } else {
            1.0
        }
    };
    let max_upvotes = max_of(|m| m.upvotes);
    let max_comments = max_of(|m| m.comments);
    let max_shares = max_of(|m| m.shares);

    batch
        .iter()
        .map(|m| {
            UPVOTE_WEIGHT * (m.upvotes / max_upvotes)
                + COMMENT_WEIGHT * (m.comments / max_comments)
                + SHARE_WEIGHT * (m.shares / max_shares)
        })
        .collect()
}
