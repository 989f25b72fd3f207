//! Lexicon and rule based sentiment scoring in the style of VADER.
//!
//! Each token contributes its lexicon valence, adjusted by preceding booster
//! words and negations. A "but" shifts weight onto the clause after it. The
//! summed valence is squashed into a compound score in [-1, 1].

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tokenizer;

/// Bumped whenever the lexicon or the scoring rules change.
pub const LEXICON_VERSION: &str = "pulse-lexicon-1";

const POSITIVE_THRESHOLD: f64 = 0.05;
const NEGATIVE_THRESHOLD: f64 = -0.05;

const BOOSTER_INCR: f64 = 0.293;
const BOOSTER_DECR: f64 = -0.293;
const NEGATION_SCALAR: f64 = -0.74;
const NORMALIZATION_ALPHA: f64 = 15.0;
const EXCLAMATION_BOOST: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;

const LEXICON: &[(&str, f64)] = &[
    // positive
    ("adorable", 2.2),
    ("amazing", 2.8),
    ("awesome", 3.1),
    ("beautiful", 2.9),
    ("best", 3.2),
    ("better", 1.9),
    ("bargain", 1.3),
    ("brilliant", 2.8),
    ("charming", 2.6),
    ("clean", 1.7),
    ("comfortable", 1.5),
    ("comfy", 1.7),
    ("cool", 1.3),
    ("cute", 2.0),
    ("delight", 2.9),
    ("delighted", 2.9),
    ("durable", 1.2),
    ("easy", 1.9),
    ("enjoy", 2.2),
    ("enjoyed", 2.3),
    ("excellent", 2.7),
    ("excited", 1.4),
    ("fantastic", 2.6),
    ("favorite", 2.0),
    ("fine", 0.8),
    ("fun", 2.3),
    ("glad", 2.0),
    ("gorgeous", 3.0),
    ("great", 3.1),
    ("good", 1.9),
    ("happy", 2.7),
    ("helpful", 1.6),
    ("impressed", 2.1),
    ("incredible", 2.5),
    ("like", 2.0),
    ("liked", 1.8),
    ("love", 3.2),
    ("loved", 2.9),
    ("lovely", 2.8),
    ("nice", 1.8),
    ("perfect", 2.7),
    ("pleased", 1.9),
    ("pretty", 2.2),
    ("recommend", 1.5),
    ("recommended", 1.6),
    ("reliable", 1.6),
    ("satisfied", 1.8),
    ("smooth", 1.0),
    ("soft", 0.9),
    ("solid", 1.4),
    ("stylish", 1.8),
    ("super", 2.9),
    ("thanks", 1.9),
    ("useful", 1.9),
    ("win", 2.8),
    ("wonderful", 2.7),
    ("worth", 0.9),
    ("wow", 2.8),
    // negative
    ("angry", -2.3),
    ("annoying", -1.7),
    ("awful", -2.0),
    ("bad", -2.5),
    ("boring", -1.3),
    ("broke", -1.8),
    ("broken", -2.1),
    ("cheap", -0.5),
    ("complaint", -1.5),
    ("confusing", -1.3),
    ("crap", -1.6),
    ("damaged", -1.9),
    ("defective", -1.9),
    ("disappointed", -1.9),
    ("disappointing", -2.2),
    ("dislike", -1.6),
    ("fail", -2.5),
    ("failed", -2.3),
    ("fake", -2.1),
    ("flimsy", -1.4),
    ("frustrated", -2.1),
    ("garbage", -2.1),
    ("hate", -2.7),
    ("hated", -3.2),
    ("horrible", -2.5),
    ("junk", -1.6),
    ("meh", -0.3),
    ("mediocre", -1.0),
    ("overpriced", -1.5),
    ("poor", -2.1),
    ("problem", -1.7),
    ("regret", -1.9),
    ("ripoff", -2.3),
    ("rude", -2.0),
    ("sad", -2.1),
    ("scam", -2.5),
    ("suck", -1.7),
    ("sucks", -1.5),
    ("terrible", -2.1),
    ("ugly", -2.3),
    ("upset", -1.6),
    ("useless", -1.8),
    ("waste", -1.8),
    ("worse", -2.1),
    ("worst", -3.1),
    ("wrong", -2.1),
];

const BOOSTERS_UP: &[&str] = &[
    "absolutely",
    "amazingly",
    "completely",
    "deeply",
    "especially",
    "extremely",
    "fully",
    "highly",
    "hugely",
    "incredibly",
    "insanely",
    "particularly",
    "purely",
    "quite",
    "really",
    "seriously",
    "so",
    "totally",
    "truly",
    "utterly",
    "very",
];

const BOOSTERS_DOWN: &[&str] = &[
    "almost",
    "barely",
    "hardly",
    "kinda",
    "marginally",
    "occasionally",
    "partly",
    "scarcely",
    "slightly",
    "somewhat",
    "sorta",
];

const NEGATIONS: &[&str] = &[
    "aint", "arent", "cannot", "cant", "couldnt", "didnt", "doesnt", "dont", "hadnt", "hasnt",
    "havent", "isnt", "neither", "never", "no", "nobody", "none", "nope", "nor", "not", "nothing",
    "nowhere", "shouldnt", "wasnt", "werent", "without", "wont", "wouldnt",
];

/// Sentiment class derived from the compound score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
    Neutral,
}

impl Polarity {
    pub fn from_compound(compound: f64) -> Self {
        if compound > POSITIVE_THRESHOLD {
            Self::Positive
        } else if compound < NEGATIVE_THRESHOLD {
            Self::Negative
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub compound: f64,
    pub label: Polarity,
}

/// Sentiment analyzer over a fixed lexicon.
#[derive(Debug, Clone)]
pub struct SentimentAnalyzer {
    lexicon: HashMap<&'static str, f64>,
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self {
            lexicon: LEXICON.iter().copied().collect(),
        }
    }

    pub fn lexicon_size(&self) -> usize {
        self.lexicon.len()
    }

    /// Score a text. `None` when there is nothing to score (empty or blank).
    pub fn analyze(&self, text: &str) -> Option<SentimentScore> {
        if text.trim().is_empty() {
            return None;
        }
        let compound = self.compound(text);
        Some(SentimentScore {
            compound,
            label: Polarity::from_compound(compound),
        })
    }

    /// Score many texts in parallel; order is preserved and `None` inputs stay `None`.
    pub fn analyze_batch(&self, texts: &[Option<&str>]) -> Vec<Option<SentimentScore>> {
        texts
            .par_iter()
            .map(|t| t.and_then(|text| self.analyze(text)))
            .collect()
    }

    /// Compound polarity in [-1, 1].
    pub fn compound(&self, text: &str) -> f64 {
        let tokens: Vec<String> = text
            .split_whitespace()
            .map(|t| {
                t.trim_matches(|c: char| !c.is_alphanumeric())
                    .to_lowercase()
                    .replace('\'', "")
            })
            .filter(|t| !t.is_empty())
            .collect();

        let mut valences: Vec<f64> = tokens
            .iter()
            .enumerate()
            .map(|(i, _)| self.token_valence(&tokens, i))
            .collect();

        if let Some(but_idx) = tokens.iter().position(|t| t == "but") {
            for (i, v) in valences.iter_mut().enumerate() {
                if i < but_idx {
                    *v *= 0.5;
                } else if i > but_idx {
                    *v *= 1.5;
                }
            }
        }

        let mut sum: f64 = valences.iter().sum();
        if sum != 0.0 {
            let bangs = text.matches('!').count().min(MAX_EXCLAMATIONS) as f64;
            sum += bangs * EXCLAMATION_BOOST * sum.signum();
        }
        normalize(sum)
    }

    fn token_valence(&self, tokens: &[String], i: usize) -> f64 {
        let token = tokens[i].as_str();
        if is_booster(token).is_some() {
            return 0.0;
        }
        let mut valence = match self.lookup(token) {
            Some(v) => v,
            None => return 0.0,
        };

        for distance in 1..=3 {
            if i < distance {
                break;
            }
            let prev = tokens[i - distance].as_str();
            if let Some(boost) = is_booster(prev) {
                let damp = match distance {
                    1 => 1.0,
                    2 => 0.95,
                    _ => 0.9,
                };
                let signed = if valence < 0.0 { -boost } else { boost };
                valence += signed * damp;
            }
            if NEGATIONS.contains(&prev) {
                valence *= NEGATION_SCALAR;
            }
        }
        valence
    }

    fn lookup(&self, token: &str) -> Option<f64> {
        self.lexicon
            .get(token)
            .copied()
            .or_else(|| self.lexicon.get(tokenizer::lemmatize(token).as_str()).copied())
    }
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_booster(token: &str) -> Option<f64> {
    if BOOSTERS_UP.contains(&token) {
        Some(BOOSTER_INCR)
    } else if BOOSTERS_DOWN.contains(&token) {
        Some(BOOSTER_DECR)
    } else {
        None
    }
}

fn normalize(score: f64) -> f64 {
    let norm = score / (score * score + NORMALIZATION_ALPHA).sqrt();
    norm.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer() -> SentimentAnalyzer {
        SentimentAnalyzer::new()
    }

    #[test]
    fn strongly_positive_text() {
        let s = analyzer().analyze("love cute plushy amazing quality").unwrap();
        assert_eq!(s.label, Polarity::Positive);
        assert!(s.compound > 0.05);
    }

    #[test]
    fn strongly_negative_text() {
        let s = analyzer().analyze("terrible broken junk waste money").unwrap();
        assert_eq!(s.label, Polarity::Negative);
        assert!(s.compound < -0.05);
    }

    #[test]
    fn no_lexicon_words_is_neutral() {
        let s = analyzer().analyze("bought storage box yesterday").unwrap();
        assert_eq!(s.label, Polarity::Neutral);
        assert_eq!(s.compound, 0.0);
    }

    #[test]
    fn empty_text_is_absent() {
        assert!(analyzer().analyze("").is_none());
        assert!(analyzer().analyze("   ").is_none());
    }

    #[test]
    fn negation_flips_polarity() {
        let a = analyzer();
        assert!(a.compound("good") > 0.0);
        assert!(a.compound("not good") < 0.0);
    }

    #[test]
    fn booster_intensifies() {
        let a = analyzer();
        assert!(a.compound("really good") > a.compound("good"));
        assert!(a.compound("slightly good") < a.compound("good"));
    }

    #[test]
    fn but_shifts_weight_to_second_clause() {
        let a = analyzer();
        assert!(a.compound("great but broken") < 0.0);
    }

    #[test]
    fn plural_lookup_falls_back_to_lemma() {
        let a = analyzer();
        assert!(a.compound("problems") < 0.0);
    }

    #[test]
    fn compound_bounded() {
        let a = analyzer();
        let text = "love ".repeat(200);
        let c = a.compound(&text);
        assert!(c <= 1.0 && c > 0.99);
    }

    #[test]
    fn deterministic() {
        let a = analyzer();
        let t = "cute but flimsy storage";
        assert_eq!(a.compound(t), a.compound(t));
    }

    #[test]
    fn batch_keeps_order_and_absence() {
        let a = analyzer();
        let out = a.analyze_batch(&[Some("great"), None, Some("awful"), Some("")]);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0].unwrap().label, Polarity::Positive);
        assert!(out[1].is_none());
        assert_eq!(out[2].unwrap().label, Polarity::Negative);
        assert!(out[3].is_none());
    }

    #[test]
    fn polarity_thresholds() {
        assert_eq!(Polarity::from_compound(0.05), Polarity::Neutral);
        assert_eq!(Polarity::from_compound(0.0501), Polarity::Positive);
        assert_eq!(Polarity::from_compound(-0.05), Polarity::Neutral);
        assert_eq!(Polarity::from_compound(-0.0501), Polarity::Negative);
    }
}
