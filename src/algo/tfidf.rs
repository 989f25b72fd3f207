use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A corpus of tokenized documents for building a capped TF-IDF space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Corpus {
    /// document_id -> term -> count
    doc_terms: Vec<HashMap<String, u32>>,
    /// term -> number of documents containing it
    doc_freq: HashMap<String, u32>,
    /// term -> occurrences across the whole corpus
    term_freq: HashMap<String, u32>,
    /// total number of documents
    num_docs: u32,
}

impl Corpus {
    pub fn new() -> Self {
        Self {
            doc_terms: Vec::new(),
            doc_freq: HashMap::new(),
            term_freq: HashMap::new(),
            num_docs: 0,
        }
    }

    /// Build a corpus from pre-tokenized documents.
    pub fn from_token_lists(token_lists: &[Vec<String>]) -> Self {
        let mut corpus = Self::new();
        for tokens in token_lists {
            corpus.add_document(tokens);
        }
        corpus
    }

    /// Add a document (as pre-tokenized terms) to the corpus.
    pub fn add_document(&mut self, tokens: &[String]) {
        let mut term_counts: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *term_counts.entry(token.clone()).or_insert(0) += 1;
        }
        for (term, &count) in &term_counts {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
            *self.term_freq.entry(term.clone()).or_insert(0) += count;
        }
        self.doc_terms.push(term_counts);
        self.num_docs += 1;
    }

    /// Smoothed IDF: ln((1 + N) / (1 + df)) + 1.
    pub fn idf(&self, term: &str) -> f64 {
        let df = *self.doc_freq.get(term).unwrap_or(&0) as f64;
        let n = self.num_docs as f64;
        ((1.0 + n) / (1.0 + df)).ln() + 1.0
    }

    /// The `max_features` most frequent terms across the corpus, ties broken
    /// alphabetically so the space is deterministic.
    pub fn vocabulary(&self, max_features: usize) -> Vec<String> {
        let mut terms: Vec<(&String, u32)> = self.term_freq.iter().map(|(t, &c)| (t, c)).collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        terms.truncate(max_features);
        terms.into_iter().map(|(t, _)| t.clone()).collect()
    }

    /// Dense TF-IDF rows over `vocabulary`, one per document, each L2-normalized.
    /// Documents with no vocabulary terms get an all-zero row.
    pub fn tfidf_matrix(&self, vocabulary: &[String]) -> Vec<Vec<f64>> {
        let idf: Vec<f64> = vocabulary.iter().map(|t| self.idf(t)).collect();
        self.doc_terms
            .iter()
            .map(|doc| {
                let mut row: Vec<f64> = vocabulary
                    .iter()
                    .zip(&idf)
                    .map(|(term, w)| *doc.get(term).unwrap_or(&0) as f64 * w)
                    .collect();
                let norm = row.iter().map(|x| x * x).sum::<f64>().sqrt();
                if norm > 0.0 {
                    for x in &mut row {
                        *x /= norm;
                    }
                }
                row
            })
            .collect()
    }

    pub fn num_docs(&self) -> u32 {
        self.num_docs
    }
}

impl Default for Corpus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(String::from).collect()
    }

    fn make_corpus() -> Corpus {
        Corpus::from_token_lists(&[
            toks("cute plushy toy"),
            toks("cute storage box"),
            toks("earbud sound cute"),
        ])
    }

    #[test]
    fn idf_common_vs_rare() {
        let c = make_corpus();
        // "cute" is in every document, "storage" in one
        assert!((c.idf("cute") - 1.0).abs() < 1e-12);
        assert!(c.idf("storage") > c.idf("cute"));
    }

    #[test]
    fn idf_unknown_term_finite() {
        let c = make_corpus();
        let idf = c.idf("nonexistent");
        assert!((idf - (4.0f64.ln() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn empty_corpus() {
        let c = Corpus::new();
        assert_eq!(c.num_docs(), 0);
        assert!(c.idf("unknown").is_finite());
        assert!(c.vocabulary(10).is_empty());
        assert!(c.tfidf_matrix(&[]).is_empty());
    }

    #[test]
    fn vocabulary_capped_by_frequency() {
        let c = make_corpus();
        let vocab = c.vocabulary(2);
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab[0], "cute");
        // Remaining terms tie at 1, alphabetical order wins
        assert_eq!(vocab[1], "box");
    }

    #[test]
    fn vocabulary_larger_than_corpus() {
        let c = make_corpus();
        assert_eq!(c.vocabulary(1000).len(), 7);
    }

    #[test]
    fn rows_are_unit_length() {
        let c = make_corpus();
        let vocab = c.vocabulary(1000);
        let m = c.tfidf_matrix(&vocab);
        assert_eq!(m.len(), 3);
        for row in &m {
            assert_eq!(row.len(), vocab.len());
            let norm: f64 = row.iter().map(|x| x * x).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-10);
            assert!(row.iter().all(|&x| x >= 0.0));
        }
    }

    #[test]
    fn out_of_vocabulary_document_is_zero_row() {
        let mut c = make_corpus();
        c.add_document(&toks("zzz"));
        let vocab = c.vocabulary(2);
        let m = c.tfidf_matrix(&vocab);
        assert!(m[3].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn identical_documents_identical_rows() {
        let c = Corpus::from_token_lists(&[toks("same words here"), toks("same words here")]);
        let vocab = c.vocabulary(10);
        let m = c.tfidf_matrix(&vocab);
        assert_eq!(m[0], m[1]);
    }

    #[test]
    fn corpus_serde_roundtrip() {
        let c = make_corpus();
        let json = serde_json::to_string(&c).unwrap();
        let c2: Corpus = serde_json::from_str(&json).unwrap();
        assert_eq!(c.num_docs(), c2.num_docs());
        assert!((c.idf("storage") - c2.idf("storage")).abs() < 1e-10);
        assert_eq!(c.vocabulary(5), c2.vocabulary(5));
    }
}
