use std::sync::OnceLock;

use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

/// Split already-cleaned text on whitespace. Cleaned text has no punctuation
/// and no stopwords left, so no further filtering happens here.
pub fn split_clean(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Derive `cleaned_content` from raw post text.
///
/// Lower-cases, removes URLs, keeps only ASCII letters and whitespace, drops
/// stopwords and lemmatizes what remains.
pub fn clean_text(text: &str) -> String {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    static NON_ALPHA_RE: OnceLock<Regex> = OnceLock::new();
    let url_re = URL_RE.get_or_init(|| Regex::new(r"https?\S+|www\S+").expect("static regex"));
    let non_alpha_re = NON_ALPHA_RE.get_or_init(|| Regex::new(r"[^a-z\s]").expect("static regex"));

    let lower = text.to_lowercase();
    let no_urls = url_re.replace_all(&lower, "");
    let letters = non_alpha_re.replace_all(&no_urls, "");

    letters
        .unicode_words()
        .filter(|w| !is_stopword(w))
        .map(lemmatize)
        .collect::<Vec<String>>()
        .join(" ")
}

/// Light noun lemmatizer: folds regular plural forms to their singular.
pub fn lemmatize(word: &str) -> String {
    if word.len() <= 3 {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        if stem.len() >= 2 {
            return format!("{stem}y");
        }
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") && !word.ends_with("us") && !word.ends_with("is")
    {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

fn is_stopword(word: &str) -> bool {
    matches!(
        word,
        "a" | "an" | "the" | "is" | "it" | "of" | "to" | "in" | "for" | "on" | "with"
        | "at" | "by" | "from" | "as" | "or" | "and" | "be" | "are"
        | "was" | "were" | "been" | "being" | "have" | "has" | "had" | "do" | "does"
        | "did" | "will" | "would" | "should" | "shall"
        | "can" | "this" | "that" | "these" | "those" | "there" | "here" | "where"
        | "when" | "what" | "which" | "who" | "whom" | "how" | "all" | "each"
        | "both" | "few" | "more" | "most" | "other" | "some" | "such"
        | "only" | "own" | "same" | "so" | "than" | "too" | "just" | "because"
        | "about" | "into" | "through" | "during" | "before" | "after" | "above" | "below"
        | "between" | "under" | "again" | "further" | "then" | "once" | "any" | "its"
        | "your" | "our" | "their" | "his" | "her" | "my" | "if" | "up" | "out"
        | "i" | "me" | "we" | "you" | "he" | "she" | "they" | "them" | "him" | "us"
        | "am" | "yours" | "ours" | "theirs" | "itself" | "myself" | "yourself"
        | "s" | "t" | "d" | "ll" | "m" | "o" | "re" | "ve" | "y" | "while" | "until"
        | "off" | "over" | "down" | "why" | "whose"
    )
}
