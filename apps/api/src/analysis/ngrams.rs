//! N-gram extraction — ranked word and phrase frequencies for word-cloud visualization.
//!
//! Tokenization here is alphabetic-only: digits and punctuation are stripped before
//! splitting. The ATS keyword scorer tokenizes on whitespace instead; the two policies
//! are kept separate on purpose.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::stopwords::is_stopword;
use crate::analysis::AnalysisError;

/// Tokens must be longer than this to survive cleaning.
const MIN_TOKEN_LEN: usize = 2;

/// One ranked phrase. `value` is always >= 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ngram {
    pub text: String,
    pub value: u32,
}

/// Which n-gram lists to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractMode {
    /// Unigrams only.
    Single,
    /// Bigrams, or trigrams when the trigram flag is set.
    Multi,
    /// Both lists, concatenated without de-duplication.
    #[default]
    Both,
}

/// Result of a mode-driven extraction. Lists a mode does not request stay empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NgramLists {
    pub single: Vec<Ngram>,
    pub multi: Vec<Ngram>,
}

impl NgramLists {
    /// Single list followed by multi list. A word may legitimately appear in both.
    pub fn combined(&self) -> Vec<Ngram> {
        self.single.iter().chain(self.multi.iter()).cloned().collect()
    }
}

/// Caller-owned set of phrases suppressed from extraction.
///
/// Entries are normalized into the extractor's key space on insert, so
/// `"Customer  Retention!"` and `"customer retention"` are the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ExcludedSet {
    keys: HashSet<String>,
}

impl ExcludedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the phrase normalizes to nothing or was already present.
    pub fn insert(&mut self, phrase: &str) -> bool {
        let key = normalize_key(phrase);
        !key.is_empty() && self.keys.insert(key)
    }

    pub fn remove(&mut self, phrase: &str) -> bool {
        self.keys.remove(&normalize_key(phrase))
    }

    /// Flips membership. Returns true if the phrase is excluded afterwards.
    pub fn toggle(&mut self, phrase: &str) -> bool {
        if self.remove(phrase) {
            false
        } else {
            self.insert(phrase)
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl From<Vec<String>> for ExcludedSet {
    fn from(phrases: Vec<String>) -> Self {
        let mut set = ExcludedSet::new();
        for p in &phrases {
            set.insert(p);
        }
        set
    }
}

impl From<ExcludedSet> for Vec<String> {
    fn from(set: ExcludedSet) -> Self {
        let mut keys: Vec<String> = set.keys.into_iter().collect();
        keys.sort();
        keys
    }
}

/// Lowercases, drops everything outside `a-z` and whitespace, collapses whitespace runs.
pub fn normalize_key(phrase: &str) -> String {
    clean_text(phrase).split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_whitespace())
        .collect()
}

/// Cleaned token stream: alphabetic, longer than two chars, not a stopword.
pub fn tokenize(text: &str) -> Vec<String> {
    clean_text(text)
        .split_whitespace()
        .filter(|t| t.len() > MIN_TOKEN_LEN && !is_stopword(t))
        .map(str::to_string)
        .collect()
}

/// Extracts up to `limit` n-grams of size `n`, most frequent first.
///
/// Ties keep first-discovered order. Phrases in `excluded` are never counted.
pub fn extract(
    text: &str,
    n: usize,
    limit: usize,
    excluded: &ExcludedSet,
) -> Result<Vec<Ngram>, AnalysisError> {
    if n < 1 {
        return Err(AnalysisError::InvalidNgramSize(n));
    }

    let tokens = tokenize(text);
    if tokens.len() < n {
        return Ok(vec![]);
    }

    // Insertion-ordered accumulation: `order` fixes the tie-break.
    let mut order: Vec<Ngram> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for window in tokens.windows(n) {
        let phrase = window.join(" ");
        if excluded.contains(&phrase) {
            continue;
        }
        match index.get(&phrase) {
            Some(&i) => order[i].value += 1,
            None => {
                index.insert(phrase.clone(), order.len());
                order.push(Ngram {
                    text: phrase,
                    value: 1,
                });
            }
        }
    }

    let distinct = order.len();
    order.sort_by(|a, b| b.value.cmp(&a.value));
    order.truncate(limit);

    debug!(
        "Extracted {} of {} distinct {}-grams from {} tokens",
        order.len(),
        distinct,
        n,
        tokens.len()
    );

    Ok(order)
}

/// Window size of the multi list: trigrams when the flag is set, bigrams otherwise.
pub fn multi_size(trigrams: bool) -> usize {
    if trigrams {
        3
    } else {
        2
    }
}

/// Runs extraction for the requested mode. Each list is truncated to `limit` on its own.
pub fn extract_mode(
    text: &str,
    mode: ExtractMode,
    multi_n: usize,
    limit: usize,
    excluded: &ExcludedSet,
) -> Result<NgramLists, AnalysisError> {
    let want_single = matches!(mode, ExtractMode::Single | ExtractMode::Both);
    let want_multi = matches!(mode, ExtractMode::Multi | ExtractMode::Both);

    Ok(NgramLists {
        single: if want_single {
            extract(text, 1, limit, excluded)?
        } else {
            vec![]
        },
        multi: if want_multi {
            extract(text, multi_n, limit, excluded)?
        } else {
            vec![]
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESUME: &str = "Senior engineer. Built data pipelines for customer analytics. \
        Data pipelines reduced customer churn. Customer analytics dashboards shipped weekly.";

    fn none() -> ExcludedSet {
        ExcludedSet::new()
    }

    fn window_count(text: &str, n: usize) -> usize {
        tokenize(text).len().saturating_sub(n - 1)
    }

    #[test]
    fn test_end_to_end_unigrams() {
        let text = "I worked on a project that improved 15% of customer retention.";
        let grams = extract(text, 1, 50, &none()).unwrap();
        let find = |w: &str| grams.iter().find(|g| g.text == w).map(|g| g.value);
        assert_eq!(find("project"), Some(1));
        assert_eq!(find("retention"), Some(1));
        assert_eq!(find("that"), None, "stopword must be removed");
        assert!(grams.iter().all(|g| g.text.chars().all(|c| c.is_ascii_lowercase())));
    }

    #[test]
    fn test_ranked_by_count_desc() {
        let grams = extract(RESUME, 1, 50, &none()).unwrap();
        assert_eq!(grams[0].text, "customer");
        assert_eq!(grams[0].value, 3);
        assert!(grams.windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[test]
    fn test_ties_keep_first_discovered_order() {
        let grams = extract("zebra apple mango", 1, 10, &none()).unwrap();
        let texts: Vec<&str> = grams.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(texts, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn test_bigrams() {
        let grams = extract(RESUME, 2, 50, &none()).unwrap();
        let top: Vec<&str> = grams.iter().take(2).map(|g| g.text.as_str()).collect();
        assert!(top.contains(&"data pipelines"));
        assert!(top.contains(&"customer analytics"));
        assert_eq!(grams[0].value, 2);
    }

    #[test]
    fn test_limit_respected() {
        let grams = extract(RESUME, 1, 3, &none()).unwrap();
        assert_eq!(grams.len(), 3);
        assert!(extract(RESUME, 1, 0, &none()).unwrap().is_empty());
    }

    #[test]
    fn test_counts_positive_and_bounded_by_windows() {
        for n in 1..=4 {
            let grams = extract(RESUME, n, 100, &none()).unwrap();
            assert!(grams.iter().all(|g| g.value >= 1));
            let total: u32 = grams.iter().map(|g| g.value).sum();
            assert!(total as usize <= window_count(RESUME, n));
        }
    }

    #[test]
    fn test_idempotent() {
        let mut excluded = none();
        excluded.insert("data");
        let a = extract(RESUME, 2, 10, &excluded).unwrap();
        let b = extract(RESUME, 2, 10, &excluded).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_exclusion_removes_phrase() {
        let before = extract(RESUME, 2, 50, &none()).unwrap();
        assert!(before.iter().any(|g| g.text == "data pipelines"));

        let mut excluded = none();
        excluded.insert("Data Pipelines!");
        let after = extract(RESUME, 2, 50, &excluded).unwrap();
        assert!(after.iter().all(|g| g.text != "data pipelines"));
        // Other phrases keep their counts.
        let count = |v: &[Ngram], t: &str| v.iter().find(|g| g.text == t).map(|g| g.value);
        assert_eq!(
            count(&before, "customer analytics"),
            count(&after, "customer analytics")
        );
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        assert!(extract("", 1, 10, &none()).unwrap().is_empty());
        assert!(extract("   \n\t ", 2, 10, &none()).unwrap().is_empty());
    }

    #[test]
    fn test_zero_n_rejected() {
        assert_eq!(
            extract(RESUME, 0, 10, &none()),
            Err(AnalysisError::InvalidNgramSize(0))
        );
    }

    #[test]
    fn test_digits_and_punctuation_stripped() {
        let grams = extract("Kubernetes-based k8s rollout, 2024!", 1, 10, &none()).unwrap();
        let texts: Vec<&str> = grams.iter().map(|g| g.text.as_str()).collect();
        assert_eq!(texts, vec!["kubernetesbased", "rollout"]);
    }

    #[test]
    fn test_mode_both_concatenates_without_dedup() {
        let lists = extract_mode("rust rust rust", ExtractMode::Both, multi_size(false), 10, &none()).unwrap();
        assert_eq!(lists.single, vec![Ngram { text: "rust".into(), value: 3 }]);
        assert_eq!(lists.multi, vec![Ngram { text: "rust rust".into(), value: 2 }]);
        assert_eq!(lists.combined().len(), 2);
    }

    #[test]
    fn test_mode_multi_trigrams() {
        let lists = extract_mode(RESUME, ExtractMode::Multi, multi_size(true), 10, &none()).unwrap();
        assert!(lists.single.is_empty());
        assert!(lists.multi.iter().all(|g| g.text.split(' ').count() == 3));
    }

    #[test]
    fn test_mode_single_only() {
        let lists = extract_mode(RESUME, ExtractMode::Single, 2, 10, &none()).unwrap();
        assert!(lists.multi.is_empty());
        assert!(!lists.single.is_empty());
    }

    #[test]
    fn test_mode_rejects_zero_multi_size() {
        let err = extract_mode(RESUME, ExtractMode::Multi, 0, 10, &none()).unwrap_err();
        assert_eq!(err, AnalysisError::InvalidNgramSize(0));
        // Single mode never builds the multi list.
        assert!(extract_mode(RESUME, ExtractMode::Single, 0, 10, &none()).is_ok());
    }

    #[test]
    fn test_excluded_set_normalizes_and_toggles() {
        let mut set = ExcludedSet::new();
        assert!(set.insert("  Customer   Retention "));
        assert!(set.contains("customer retention"));
        assert!(!set.insert("customer retention"));
        assert!(!set.toggle("CUSTOMER RETENTION"));
        assert!(set.is_empty());
        assert!(set.toggle("churn"));
        assert_eq!(set.len(), 1);
        assert!(!set.insert("123 !!"));
    }

    #[test]
    fn test_excluded_set_deserializes_from_list() {
        let set: ExcludedSet = serde_json::from_str(r#"["Data Pipelines", "churn"]"#).unwrap();
        assert!(set.contains("data pipelines"));
        assert!(set.contains("churn"));
    }
}
