//! Closed English stopword list used by n-gram extraction.

use std::collections::HashSet;

use once_cell::sync::Lazy;

/// Tokens of length <= 2 are dropped before this list is consulted,
/// so short function words ("a", "an", "of", "to") are not listed.
const STOPWORD_LIST: &[&str] = &[
    "about", "above", "after", "again", "against", "all", "also", "and", "any", "are",
    "aren", "because", "been", "before", "being", "below", "between", "both", "but",
    "can", "cannot", "could", "did", "does", "doing", "down", "during", "each", "few",
    "for", "from", "further", "had", "has", "have", "having", "her", "here", "hers",
    "herself", "him", "himself", "his", "how", "into", "its", "itself", "just", "let",
    "more", "most", "must", "myself", "nor", "not", "now", "off", "once", "only", "other",
    "ought", "our", "ours", "ourselves", "out", "over", "own", "same", "shall", "she",
    "should", "some", "such", "than", "that", "the", "their", "theirs", "them",
    "themselves", "then", "there", "these", "they", "this", "those", "through", "too",
    "under", "until", "upon", "very", "was", "were", "what", "when", "where", "which",
    "while", "who", "whom", "why", "will", "with", "within", "without", "would", "you",
    "your", "yours", "yourself", "yourselves",
];

pub static STOPWORDS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STOPWORD_LIST.iter().copied().collect());

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}
