// Document analysis engines: n-gram extraction, rewriting with change tracking, ATS scoring.
// Engines are synchronous and pure. Handlers run them inside tokio::task::spawn_blocking.
// No engine emits markup; `markup` is the only module that produces HTML.

pub mod ats_scoring;
pub mod handlers;
pub mod markup;
pub mod ngrams;
pub mod rewriter;
pub mod stopwords;
pub mod text;

use thiserror::Error;

/// Input errors raised by the engines. Rejected before any processing happens.
/// Empty results are never errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("n-gram size must be at least 1, got {0}")]
    InvalidNgramSize(usize),

    #[error("invalid phrase '{phrase}': {reason}")]
    InvalidPattern { phrase: String, reason: String },

    #[error("text is required")]
    MissingText,

    #[error("text is {len} bytes, limit is {max}")]
    InputTooLarge { len: usize, max: usize },

    #[error("{count} keywords given, limit is {max}")]
    TooManyKeywords { count: usize, max: usize },
}

/// Resolves the optional request text against the configured size limit.
pub fn require_text(text: Option<String>, max_bytes: usize) -> Result<String, AnalysisError> {
    let text = text.ok_or(AnalysisError::MissingText)?;
    if text.len() > max_bytes {
        return Err(AnalysisError::InputTooLarge {
            len: text.len(),
            max: max_bytes,
        });
    }
    Ok(text)
}

/// Rejects keyword lists longer than `max`. Each keyword multiplies matching work.
pub fn require_keywords(keywords: Vec<String>, max: usize) -> Result<Vec<String>, AnalysisError> {
    if keywords.len() > max {
        return Err(AnalysisError::TooManyKeywords {
            count: keywords.len(),
            max,
        });
    }
    Ok(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_text_rejected() {
        assert_eq!(require_text(None, 10), Err(AnalysisError::MissingText));
    }

    #[test]
    fn test_empty_text_accepted() {
        assert_eq!(require_text(Some(String::new()), 10).unwrap(), "");
    }

    #[test]
    fn test_oversized_text_rejected() {
        let err = require_text(Some("x".repeat(11)), 10).unwrap_err();
        assert_eq!(err, AnalysisError::InputTooLarge { len: 11, max: 10 });
    }

    #[test]
    fn test_keyword_list_bounded() {
        let keywords = vec!["rust".to_string(); 3];
        assert_eq!(require_keywords(keywords.clone(), 3).unwrap().len(), 3);
        assert_eq!(
            require_keywords(keywords, 2),
            Err(AnalysisError::TooManyKeywords { count: 3, max: 2 })
        );
    }
}
