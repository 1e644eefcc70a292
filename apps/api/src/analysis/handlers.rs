//! Axum route handlers for the Analysis API.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::ats_scoring::{score, AtsReport};
use crate::analysis::markup::render_marked;
use crate::analysis::ngrams::{
    extract_mode, multi_size, ExcludedSet, ExtractMode, Ngram, NgramLists,
};
use crate::analysis::{require_keywords, require_text};
use crate::analysis::rewriter::{rewrite, RewriteResult, VerbMap, VerbRuleSpec};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct NgramRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub mode: ExtractMode,
    #[serde(default)]
    pub trigrams: bool,
    /// Overrides the multi-list window size. Takes precedence over `trigrams`.
    pub n: Option<usize>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub excluded: ExcludedSet,
    /// Phrases to flip in `excluded` before extracting, e.g. a word clicked in the cloud.
    #[serde(default)]
    pub toggle: Vec<String>,
}

/// N-gram lists as returned over the API.
#[derive(Debug, Serialize)]
pub struct NgramOutput {
    #[serde(flatten)]
    pub lists: NgramLists,
    /// Single list followed by multi list. Present in `both` mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined: Option<Vec<Ngram>>,
}

impl NgramOutput {
    fn new(lists: NgramLists, mode: ExtractMode) -> Self {
        let combined = (mode == ExtractMode::Both).then(|| lists.combined());
        NgramOutput { lists, combined }
    }
}

#[derive(Debug, Serialize)]
pub struct NgramResponse {
    pub analysis_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub mode: ExtractMode,
    /// The exclusion set after `toggle` was applied, for the next request.
    pub excluded: ExcludedSet,
    #[serde(flatten)]
    pub ngrams: NgramOutput,
}

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Fixes replacement choices. Falls back to `ENHANCEMENT_SEED`, then to entropy.
    pub seed: Option<u64>,
    #[serde(default)]
    pub extra_verbs: Vec<VerbRuleSpec>,
    #[serde(default)]
    pub render_html: bool,
}

#[derive(Debug, Serialize)]
pub struct RewriteResponse {
    pub analysis_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    /// The seed used, when the run is reproducible.
    pub seed: Option<u64>,
    #[serde(flatten)]
    pub result: RewriteResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marked_html: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub analysis_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: AtsReport,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub text: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub seed: Option<u64>,
    #[serde(default)]
    pub trigrams: bool,
    pub limit: Option<usize>,
    #[serde(default)]
    pub excluded: ExcludedSet,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis_id: Uuid,
    pub analyzed_at: DateTime<Utc>,
    pub seed: Option<u64>,
    pub ngrams: NgramOutput,
    pub rewrite: RewriteResult,
    pub marked_html: String,
    pub score: AtsReport,
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Engines are CPU-bound; keep them off the async worker threads.
async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e).context("analysis task failed")))
}

/// Request seed wins over the configured seed. Without either, the RNG is seeded from
/// entropy and the run is not reproducible.
fn enhancement_rng(request_seed: Option<u64>, config_seed: Option<u64>) -> (ChaCha8Rng, Option<u64>) {
    match request_seed.or(config_seed) {
        Some(seed) => (ChaCha8Rng::seed_from_u64(seed), Some(seed)),
        None => (ChaCha8Rng::from_entropy(), None),
    }
}

fn verbs_for(state: &AppState, extra: Vec<VerbRuleSpec>) -> Result<VerbMap, AppError> {
    if extra.is_empty() {
        return Ok(state.verbs.as_ref().clone());
    }
    Ok(state.verbs.with_overrides(extra)?)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/ngrams
///
/// Ranked unigrams and/or multi-word phrases for word-cloud rendering.
pub async fn handle_ngrams(
    State(state): State<AppState>,
    Json(request): Json<NgramRequest>,
) -> Result<Json<NgramResponse>, AppError> {
    let text = require_text(request.text, state.config.max_input_bytes)?;
    let limit = request.limit.unwrap_or(state.config.ngram_default_limit);
    let multi_n = request.n.unwrap_or_else(|| multi_size(request.trigrams));
    let mode = request.mode;
    let mut excluded = request.excluded;
    for phrase in &request.toggle {
        excluded.toggle(phrase);
    }
    if !excluded.is_empty() {
        debug!("Excluding {} phrases", excluded.len());
    }

    let (lists, excluded) = run_blocking(move || {
        extract_mode(&text, mode, multi_n, limit, &excluded).map(|lists| (lists, excluded))
    })
    .await??;

    info!(
        "N-gram extraction: mode={:?} single={} multi={}",
        mode,
        lists.single.len(),
        lists.multi.len()
    );

    Ok(Json(NgramResponse {
        analysis_id: Uuid::new_v4(),
        analyzed_at: Utc::now(),
        mode,
        excluded,
        ngrams: NgramOutput::new(lists, mode),
    }))
}

/// POST /api/v1/rewrite
///
/// Keyword highlighting, verb enhancement and metric annotation with a full change log.
/// `marked_html` is included only when `render_html` is set.
pub async fn handle_rewrite(
    State(state): State<AppState>,
    Json(request): Json<RewriteRequest>,
) -> Result<Json<RewriteResponse>, AppError> {
    let text = require_text(request.text, state.config.max_input_bytes)?;
    let keywords = require_keywords(request.keywords, state.config.max_keywords)?;
    let verbs = verbs_for(&state, request.extra_verbs)?;
    let (mut rng, seed) = enhancement_rng(request.seed, state.config.enhancement_seed);
    let render_html = request.render_html;

    let (result, marked_html) = run_blocking(move || {
        rewrite(&text, &keywords, &verbs, &mut rng).map(|result| {
            let html = render_html.then(|| render_marked(&result.text, &result.highlights));
            (result, html)
        })
    })
    .await??;

    info!(
        "Rewrite: {} keyword, {} enhancement, {} metric changes",
        result.summary.keyword, result.summary.enhancement, result.summary.metric
    );

    Ok(Json(RewriteResponse {
        analysis_id: Uuid::new_v4(),
        analyzed_at: Utc::now(),
        seed,
        result,
        marked_html,
    }))
}

/// POST /api/v1/score
///
/// ATS compatibility report: score breakdown, per-category checks, recommendations.
pub async fn handle_score(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    let text = require_text(request.text, state.config.max_input_bytes)?;
    let keywords = require_keywords(request.keywords, state.config.max_keywords)?;

    let report = run_blocking(move || score(&text, &keywords)).await?;

    info!("ATS score: overall={:.1}", report.breakdown.overall);

    Ok(Json(ScoreResponse {
        analysis_id: Uuid::new_v4(),
        analyzed_at: Utc::now(),
        report,
    }))
}

/// POST /api/v1/analyze
///
/// Runs all three engines over the same text. Engines share no state; this is
/// a convenience wrapper over the individual endpoints.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let text = require_text(request.text, state.config.max_input_bytes)?;
    let keywords = require_keywords(request.keywords, state.config.max_keywords)?;
    let verbs = state.verbs.as_ref().clone();
    let (mut rng, seed) = enhancement_rng(request.seed, state.config.enhancement_seed);
    let limit = request.limit.unwrap_or(state.config.ngram_default_limit);
    let multi_n = multi_size(request.trigrams);
    let excluded = request.excluded;

    let (ngrams, rewritten, marked_html, report) = run_blocking(move || {
        let ngrams = extract_mode(&text, ExtractMode::Both, multi_n, limit, &excluded)?;
        let rewritten = rewrite(&text, &keywords, &verbs, &mut rng)?;
        let marked_html = render_marked(&rewritten.text, &rewritten.highlights);
        let report = score(&text, &keywords);
        Ok::<_, crate::analysis::AnalysisError>((ngrams, rewritten, marked_html, report))
    })
    .await??;

    info!(
        "Analyze: {} n-grams, {} changes, overall score {:.1}",
        ngrams.single.len() + ngrams.multi.len(),
        rewritten.summary.total,
        report.breakdown.overall
    );

    Ok(Json(AnalyzeResponse {
        analysis_id: Uuid::new_v4(),
        analyzed_at: Utc::now(),
        seed,
        ngrams: NgramOutput::new(ngrams, ExtractMode::Both),
        rewrite: rewritten,
        marked_html,
        score: report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_request_seed_wins_over_config_seed() {
        let (_, seed) = enhancement_rng(Some(1), Some(2));
        assert_eq!(seed, Some(1));
        let (_, seed) = enhancement_rng(None, Some(2));
        assert_eq!(seed, Some(2));
        let (_, seed) = enhancement_rng(None, None);
        assert_eq!(seed, None);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let (mut a, _) = enhancement_rng(Some(9), None);
        let (mut b, _) = enhancement_rng(Some(9), None);
        assert_eq!(a.gen::<u64>(), b.gen::<u64>());
    }

    #[test]
    fn test_ngram_request_defaults() {
        let req: NgramRequest = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        assert_eq!(req.mode, ExtractMode::Both);
        assert!(!req.trigrams);
        assert!(req.excluded.is_empty());
        assert!(req.toggle.is_empty());
        assert!(req.limit.is_none());
    }

    #[test]
    fn test_combined_list_only_in_both_mode() {
        let lists = NgramLists {
            single: vec![Ngram { text: "rust".into(), value: 2 }],
            multi: vec![Ngram { text: "rust rust".into(), value: 1 }],
        };
        let both = NgramOutput::new(lists.clone(), ExtractMode::Both);
        assert_eq!(both.combined.as_ref().map(Vec::len), Some(2));
        let multi = NgramOutput::new(lists, ExtractMode::Multi);
        assert!(multi.combined.is_none());
    }

    #[test]
    fn test_rewrite_request_parses_extra_verbs() {
        let req: RewriteRequest = serde_json::from_str(
            r#"{"text": "x", "keywords": ["rust"], "seed": 3,
                "extra_verbs": [{"weak": "fixed", "strong": ["resolved"]}]}"#,
        )
        .unwrap();
        assert_eq!(req.seed, Some(3));
        assert_eq!(req.extra_verbs[0].weak, "fixed");
        assert!(!req.render_html);
    }

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let v = run_blocking(|| 2 + 2).await.unwrap();
        assert_eq!(v, 4);
    }

    #[tokio::test]
    async fn test_run_blocking_maps_panic_to_internal() {
        let err = run_blocking(|| -> u8 { panic!("engine failure") }).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }
}
