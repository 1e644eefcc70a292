//! Rewriter — keyword highlighting, weak-verb enhancement and metric annotation,
//! with every match recorded as a `Change`.
//!
//! All three passes read the same input text. Only the enhancement pass edits it;
//! `rewrite` applies those edits and moves every highlight into the rewritten text's
//! coordinates. Nothing here produces markup (see `analysis::markup`).
//!
//! Enhancement picks a replacement uniformly at random per occurrence, so two runs
//! over the same text may differ. Pass a seeded RNG (`rand_chacha::ChaCha8Rng`) when
//! reproducible output is needed.

use std::collections::{BTreeMap, HashSet};
use std::ops::Range;

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::text::{
    compile_phrase, context_window, find_whole_matches, match_leading_case, CONTEXT_RADIUS_CHARS,
};
use crate::analysis::AnalysisError;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Keyword,
    Enhancement,
    Metric,
}

/// One recorded match or edit. `original` is always a literal substring of the pass input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub original: String,
    pub optimized: String,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub context: String,
}

/// A byte span to decorate, pointing at the change it renders.
///
/// Enhancement and metric spans cover exactly the change's `optimized` text. A keyword
/// span that partly covers an enhancement edit is widened over the whole replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub start: usize,
    pub end: usize,
    pub kind: ChangeType,
    pub tooltip: String,
    pub change_index: usize,
}

/// Output of an annotation-only pass. Highlights index into `changes`.
#[derive(Debug, Clone, Default)]
pub struct Pass {
    pub changes: Vec<Change>,
    pub highlights: Vec<Highlight>,
}

/// A replacement in input coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub range: Range<usize>,
    pub replacement: String,
}

/// Output of the enhancement pass. `highlights` are in `text` coordinates,
/// `edits` in input coordinates, sorted by start.
#[derive(Debug, Clone)]
pub struct Enhancement {
    pub text: String,
    pub changes: Vec<Change>,
    pub highlights: Vec<Highlight>,
    pub edits: Vec<Edit>,
}

/// Per-type change counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSummary {
    pub keyword: usize,
    pub enhancement: usize,
    pub metric: usize,
    pub total: usize,
}

/// Full rewrite output: plain rewritten text plus the change log and spans to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteResult {
    pub text: String,
    pub changes: Vec<Change>,
    pub highlights: Vec<Highlight>,
    pub summary: ChangeSummary,
}

// ────────────────────────────────────────────────────────────────────────────
// Verb map
// ────────────────────────────────────────────────────────────────────────────

/// Caller-facing weak → strong mapping, as accepted over the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbRuleSpec {
    pub weak: String,
    pub strong: Vec<String>,
}

#[derive(Debug, Clone)]
struct VerbRule {
    weak: String,
    strong: Vec<String>,
    pattern: Regex,
}

/// Ordered weak-phrase rules. Earlier rules claim text first, so a match that
/// overlaps one already claimed is left alone.
#[derive(Debug, Clone)]
pub struct VerbMap {
    rules: Vec<VerbRule>,
}

const DEFAULT_VERB_RULES: &[(&str, &[&str])] = &[
    ("responsible for", &["oversaw", "directed", "owned"]),
    ("participated in", &["contributed to", "collaborated on", "engaged in"]),
    ("worked", &["spearheaded", "executed", "implemented"]),
    ("improved", &["optimized", "enhanced", "streamlined"]),
    ("helped", &["facilitated", "enabled", "accelerated"]),
    ("managed", &["orchestrated", "directed", "oversaw"]),
    ("assisted", &["supported", "collaborated on", "contributed to"]),
    ("handled", &["coordinated", "administered", "resolved"]),
    ("made", &["created", "developed", "engineered"]),
    ("used", &["leveraged", "utilized", "applied"]),
    ("led", &["spearheaded", "directed", "championed"]),
    ("did", &["executed", "delivered", "accomplished"]),
];

static DEFAULT_VERB_MAP: Lazy<VerbMap> = Lazy::new(|| {
    let specs = DEFAULT_VERB_RULES
        .iter()
        .map(|(weak, strong)| VerbRuleSpec {
            weak: weak.to_string(),
            strong: strong.iter().map(|s| s.to_string()).collect(),
        })
        .collect();
    VerbMap::new(specs).expect("built-in verb rules are valid")
});

impl VerbMap {
    pub fn new(specs: Vec<VerbRuleSpec>) -> Result<Self, AnalysisError> {
        let rules = specs
            .into_iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(VerbMap { rules })
    }

    /// The built-in resume verb rules.
    pub fn builtin() -> Self {
        DEFAULT_VERB_MAP.clone()
    }

    /// Returns a map where `extra` rules come first. An extra rule with the same weak
    /// phrase (case-insensitive) replaces the existing one.
    pub fn with_overrides(&self, extra: Vec<VerbRuleSpec>) -> Result<Self, AnalysisError> {
        let mut rules = extra
            .into_iter()
            .map(compile_rule)
            .collect::<Result<Vec<_>, _>>()?;
        let overridden: Vec<String> = rules.iter().map(|r| r.weak.to_lowercase()).collect();
        rules.extend(
            self.rules
                .iter()
                .filter(|r| !overridden.contains(&r.weak.to_lowercase()))
                .cloned(),
        );
        Ok(VerbMap { rules })
    }
}

#[cfg(test)]
impl VerbMap {
    pub fn candidates(&self, weak: &str) -> Option<&[String]> {
        self.rules
            .iter()
            .find(|r| r.weak.eq_ignore_ascii_case(weak))
            .map(|r| r.strong.as_slice())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }
}

fn compile_rule(spec: VerbRuleSpec) -> Result<VerbRule, AnalysisError> {
    let pattern = compile_phrase(&spec.weak)?;
    let strong: Vec<String> = spec
        .strong
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if strong.is_empty() {
        return Err(AnalysisError::InvalidPattern {
            phrase: spec.weak,
            reason: "no replacement candidates".to_string(),
        });
    }
    Ok(VerbRule {
        weak: spec.weak.trim().to_string(),
        strong,
        pattern,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Passes
// ────────────────────────────────────────────────────────────────────────────

/// Marks every whole-phrase, case-insensitive occurrence of each keyword.
///
/// Order is keyword list order, then left to right. Overlapping keywords each get
/// their own change; a phrase repeated in the list (ignoring case and spacing) is
/// matched once. All phrases are validated before any matching happens.
pub fn highlight_keywords(text: &str, phrases: &[String]) -> Result<Pass, AnalysisError> {
    let patterns = phrases
        .iter()
        .map(|p| compile_phrase(p).map(|re| (p.trim(), re)))
        .collect::<Result<Vec<_>, _>>()?;

    let mut seen = HashSet::new();
    let mut pass = Pass::default();
    for (phrase, re) in &patterns {
        if !seen.insert(phrase_key(phrase)) {
            continue;
        }
        for range in find_whole_matches(re, text) {
            let matched = &text[range.clone()];
            pass.push(
                Change {
                    original: matched.to_string(),
                    optimized: matched.to_string(),
                    change_type: ChangeType::Keyword,
                    context: context_window(text, range.start, range.end, CONTEXT_RADIUS_CHARS),
                },
                range,
                format!("Keyword match: {phrase}"),
            );
        }
    }

    debug!(
        "Keyword pass: {} matches for {} phrases",
        pass.changes.len(),
        phrases.len()
    );
    Ok(pass)
}

/// Replaces weak phrases with a randomly chosen strong candidate per occurrence.
pub fn apply_enhancement<R: Rng + ?Sized>(text: &str, verbs: &VerbMap, rng: &mut R) -> Enhancement {
    let mut changes = Vec::new();
    let mut claimed: Vec<(Edit, usize)> = Vec::new();
    // start -> end of every claimed range; claimed ranges never overlap.
    let mut spans: BTreeMap<usize, usize> = BTreeMap::new();

    for rule in &verbs.rules {
        for range in find_whole_matches(&rule.pattern, text) {
            let taken = spans
                .range(..range.end)
                .next_back()
                .is_some_and(|(_, &end)| end > range.start);
            if taken {
                continue;
            }
            let Some(choice) = rule.strong.choose(rng) else {
                continue;
            };
            let matched = &text[range.clone()];
            let replacement = match_leading_case(matched, choice);

            spans.insert(range.start, range.end);
            claimed.push((
                Edit {
                    range: range.clone(),
                    replacement: replacement.clone(),
                },
                changes.len(),
            ));
            changes.push(Change {
                original: matched.to_string(),
                optimized: replacement,
                change_type: ChangeType::Enhancement,
                context: context_window(text, range.start, range.end, CONTEXT_RADIUS_CHARS),
            });
        }
    }

    claimed.sort_by_key(|(e, _)| e.range.start);

    let mut out = String::with_capacity(text.len());
    let mut highlights = Vec::with_capacity(claimed.len());
    let mut cursor = 0;
    for (edit, change_index) in &claimed {
        out.push_str(&text[cursor..edit.range.start]);
        let start = out.len();
        out.push_str(&edit.replacement);
        let change = &changes[*change_index];
        highlights.push(Highlight {
            start,
            end: out.len(),
            kind: ChangeType::Enhancement,
            tooltip: format!(
                "Enhanced \"{}\" to \"{}\"",
                change.original, change.optimized
            ),
            change_index: *change_index,
        });
        cursor = edit.range.end;
    }
    out.push_str(&text[cursor..]);

    debug!("Enhancement pass: {} replacements", changes.len());

    Enhancement {
        text: out,
        changes,
        highlights,
        edits: claimed.into_iter().map(|(e, _)| e).collect(),
    }
}

static METRIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?\s*(?:%|(?:percent|users|customers|dollars|revenue|growth|increase|decrease|improvement)\b)",
    )
    .expect("metric pattern compiles")
});

static DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}/\d{2,4}\b").expect("date pattern compiles"));

/// Annotates quantified achievements: a number followed by a unit such as `%` or `users`.
/// Numbers that are part of a date like `3/15/2024` are never flagged.
pub fn highlight_metrics(text: &str) -> Pass {
    let dates: Vec<Range<usize>> = DATE_RE.find_iter(text).map(|m| m.range()).collect();

    let mut pass = Pass::default();
    for m in METRIC_RE.find_iter(text) {
        let range = m.range();
        let glued_to_word = text[..range.start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '.' || c == ',');
        if glued_to_word || overlaps_sorted(&dates, &range, |d| d) {
            continue;
        }
        pass.push(
            Change {
                original: m.as_str().to_string(),
                optimized: m.as_str().to_string(),
                change_type: ChangeType::Metric,
                context: context_window(text, range.start, range.end, CONTEXT_RADIUS_CHARS),
            },
            range,
            format!("Quantified achievement: {}", m.as_str()),
        );
    }

    debug!("Metric pass: {} matches", pass.changes.len());
    pass
}

/// Runs keyword, enhancement and metric passes over `text` and merges them.
///
/// Change log order is keyword changes, then enhancements, then metrics.
/// Highlights are sorted by start, longer spans first. A metric whose text was
/// rewritten by an enhancement is dropped, since it no longer exists in the output.
pub fn rewrite<R: Rng + ?Sized>(
    text: &str,
    keywords: &[String],
    verbs: &VerbMap,
    rng: &mut R,
) -> Result<RewriteResult, AnalysisError> {
    let keyword_pass = highlight_keywords(text, keywords)?;
    let enhancement = apply_enhancement(text, verbs, rng);
    let metric_pass = highlight_metrics(text);

    let edits = EditMap::new(&enhancement.edits);

    let mut changes = keyword_pass.changes;
    let mut highlights: Vec<Highlight> = keyword_pass
        .highlights
        .into_iter()
        .map(|h| edits.highlight(h))
        .collect();

    let offset = changes.len();
    changes.extend(enhancement.changes);
    highlights.extend(enhancement.highlights.into_iter().map(|mut h| {
        h.change_index += offset;
        h
    }));

    for (change, h) in metric_pass.changes.into_iter().zip(metric_pass.highlights) {
        if edits.touches(&(h.start..h.end)) {
            continue;
        }
        let mut h = edits.highlight(h);
        h.change_index = changes.len();
        changes.push(change);
        highlights.push(h);
    }

    highlights.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let summary = summarize(&changes);
    Ok(RewriteResult {
        text: enhancement.text,
        changes,
        highlights,
        summary,
    })
}

pub fn summarize(changes: &[Change]) -> ChangeSummary {
    let mut summary = ChangeSummary {
        total: changes.len(),
        ..Default::default()
    };
    for c in changes {
        match c.change_type {
            ChangeType::Keyword => summary.keyword += 1,
            ChangeType::Enhancement => summary.enhancement += 1,
            ChangeType::Metric => summary.metric += 1,
        }
    }
    summary
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

impl Pass {
    fn push(&mut self, change: Change, range: Range<usize>, tooltip: String) {
        self.highlights.push(Highlight {
            start: range.start,
            end: range.end,
            kind: change.change_type,
            tooltip,
            change_index: self.changes.len(),
        });
        self.changes.push(change);
    }
}

fn phrase_key(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// True when `range` overlaps any of `items`, which must be sorted and non-overlapping.
fn overlaps_sorted<T>(items: &[T], range: &Range<usize>, span: impl Fn(&T) -> &Range<usize>) -> bool {
    let i = items.partition_point(|item| span(item).end <= range.start);
    items.get(i).is_some_and(|item| span(item).start < range.end)
}

/// Maps input offsets into rewritten-text coordinates through sorted, disjoint edits.
struct EditMap<'a> {
    edits: &'a [Edit],
    /// `shift[i]` is the total length change of `edits[..i]`.
    shift: Vec<isize>,
}

impl<'a> EditMap<'a> {
    fn new(edits: &'a [Edit]) -> Self {
        let mut shift = Vec::with_capacity(edits.len() + 1);
        let mut total: isize = 0;
        shift.push(total);
        for edit in edits {
            total += edit.replacement.len() as isize - edit.range.len() as isize;
            shift.push(total);
        }
        EditMap { edits, shift }
    }

    fn touches(&self, range: &Range<usize>) -> bool {
        overlaps_sorted(self.edits, range, |e| &e.range)
    }

    fn highlight(&self, mut h: Highlight) -> Highlight {
        h.start = self.offset(h.start, false);
        h.end = self.offset(h.end, true);
        h
    }

    /// An offset strictly inside an edit snaps outward to the edit's new start
    /// (span starts) or new end (span ends).
    fn offset(&self, pos: usize, is_end: bool) -> usize {
        let i = self.edits.partition_point(|e| e.range.end <= pos);
        let delta = self.shift[i];
        match self.edits.get(i) {
            Some(edit) if edit.range.start < pos => {
                let new_start = (edit.range.start as isize + delta) as usize;
                if is_end {
                    new_start + edit.replacement.len()
                } else {
                    new_start
                }
            }
            _ => (pos as isize + delta) as usize,
        }
    }
}
