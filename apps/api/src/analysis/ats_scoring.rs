//! ATS scoring — heuristic applicant-tracking compatibility model.
//!
//! Sub-scores (each 0–100):
//! - keyword match: share of target keywords found as whole whitespace tokens
//! - readability: four structural probes (header, section heading, body text, bullets)
//! - formatting: five layout heuristics
//! - certifications: share of known certifications mentioned
//! - fonts: 100 if any allow-listed font is declared, else 0
//!
//! `overall` is the unweighted mean of keyword, readability, formatting and
//! certification scores. The font score is reported but left out of the mean.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Output data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub overall: f64,
    pub keyword_match: f64,
    pub formatting: f64,
    pub readability: f64,
    pub certifications: f64,
    pub fonts: f64,
}

/// Result of a single pass/fail probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub met: bool,
    pub details: String,
}

pub type ReadabilityCheck = Check;
pub type FormattingCheck = Check;
pub type FontCheck = Check;
pub type CertificationCheck = Check;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub keyword: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCoverage {
    pub score: f64,
    pub occurrences: Vec<KeywordCount>,
    pub missing: Vec<String>,
}

/// Full ATS report returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtsReport {
    pub breakdown: ScoreBreakdown,
    pub keyword_coverage: KeywordCoverage,
    pub readability: Vec<ReadabilityCheck>,
    pub formatting: Vec<FormattingCheck>,
    pub fonts: Vec<FontCheck>,
    pub certifications: Vec<CertificationCheck>,
    pub recommendations: Vec<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Fixed probes
// ────────────────────────────────────────────────────────────────────────────

/// Minimum character count for the length heuristic (exclusive).
const MIN_TEXT_CHARS: usize = 300;

/// Number of missing keywords named in a recommendation.
const MAX_LISTED_MISSING: usize = 5;

struct Probe {
    name: &'static str,
    details: &'static str,
    pattern: Regex,
}

fn probe(name: &'static str, details: &'static str, pattern: &str) -> Probe {
    Probe {
        name,
        details,
        pattern: Regex::new(pattern).expect("static probe pattern compiles"),
    }
}

static READABILITY_PROBES: Lazy<Vec<Probe>> = Lazy::new(|| {
    vec![
        probe(
            "Header",
            "Document opens with a short capitalized header line (name or title)",
            r"\A\s*[A-Z][^\n]{1,59}(?:\r?\n|\z)",
        ),
        probe(
            "Section Headings",
            "An all-caps section heading line ending in a colon, e.g. EXPERIENCE:",
            r"(?m)^[ \t]*[A-Z][A-Z0-9 &/'-]{2,}:[ \t]*\r?$",
        ),
        probe(
            "Body Text",
            "At least one plain sentence line of five or more words",
            r"(?m)^[ \t]*[A-Za-z][a-z]*(?:[ ,;]+[A-Za-z0-9%$.'()/-]+){4,}[.!?]?[ \t]*\r?$",
        ),
        probe(
            "Bullet Points",
            "Achievements listed as bullet lines",
            r"(?m)^[ \t]*[•\-*▪◦‣][ \t]+\S",
        ),
    ]
});

static FORMATTING_PROBES: Lazy<Vec<Probe>> = Lazy::new(|| {
    vec![
        probe(
            "Paragraph Breaks",
            "Sections separated by blank lines",
            r"\n[ \t]*\r?\n",
        ),
        probe(
            "Section Headings",
            "A capitalized heading terminated by a colon",
            r"(?m)^[ \t]*[A-Z][A-Za-z &/]*:",
        ),
        probe(
            "Bullet Points",
            "Bullet characters at the start of lines",
            r"(?m)^[ \t]*[•\-*]",
        ),
    ]
});

const ALLOWED_FONTS: &[&str] = &["Arial", "Calibri", "Helvetica", "Times New Roman"];

static FONT_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    ALLOWED_FONTS
        .iter()
        .map(|&name| {
            let words: Vec<String> = name.split_whitespace().map(regex::escape).collect();
            let pattern = format!(r"(?i)font-family\s*:\s*[^;}}\n]*\b{}\b", words.join(r"\s+"));
            (name, Regex::new(&pattern).expect("font pattern compiles"))
        })
        .collect()
});

const CERTIFICATIONS: &[(&str, &[&str])] = &[
    (
        "AWS Certified",
        &["aws certified", "aws solutions architect", "aws certified developer"],
    ),
    ("PMP", &["pmp", "project management professional"]),
    (
        "Certified ScrumMaster",
        &["csm", "certified scrummaster", "certified scrum master"],
    ),
    (
        "CISSP",
        &["cissp", "certified information systems security professional"],
    ),
    (
        "Google Cloud Certified",
        &["google cloud certified", "gcp certified", "professional cloud architect"],
    ),
];

static CERTIFICATION_PATTERNS: Lazy<Vec<(&'static str, String, Regex)>> = Lazy::new(|| {
    CERTIFICATIONS
        .iter()
        .map(|&(name, synonyms)| {
            let alternatives: Vec<String> = synonyms
                .iter()
                .map(|s| {
                    s.split_whitespace()
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join(r"\s+")
                })
                .collect();
            let pattern = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
            (
                name,
                synonyms.join(", "),
                Regex::new(&pattern).expect("certification pattern compiles"),
            )
        })
        .collect()
});

// ────────────────────────────────────────────────────────────────────────────
// Sub-scores
// ────────────────────────────────────────────────────────────────────────────

/// Counts whitespace tokens equal (case-insensitively) to each keyword.
///
/// This is exact token equality: punctuation stays attached to tokens and
/// multi-word keywords never match. An empty keyword list scores 100.
pub fn keyword_coverage(text: &str, keywords: &[String]) -> KeywordCoverage {
    let tokens: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();

    let occurrences: Vec<KeywordCount> = keywords
        .iter()
        .map(|kw| {
            let needle = kw.to_lowercase();
            KeywordCount {
                keyword: kw.clone(),
                count: tokens.iter().filter(|t| **t == needle).count(),
            }
        })
        .collect();

    let missing: Vec<String> = occurrences
        .iter()
        .filter(|o| o.count == 0)
        .map(|o| o.keyword.clone())
        .collect();

    let score = if keywords.is_empty() {
        100.0
    } else {
        (keywords.len() - missing.len()) as f64 / keywords.len() as f64 * 100.0
    };

    KeywordCoverage {
        score,
        occurrences,
        missing,
    }
}

fn run_probes(text: &str, probes: &[Probe]) -> Vec<Check> {
    probes
        .iter()
        .map(|p| Check {
            name: p.name.to_string(),
            met: p.pattern.is_match(text),
            details: p.details.to_string(),
        })
        .collect()
}

pub fn readability_checks(text: &str) -> Vec<ReadabilityCheck> {
    run_probes(text, &READABILITY_PROBES)
}

pub fn formatting_checks(text: &str) -> Vec<FormattingCheck> {
    let mut checks = run_probes(text, &FORMATTING_PROBES);
    checks.push(Check {
        name: "Sufficient Length".to_string(),
        met: text.chars().count() > MIN_TEXT_CHARS,
        details: format!("More than {MIN_TEXT_CHARS} characters of content"),
    });
    checks.push(Check {
        name: "Plain ASCII".to_string(),
        met: text.is_ascii(),
        details: "No non-ASCII characters that parsers may garble".to_string(),
    });
    checks
}

pub fn font_checks(text: &str) -> Vec<FontCheck> {
    FONT_PATTERNS
        .iter()
        .map(|(name, re)| Check {
            name: name.to_string(),
            met: re.is_match(text),
            details: format!("font-family declaration naming {name}"),
        })
        .collect()
}

pub fn certification_checks(text: &str) -> Vec<CertificationCheck> {
    CERTIFICATION_PATTERNS
        .iter()
        .map(|(name, synonyms, re)| Check {
            name: name.to_string(),
            met: re.is_match(text),
            details: format!("Accepted forms: {synonyms}"),
        })
        .collect()
}

/// Share of checks met, as a percentage. No checks scores 0.
pub fn fraction_score(checks: &[Check]) -> f64 {
    if checks.is_empty() {
        return 0.0;
    }
    checks.iter().filter(|c| c.met).count() as f64 / checks.len() as f64 * 100.0
}

/// Binary: any declared allow-listed font is enough.
pub fn font_score(checks: &[FontCheck]) -> f64 {
    if checks.iter().any(|c| c.met) {
        100.0
    } else {
        0.0
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Composite
// ────────────────────────────────────────────────────────────────────────────

/// Runs every check and combines them. Never fails; any string is valid input.
pub fn score(text: &str, keywords: &[String]) -> AtsReport {
    let keyword_coverage = keyword_coverage(text, keywords);
    let readability = readability_checks(text);
    let formatting = formatting_checks(text);
    let fonts = font_checks(text);
    let certifications = certification_checks(text);

    let keyword_match = keyword_coverage.score;
    let readability_score = fraction_score(&readability);
    let formatting_score = fraction_score(&formatting);
    let certification_score = fraction_score(&certifications);

    let breakdown = ScoreBreakdown {
        overall: (keyword_match + readability_score + formatting_score + certification_score) / 4.0,
        keyword_match,
        formatting: formatting_score,
        readability: readability_score,
        certifications: certification_score,
        fonts: font_score(&fonts),
    };

    debug!(
        "ATS score: overall={:.1} keywords={:.1} readability={:.1} formatting={:.1} certs={:.1} fonts={:.0}",
        breakdown.overall,
        breakdown.keyword_match,
        breakdown.readability,
        breakdown.formatting,
        breakdown.certifications,
        breakdown.fonts
    );

    let recommendations = build_recommendations(
        &breakdown,
        &keyword_coverage.missing,
        readability.iter().chain(formatting.iter()),
    );

    AtsReport {
        breakdown,
        keyword_coverage,
        readability,
        formatting,
        fonts,
        certifications,
        recommendations,
    }
}

/// Overall verdict first, then one line per gap.
fn build_recommendations<'a>(
    breakdown: &ScoreBreakdown,
    missing: &[String],
    structural: impl Iterator<Item = &'a Check>,
) -> Vec<String> {
    let overall = breakdown.overall.round() as u32;
    let mut recs = vec![if overall >= 80 {
        "Strong ATS compatibility.".to_string()
    } else if overall >= 60 {
        format!("Moderate ATS compatibility ({overall}/100).")
    } else {
        format!("Low ATS compatibility ({overall}/100). Address the gaps below before submitting.")
    }];

    if !missing.is_empty() {
        let listed: Vec<&str> = missing
            .iter()
            .take(MAX_LISTED_MISSING)
            .map(String::as_str)
            .collect();
        recs.push(format!("Add missing keywords: {}.", listed.join(", ")));
    }

    for check in structural.filter(|c| !c.met) {
        recs.push(format!("{}: {}.", check.name, check.details));
    }

    if breakdown.fonts == 0.0 {
        recs.push(format!(
            "Declare an ATS-safe font: {}.",
            ALLOWED_FONTS.join(", ")
        ));
    }

    recs
}
