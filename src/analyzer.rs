//! Turns raw page content into a rooms-available signal.
//!
//! The analysis is a pure function over the content: a handful of independent
//! signals are counted, combined into a score with fixed weights, and compared
//! against a fixed threshold. Weights, floors and the threshold together form
//! one versioned policy (`SCORING_POLICY_VERSION`) so behavior stays
//! reproducible without network access.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const SCORING_POLICY_VERSION: u32 = 1;

/// Score at or above which the page is declared to have rooms.
pub const AVAILABILITY_THRESHOLD: f32 = 4.0;

// Scoring policy v1. The explicit absence of a no-results message carries the
// largest weight; concrete listing and price evidence comes next; keyword
// volume and sheer content length only nudge the score.
const W_SENTINEL_ABSENT: f32 = 3.0;
const W_LISTINGS: f32 = 2.0;
const W_PRICES: f32 = 1.5;
const W_KEYWORDS: f32 = 1.0;
const W_FORMS: f32 = 0.5;
const W_LENGTH: f32 = 0.5;
const KEYWORD_FLOOR: usize = 4;
const LENGTH_FLOOR: usize = 20_000;

static NO_RESULTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)no results found|keine[ -]ergebnisse").unwrap());

static LISTING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:housing-offer-item|offer-item|list-item|result-item)\b").unwrap()
});

static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\d+(?:[.,]\d+)?\s*(?:€|eur\b)|€\s*\d+").unwrap());

static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:rooms?|flat|apartment|dorm|apply|wohnung|zimmer|wohnheim|bewerben|angebot|miete)\b")
        .unwrap()
});

static FORM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*(?:form|button|input|select)\b").unwrap());

/// Structured counts backing one availability call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentEvidence {
    pub has_no_results_message: bool,
    pub listings_count: usize,
    pub price_matches: usize,
    pub keyword_matches: usize,
    pub form_elements: usize,
    pub content_length: usize,
    pub score: f32,
    pub policy_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub rooms_available: bool,
    pub rationale: String,
    pub evidence: ContentEvidence,
}

/// True when the page carries an explicit "no results" message in either
/// supported language.
pub fn has_no_results_sentinel(content: &str) -> bool {
    NO_RESULTS_RE.is_match(content)
}

/// Scores `content` against the fixed availability policy.
/// Deterministic: identical content always yields an identical result.
pub fn analyze(content: &str) -> Analysis {
    let has_no_results_message = has_no_results_sentinel(content);
    let listings_count = LISTING_RE.find_iter(content).count();
    let price_matches = PRICE_RE.find_iter(content).count();
    let keyword_matches = KEYWORD_RE.find_iter(content).count();
    let form_elements = FORM_RE.find_iter(content).count();
    let content_length = content.len();

    let mut score = 0.0;
    if !has_no_results_message {
        score += W_SENTINEL_ABSENT;
    }
    if listings_count >= 1 {
        score += W_LISTINGS;
    }
    if price_matches >= 1 {
        score += W_PRICES;
    }
    if keyword_matches >= KEYWORD_FLOOR {
        score += W_KEYWORDS;
    }
    if form_elements >= 1 {
        score += W_FORMS;
    }
    if content_length >= LENGTH_FLOOR {
        score += W_LENGTH;
    }

    let rooms_available = score >= AVAILABILITY_THRESHOLD;

    let rationale = if has_no_results_message && !rooms_available {
        "Explicit no-results message present".to_string()
    } else if rooms_available && listings_count > 0 {
        format!("{listings_count} listing elements found (score {score:.1})")
    } else if rooms_available {
        format!("Availability signals above threshold (score {score:.1})")
    } else {
        format!("No listings detected (score {score:.1})")
    };

    Analysis {
        rooms_available,
        rationale,
        evidence: ContentEvidence {
            has_no_results_message,
            listings_count,
            price_matches,
            keyword_matches,
            form_elements,
            content_length,
            score,
            policy_version: SCORING_POLICY_VERSION,
        },
    }
}
