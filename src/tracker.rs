//! Stateful comparison of the current observation against the previous one.
//!
//! The tracker owns exactly the "previous" observation summary and decides
//! whether a cycle's result is worth a notification. State is updated every
//! cycle regardless of the decision so drift never compounds.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::analyzer::{Analysis, ContentEvidence};

/// Fixed-length hex fingerprint of page content.
pub fn fingerprint(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// One fetch cycle's immutable result.
#[derive(Debug, Clone)]
pub struct Observation {
    pub fetched_at: DateTime<Utc>,
    pub fingerprint: String,
    pub rooms_available: bool,
    pub rationale: String,
    pub evidence: ContentEvidence,
}

impl Observation {
    pub fn from_analysis(content: &str, analysis: Analysis) -> Self {
        Self {
            fetched_at: Utc::now(),
            fingerprint: fingerprint(content),
            rooms_available: analysis.rooms_available,
            rationale: analysis.rationale,
            evidence: analysis.evidence,
        }
    }
}

/// Summary of the previous observation. Starts empty; after the first
/// completed cycle all fields are always set together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerState {
    pub last_fingerprint: Option<String>,
    pub last_rooms_available: Option<bool>,
    pub last_content_len: Option<usize>,
}

impl TrackerState {
    pub fn has_prior_observation(&self) -> bool {
        self.last_fingerprint.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyReason {
    /// Rooms are listed and the page changed or the signal flipped.
    RoomsAvailable,
    /// The page changed in a way the analyzer could not classify; lower
    /// confidence, defends against analyzer false negatives.
    PossibleChange,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub notify: Option<NotifyReason>,
    pub reason: String,
}

/// Tunable knobs for the change decision.
#[derive(Debug, Clone, Default)]
pub struct TrackerPolicy {
    /// When set, a content-length delta of at least this many characters also
    /// counts as a possible change, even if the page still shows its
    /// no-results message. Disabled by default: it is deliberately lossy and
    /// prone to false positives.
    pub ambiguous_min_length_delta: Option<usize>,
}

/// Compares `obs` against `state` and returns the notify decision together
/// with the successor state. Pure; the caller commits the new state.
pub fn evaluate(
    obs: &Observation,
    state: &TrackerState,
    policy: &TrackerPolicy,
) -> (Decision, TrackerState) {
    let new_state = TrackerState {
        last_fingerprint: Some(obs.fingerprint.clone()),
        last_rooms_available: Some(obs.rooms_available),
        last_content_len: Some(obs.evidence.content_length),
    };

    let (Some(prev_fingerprint), Some(prev_available)) =
        (&state.last_fingerprint, state.last_rooms_available)
    else {
        // First cycle: establish the baseline, never notify.
        return (
            Decision {
                notify: None,
                reason: format!("Initial observation recorded - {}", obs.rationale),
            },
            new_state,
        );
    };

    let content_changed = *prev_fingerprint != obs.fingerprint;
    let flipped_to_available = obs.rooms_available && !prev_available;

    let decision = if obs.rooms_available && (content_changed || flipped_to_available) {
        Decision {
            notify: Some(NotifyReason::RoomsAvailable),
            reason: format!("Rooms available! {}", obs.rationale),
        }
    } else if !obs.rooms_available
        && content_changed
        && !obs.evidence.has_no_results_message
    {
        Decision {
            notify: Some(NotifyReason::PossibleChange),
            reason: "Content changed without an explicit no-results message".to_string(),
        }
    } else if let Some(min_delta) = policy.ambiguous_min_length_delta {
        let delta = state
            .last_content_len
            .map(|prev| prev.abs_diff(obs.evidence.content_length))
            .unwrap_or(0);
        if !obs.rooms_available && delta >= min_delta {
            Decision {
                notify: Some(NotifyReason::PossibleChange),
                reason: format!("Content length shifted by {delta} characters"),
            }
        } else {
            no_change_decision(obs, content_changed)
        }
    } else {
        no_change_decision(obs, content_changed)
    };

    (decision, new_state)
}

fn no_change_decision(obs: &Observation, content_changed: bool) -> Decision {
    let reason = if content_changed {
        format!("Content changed but no rooms: {}", obs.rationale)
    } else {
        format!("No changes detected: {}", obs.rationale)
    };
    Decision {
        notify: None,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::analyze;

    const OFFERS_PAGE: &str = r#"
        <div class="housing-offer-item">Room, 450 €</div>
        <div class="housing-offer-item">Apartment</div>
        <form><input></form>
    "#;

    const NO_RESULTS_PAGE: &str =
        r#"<div>No results found for the given search criteria</div>"#;

    fn observe(content: &str) -> Observation {
        Observation::from_analysis(content, analyze(content))
    }

    #[test]
    fn first_cycle_never_notifies() {
        let obs = observe(OFFERS_PAGE);
        assert!(obs.rooms_available);
        let (decision, new_state) =
            evaluate(&obs, &TrackerState::default(), &TrackerPolicy::default());
        assert!(decision.notify.is_none());
        assert!(new_state.has_prior_observation());
    }

    #[test]
    fn state_fields_are_set_together_after_first_cycle() {
        let obs = observe(NO_RESULTS_PAGE);
        let (_, state) = evaluate(&obs, &TrackerState::default(), &TrackerPolicy::default());
        assert!(state.last_fingerprint.is_some());
        assert!(state.last_rooms_available.is_some());
        assert!(state.last_content_len.is_some());
    }

    #[test]
    fn transition_to_available_notifies() {
        let policy = TrackerPolicy::default();
        let (_, state) = evaluate(&observe(NO_RESULTS_PAGE), &TrackerState::default(), &policy);
        let obs = observe(OFFERS_PAGE);
        let (decision, _) = evaluate(&obs, &state, &policy);
        assert_eq!(decision.notify, Some(NotifyReason::RoomsAvailable));
    }

    #[test]
    fn identical_fingerprint_twice_stays_quiet() {
        let policy = TrackerPolicy::default();
        let (_, state) = evaluate(&observe(NO_RESULTS_PAGE), &TrackerState::default(), &policy);
        let (decision, _) = evaluate(&observe(NO_RESULTS_PAGE), &state, &policy);
        assert!(decision.notify.is_none());
    }

    #[test]
    fn no_flap_when_still_available_and_unchanged() {
        let policy = TrackerPolicy::default();
        let (_, state) = evaluate(&observe(OFFERS_PAGE), &TrackerState::default(), &policy);
        let (decision, _) = evaluate(&observe(OFFERS_PAGE), &state, &policy);
        assert!(decision.notify.is_none());
    }

    #[test]
    fn availability_flip_notifies_even_without_content_change() {
        // Should not occur with a deterministic analyzer, but the availability
        // signal takes precedence over fingerprint equality.
        let policy = TrackerPolicy::default();
        let obs = observe(OFFERS_PAGE);
        let state = TrackerState {
            last_fingerprint: Some(obs.fingerprint.clone()),
            last_rooms_available: Some(false),
            last_content_len: Some(obs.evidence.content_length),
        };
        let (decision, _) = evaluate(&obs, &state, &policy);
        assert_eq!(decision.notify, Some(NotifyReason::RoomsAvailable));
    }

    #[test]
    fn ambiguous_change_without_sentinel_notifies_low_confidence() {
        let policy = TrackerPolicy::default();
        let first = "<div>some unrelated page body</div>";
        let second = "<div>some different page body without listings</div>";
        let (_, state) = evaluate(&observe(first), &TrackerState::default(), &policy);
        let obs = observe(second);
        assert!(!obs.rooms_available || obs.evidence.listings_count == 0);
        let (decision, _) = evaluate(&obs, &state, &policy);
        // Neither page has the sentinel, both are unavailable only if score
        // stays below threshold; a changed fingerprint without a sentinel is
        // a possible change.
        if !obs.rooms_available {
            assert_eq!(decision.notify, Some(NotifyReason::PossibleChange));
        }
    }

    #[test]
    fn changed_page_with_sentinel_stays_quiet_by_default() {
        let policy = TrackerPolicy::default();
        let first = r#"<div>No results found for the given search criteria. A</div>"#;
        let second = r#"<div>No results found for the given search criteria. B</div>"#;
        let (_, state) = evaluate(&observe(first), &TrackerState::default(), &policy);
        let (decision, _) = evaluate(&observe(second), &state, &policy);
        assert!(decision.notify.is_none());
    }

    #[test]
    fn length_delta_knob_triggers_possible_change() {
        let policy = TrackerPolicy {
            ambiguous_min_length_delta: Some(100),
        };
        let first = r#"<div>No results found for the given search criteria.</div>"#;
        let second = format!(
            r#"<div>No results found for the given search criteria.</div>{}"#,
            "x".repeat(500)
        );
        let (_, state) = evaluate(&observe(first), &TrackerState::default(), &policy);
        let (decision, _) = evaluate(&observe(&second), &state, &policy);
        assert_eq!(decision.notify, Some(NotifyReason::PossibleChange));
    }
}
