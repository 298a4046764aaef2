//! Property-based tests for the offer status workflow
//!
//! The transition table is the only source of truth for what an offer may do
//! next. These tests drive random status walks through the table and check that
//! the derived lookups (terminal detection, progress, step lists, timelines)
//! agree with it.

use bayern_ankauf::workflow::{
    HAPPY_PATH, OfferStatus, StatusHistoryEntry, StepState, generate_timeline, get_next_statuses,
    get_progress_percentage, get_status_steps, is_terminal_status, is_valid_transition,
};
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

// These property tests cover:
//
// 1. Consistency between the transition predicate and the successor list
// 2. Terminal detection agrees with an empty successor list
// 3. Random walks along legal edges always end in a terminal status
// 4. Step lists have exactly one current step once an offer is submitted
// 5. Timelines keep the length and order of their history
//
// Persisting status changes is covered by the scenarios in `scenarios.rs`.

fn status_strategy() -> impl Strategy<Value = OfferStatus> {
    prop::sample::select(OfferStatus::ALL.to_vec())
}

/// Walks the graph from ENTWURF, picking successors by the given indices
fn walk(choices: &[usize]) -> Vec<OfferStatus> {
    let mut path = vec![OfferStatus::Entwurf];
    for choice in choices {
        let current = *path.last().expect("path starts non-empty");
        let next = get_next_statuses(current);
        if next.is_empty() {
            break;
        }
        path.push(next[choice % next.len()]);
    }
    path
}

proptest! {
    /// Property: is_valid_transition(from, to) holds iff to is a listed successor
    #[test]
    fn prop_transition_matches_successors(from in status_strategy(), to in status_strategy()) {
        prop_assert_eq!(
            is_valid_transition(from, to),
            get_next_statuses(from).contains(&to)
        );
    }

    /// Property: a status is terminal iff it has no successors
    #[test]
    fn prop_terminal_iff_no_successors(status in status_strategy()) {
        prop_assert_eq!(is_terminal_status(status), get_next_statuses(status).is_empty());
    }

    /// Property: no status may transition to itself
    #[test]
    fn prop_no_self_transitions(status in status_strategy()) {
        prop_assert!(!is_valid_transition(status, status));
    }

    /// Property: every legal walk reaches a terminal status within ten steps
    ///
    /// The graph is acyclic, so following successors must end. Terminal states
    /// always report full progress.
    #[test]
    fn prop_walks_terminate(choices in prop::collection::vec(any::<usize>(), 10)) {
        let path = walk(&choices);
        let last = *path.last().unwrap();

        prop_assert!(is_terminal_status(last), "walk ended in {:?}", path);
        prop_assert_eq!(get_progress_percentage(last), 100);

        for pair in path.windows(2) {
            prop_assert!(is_valid_transition(pair[0], pair[1]));
        }
    }

    /// Property: progress stays within 0..=100
    #[test]
    fn prop_progress_in_range(status in status_strategy()) {
        prop_assert!(get_progress_percentage(status) <= 100);
    }

    /// Property: once submitted, exactly one step is current and nothing after it is completed
    #[test]
    fn prop_single_current_step(status in status_strategy()) {
        let steps = get_status_steps(status);
        let current: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.state == StepState::Current)
            .map(|(i, _)| i)
            .collect();

        if status == OfferStatus::Entwurf {
            prop_assert!(current.is_empty());
        } else {
            prop_assert_eq!(current.len(), 1);
            let index = current[0];
            prop_assert_eq!(steps[index].status, status);
            prop_assert!(steps[..index].iter().all(|s| s.state == StepState::Completed));
            prop_assert!(steps[index + 1..].iter().all(|s| s.state == StepState::Upcoming));
        }
    }

    /// Property: the timeline mirrors the history one to one
    #[test]
    fn prop_timeline_preserves_history(choices in prop::collection::vec(any::<usize>(), 0..10)) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        let history: Vec<StatusHistoryEntry> = walk(&choices)
            .into_iter()
            .enumerate()
            .map(|(i, status)| StatusHistoryEntry {
                status,
                timestamp: start + Duration::hours(i as i64),
            })
            .collect();

        let timeline = generate_timeline(&history);

        prop_assert_eq!(timeline.len(), history.len());
        for (entry, source) in timeline.iter().zip(&history) {
            prop_assert_eq!(entry.status, source.status);
            prop_assert_eq!(entry.timestamp, source.timestamp);
            prop_assert_eq!(entry.title, source.status.label());
        }
    }
}

#[test]
fn happy_path_is_a_legal_chain() {
    assert!(is_valid_transition(OfferStatus::Entwurf, HAPPY_PATH[0]));
    for pair in HAPPY_PATH.windows(2) {
        assert!(is_valid_transition(pair[0], pair[1]), "{} -> {}", pair[0], pair[1]);
    }
    assert!(is_terminal_status(*HAPPY_PATH.last().unwrap()));
}
