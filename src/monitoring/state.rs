//! Failure/recovery state machine for monitored endpoints.
//!
//! Pure function over the endpoint's stored failure state and one probe
//! outcome. Alert and recovery events are tied to transition edges only:
//! the sweep that first confirms an outage past the threshold, and the sweep
//! that observes a success while the stored status is Offline. The previous
//! status must be read before any field is mutated.

use chrono::{DateTime, Duration, Utc};

use super::types::{Evaluation, ProbeOutcome, TransitionEvent};
use crate::database::models::EndpointStatus;

/// Evaluate one probe outcome against an endpoint's accumulated failure
/// state, producing the new status and at most one transition event.
///
/// `threshold` is how long a failure streak must persist before the endpoint
/// is declared Offline. The caller applies `last_checked_at = now`
/// unconditionally alongside the returned fields.
pub fn evaluate(
    previous_status: EndpointStatus,
    first_failure_time: Option<DateTime<Utc>>,
    outcome: &ProbeOutcome,
    now: DateTime<Utc>,
    threshold: Duration,
) -> Evaluation {
    if outcome.success {
        let event =
            (previous_status == EndpointStatus::Offline).then_some(TransitionEvent::Recovery);
        return Evaluation {
            status: EndpointStatus::Online,
            first_failure_time: None,
            last_error: None,
            event,
        };
    }

    let reason = outcome.reason.clone();

    match first_failure_time {
        // First failure of a new streak
        None => Evaluation {
            status: EndpointStatus::Warning,
            first_failure_time: Some(now),
            last_error: reason,
            event: None,
        },
        Some(first) => {
            if now - first >= threshold {
                // Streak has outlasted the threshold: confirmed Offline.
                // The alert fires only on the sweep that confirms it.
                let event = (previous_status != EndpointStatus::Offline)
                    .then_some(TransitionEvent::Alert);
                Evaluation {
                    status: EndpointStatus::Offline,
                    first_failure_time: Some(first),
                    last_error: reason,
                    event,
                }
            } else {
                Evaluation {
                    status: EndpointStatus::Warning,
                    first_failure_time: Some(first),
                    last_error: reason,
                    event: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold() -> Duration {
        Duration::minutes(15)
    }

    #[test]
    fn test_first_failure_enters_warning_without_event() {
        let now = Utc::now();
        let eval = evaluate(
            EndpointStatus::Online,
            None,
            &ProbeOutcome::failure("Status Code: 500"),
            now,
            threshold(),
        );

        assert_eq!(eval.status, EndpointStatus::Warning);
        assert_eq!(eval.first_failure_time, Some(now));
        assert_eq!(eval.last_error.as_deref(), Some("Status Code: 500"));
        assert_eq!(eval.event, None);
    }

    #[test]
    fn test_streak_below_threshold_stays_warning() {
        let now = Utc::now();
        let first = now - Duration::minutes(14);
        let eval = evaluate(
            EndpointStatus::Warning,
            Some(first),
            &ProbeOutcome::failure("Status Code: 500"),
            now,
            threshold(),
        );

        assert_eq!(eval.status, EndpointStatus::Warning);
        assert_eq!(eval.first_failure_time, Some(first));
        assert_eq!(eval.event, None);
    }

    #[test]
    fn test_streak_past_threshold_confirms_offline_and_alerts_once() {
        let now = Utc::now();
        let first = now - Duration::minutes(16);
        let eval = evaluate(
            EndpointStatus::Warning,
            Some(first),
            &ProbeOutcome::failure("Status Code: 500"),
            now,
            threshold(),
        );

        assert_eq!(eval.status, EndpointStatus::Offline);
        assert_eq!(eval.first_failure_time, Some(first));
        assert_eq!(eval.event, Some(TransitionEvent::Alert));
    }

    #[test]
    fn test_streak_exactly_at_threshold_confirms_offline() {
        let now = Utc::now();
        let first = now - threshold();
        let eval = evaluate(
            EndpointStatus::Warning,
            Some(first),
            &ProbeOutcome::failure("Connection Error: refused"),
            now,
            threshold(),
        );

        assert_eq!(eval.status, EndpointStatus::Offline);
        assert_eq!(eval.event, Some(TransitionEvent::Alert));
    }

    #[test]
    fn test_continued_offline_emits_no_further_events() {
        let now = Utc::now();
        let first = now - Duration::hours(2);
        let eval = evaluate(
            EndpointStatus::Offline,
            Some(first),
            &ProbeOutcome::failure("Connection Error: timed out"),
            now,
            threshold(),
        );

        assert_eq!(eval.status, EndpointStatus::Offline);
        assert_eq!(eval.event, None);
    }

    #[test]
    fn test_recovery_from_offline_emits_recovery() {
        let now = Utc::now();
        let eval = evaluate(
            EndpointStatus::Offline,
            Some(now - Duration::hours(1)),
            &ProbeOutcome::success(),
            now,
            threshold(),
        );

        assert_eq!(eval.status, EndpointStatus::Online);
        assert_eq!(eval.first_failure_time, None);
        assert_eq!(eval.last_error, None);
        assert_eq!(eval.event, Some(TransitionEvent::Recovery));
    }

    #[test]
    fn test_success_from_warning_clears_state_without_event() {
        let now = Utc::now();
        let eval = evaluate(
            EndpointStatus::Warning,
            Some(now - Duration::minutes(5)),
            &ProbeOutcome::success(),
            now,
            threshold(),
        );

        assert_eq!(eval.status, EndpointStatus::Online);
        assert_eq!(eval.first_failure_time, None);
        assert_eq!(eval.event, None);
    }

    #[test]
    fn test_success_from_online_is_a_noop_edge() {
        let now = Utc::now();
        let eval =
            evaluate(EndpointStatus::Online, None, &ProbeOutcome::success(), now, threshold());

        assert_eq!(eval.status, EndpointStatus::Online);
        assert_eq!(eval.event, None);
    }

    /// Re-running with identical inputs after the stored status was updated
    /// must yield the same state but no duplicate event.
    #[test]
    fn test_idempotent_rerun_emits_no_duplicate_alert() {
        let now = Utc::now();
        let first = now - Duration::minutes(20);
        let outcome = ProbeOutcome::failure("Status Code: 502");

        let one = evaluate(EndpointStatus::Warning, Some(first), &outcome, now, threshold());
        assert_eq!(one.event, Some(TransitionEvent::Alert));

        // Stored status is now Offline; same probe result, same clock.
        let two = evaluate(one.status, one.first_failure_time, &outcome, now, threshold());
        assert_eq!(two.status, one.status);
        assert_eq!(two.first_failure_time, one.first_failure_time);
        assert_eq!(two.event, None);
    }

    /// first_failure_time is set exactly when the status is not Online.
    #[test]
    fn test_failure_state_invariant_holds_on_every_branch() {
        let now = Utc::now();
        let cases = [
            evaluate(EndpointStatus::Online, None, &ProbeOutcome::success(), now, threshold()),
            evaluate(
                EndpointStatus::Online,
                None,
                &ProbeOutcome::failure("Status Code: 500"),
                now,
                threshold(),
            ),
            evaluate(
                EndpointStatus::Warning,
                Some(now - Duration::minutes(5)),
                &ProbeOutcome::failure("Status Code: 500"),
                now,
                threshold(),
            ),
            evaluate(
                EndpointStatus::Warning,
                Some(now - Duration::minutes(20)),
                &ProbeOutcome::failure("Status Code: 500"),
                now,
                threshold(),
            ),
            evaluate(
                EndpointStatus::Offline,
                Some(now - Duration::hours(1)),
                &ProbeOutcome::success(),
                now,
                threshold(),
            ),
        ];

        for eval in cases {
            assert_eq!(
                eval.first_failure_time.is_some(),
                eval.status != EndpointStatus::Online
            );
        }
    }
}
