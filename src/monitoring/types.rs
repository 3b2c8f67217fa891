use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{EndpointSnapshot, EndpointStatus};

/// Classified result of one probe attempt
///
/// Network failures never cross the prober boundary as errors; they are
/// converted into a failed outcome with a descriptive reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub success: bool,
    /// Human-readable failure reason; always present when `success` is false
    pub reason: Option<String>,
}

impl ProbeOutcome {
    pub fn success() -> Self {
        Self { success: true, reason: None }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self { success: false, reason: Some(reason.into()) }
    }
}

/// One-shot output event of the failure/recovery state machine
///
/// Emitted only on the `Warning/Online -> Offline` confirmation edge and the
/// `Offline -> Online` recovery edge, never on repeated visits to a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    Alert,
    Recovery,
}

/// New endpoint state produced by evaluating one probe outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub status: EndpointStatus,
    pub first_failure_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub event: Option<TransitionEvent>,
}

/// Pending mutation of the downtime audit trail, applied atomically with the
/// rest of the sweep's changes at commit time
#[derive(Debug, Clone)]
pub enum EpisodeChange {
    /// Open a new episode on the alert edge
    Open {
        endpoint_uuid: Uuid,
        snapshot: EndpointSnapshot,
        start_time: DateTime<Utc>,
        last_error: Option<String>,
    },
    /// Terminate the currently open episode on the recovery edge
    Close { endpoint_uuid: Uuid, end_time: DateTime<Utc> },
}
