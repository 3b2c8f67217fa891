/// Monitoring engine module - probe execution and failure tracking
///
/// This module is responsible for:
/// - Performing HTTP probes against endpoint URLs
/// - Deciding which endpoints are due for a probe (interval policy)
/// - Converting probe outcomes into status transitions (state machine)
pub mod policy;
pub mod prober;
pub mod state;
pub mod types;

pub use prober::{HttpProber, Prober};
pub use types::{EpisodeChange, Evaluation, ProbeOutcome, TransitionEvent};
