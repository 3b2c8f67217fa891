use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Health classification of a monitored endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    Online,
    Warning,
    Offline,
}

impl std::fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointStatus::Online => write!(f, "online"),
            EndpointStatus::Warning => write!(f, "warning"),
            EndpointStatus::Offline => write!(f, "offline"),
        }
    }
}

impl EndpointStatus {
    /// Parse a stored status string; unknown values fall back to Online
    pub fn parse(s: &str) -> Self {
        match s {
            "warning" => EndpointStatus::Warning,
            "offline" => EndpointStatus::Offline,
            _ => EndpointStatus::Online,
        }
    }
}

/// Endpoint model - a monitored HTTP target
///
/// Invariant maintained by the sweep engine: `first_failure_time` is set
/// if and only if `status != Online`, and an Offline endpoint has exactly
/// one open downtime episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Option<i64>,
    pub uuid: Uuid,
    pub name: String,
    pub url: String,
    /// When set, a 200 response must contain this substring to count as healthy
    pub expected_text: Option<String>,
    pub status: EndpointStatus,
    pub first_failure_time: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Endpoint {
    /// Create a new endpoint; the URL must already be normalized
    /// (see `validation::normalize_url`)
    pub fn new(name: String, url: String) -> Self {
        Self {
            id: None,
            uuid: Uuid::new_v4(),
            name,
            url,
            expected_text: None,
            status: EndpointStatus::Online,
            first_failure_time: None,
            last_checked_at: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    /// Denormalized name/url copy embedded in episodes at open time, so
    /// history stays meaningful after the endpoint is deleted
    pub fn snapshot(&self) -> EndpointSnapshot {
        EndpointSnapshot { name: self.name.clone(), url: self.url.clone() }
    }

    /// Convert a timestamp to unix seconds for storage
    pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
        time.timestamp()
    }

    /// Convert stored unix seconds back to a timestamp
    pub fn i64_to_timestamp(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
    }
}

/// Snapshot of an endpoint's identity captured when an episode opens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSnapshot {
    pub name: String,
    pub url: String,
}

/// DowntimeEpisode model - one confirmed-offline period
///
/// Append-only audit record. `end_time == None` means the episode is still
/// open (the endpoint is currently Offline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DowntimeEpisode {
    pub id: Option<i64>,
    /// Weak reference; may dangle once the endpoint is deleted
    pub endpoint_uuid: Uuid,
    pub endpoint_name: String,
    pub endpoint_url: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Failure reason captured at the moment the outage was confirmed
    pub last_error: Option<String>,
}

impl DowntimeEpisode {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

/// MonitoringSettings model - the single global configuration row
///
/// Read once per sweep, never written by the sweep engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    pub interval_weekday_minutes: i64,
    pub interval_weekend_minutes: i64,
    pub alert_threshold_minutes: i64,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl MonitoringSettings {
    /// Failure-streak duration after which an endpoint is declared Offline
    pub fn alert_threshold(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.alert_threshold_minutes)
    }
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            interval_weekday_minutes: 60,
            interval_weekend_minutes: 120,
            alert_threshold_minutes: 15,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 465,
            smtp_user: None,
            smtp_password: None,
        }
    }
}

/// A notification recipient resolved from the user directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
}
