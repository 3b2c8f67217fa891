/// Notification dispatch module
///
/// Invoked only on the state machine's transition edges: the sweep that
/// confirms an outage (alert) and the sweep that observes recovery. There is
/// no retry queue; a failed send is logged and dropped.
pub mod email;

pub use email::EmailNotifier;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::database::models::{Endpoint, MonitoringSettings};
use crate::monitoring::TransitionEvent;

/// Notifier trait - delivers one notification per transition event
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver the given event to every opted-in recipient. Per-recipient
    /// delivery failures are handled (logged) internally; an `Err` here means
    /// the dispatch as a whole could not be attempted.
    async fn dispatch(
        &self,
        event: TransitionEvent,
        endpoint: &Endpoint,
        settings: &MonitoringSettings,
        now: DateTime<Utc>,
    ) -> Result<()>;
}

/// Subject and plain-text body of one notification email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

/// Build the message content for a transition event
pub fn content_for(
    event: TransitionEvent,
    endpoint: &Endpoint,
    settings: &MonitoringSettings,
    now: DateTime<Utc>,
) -> EmailContent {
    match event {
        TransitionEvent::Alert => alert_content(endpoint, settings, now),
        TransitionEvent::Recovery => recovery_content(endpoint, now),
    }
}

fn alert_content(
    endpoint: &Endpoint,
    settings: &MonitoringSettings,
    now: DateTime<Utc>,
) -> EmailContent {
    let error = endpoint.last_error.as_deref().unwrap_or("unknown");
    EmailContent {
        subject: format!("ALERT: {} is OFFLINE", endpoint.name),
        body: format!(
            "The site {} ({}) has been unreachable for more than {} minutes.\n\n\
             Time: {}\nError: {}",
            endpoint.name,
            endpoint.url,
            settings.alert_threshold_minutes,
            now.format("%Y-%m-%d %H:%M:%S UTC"),
            error,
        ),
    }
}

fn recovery_content(endpoint: &Endpoint, now: DateTime<Utc>) -> EmailContent {
    EmailContent {
        subject: format!("RECOVERY: {} is back ONLINE", endpoint.name),
        body: format!(
            "The site {} ({}) is responding again.\n\nTime: {}",
            endpoint.name,
            endpoint.url,
            now.format("%Y-%m-%d %H:%M:%S UTC"),
        ),
    }
}

/// Qualify a bare SMTP username into a full sender address using the
/// configured sender domain. Purely cosmetic; addresses that already carry a
/// domain pass through untouched.
pub fn qualify_sender(user: &str, sender_domain: Option<&str>) -> String {
    match sender_domain {
        Some(domain) if !user.contains('@') => format!("{user}@{domain}"),
        _ => user.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::EndpointStatus;

    fn endpoint() -> Endpoint {
        let mut endpoint =
            Endpoint::new("Docs".to_string(), "https://docs.example.com".to_string());
        endpoint.status = EndpointStatus::Offline;
        endpoint.last_error = Some("Status Code: 503".to_string());
        endpoint
    }

    #[test]
    fn test_alert_content_names_endpoint_threshold_and_reason() {
        let content = content_for(
            TransitionEvent::Alert,
            &endpoint(),
            &MonitoringSettings::default(),
            Utc::now(),
        );

        assert_eq!(content.subject, "ALERT: Docs is OFFLINE");
        assert!(content.body.contains("https://docs.example.com"));
        assert!(content.body.contains("more than 15 minutes"));
        assert!(content.body.contains("Status Code: 503"));
    }

    #[test]
    fn test_recovery_content_names_endpoint_and_timestamp() {
        let now = Utc::now();
        let content = content_for(
            TransitionEvent::Recovery,
            &endpoint(),
            &MonitoringSettings::default(),
            now,
        );

        assert_eq!(content.subject, "RECOVERY: Docs is back ONLINE");
        assert!(content.body.contains("https://docs.example.com"));
        assert!(content.body.contains(&now.format("%Y-%m-%d").to_string()));
    }

    #[test]
    fn test_bare_username_gets_qualified() {
        assert_eq!(qualify_sender("monitor", Some("example.org")), "monitor@example.org");
    }

    #[test]
    fn test_full_address_passes_through() {
        assert_eq!(qualify_sender("monitor@corp.net", Some("example.org")), "monitor@corp.net");
    }

    #[test]
    fn test_no_domain_configured_passes_through() {
        assert_eq!(qualify_sender("monitor", None), "monitor");
    }
}
