use std::time::Duration;

use anyhow::Result;

use super::types::ProbeOutcome;

/// Prober trait - performs one network check against an endpoint URL
///
/// Implementations never propagate network errors; every failure mode is
/// classified into a `ProbeOutcome` with a descriptive reason.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, url: &str, expected_text: Option<&str>) -> ProbeOutcome;
}

/// HTTP prober backed by a shared reqwest client with a fixed request timeout
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str, expected_text: Option<&str>) -> ProbeOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            // Transport, DNS resolution and timeout errors all land here
            Err(e) => return ProbeOutcome::failure(format!("Connection Error: {e}")),
        };

        let status = response.status().as_u16();
        if status != 200 {
            return ProbeOutcome::failure(format!("Status Code: {status}"));
        }

        match expected_text {
            None => ProbeOutcome::success(),
            Some(text) => match response.text().await {
                Ok(body) if body.contains(text) => ProbeOutcome::success(),
                Ok(_) => ProbeOutcome::failure(format!("Expected text '{text}' not found.")),
                Err(e) => ProbeOutcome::failure(format!("Connection Error: {e}")),
            },
        }
    }
}
