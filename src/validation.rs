//! Endpoint URL validation and normalization.

use anyhow::{Result, anyhow, bail};
use url::Url;

/// Normalize an endpoint URL entered through the admin surface.
///
/// A bare host ("example.com") gets an explicit `https://` scheme; anything
/// other than http/https is rejected.
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("Endpoint URL must not be empty");
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = Url::parse(&candidate).map_err(|e| anyhow!("Invalid URL '{trimmed}': {e}"))?;

    match parsed.scheme() {
        "http" | "https" => Ok(candidate),
        other => Err(anyhow!("Unsupported scheme for endpoint: {other}")),
    }
}
