//! AutoSSL priming for freshly pointed custom domains.
//!
//! Gateways issue a certificate for a hostname on its first HTTPS request.
//! The first few requests usually fail while issuance runs, so the request
//! is retried with a linear backoff.

use std::time::Duration;
use tracing::{debug, info, warn};

/// `https://{domain}/`
pub fn autossl_url(domain: &str) -> String {
    format!("https://{}/", domain.trim_end_matches('.'))
}

/// GET `url` until it succeeds, at most `max_attempts` times, sleeping
/// `attempt * backoff` after each failure.
///
/// Best-effort: returns whether a request succeeded.
pub async fn prime_autossl(
    http: &reqwest::Client,
    url: &str,
    max_attempts: u32,
    backoff: Duration,
) -> bool {
    for attempt in 1..=max_attempts {
        match http.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                info!(url, attempt, "AutoSSL primed");
                return true;
            }
            Ok(response) => debug!(url, attempt, status = %response.status(), "AutoSSL not ready"),
            Err(e) => debug!(url, attempt, error = %e, "AutoSSL not ready"),
        }
        if attempt < max_attempts {
            tokio::time::sleep(backoff * attempt).await;
        }
    }
    warn!(url, max_attempts, "AutoSSL priming gave up");
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_autossl_url() {
        assert_eq!(autossl_url("shop.ogn.app."), "https://shop.ogn.app/");
    }
}
