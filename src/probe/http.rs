//! HTTP probe implementation.

use super::{is_healthy_status, ProbeError, ProbeOutcome};
use std::time::{Duration, Instant};

/// Issues reachability probes with a shared HTTP client.
#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
    timeout: Duration,
}

impl Prober {
    /// Build a prober whose every attempt is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Probe `url` once and classify the result.
    pub async fn probe(&self, url: &str) -> ProbeOutcome {
        let result = self.run_http_probe(url).await;
        if let Err(e) = &result {
            tracing::debug!("Probe of {} is down: {}", url, e);
        }
        ProbeOutcome::from(result)
    }

    /// Run a single GET against `url`.
    ///
    /// Returns the time until the response head arrived.
    pub async fn run_http_probe(&self, url: &str) -> Result<Duration, ProbeError> {
        let start = Instant::now();

        // Dropping the request future on expiry cancels the connection.
        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(self.timeout)
                } else {
                    ProbeError::Network(e.to_string())
                }
            })?;

        let elapsed = start.elapsed();

        let code = response.status().as_u16();
        if !is_healthy_status(code) {
            return Err(ProbeError::Status(code));
        }

        Ok(elapsed)
    }
}
