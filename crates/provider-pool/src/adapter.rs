use crate::{ApiKeyPool, RateLimiter};
use analysis_core::AnalysisError;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Issues provider requests through the key pool, rotating credentials on
/// rate limits and auth failures. A 429 or 401/403 rotates to the next key
/// within the same attempt; only 5xx and network timeouts consume the retry
/// budget.
#[derive(Clone)]
pub struct RequestAdapter {
    pool: Arc<ApiKeyPool>,
    limiter: RateLimiter,
    retry_budget: u32,
}

impl RequestAdapter {
    pub fn new(pool: Arc<ApiKeyPool>, limiter: RateLimiter) -> Self {
        Self {
            pool,
            limiter,
            retry_budget: 3,
        }
    }

    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget;
        self
    }

    pub fn pool(&self) -> &Arc<ApiKeyPool> {
        &self.pool
    }

    /// Send a request built by `build(credential)` and decode the JSON body.
    pub async fn send_json<T, F>(&self, endpoint: &str, build: F) -> Result<T, AnalysisError>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        match self.send_json_opt(endpoint, build).await? {
            Some(body) => Ok(body),
            None => Err(AnalysisError::ProviderBadData(format!(
                "{}: HTTP 404",
                endpoint
            ))),
        }
    }

    /// Like `send_json`, but a 404 decodes to `Ok(None)`.
    pub async fn send_json_opt<T, F>(
        &self,
        endpoint: &str,
        build: F,
    ) -> Result<Option<T>, AnalysisError>
    where
        T: DeserializeOwned,
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let mut retries_left = self.retry_budget;

        loop {
            self.limiter.acquire().await;

            let key = self.pool.next().await.ok_or_else(|| {
                AnalysisError::ProviderUnavailable(format!(
                    "{}: every credential is cooling or failed",
                    endpoint
                ))
            })?;

            let response = match build(&key.credential).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if retries_left == 0 {
                        return Err(AnalysisError::Transient(format!("{}: {}", endpoint, e)));
                    }
                    retries_left -= 1;
                    tracing::debug!(endpoint, error = %e, retries_left, "network error, retrying");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    continue;
                }
            };

            let status = response.status().as_u16();
            match status {
                200..=299 => {
                    self.pool.mark_success(&key.id).await;
                    let body = response.json::<T>().await.map_err(|e| {
                        AnalysisError::ProviderBadData(format!("{}: {}", endpoint, e))
                    })?;
                    return Ok(Some(body));
                }
                404 => {
                    self.pool.mark_success(&key.id).await;
                    return Ok(None);
                }
                429 => {
                    // Rotate within the same attempt; the job-level retry is
                    // untouched.
                    self.pool.mark_rate_limited(&key.id).await;
                    continue;
                }
                401 | 403 => {
                    self.pool.mark_failed(&key.id).await;
                    continue;
                }
                500..=599 => {
                    if retries_left == 0 {
                        return Err(AnalysisError::Transient(format!(
                            "{}: HTTP {} after {} retries",
                            endpoint, status, self.retry_budget
                        )));
                    }
                    retries_left -= 1;
                    tracing::warn!(endpoint, status, retries_left, "server error, retrying");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    continue;
                }
                _ => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(AnalysisError::ProviderBadData(format!(
                        "{}: HTTP {}: {}",
                        endpoint, status, body
                    )));
                }
            }
        }
    }
}
