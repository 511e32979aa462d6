use analysis_core::{AnalysisError, QualifiedWallet, TokenQualifiedSnapshot};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Per-job output TTL: long enough that results survive an hours-long batch
pub const JOB_RESULT_TTL_SECS: u64 = 24 * 3600;

/// Per-token qualified snapshot TTL: a batch never recomputes a token
pub const TOKEN_QUALIFIED_TTL_SECS: u64 = 6 * 3600;

const RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];

/// Shared KV store for job results, per-token snapshots, and batch
/// completion counters. Holds one multiplexed connection with reconnect
/// handled by the manager; transient command failures are retried with
/// exponential backoff.
#[derive(Clone)]
pub struct ResultCache {
    manager: ConnectionManager,
}

impl ResultCache {
    pub async fn connect(redis_url: &str) -> Result<Self, AnalysisError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AnalysisError::Fatal(format!("invalid redis url: {}", e)))?;

        let config = redis::aio::ConnectionManagerConfig::new()
            .set_response_timeout(Duration::from_secs(60))
            .set_connection_timeout(Duration::from_secs(10));

        let manager = client
            .get_connection_manager_with_config(config)
            .await
            .map_err(|e| AnalysisError::Fatal(format!("redis connect failed: {}", e)))?;

        tracing::info!(url = redis_url, "result cache connected");
        Ok(Self { manager })
    }

    async fn with_retry<T, F, Fut>(&self, op_name: &str, mut op: F) -> Result<T, AnalysisError>
    where
        F: FnMut(ConnectionManager) -> Fut,
        Fut: std::future::Future<Output = redis::RedisResult<T>>,
    {
        let mut last_err = None;
        for (attempt, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
            match op(self.manager.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!(op = op_name, attempt, error = %e, "cache op failed, retrying");
                    last_err = Some(e);
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                }
            }
        }
        // Final attempt without a trailing sleep
        match op(self.manager.clone()).await {
            Ok(value) => Ok(value),
            Err(e) => Err(AnalysisError::CacheError(format!(
                "{}: {} (after retries, last: {:?})",
                op_name, e, last_err
            ))),
        }
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AnalysisError> {
        let key = key.to_string();
        let value = value.to_string();
        self.with_retry("set_ex", move |mut conn| {
            let key = key.clone();
            let value = value.clone();
            async move { conn.set_ex::<_, _, ()>(key, value, ttl_secs).await }
        })
        .await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, AnalysisError> {
        let key = key.to_string();
        self.with_retry("get", move |mut conn| {
            let key = key.clone();
            async move { conn.get::<_, Option<String>>(key).await }
        })
        .await
    }

    pub async fn del(&self, key: &str) -> Result<(), AnalysisError> {
        let key = key.to_string();
        self.with_retry("del", move |mut conn| {
            let key = key.clone();
            async move { conn.del::<_, ()>(key).await }
        })
        .await
    }

    pub async fn incr(&self, key: &str) -> Result<i64, AnalysisError> {
        let key = key.to_string();
        self.with_retry("incr", move |mut conn| {
            let key = key.clone();
            async move { conn.incr::<_, _, i64>(key, 1).await }
        })
        .await
    }

    pub async fn sadd(&self, key: &str, member: &str) -> Result<(), AnalysisError> {
        let key = key.to_string();
        let member = member.to_string();
        self.with_retry("sadd", move |mut conn| {
            let key = key.clone();
            let member = member.clone();
            async move { conn.sadd::<_, _, ()>(key, member).await }
        })
        .await
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<(), AnalysisError> {
        let key = key.to_string();
        let member = member.to_string();
        self.with_retry("srem", move |mut conn| {
            let key = key.clone();
            let member = member.clone();
            async move { conn.srem::<_, _, ()>(key, member).await }
        })
        .await
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>, AnalysisError> {
        let key = key.to_string();
        self.with_retry("smembers", move |mut conn| {
            let key = key.clone();
            async move { conn.smembers::<_, Vec<String>>(key).await }
        })
        .await
    }

    pub async fn store_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> Result<(), AnalysisError> {
        let body = serde_json::to_string(value)
            .map_err(|e| AnalysisError::CacheError(format!("serialize {}: {}", key, e)))?;
        self.set_ex(key, &body, ttl_secs).await
    }

    pub async fn load_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AnalysisError> {
        match self.get(key).await? {
            Some(body) => {
                let value = serde_json::from_str(&body)
                    .map_err(|e| AnalysisError::CacheError(format!("deserialize {}: {}", key, e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    // -- Domain keys ---------------------------------------------------------

    pub fn job_result_key(job_id: &str) -> String {
        format!("job_result:{}", job_id)
    }

    pub async fn store_job_result<T: Serialize>(
        &self,
        job_id: &str,
        result: &T,
    ) -> Result<(), AnalysisError> {
        self.store_json(&Self::job_result_key(job_id), result, JOB_RESULT_TTL_SECS)
            .await
    }

    pub async fn load_job_result<T: DeserializeOwned>(
        &self,
        job_id: &str,
    ) -> Result<Option<T>, AnalysisError> {
        self.load_json(&Self::job_result_key(job_id)).await
    }

    pub fn token_qualified_key(token_address: &str) -> String {
        format!("token_qualified:{}", token_address)
    }

    pub async fn store_token_qualified(
        &self,
        token_address: &str,
        wallets: &[QualifiedWallet],
    ) -> Result<(), AnalysisError> {
        let snapshot = TokenQualifiedSnapshot {
            token_address: token_address.to_string(),
            qualified_wallets: wallets.to_vec(),
            wallet_count: wallets.len(),
            created_at: Utc::now(),
        };
        self.store_json(
            &Self::token_qualified_key(token_address),
            &snapshot,
            TOKEN_QUALIFIED_TTL_SECS,
        )
        .await
    }

    /// Cached qualified set for a token. Empty or unreadable snapshots are
    /// deleted and reported as a miss so the pipeline recomputes them.
    pub async fn load_token_qualified(
        &self,
        token_address: &str,
    ) -> Result<Option<TokenQualifiedSnapshot>, AnalysisError> {
        let key = Self::token_qualified_key(token_address);
        match self.load_json::<TokenQualifiedSnapshot>(&key).await {
            Ok(Some(snapshot)) if !snapshot.qualified_wallets.is_empty() => Ok(Some(snapshot)),
            Ok(Some(_)) => {
                tracing::debug!(token = token_address, "empty qualified snapshot, dropping");
                self.del(&key).await.ok();
                Ok(None)
            }
            Ok(None) => Ok(None),
            Err(e) => {
                tracing::warn!(token = token_address, error = %e, "bad qualified snapshot, dropping");
                self.del(&key).await.ok();
                Ok(None)
            }
        }
    }

    // -- Batch completion barrier -------------------------------------------

    pub async fn init_batch(&self, parent_id: &str, total: i64) -> Result<(), AnalysisError> {
        self.set_ex(
            &format!("batch_total:{}", parent_id),
            &total.to_string(),
            JOB_RESULT_TTL_SECS,
        )
        .await?;
        self.set_ex(&format!("batch_done:{}", parent_id), "0", JOB_RESULT_TTL_SECS)
            .await
    }

    /// Increment the done counter; returns the new count
    pub async fn mark_batch_done(&self, parent_id: &str) -> Result<i64, AnalysisError> {
        self.incr(&format!("batch_done:{}", parent_id)).await
    }

    /// `None` when the total key is missing (store restarted mid-run); the
    /// caller must degrade to a bounded poll rather than wait forever.
    pub async fn batch_total(&self, parent_id: &str) -> Result<Option<i64>, AnalysisError> {
        Ok(self
            .get(&format!("batch_total:{}", parent_id))
            .await?
            .and_then(|v| v.parse().ok()))
    }

    pub async fn batch_done(&self, parent_id: &str) -> Result<i64, AnalysisError> {
        Ok(self
            .get(&format!("batch_done:{}", parent_id))
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    // -- Abandonment sentinel ------------------------------------------------

    pub async fn mark_abandoned(&self, parent_id: &str) -> Result<(), AnalysisError> {
        self.set_ex(&format!("abandoned:{}", parent_id), "1", JOB_RESULT_TTL_SECS)
            .await
    }

    pub async fn is_abandoned(&self, parent_id: &str) -> Result<bool, AnalysisError> {
        Ok(self.get(&format!("abandoned:{}", parent_id)).await?.is_some())
    }
}
