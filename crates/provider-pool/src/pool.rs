use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Cooling,
    Failed,
}

#[derive(Debug, Clone)]
struct ApiKey {
    id: String,
    credential: String,
    status: KeyStatus,
    cooldown_until: Option<DateTime<Utc>>,
    request_count: u64,
    success_count: u64,
}

/// A credential handed out by the pool for one request
#[derive(Debug, Clone)]
pub struct LeasedKey {
    pub id: String,
    pub credential: String,
}

struct PoolInner {
    keys: Vec<ApiKey>,
    /// Indices into `keys` that are currently active, rotated round-robin
    active: Vec<usize>,
    cursor: usize,
    rate_limit_hits: u64,
    auth_failures: u64,
}

/// Rotating pool of provider credentials with per-key cooldown.
///
/// Rate-limited keys leave the active set until their cooldown expires;
/// auth-failed keys leave it for the process lifetime. All mutation goes
/// through the single internal lock.
pub struct ApiKeyPool {
    inner: Mutex<PoolInner>,
    cooldown: Duration,
}

impl ApiKeyPool {
    pub fn new(credentials: Vec<String>, cooldown_minutes: u64) -> Self {
        let keys: Vec<ApiKey> = credentials
            .into_iter()
            .enumerate()
            .map(|(i, credential)| ApiKey {
                id: format!("key-{}", i + 1),
                credential,
                status: KeyStatus::Active,
                cooldown_until: None,
                request_count: 0,
                success_count: 0,
            })
            .collect();

        let active = (0..keys.len()).collect();
        tracing::info!(keys = keys.len(), cooldown_minutes, "api key pool initialised");

        Self {
            inner: Mutex::new(PoolInner {
                keys,
                active,
                cursor: 0,
                rate_limit_hits: 0,
                auth_failures: 0,
            }),
            cooldown: Duration::minutes(cooldown_minutes as i64),
        }
    }

    /// Next active credential, round-robin. Promotes any cooled-down key
    /// back into rotation first. `None` when every key is cooling or burnt.
    pub async fn next(&self) -> Option<LeasedKey> {
        let mut inner = self.inner.lock().await;
        Self::promote_cooled(&mut inner);

        if inner.active.is_empty() {
            let cooling = inner
                .keys
                .iter()
                .filter(|k| k.status == KeyStatus::Cooling)
                .count();
            tracing::warn!(
                cooling,
                failed = inner.keys.len() - cooling,
                "no active api keys available"
            );
            return None;
        }

        let slot = inner.cursor % inner.active.len();
        inner.cursor = (slot + 1) % inner.active.len();
        let idx = inner.active[slot];

        let key = &mut inner.keys[idx];
        key.request_count += 1;
        Some(LeasedKey {
            id: key.id.clone(),
            credential: key.credential.clone(),
        })
    }

    /// Move a key into cooldown after a 429
    pub async fn mark_rate_limited(&self, key_id: &str) {
        let mut inner = self.inner.lock().await;
        let until = Utc::now() + self.cooldown;
        if let Some(idx) = inner.keys.iter().position(|k| k.id == key_id) {
            inner.keys[idx].status = KeyStatus::Cooling;
            inner.keys[idx].cooldown_until = Some(until);
            inner.active.retain(|&i| i != idx);
            inner.rate_limit_hits += 1;
            tracing::warn!(
                key = key_id,
                until = %until,
                active = inner.active.len(),
                "key rate limited, cooling down"
            );
        }
    }

    /// Burn a key permanently after an auth failure
    pub async fn mark_failed(&self, key_id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(idx) = inner.keys.iter().position(|k| k.id == key_id) {
            inner.keys[idx].status = KeyStatus::Failed;
            inner.keys[idx].cooldown_until = None;
            inner.active.retain(|&i| i != idx);
            inner.auth_failures += 1;
            tracing::error!(
                key = key_id,
                active = inner.active.len(),
                "key failed auth, removed from pool"
            );
        }
    }

    pub async fn mark_success(&self, key_id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(key) = inner.keys.iter_mut().find(|k| k.id == key_id) {
            key.success_count += 1;
        }
    }

    pub async fn status(&self) -> PoolStatus {
        let mut inner = self.inner.lock().await;
        Self::promote_cooled(&mut inner);

        let total_requests: u64 = inner.keys.iter().map(|k| k.request_count).sum();
        let successful: u64 = inner.keys.iter().map(|k| k.success_count).sum();
        PoolStatus {
            total_keys: inner.keys.len(),
            active_keys: inner.active.len(),
            cooling_keys: inner
                .keys
                .iter()
                .filter(|k| k.status == KeyStatus::Cooling)
                .count(),
            failed_keys: inner
                .keys
                .iter()
                .filter(|k| k.status == KeyStatus::Failed)
                .count(),
            total_requests,
            successful_requests: successful,
            rate_limit_hits: inner.rate_limit_hits,
            auth_failures: inner.auth_failures,
        }
    }

    fn promote_cooled(inner: &mut PoolInner) {
        let now = Utc::now();
        let mut recovered = Vec::new();
        for (idx, key) in inner.keys.iter_mut().enumerate() {
            if key.status == KeyStatus::Cooling {
                if let Some(until) = key.cooldown_until {
                    if now >= until {
                        key.status = KeyStatus::Active;
                        key.cooldown_until = None;
                        recovered.push(idx);
                    }
                }
            }
        }
        if !recovered.is_empty() {
            tracing::info!(count = recovered.len(), "keys recovered from cooldown");
            inner.active.extend(recovered);
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub total_keys: usize,
    pub active_keys: usize,
    pub cooling_keys: usize,
    pub failed_keys: usize,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub rate_limit_hits: u64,
    pub auth_failures: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(n: usize, cooldown_minutes: u64) -> ApiKeyPool {
        let creds = (0..n).map(|i| format!("cred-{}", i)).collect();
        ApiKeyPool::new(creds, cooldown_minutes)
    }

    #[tokio::test]
    async fn round_robin_cycles_active_keys() {
        let pool = pool_with(3, 15);
        let a = pool.next().await.unwrap();
        let b = pool.next().await.unwrap();
        let c = pool.next().await.unwrap();
        let d = pool.next().await.unwrap();

        assert_ne!(a.id, b.id);
        assert_ne!(b.id, c.id);
        assert_eq!(a.id, d.id);
    }

    #[tokio::test]
    async fn rate_limited_key_leaves_rotation() {
        let pool = pool_with(2, 15);
        let first = pool.next().await.unwrap();
        pool.mark_rate_limited(&first.id).await;

        for _ in 0..4 {
            let key = pool.next().await.unwrap();
            assert_ne!(key.id, first.id);
        }

        let status = pool.status().await;
        assert_eq!(status.active_keys, 1);
        assert_eq!(status.cooling_keys, 1);
    }

    #[tokio::test]
    async fn cooled_key_is_promoted_back() {
        // Zero-minute cooldown expires immediately on the next call
        let pool = pool_with(1, 0);
        let key = pool.next().await.unwrap();
        pool.mark_rate_limited(&key.id).await;

        let again = pool.next().await;
        assert!(again.is_some());
        assert_eq!(again.unwrap().id, key.id);
    }

    #[tokio::test]
    async fn failed_key_is_gone_for_good() {
        let pool = pool_with(1, 0);
        let key = pool.next().await.unwrap();
        pool.mark_failed(&key.id).await;

        assert!(pool.next().await.is_none());
        let status = pool.status().await;
        assert_eq!(status.failed_keys, 1);
        assert_eq!(status.auth_failures, 1);
    }

    #[tokio::test]
    async fn empty_pool_returns_none() {
        let pool = pool_with(0, 15);
        assert!(pool.next().await.is_none());
    }
}
