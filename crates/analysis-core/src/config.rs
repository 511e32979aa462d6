use serde::Serialize;

/// Values that ship as placeholders and must never reach a provider
const PLACEHOLDER_MARKERS: &[&str] = &["your_", "changeme", "placeholder"];

/// Process configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Data-provider API keys, comma separated in `DATA_API_KEYS`
    pub data_api_keys: Vec<String>,
    pub redis_url: String,
    /// Minutes a rate-limited key stays out of rotation
    pub key_cooldown_minutes: u64,
    /// Provider request budget per minute (sliding window)
    pub provider_rate_limit: usize,
    /// Port for the worker health endpoint
    pub health_port: u16,
    /// Queues this worker consumes, in priority order
    pub worker_queues: Vec<String>,
    /// Concurrent workers in this process. Must exceed 1 when the process
    /// serves compute alongside high/batch, or a coordinator can starve the
    /// leaves it waits on.
    pub worker_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let data_api_keys = std::env::var("DATA_API_KEYS")
            .unwrap_or_default()
            .split(',')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        Self {
            data_api_keys,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379/0".to_string()),
            key_cooldown_minutes: env_parse("KEY_COOLDOWN_MINUTES", 15),
            provider_rate_limit: env_parse("PROVIDER_RATE_LIMIT", 500),
            health_port: env_parse("HEALTH_PORT", 8090),
            worker_queues: std::env::var("WORKER_QUEUES")
                .unwrap_or_else(|_| "high,batch,compute".to_string())
                .split(',')
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect(),
            worker_concurrency: env_parse("WORKER_CONCURRENCY", 4),
        }
    }

    /// True when at least one real (non-placeholder) provider key is present
    pub fn is_provider_configured(&self) -> bool {
        self.data_api_keys.iter().any(|k| !is_placeholder(k))
    }

    pub fn is_cache_configured(&self) -> bool {
        !self.redis_url.is_empty()
    }

    /// Keys that look like real credentials (placeholders filtered out)
    pub fn usable_keys(&self) -> Vec<String> {
        self.data_api_keys
            .iter()
            .filter(|k| !is_placeholder(k))
            .cloned()
            .collect()
    }

    pub fn status(&self) -> ConfigStatus {
        ConfigStatus {
            provider_configured: self.is_provider_configured(),
            cache_configured: self.is_cache_configured(),
            key_count: self.usable_keys().len(),
            placeholder_keys: self
                .data_api_keys
                .iter()
                .filter(|k| is_placeholder(k))
                .count(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v.is_empty() || PLACEHOLDER_MARKERS.iter().any(|m| v.starts_with(m) || v == *m)
}

/// Reported by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ConfigStatus {
    pub provider_configured: bool,
    pub cache_configured: bool,
    pub key_count: usize,
    pub placeholder_keys: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_keys_are_detected() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("your_api_key_here"));
        assert!(is_placeholder("  CHANGEME "));
        assert!(!is_placeholder("st_4f2a9c1b77e04d19"));
    }

    #[test]
    fn usable_keys_filters_placeholders() {
        let config = Config {
            data_api_keys: vec![
                "st_4f2a9c1b77e04d19".to_string(),
                "your_api_key_here".to_string(),
            ],
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            key_cooldown_minutes: 15,
            provider_rate_limit: 500,
            health_port: 8090,
            worker_queues: vec!["high".to_string()],
            worker_concurrency: 4,
        };

        assert_eq!(config.usable_keys(), vec!["st_4f2a9c1b77e04d19".to_string()]);
        assert!(config.is_provider_configured());
        assert_eq!(config.status().placeholder_keys, 1);
    }
}
