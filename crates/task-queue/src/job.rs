use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Retry back-off for latency-sensitive leaf fetches
pub const HIGH_RETRY_INTERVALS: [u64; 3] = [10, 30, 60];
/// Retry back-off for bulk fetches; generous to let rate limits recover
pub const BATCH_RETRY_INTERVALS: [u64; 3] = [30, 60, 120];

/// Wall-clock limit per job
pub const DEFAULT_JOB_TIMEOUT_SECS: u64 = 3600;

/// The three worker queues. Coordinators must never share a queue with the
/// leaves they wait on, or they can occupy every worker and deadlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueName {
    /// Latency-sensitive leaf fetches
    High,
    /// Bulk fetches and rate-limited fan-out
    Batch,
    /// Coordinators and aggregators
    Compute,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::High => "high",
            QueueName::Batch => "batch",
            QueueName::Compute => "compute",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "high" => Some(QueueName::High),
            "batch" => Some(QueueName::Batch),
            "compute" => Some(QueueName::Compute),
            _ => None,
        }
    }

    pub fn list_key(&self) -> String {
        format!("queue:{}", self.as_str())
    }

    fn default_retry_intervals(&self) -> Vec<u64> {
        match self {
            QueueName::High => HIGH_RETRY_INTERVALS.to_vec(),
            QueueName::Batch | QueueName::Compute => BATCH_RETRY_INTERVALS.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Started,
    Finished,
    Failed,
    Deferred,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

/// An edge in the job graph. `allow_failure` lets the dependent proceed
/// when this dependency failed (or died after saving its result).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub job_id: String,
    #[serde(default)]
    pub allow_failure: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue: QueueName,
    pub function: String,
    pub args: serde_json::Value,
    pub status: JobStatus,
    pub retries_left: u32,
    pub retry_intervals: Vec<u64>,
    #[serde(default)]
    pub depends_on: Vec<Dependency>,
    pub timeout_secs: u64,
    pub enqueued_at: i64,
    #[serde(default)]
    pub error: Option<String>,
}

impl Job {
    pub fn new(queue: QueueName, function: impl Into<String>, args: serde_json::Value) -> Self {
        let retry_intervals = queue.default_retry_intervals();
        Self {
            id: Uuid::new_v4().to_string(),
            queue,
            function: function.into(),
            args,
            status: JobStatus::Queued,
            retries_left: retry_intervals.len() as u32,
            retry_intervals,
            depends_on: Vec::new(),
            timeout_secs: DEFAULT_JOB_TIMEOUT_SECS,
            enqueued_at: Utc::now().timestamp(),
            error: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn depends_on(mut self, job_id: impl Into<String>, allow_failure: bool) -> Self {
        self.depends_on.push(Dependency {
            job_id: job_id.into(),
            allow_failure,
        });
        self
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Back-off before the next retry, indexed by how many retries have
    /// already been consumed
    pub fn next_retry_interval(&self) -> u64 {
        let consumed = self
            .retry_intervals
            .len()
            .saturating_sub(self.retries_left as usize);
        self.retry_intervals
            .get(consumed)
            .copied()
            .unwrap_or_else(|| self.retry_intervals.last().copied().unwrap_or(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn queue_defaults_follow_the_queue() {
        let high = Job::new(QueueName::High, "fetch", json!({}));
        assert_eq!(high.retry_intervals, vec![10, 30, 60]);
        assert_eq!(high.retries_left, 3);

        let batch = Job::new(QueueName::Batch, "fetch", json!({}));
        assert_eq!(batch.retry_intervals, vec![30, 60, 120]);
        assert_eq!(batch.timeout_secs, DEFAULT_JOB_TIMEOUT_SECS);
    }

    #[test]
    fn retry_interval_walks_the_schedule() {
        let mut job = Job::new(QueueName::Batch, "fetch", json!({}));
        assert_eq!(job.next_retry_interval(), 30);
        job.retries_left = 2;
        assert_eq!(job.next_retry_interval(), 60);
        job.retries_left = 1;
        assert_eq!(job.next_retry_interval(), 120);
        job.retries_left = 0;
        assert_eq!(job.next_retry_interval(), 120);
    }

    #[test]
    fn queue_names_round_trip() {
        for queue in [QueueName::High, QueueName::Batch, QueueName::Compute] {
            assert_eq!(QueueName::parse(queue.as_str()), Some(queue));
        }
        assert_eq!(QueueName::parse("bogus"), None);
    }
}
