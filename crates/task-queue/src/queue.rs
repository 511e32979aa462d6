use crate::job::{Job, JobStatus, QueueName};
use analysis_core::AnalysisError;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use result_cache::JOB_RESULT_TTL_SECS;

const SCHEDULED_KEY: &str = "queue:scheduled";

/// Redis-backed job queue. Job bodies live under `job:{id}` with the same
/// TTL as job results; queue membership is a list per queue plus a sorted
/// set for scheduled (back-off) retries.
#[derive(Clone)]
pub struct JobQueue {
    manager: ConnectionManager,
}

impl JobQueue {
    pub async fn connect(redis_url: &str) -> Result<Self, AnalysisError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AnalysisError::Fatal(format!("invalid redis url: {}", e)))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| AnalysisError::Fatal(format!("queue connect failed: {}", e)))?;
        Ok(Self { manager })
    }

    fn job_key(job_id: &str) -> String {
        format!("job:{}", job_id)
    }

    pub async fn save_job(&self, job: &Job) -> Result<(), AnalysisError> {
        let body = serde_json::to_string(job)
            .map_err(|e| AnalysisError::CacheError(format!("serialize job {}: {}", job.id, e)))?;
        let mut conn = self.manager.clone();
        conn.set_ex::<_, _, ()>(Self::job_key(&job.id), body, JOB_RESULT_TTL_SECS)
            .await
            .map_err(|e| AnalysisError::CacheError(format!("save job {}: {}", job.id, e)))
    }

    pub async fn load_job(&self, job_id: &str) -> Result<Option<Job>, AnalysisError> {
        let mut conn = self.manager.clone();
        let body: Option<String> = conn
            .get(Self::job_key(job_id))
            .await
            .map_err(|e| AnalysisError::CacheError(format!("load job {}: {}", job_id, e)))?;
        match body {
            Some(body) => {
                let job = serde_json::from_str(&body).map_err(|e| {
                    AnalysisError::CacheError(format!("deserialize job {}: {}", job_id, e))
                })?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }

    /// Persist and push a job onto its queue. Returns the job id.
    pub async fn enqueue(&self, job: Job) -> Result<String, AnalysisError> {
        self.save_job(&job).await?;
        let mut conn = self.manager.clone();
        conn.lpush::<_, _, ()>(job.queue.list_key(), &job.id)
            .await
            .map_err(|e| AnalysisError::CacheError(format!("enqueue {}: {}", job.id, e)))?;
        tracing::debug!(job = %job.id, queue = job.queue.as_str(), function = %job.function, "job enqueued");
        Ok(job.id)
    }

    /// Persist a job and schedule it to enter its queue after `delay_secs`
    pub async fn enqueue_in(&self, job: Job, delay_secs: u64) -> Result<String, AnalysisError> {
        self.save_job(&job).await?;
        let due = Utc::now().timestamp() + delay_secs as i64;
        let mut conn = self.manager.clone();
        conn.zadd::<_, _, _, ()>(SCHEDULED_KEY, &job.id, due)
            .await
            .map_err(|e| AnalysisError::CacheError(format!("schedule {}: {}", job.id, e)))?;
        tracing::debug!(job = %job.id, delay_secs, "job scheduled");
        Ok(job.id)
    }

    /// Move due scheduled jobs back onto their queues
    pub async fn promote_scheduled(&self) -> Result<(), AnalysisError> {
        let now = Utc::now().timestamp();
        let mut conn = self.manager.clone();
        let due: Vec<String> = conn
            .zrangebyscore(SCHEDULED_KEY, 0, now)
            .await
            .map_err(|e| AnalysisError::CacheError(format!("scheduled scan: {}", e)))?;

        for job_id in due {
            let removed: i64 = conn
                .zrem(SCHEDULED_KEY, &job_id)
                .await
                .map_err(|e| AnalysisError::CacheError(format!("scheduled pop: {}", e)))?;
            // Another worker may have promoted it between the scan and here
            if removed == 0 {
                continue;
            }
            match self.load_job(&job_id).await? {
                Some(job) => {
                    conn.lpush::<_, _, ()>(job.queue.list_key(), &job_id)
                        .await
                        .map_err(|e| {
                            AnalysisError::CacheError(format!("promote {}: {}", job_id, e))
                        })?;
                }
                None => tracing::warn!(job = %job_id, "scheduled job body expired, dropping"),
            }
        }
        Ok(())
    }

    /// Pop the next job, honouring the worker's queue priority order.
    /// Promotes due scheduled jobs first.
    pub async fn pop(&self, queues: &[QueueName]) -> Result<Option<Job>, AnalysisError> {
        self.promote_scheduled().await?;

        let mut conn = self.manager.clone();
        for queue in queues {
            let job_id: Option<String> = conn
                .rpop(queue.list_key(), None)
                .await
                .map_err(|e| AnalysisError::CacheError(format!("pop {}: {}", queue.as_str(), e)))?;
            if let Some(job_id) = job_id {
                match self.load_job(&job_id).await? {
                    Some(job) => return Ok(Some(job)),
                    None => {
                        tracing::warn!(job = %job_id, "popped job body missing, skipping");
                        continue;
                    }
                }
            }
        }
        Ok(None)
    }

    /// Update a job's status field and persist it
    pub async fn set_status(&self, job: &mut Job, status: JobStatus) -> Result<(), AnalysisError> {
        job.status = status;
        self.save_job(job).await
    }
}
