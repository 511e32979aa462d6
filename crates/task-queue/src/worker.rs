use crate::job::{Dependency, Job, JobStatus, QueueName};
use crate::queue::JobQueue;
use crate::registry::{JobContext, JobRegistry};
use analysis_core::AnalysisError;
use result_cache::ResultCache;
use std::sync::Arc;
use std::time::Duration;

const IDLE_POLL_MS: u64 = 500;
const DEFER_DELAY_SECS: u64 = 5;

/// Observed state of one dependency edge at gate-check time
pub struct DepState {
    pub dep: Dependency,
    pub status: Option<JobStatus>,
    pub has_cached_result: bool,
}

pub enum DepOutcome {
    Ready,
    Defer,
    Fail(String),
}

/// Decide whether a job may start given its dependencies' states.
///
/// The dependency graph is advisory; the cache is authoritative for data. A
/// dependency that saved its result but never reached a terminal status
/// (worker crash) unblocks an `allow_failure` edge.
pub fn evaluate_dependencies(states: &[DepState]) -> DepOutcome {
    for state in states {
        match state.status {
            Some(JobStatus::Finished) => continue,
            Some(JobStatus::Failed) => {
                if state.dep.allow_failure {
                    continue;
                }
                return DepOutcome::Fail(format!(
                    "dependency {} failed and failure is not allowed",
                    state.dep.job_id
                ));
            }
            Some(_) => {
                // Still running. A saved result on an allow_failure edge is
                // good enough to proceed.
                if state.dep.allow_failure && state.has_cached_result {
                    continue;
                }
                return DepOutcome::Defer;
            }
            None => {
                // Job record gone (expired or store restarted)
                if state.has_cached_result || state.dep.allow_failure {
                    continue;
                }
                return DepOutcome::Defer;
            }
        }
    }
    DepOutcome::Ready
}

/// Pulls jobs from its configured queues in priority order and executes
/// registered handlers with a wall-clock limit, retrying failures on a
/// back-off schedule.
pub struct Worker {
    queue: JobQueue,
    cache: ResultCache,
    registry: Arc<JobRegistry>,
    queues: Vec<QueueName>,
}

impl Worker {
    pub fn new(
        queue: JobQueue,
        cache: ResultCache,
        registry: Arc<JobRegistry>,
        queues: Vec<QueueName>,
    ) -> Self {
        Self {
            queue,
            cache,
            registry,
            queues,
        }
    }

    /// Run until the process is stopped
    pub async fn run(&self) {
        let queue_names: Vec<&str> = self.queues.iter().map(|q| q.as_str()).collect();
        tracing::info!(queues = ?queue_names, "worker started");

        loop {
            match self.queue.pop(&self.queues).await {
                Ok(Some(job)) => {
                    if let Err(e) = self.process(job).await {
                        tracing::error!(error = %e, "job processing error");
                    }
                }
                Ok(None) => {
                    tokio::time::sleep(Duration::from_millis(IDLE_POLL_MS)).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "queue pop failed, backing off");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }

    /// Execute exactly one job if one is available. Returns whether a job
    /// was processed; used by drain loops in tests and request-scoped runs.
    pub async fn run_one(&self) -> Result<bool, AnalysisError> {
        match self.queue.pop(&self.queues).await? {
            Some(job) => {
                self.process(job).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn process(&self, mut job: Job) -> Result<(), AnalysisError> {
        // Dependency gate
        let mut states = Vec::with_capacity(job.depends_on.len());
        for dep in &job.depends_on {
            let status = self.queue.load_job(&dep.job_id).await?.map(|j| j.status);
            let has_cached_result = self
                .cache
                .get(&ResultCache::job_result_key(&dep.job_id))
                .await?
                .is_some();
            states.push(DepState {
                dep: dep.clone(),
                status,
                has_cached_result,
            });
        }

        match evaluate_dependencies(&states) {
            DepOutcome::Ready => {}
            DepOutcome::Defer => {
                tracing::debug!(job = %job.id, "dependencies unmet, deferring");
                self.queue.set_status(&mut job, JobStatus::Deferred).await?;
                self.queue.enqueue_in(job, DEFER_DELAY_SECS).await?;
                return Ok(());
            }
            DepOutcome::Fail(reason) => {
                tracing::warn!(job = %job.id, reason = %reason, "job failed at dependency gate");
                job.error = Some(reason);
                self.queue.set_status(&mut job, JobStatus::Failed).await?;
                return Ok(());
            }
        }

        let Some(handler) = self.registry.get(&job.function) else {
            job.error = Some(format!("no handler registered for '{}'", job.function));
            self.queue.set_status(&mut job, JobStatus::Failed).await?;
            return Ok(());
        };

        self.queue.set_status(&mut job, JobStatus::Started).await?;
        tracing::info!(job = %job.id, function = %job.function, queue = job.queue.as_str(), "job started");

        let ctx = JobContext {
            job_id: job.id.clone(),
            cache: self.cache.clone(),
            queue: self.queue.clone(),
        };

        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(
            Duration::from_secs(job.timeout_secs),
            handler.run(ctx, job.args.clone()),
        )
        .await;

        match outcome {
            Ok(Ok(result)) => {
                // The cache is authoritative: persist before the status flip
                self.cache.store_job_result(&job.id, &result).await?;
                self.queue.set_status(&mut job, JobStatus::Finished).await?;
                tracing::info!(
                    job = %job.id,
                    function = %job.function,
                    elapsed_secs = started.elapsed().as_secs(),
                    "job finished"
                );
            }
            Ok(Err(e)) => {
                self.handle_failure(job, e.to_string()).await?;
            }
            Err(_) => {
                self.handle_failure(
                    job.clone(),
                    format!("wall-clock limit of {}s exceeded", job.timeout_secs),
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn handle_failure(&self, mut job: Job, error: String) -> Result<(), AnalysisError> {
        if job.retries_left > 0 {
            let delay = job.next_retry_interval();
            job.retries_left -= 1;
            job.error = Some(error.clone());
            job.status = JobStatus::Queued;
            tracing::warn!(
                job = %job.id,
                function = %job.function,
                retries_left = job.retries_left,
                delay_secs = delay,
                error = %error,
                "job failed, scheduling retry"
            );
            self.queue.enqueue_in(job, delay).await?;
        } else {
            tracing::error!(job = %job.id, function = %job.function, error = %error, "job failed permanently");
            job.error = Some(error);
            self.queue.set_status(&mut job, JobStatus::Failed).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(allow_failure: bool, status: Option<JobStatus>, has_result: bool) -> DepState {
        DepState {
            dep: Dependency {
                job_id: "dep-1".to_string(),
                allow_failure,
            },
            status,
            has_cached_result: has_result,
        }
    }

    #[test]
    fn finished_dependency_is_ready() {
        assert!(matches!(
            evaluate_dependencies(&[state(false, Some(JobStatus::Finished), true)]),
            DepOutcome::Ready
        ));
    }

    #[test]
    fn failed_dependency_blocks_unless_allowed() {
        assert!(matches!(
            evaluate_dependencies(&[state(false, Some(JobStatus::Failed), false)]),
            DepOutcome::Fail(_)
        ));
        assert!(matches!(
            evaluate_dependencies(&[state(true, Some(JobStatus::Failed), false)]),
            DepOutcome::Ready
        ));
    }

    #[test]
    fn running_dependency_defers() {
        assert!(matches!(
            evaluate_dependencies(&[state(false, Some(JobStatus::Started), false)]),
            DepOutcome::Defer
        ));
    }

    #[test]
    fn crashed_dependency_with_saved_result_unblocks_allowed_edge() {
        // Saved its result, never flipped to finished
        assert!(matches!(
            evaluate_dependencies(&[state(true, Some(JobStatus::Started), true)]),
            DepOutcome::Ready
        ));
        // Without allow_failure the edge still waits
        assert!(matches!(
            evaluate_dependencies(&[state(false, Some(JobStatus::Started), true)]),
            DepOutcome::Defer
        ));
    }

    #[test]
    fn expired_record_with_cached_result_is_ready() {
        assert!(matches!(
            evaluate_dependencies(&[state(false, None, true)]),
            DepOutcome::Ready
        ));
        assert!(matches!(
            evaluate_dependencies(&[state(false, None, false)]),
            DepOutcome::Defer
        ));
        assert!(matches!(
            evaluate_dependencies(&[state(true, None, false)]),
            DepOutcome::Ready
        ));
    }

    #[test]
    fn empty_dependency_list_is_ready() {
        assert!(matches!(evaluate_dependencies(&[]), DepOutcome::Ready));
    }
}
