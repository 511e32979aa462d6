use crate::queue::JobQueue;
use analysis_core::AnalysisError;
use async_trait::async_trait;
use result_cache::ResultCache;
use std::collections::HashMap;
use std::sync::Arc;

/// Everything a handler needs to do its work: the shared cache, the queue
/// (coordinators enqueue children through it), and its own job id.
#[derive(Clone)]
pub struct JobContext {
    pub job_id: String,
    pub cache: ResultCache,
    pub queue: JobQueue,
}

/// A named, idempotent unit of work. Handlers must write their result to
/// the cache before returning; the runtime also stores the returned value
/// under `job_result:{id}`, so replays overwrite deterministically.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(
        &self,
        ctx: JobContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AnalysisError>;
}

/// Function-name → handler table shared by every worker in the process
#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn JobHandler>) {
        let name = name.into();
        tracing::debug!(function = %name, "job handler registered");
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(name).cloned()
    }

    pub fn function_names(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}
