use crate::candidates::{chunk_batches, merge_candidates, split_prequalified, PnlQualified};
use crate::jobs::{
    AggregateArgs, CandidateListResult, EntryBatchArgs, EntryBatchResult, LeafArgs,
    OhlcvRallyResult, PnlBatchArgs, PnlBatchResult, TokenJobArgs, TokenPipelineOutput,
    FN_AGGREGATE_CROSS_TOKEN, FN_COORDINATE_TOKEN, FN_FETCH_ENTRY_PRICES_BATCH,
    FN_FETCH_FIRST_BUYERS, FN_FETCH_OHLCV_RALLIES, FN_FETCH_PNL_BATCH, FN_FETCH_RECENT_TRADES,
    FN_FETCH_TOP_HOLDERS, FN_FETCH_TOP_TRADERS,
};
use analysis_core::{
    AnalysisError, AnalysisOptions, AnalysisRequest, AnalysisResponse, AnalysisSummary, Candle,
    QualifiedWallet, RallyExport, ScoredWallet, TokenAth, TokenReport, TokenRequest,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rally_detection::{rally_to_export, RallyDetector};
use result_cache::ResultCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use task_queue::{Job, JobQueue, QueueName};
use tracker_client::MarketDataClient;
use uuid::Uuid;
use wallet_ranking::{aggregate_cross_token, score_token_wallets, ScoreWeights, TOP_WALLET_LIMIT};

/// Bounded wait for a single leaf result
pub const LEAF_WAIT_SECS: u64 = 600;
/// Bounded wait for a staggered sub-batch barrier
pub const BATCH_WAIT_SECS: u64 = 1800;
/// Bounded wait for the whole request
pub const REQUEST_WAIT_SECS: u64 = 3600;

const POLL_INTERVAL_MS: u64 = 1000;

/// In-process memo TTL for token ATH and supply lookups
const MEMO_TTL_SECS: i64 = 300;

/// Internal cache entry with timestamp
struct CacheEntry<T> {
    data: T,
    cached_at: DateTime<Utc>,
}

/// Request-scoped orchestration over the job runtime: fans each token out
/// into leaf fetches, coordinates qualification, and aggregates the final
/// cross-token ranking. Shared by every worker in the process.
pub struct AnalysisService {
    pub client: Arc<MarketDataClient>,
    pub cache: ResultCache,
    pub queue: JobQueue,
    pub detector: RallyDetector,
    weights: ScoreWeights,
    /// Memoised ATH per token (5-min TTL); one source of truth for both
    /// scoring and display within a run
    ath_cache: DashMap<String, CacheEntry<TokenAth>>,
    /// Memoised total supply per token (5-min TTL)
    supply_cache: DashMap<String, CacheEntry<Option<f64>>>,
}

impl AnalysisService {
    pub fn new(client: Arc<MarketDataClient>, cache: ResultCache, queue: JobQueue) -> Self {
        Self {
            client,
            cache,
            queue,
            detector: RallyDetector::default(),
            weights: ScoreWeights::default(),
            ath_cache: DashMap::new(),
            supply_cache: DashMap::new(),
        }
    }

    /// Token ATH through the hybrid lookup, memoised so repeat tokens in a
    /// batch (or the cached-qualified path) skip the provider round-trips.
    async fn resolve_ath(
        &self,
        address: &str,
        candles: &[Candle],
    ) -> Result<Option<TokenAth>, AnalysisError> {
        if let Some(entry) = self.ath_cache.get(address) {
            let age = (Utc::now() - entry.cached_at).num_seconds();
            if age < MEMO_TTL_SECS {
                return Ok(Some(entry.data));
            }
        }

        let ath = self.client.get_token_ath(address, candles).await?;
        if let Some(ath) = ath {
            self.ath_cache.insert(
                address.to_string(),
                CacheEntry {
                    data: ath,
                    cached_at: Utc::now(),
                },
            );
        }
        Ok(ath)
    }

    /// Total supply from token metadata, memoised. Display-only; a lookup
    /// failure is logged and never cached.
    async fn resolve_total_supply(&self, address: &str, ticker: &str) -> Option<f64> {
        if let Some(entry) = self.supply_cache.get(address) {
            let age = (Utc::now() - entry.cached_at).num_seconds();
            if age < MEMO_TTL_SECS {
                return entry.data;
            }
        }

        let supply = match self.client.get_token_metadata(address).await {
            Ok(Some(meta)) => meta.total_supply,
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(token = ticker, error = %e, "metadata unavailable");
                return None;
            }
        };

        self.supply_cache.insert(
            address.to_string(),
            CacheEntry {
                data: supply,
                cached_at: Utc::now(),
            },
        );
        supply
    }

    /// Run a full analysis request. Never panics and never fails the whole
    /// request over a single token; the envelope carries per-token errors.
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResponse, AnalysisError> {
        let request_id = Uuid::new_v4().to_string();
        self.analyze_with_request_id(request, &request_id).await
    }

    /// Same as `analyze`, with a caller-supplied request id. Re-running with
    /// the same id reuses every cached leaf and coordinator result.
    pub async fn analyze_with_request_id(
        &self,
        request: AnalysisRequest,
        request_id: &str,
    ) -> Result<AnalysisResponse, AnalysisError> {
        if request.tokens.is_empty() {
            return Err(AnalysisError::InvalidRequest("tokens array required".to_string()));
        }

        let options = request.options;
        tracing::info!(
            request = request_id,
            tokens = request.tokens.len(),
            min_roi = options.min_roi_multiplier,
            min_runner_hits = options.min_runner_hits,
            "analysis request accepted"
        );

        // One coordinator per token, ids derived from the request so a
        // restarted run finds its own earlier results
        let mut coordinator_ids = Vec::with_capacity(request.tokens.len());
        for token in &request.tokens {
            let coord_id = format!("coord:{}:{}", request_id, token.address);
            let args = TokenJobArgs {
                request_id: request_id.to_string(),
                token: token.clone(),
                options: options.clone(),
            };
            self.ensure_job(&coord_id, FN_COORDINATE_TOKEN, &args, QueueName::Compute, &[])
                .await?;
            coordinator_ids.push(coord_id);
        }

        // The aggregator proceeds even when a coordinator dies after saving
        // its result: every edge allows failure, the cache is authoritative
        let aggregate_id = format!("aggregate:{}", request_id);
        let agg_args = AggregateArgs {
            request_id: request_id.to_string(),
            tokens: request.tokens.clone(),
            coordinator_ids: coordinator_ids.clone(),
            options: options.clone(),
        };
        let deps: Vec<(String, bool)> = coordinator_ids
            .iter()
            .map(|id| (id.clone(), true))
            .collect();
        self.ensure_job(
            &aggregate_id,
            FN_AGGREGATE_CROSS_TOKEN,
            &agg_args,
            QueueName::Compute,
            &deps,
        )
        .await?;

        match self
            .wait_for_result::<AnalysisResponse>(&aggregate_id, REQUEST_WAIT_SECS)
            .await?
        {
            Some(response) => Ok(response),
            None => {
                // Mark the run abandoned so coordinators stop between
                // fan-in waits, then assemble whatever finished
                tracing::warn!(request = request_id, "request timed out, returning partial results");
                self.cache.mark_abandoned(request_id).await.ok();
                self.aggregate_results(&request.tokens, &coordinator_ids, &options)
                    .await
            }
        }
    }

    /// Merge coordinator outputs into the response envelope, attaching
    /// cross-token rankings and historical enrichment for the finalists.
    pub async fn aggregate_results(
        &self,
        tokens: &[TokenRequest],
        coordinator_ids: &[String],
        options: &AnalysisOptions,
    ) -> Result<AnalysisResponse, AnalysisError> {
        let mut reports = Vec::with_capacity(tokens.len());
        let mut per_token_scored: Vec<(String, Vec<ScoredWallet>)> = Vec::new();

        for (token, coord_id) in tokens.iter().zip(coordinator_ids) {
            match self
                .cache
                .load_job_result::<TokenPipelineOutput>(coord_id)
                .await
            {
                Ok(Some(output)) => {
                    if output.report.success {
                        per_token_scored.push((output.ticker.clone(), output.scored.clone()));
                    }
                    reports.push(output.report);
                }
                Ok(None) => {
                    reports.push(failed_report(token, "analysis did not complete"));
                }
                Err(e) => {
                    tracing::warn!(token = %token.ticker, error = %e, "unreadable coordinator result");
                    reports.push(failed_report(token, "analysis result unreadable"));
                }
            }
        }

        let mut ranking = aggregate_cross_token(&per_token_scored, options.min_runner_hits);

        // Historical enrichment: 30-day summaries for the finalists only,
        // so a wide batch stays linear in cost
        if tokens.len() >= 2 {
            let mut summaries: HashMap<String, u32> = HashMap::new();
            for wallet in ranking.top_wallets.iter().take(TOP_WALLET_LIMIT) {
                match self.client.get_wallet_summary(&wallet.address).await {
                    Ok(Some(summary)) => {
                        summaries.insert(wallet.address.clone(), summary.runner_count);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::debug!(wallet = %wallet.address, error = %e, "wallet summary unavailable");
                    }
                }
            }
            for wallet in ranking
                .top_wallets
                .iter_mut()
                .chain(ranking.cross_token_overlap.iter_mut())
            {
                if let Some(&runners) = summaries.get(&wallet.address) {
                    wallet.high_confidence_count = Some(runners);
                }
            }
        }

        let successful = reports.iter().filter(|r| r.success).count();
        let total_pumps = reports.iter().map(|r| r.rallies).sum();

        let response = AnalysisResponse {
            success: true,
            summary: AnalysisSummary {
                total_tokens: tokens.len(),
                successful,
                failed: tokens.len() - successful,
                total_pumps,
                cross_token_accounts: ranking.cross_token_count,
            },
            results: reports,
            cross_token_overlap: ranking.cross_token_overlap,
        };

        tracing::info!(
            tokens = tokens.len(),
            successful,
            total_pumps,
            cross_token = response.summary.cross_token_accounts,
            "analysis complete"
        );

        Ok(response)
    }

    /// The per-token sub-pipeline, executed inside a compute-queue job.
    pub async fn run_token_pipeline(
        &self,
        coord_id: &str,
        request_id: &str,
        token: &TokenRequest,
        options: &AnalysisOptions,
    ) -> Result<TokenPipelineOutput, AnalysisError> {
        let addr = &token.address;
        tracing::info!(token = %token.ticker, address = %addr, "token pipeline started");

        let leaf_args = LeafArgs {
            token: token.clone(),
            options: options.clone(),
        };

        // OHLCV + rally detection always run: the report needs rally shapes
        // and ATH resolution needs the series as its last fallback
        let ohlcv_id = format!("{}:ohlcv", coord_id);
        self.ensure_job(&ohlcv_id, FN_FETCH_OHLCV_RALLIES, &leaf_args, QueueName::High, &[])
            .await?;
        let Some(ohlcv) = self
            .wait_for_result::<OhlcvRallyResult>(&ohlcv_id, LEAF_WAIT_SECS)
            .await?
        else {
            return Ok(failed_output(token, "no price data available"));
        };

        if ohlcv.rallies.is_empty() {
            tracing::info!(token = %token.ticker, "no pumps detected");
            return Ok(empty_output(token, Vec::new(), "No significant pumps detected"));
        }

        let first_rally_start = ohlcv.rallies[0].start_time;
        let rally_details: Vec<RallyExport> = ohlcv
            .rallies
            .iter()
            .map(|r| rally_to_export(r, &ohlcv.candles))
            .collect();

        // Metadata is display-only supply; its loss never fails the token
        let total_supply = self.resolve_total_supply(addr, &token.ticker).await;

        // One ATH per invocation, shared by scoring and display
        let Some(ath) = self.resolve_ath(addr, &ohlcv.candles).await? else {
            return Ok(failed_output(token, "no usable price history for ath"));
        };

        let qualified = match self.cache.load_token_qualified(addr).await? {
            Some(snapshot) => {
                tracing::info!(
                    token = %token.ticker,
                    wallets = snapshot.wallet_count,
                    "reusing cached qualified wallets"
                );
                snapshot.qualified_wallets
            }
            None => {
                match self
                    .discover_and_qualify(
                        coord_id,
                        request_id,
                        token,
                        options,
                        &leaf_args,
                        &ath,
                        first_rally_start,
                    )
                    .await
                {
                    Ok(qualified) => qualified,
                    // Transient failures bubble up so the runtime retries
                    // the coordinator; anything else becomes a per-token
                    // error report and the request moves on
                    Err(e) if e.is_transient() => return Err(e),
                    Err(e) => {
                        tracing::warn!(token = %token.ticker, error = %e, "qualification failed");
                        return Ok(failed_output(token, &e.to_string()));
                    }
                }
            }
        };

        if qualified.is_empty() {
            tracing::info!(token = %token.ticker, "rallies found but no qualifying wallets");
            return Ok(empty_output(
                token,
                rally_details,
                "Pumps detected but no qualifying wallets",
            ));
        }

        let scored = score_token_wallets(
            &token.ticker,
            &qualified,
            &ath,
            total_supply,
            first_rally_start,
            &self.weights,
        );

        let report = TokenReport {
            token: token.clone(),
            success: true,
            rallies: rally_details.len(),
            rally_details,
            top_wallets: scored.iter().take(TOP_WALLET_LIMIT).cloned().collect(),
            pump_info: Some(format!("{} pump(s) detected", ohlcv.rallies.len())),
            error: None,
        };

        tracing::info!(
            token = %token.ticker,
            rallies = report.rallies,
            qualified = qualified.len(),
            "token pipeline finished"
        );

        Ok(TokenPipelineOutput {
            ticker: token.ticker.clone(),
            report,
            scored,
        })
    }

    /// Discovery fan-out, PnL qualification, and entry attachment for one
    /// token. Returns the persisted qualified set.
    #[allow(clippy::too_many_arguments)]
    async fn discover_and_qualify(
        &self,
        coord_id: &str,
        request_id: &str,
        token: &TokenRequest,
        options: &AnalysisOptions,
        leaf_args: &LeafArgs,
        ath: &TokenAth,
        first_rally_start: i64,
    ) -> Result<Vec<QualifiedWallet>, AnalysisError> {
        let addr = &token.address;

        // Phase 1: source fan-out. Traders, buyers, and recent trades are
        // latency-sensitive; the holder scan is heavy and goes to batch.
        let traders_id = format!("{}:traders", coord_id);
        let buyers_id = format!("{}:buyers", coord_id);
        let recent_id = format!("{}:recent", coord_id);
        let holders_id = format!("{}:holders", coord_id);

        self.ensure_job(&traders_id, FN_FETCH_TOP_TRADERS, leaf_args, QueueName::High, &[])
            .await?;
        self.ensure_job(&buyers_id, FN_FETCH_FIRST_BUYERS, leaf_args, QueueName::High, &[])
            .await?;
        self.ensure_job(&recent_id, FN_FETCH_RECENT_TRADES, leaf_args, QueueName::High, &[])
            .await?;
        self.ensure_job(&holders_id, FN_FETCH_TOP_HOLDERS, leaf_args, QueueName::Batch, &[])
            .await?;

        let traders = self
            .wait_for_result::<CandidateListResult>(&traders_id, LEAF_WAIT_SECS)
            .await?;
        let buyers = self
            .wait_for_result::<CandidateListResult>(&buyers_id, LEAF_WAIT_SECS)
            .await?;
        let recent = self
            .wait_for_result::<CandidateListResult>(&recent_id, LEAF_WAIT_SECS)
            .await?;
        let holders = self
            .wait_for_result::<CandidateListResult>(&holders_id, LEAF_WAIT_SECS)
            .await?;

        // Quorum: the strong sources carry the signal. Without at least one
        // of traders/buyers the qualified set would be noise.
        if traders.is_none() && buyers.is_none() {
            return Err(AnalysisError::ProviderBadData(
                "neither top traders nor first buyers completed".to_string(),
            ));
        }

        tracing::info!(
            token = %token.ticker,
            traders = traders.as_ref().map(|r| r.wallets.len()).unwrap_or(0),
            buyers = buyers.as_ref().map(|r| r.wallets.len()).unwrap_or(0),
            recent = recent.as_ref().map(|r| r.wallets.len()).unwrap_or(0),
            holders = holders.as_ref().map(|r| r.wallets.len()).unwrap_or(0),
            "source fan-out complete"
        );

        let merged = merge_candidates(
            [traders, buyers, recent, holders]
                .into_iter()
                .flatten()
                .map(|r| r.wallets)
                .collect(),
        );

        let (prequalified, pending) = split_prequalified(merged);
        tracing::info!(
            token = %token.ticker,
            prequalified = prequalified.len(),
            pending = pending.len(),
            "candidates split for qualification"
        );

        if self.cache.is_abandoned(request_id).await? {
            return Err(AnalysisError::Transient("request abandoned".to_string()));
        }

        // Phase 2: PnL qualification for the weak-source candidates
        let mut all_qualified: Vec<PnlQualified> = prequalified
            .into_iter()
            .map(|candidate| PnlQualified {
                candidate,
                realized_multiplier: 0.0,
                total_multiplier: 0.0,
            })
            .collect();

        let pnl_batches = chunk_batches(pending);
        if !pnl_batches.is_empty() {
            let parent_pnl = format!("{}:pnl", coord_id);
            self.cache.init_batch(&parent_pnl, pnl_batches.len() as i64).await?;

            let mut pnl_ids = Vec::with_capacity(pnl_batches.len());
            for (batch_idx, candidates) in pnl_batches.into_iter().enumerate() {
                let job_id = format!("{}:pnl:{}", coord_id, batch_idx);
                let args = PnlBatchArgs {
                    token: token.clone(),
                    parent_id: parent_pnl.clone(),
                    batch_idx,
                    candidates,
                    min_roi_multiplier: options.min_roi_multiplier,
                };
                self.ensure_job(&job_id, FN_FETCH_PNL_BATCH, &args, QueueName::Batch, &[])
                    .await?;
                pnl_ids.push(job_id);
            }

            self.wait_for_batch(&parent_pnl, &pnl_ids, BATCH_WAIT_SECS, request_id)
                .await?;

            for job_id in &pnl_ids {
                match self.cache.load_job_result::<PnlBatchResult>(job_id).await {
                    Ok(Some(result)) => all_qualified.extend(result.qualified),
                    Ok(None) => tracing::warn!(job = %job_id, "pnl batch missing, proceeding without it"),
                    Err(e) => tracing::warn!(job = %job_id, error = %e, "pnl batch unreadable, skipped"),
                }
            }
        }

        if all_qualified.is_empty() {
            return Ok(Vec::new());
        }

        if self.cache.is_abandoned(request_id).await? {
            return Err(AnalysisError::Transient("request abandoned".to_string()));
        }

        // Phase 3: entry-price attachment for every qualified wallet
        let parent_entry = format!("{}:entry", coord_id);
        let entry_batches = chunk_batches(all_qualified);
        self.cache
            .init_batch(&parent_entry, entry_batches.len() as i64)
            .await?;

        let mut entry_ids = Vec::with_capacity(entry_batches.len());
        for (batch_idx, entries) in entry_batches.into_iter().enumerate() {
            let job_id = format!("{}:entry:{}", coord_id, batch_idx);
            let args = EntryBatchArgs {
                token: token.clone(),
                parent_id: parent_entry.clone(),
                batch_idx,
                ath: *ath,
                first_rally_start,
                entries,
            };
            self.ensure_job(&job_id, FN_FETCH_ENTRY_PRICES_BATCH, &args, QueueName::Batch, &[])
                .await?;
            entry_ids.push(job_id);
        }

        self.wait_for_batch(&parent_entry, &entry_ids, BATCH_WAIT_SECS, request_id)
            .await?;

        let mut qualified = Vec::new();
        for job_id in &entry_ids {
            match self.cache.load_job_result::<EntryBatchResult>(job_id).await {
                Ok(Some(result)) => qualified.extend(result.wallets),
                Ok(None) => tracing::warn!(job = %job_id, "entry batch missing, proceeding without it"),
                Err(e) => tracing::warn!(job = %job_id, error = %e, "entry batch unreadable, skipped"),
            }
        }

        if !qualified.is_empty() {
            self.cache.store_token_qualified(addr, &qualified).await?;
        }

        Ok(qualified)
    }

    /// Enqueue a job with a deterministic id unless its result already
    /// exists; replays after a restart reuse everything that finished.
    async fn ensure_job<T: Serialize>(
        &self,
        job_id: &str,
        function: &str,
        args: &T,
        queue: QueueName,
        deps: &[(String, bool)],
    ) -> Result<(), AnalysisError> {
        if self
            .cache
            .get(&ResultCache::job_result_key(job_id))
            .await?
            .is_some()
        {
            tracing::debug!(job = %job_id, "result already cached, not re-enqueuing");
            return Ok(());
        }

        let args = serde_json::to_value(args)
            .map_err(|e| AnalysisError::Fatal(format!("serialize args: {}", e)))?;
        let mut job = Job::new(queue, function, args).with_id(job_id);
        for (dep_id, allow_failure) in deps {
            job = job.depends_on(dep_id.clone(), *allow_failure);
        }
        self.queue.enqueue(job).await?;
        Ok(())
    }

    /// Poll for a job result with a bounded wait. `None` on timeout or when
    /// the stored payload does not decode; the caller degrades.
    async fn wait_for_result<T: DeserializeOwned>(
        &self,
        job_id: &str,
        timeout_secs: u64,
    ) -> Result<Option<T>, AnalysisError> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);

        loop {
            match self.cache.load_job_result::<T>(job_id).await {
                Ok(Some(result)) => return Ok(Some(result)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(job = %job_id, error = %e, "stored result unreadable, dropping");
                    return Ok(None);
                }
            }

            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(job = %job_id, timeout_secs, "timed out waiting for job result");
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }

    /// Block until a sub-batch barrier completes or the bound expires.
    ///
    /// The done counter is the primary signal; counting results that are
    /// already present covers replays and a store restart that lost the
    /// `batch_total` key.
    async fn wait_for_batch(
        &self,
        parent_id: &str,
        job_ids: &[String],
        timeout_secs: u64,
        request_id: &str,
    ) -> Result<(), AnalysisError> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
        let known_total = job_ids.len() as i64;

        loop {
            let total = self
                .cache
                .batch_total(parent_id)
                .await?
                .unwrap_or(known_total);
            let counter = self.cache.batch_done(parent_id).await?;

            let mut present = 0i64;
            for job_id in job_ids {
                if self
                    .cache
                    .get(&ResultCache::job_result_key(job_id))
                    .await?
                    .is_some()
                {
                    present += 1;
                }
            }

            let done = counter.max(present);
            if done >= total {
                return Ok(());
            }

            if self.cache.is_abandoned(request_id).await? {
                tracing::warn!(parent = %parent_id, "request abandoned during batch wait");
                return Ok(());
            }

            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    parent = %parent_id,
                    done,
                    total,
                    "batch barrier timed out, proceeding with partial results"
                );
                return Ok(());
            }

            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }
    }
}

fn failed_report(token: &TokenRequest, error: &str) -> TokenReport {
    TokenReport {
        token: token.clone(),
        success: false,
        rallies: 0,
        rally_details: Vec::new(),
        top_wallets: Vec::new(),
        pump_info: None,
        error: Some(error.to_string()),
    }
}

fn failed_output(token: &TokenRequest, error: &str) -> TokenPipelineOutput {
    TokenPipelineOutput {
        ticker: token.ticker.clone(),
        report: failed_report(token, error),
        scored: Vec::new(),
    }
}

fn empty_output(
    token: &TokenRequest,
    rally_details: Vec<RallyExport>,
    pump_info: &str,
) -> TokenPipelineOutput {
    TokenPipelineOutput {
        ticker: token.ticker.clone(),
        report: TokenReport {
            token: token.clone(),
            success: true,
            rallies: rally_details.len(),
            rally_details,
            top_wallets: Vec::new(),
            pump_info: Some(pump_info.to_string()),
            error: None,
        },
        scored: Vec::new(),
    }
}
