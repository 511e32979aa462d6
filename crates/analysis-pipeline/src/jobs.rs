use crate::candidates::{
    build_qualified, entry_from_candidate, passes_roi_gate, PnlQualified, SUB_BATCH_STAGGER_SECS,
};
use crate::pipeline::AnalysisService;
use analysis_core::{
    AnalysisError, AnalysisOptions, Candle, CandidateWallet, QualifiedWallet, Rally, ScoredWallet,
    TokenAth, TokenReport, TokenRequest,
};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use task_queue::{JobContext, JobHandler, JobRegistry};

// Job function names, shared between enqueue sites and the registry
pub const FN_FETCH_TOP_TRADERS: &str = "fetch_top_traders";
pub const FN_FETCH_FIRST_BUYERS: &str = "fetch_first_buyers";
pub const FN_FETCH_RECENT_TRADES: &str = "fetch_recent_trades";
pub const FN_FETCH_TOP_HOLDERS: &str = "fetch_top_holders";
pub const FN_FETCH_OHLCV_RALLIES: &str = "fetch_ohlcv_rallies";
pub const FN_FETCH_PNL_BATCH: &str = "fetch_pnl_batch";
pub const FN_FETCH_ENTRY_PRICES_BATCH: &str = "fetch_entry_prices_batch";
pub const FN_COORDINATE_TOKEN: &str = "coordinate_token_analysis";
pub const FN_AGGREGATE_CROSS_TOKEN: &str = "aggregate_cross_token";

// ---------------------------------------------------------------------------
// Job argument / result payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenJobArgs {
    pub request_id: String,
    pub token: TokenRequest,
    pub options: AnalysisOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafArgs {
    pub token: TokenRequest,
    pub options: AnalysisOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateListResult {
    pub wallets: Vec<CandidateWallet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OhlcvRallyResult {
    pub candles: Vec<Candle>,
    pub rallies: Vec<Rally>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlBatchArgs {
    pub token: TokenRequest,
    pub parent_id: String,
    pub batch_idx: usize,
    pub candidates: Vec<CandidateWallet>,
    pub min_roi_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlBatchResult {
    pub qualified: Vec<PnlQualified>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryBatchArgs {
    pub token: TokenRequest,
    pub parent_id: String,
    pub batch_idx: usize,
    pub ath: TokenAth,
    pub first_rally_start: i64,
    pub entries: Vec<PnlQualified>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryBatchResult {
    pub wallets: Vec<QualifiedWallet>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateArgs {
    pub request_id: String,
    pub tokens: Vec<TokenRequest>,
    pub coordinator_ids: Vec<String>,
    pub options: AnalysisOptions,
}

/// Per-token coordinator output: the shaped report plus the full scored
/// list the aggregator merges across tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPipelineOutput {
    pub ticker: String,
    pub report: TokenReport,
    pub scored: Vec<ScoredWallet>,
}

fn parse_args<T: serde::de::DeserializeOwned>(args: serde_json::Value) -> Result<T, AnalysisError> {
    serde_json::from_value(args)
        .map_err(|e| AnalysisError::InvalidRequest(format!("bad job args: {}", e)))
}

/// Store the handler's result under its own job id before returning it.
/// The cache is authoritative for dependents; the runtime's copy after the
/// status flip is a deterministic overwrite.
async fn finish<T: Serialize>(ctx: &JobContext, result: &T) -> Result<serde_json::Value, AnalysisError> {
    ctx.cache.store_job_result(&ctx.job_id, result).await?;
    serde_json::to_value(result).map_err(|e| AnalysisError::Fatal(format!("serialize result: {}", e)))
}

/// Stagger sub-batches so a fan-out does not land on the provider at once
async fn stagger(batch_idx: usize) {
    if batch_idx > 0 {
        tokio::time::sleep(Duration::from_secs(batch_idx as u64 * SUB_BATCH_STAGGER_SECS)).await;
    }
}

/// 3-6s pause between sequential requests inside a sub-batch
async fn request_jitter() {
    let ms = rand::rng().random_range(3000..6000);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// ---------------------------------------------------------------------------
// Leaf handlers
// ---------------------------------------------------------------------------

pub struct FetchTopTradersJob(pub Arc<AnalysisService>);

#[async_trait]
impl JobHandler for FetchTopTradersJob {
    async fn run(
        &self,
        ctx: JobContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AnalysisError> {
        let args: LeafArgs = parse_args(args)?;
        let wallets = self
            .0
            .client
            .get_top_traders(&args.token.address, args.options.analysis_timeframe.to_days())
            .await?;
        tracing::info!(token = %args.token.ticker, wallets = wallets.len(), "top traders fetched");
        finish(&ctx, &CandidateListResult { wallets }).await
    }
}

pub struct FetchFirstBuyersJob(pub Arc<AnalysisService>);

#[async_trait]
impl JobHandler for FetchFirstBuyersJob {
    async fn run(
        &self,
        ctx: JobContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AnalysisError> {
        let args: LeafArgs = parse_args(args)?;
        let wallets = self.0.client.get_first_buyers(&args.token.address).await?;
        tracing::info!(token = %args.token.ticker, wallets = wallets.len(), "first buyers fetched");
        finish(&ctx, &CandidateListResult { wallets }).await
    }
}

pub struct FetchRecentTradesJob(pub Arc<AnalysisService>);

#[async_trait]
impl JobHandler for FetchRecentTradesJob {
    async fn run(
        &self,
        ctx: JobContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AnalysisError> {
        let args: LeafArgs = parse_args(args)?;
        let now = chrono::Utc::now().timestamp();
        let after = now - i64::from(args.options.analysis_timeframe.to_days()) * 86_400;
        let wallets = self
            .0
            .client
            .get_recent_trades(&args.token.address, after, now)
            .await?;
        tracing::info!(token = %args.token.ticker, wallets = wallets.len(), "recent traders fetched");
        finish(&ctx, &CandidateListResult { wallets }).await
    }
}

pub struct FetchTopHoldersJob(pub Arc<AnalysisService>);

#[async_trait]
impl JobHandler for FetchTopHoldersJob {
    async fn run(
        &self,
        ctx: JobContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AnalysisError> {
        let args: LeafArgs = parse_args(args)?;
        let wallets = self
            .0
            .client
            .get_top_holders(&args.token.address, 100.0, 1000)
            .await?;
        tracing::info!(token = %args.token.ticker, wallets = wallets.len(), "top holders fetched");
        finish(&ctx, &CandidateListResult { wallets }).await
    }
}

/// OHLCV fetch and rally detection run in the same job: within one token
/// the detector always sees exactly the series that was fetched.
pub struct FetchOhlcvRalliesJob(pub Arc<AnalysisService>);

#[async_trait]
impl JobHandler for FetchOhlcvRalliesJob {
    async fn run(
        &self,
        ctx: JobContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AnalysisError> {
        let args: LeafArgs = parse_args(args)?;
        let candles = self
            .0
            .client
            .get_ohlcv(
                &args.token.address,
                args.options.analysis_timeframe.to_days(),
                args.options.candle_size,
            )
            .await?;

        let rallies = self.0.detector.detect_all(&candles);
        tracing::info!(
            token = %args.token.ticker,
            candles = candles.len(),
            rallies = rallies.len(),
            "ohlcv fetched and rallies detected"
        );
        finish(&ctx, &OhlcvRallyResult { candles, rallies }).await
    }
}

// ---------------------------------------------------------------------------
// Batch handlers
// ---------------------------------------------------------------------------

/// PnL qualification for one sub-batch. Requests run strictly one at a
/// time with jitter; the whole batch sleeps `batch_idx * 8s` on entry.
/// Wallets the provider has no data for are dropped, never retried.
pub struct FetchPnlBatchJob(pub Arc<AnalysisService>);

#[async_trait]
impl JobHandler for FetchPnlBatchJob {
    async fn run(
        &self,
        ctx: JobContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AnalysisError> {
        let args: PnlBatchArgs = parse_args(args)?;
        stagger(args.batch_idx).await;

        let mut qualified = Vec::new();
        for (i, candidate) in args.candidates.iter().enumerate() {
            if i > 0 {
                request_jitter().await;
            }
            match self
                .0
                .client
                .get_wallet_pnl(&candidate.address, &args.token.address)
                .await
            {
                Ok(Some(pnl)) => {
                    if passes_roi_gate(
                        pnl.realized_multiplier,
                        pnl.total_multiplier,
                        args.min_roi_multiplier,
                    ) {
                        qualified.push(PnlQualified {
                            candidate: candidate.clone(),
                            realized_multiplier: pnl.realized_multiplier,
                            total_multiplier: pnl.total_multiplier,
                        });
                    } else {
                        tracing::debug!(
                            wallet = %candidate.address,
                            realized = pnl.realized_multiplier,
                            total = pnl.total_multiplier,
                            "wallet below roi gate"
                        );
                    }
                }
                Ok(None) => {
                    tracing::debug!(wallet = %candidate.address, "no pnl data, dropping wallet");
                }
                Err(e) => {
                    tracing::warn!(wallet = %candidate.address, error = %e, "pnl fetch failed, dropping wallet");
                }
            }
        }

        tracing::info!(
            token = %args.token.ticker,
            batch = args.batch_idx,
            checked = args.candidates.len(),
            qualified = qualified.len(),
            "pnl batch complete"
        );

        let value = finish(&ctx, &PnlBatchResult { qualified }).await?;
        self.0.cache.mark_batch_done(&args.parent_id).await?;
        Ok(value)
    }
}

/// Entry-price attachment for one sub-batch of qualified wallets
pub struct FetchEntryPricesBatchJob(pub Arc<AnalysisService>);

#[async_trait]
impl JobHandler for FetchEntryPricesBatchJob {
    async fn run(
        &self,
        ctx: JobContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AnalysisError> {
        let args: EntryBatchArgs = parse_args(args)?;
        stagger(args.batch_idx).await;

        let mut wallets = Vec::new();
        for (i, entry) in args.entries.iter().enumerate() {
            if i > 0 {
                request_jitter().await;
            }

            let observation = match self
                .0
                .client
                .get_entry_price(&entry.candidate.address, &args.token.address)
                .await
            {
                Ok(Some(obs)) => Some(obs),
                Ok(None) => entry_from_candidate(&entry.candidate),
                Err(e) => {
                    tracing::warn!(
                        wallet = %entry.candidate.address,
                        error = %e,
                        "entry price fetch failed, trying discovery prices"
                    );
                    entry_from_candidate(&entry.candidate)
                }
            };

            let Some(observation) = observation else {
                tracing::debug!(wallet = %entry.candidate.address, "no entry price, dropping wallet");
                continue;
            };

            match build_qualified(entry, &observation, &args.ath, args.first_rally_start) {
                Some(wallet) => wallets.push(wallet),
                None => tracing::debug!(
                    wallet = %entry.candidate.address,
                    "entry after rally start, rejected"
                ),
            }
        }

        tracing::info!(
            token = %args.token.ticker,
            batch = args.batch_idx,
            attached = wallets.len(),
            "entry price batch complete"
        );

        let value = finish(&ctx, &EntryBatchResult { wallets }).await?;
        self.0.cache.mark_batch_done(&args.parent_id).await?;
        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Coordinators
// ---------------------------------------------------------------------------

pub struct CoordinateTokenJob(pub Arc<AnalysisService>);

#[async_trait]
impl JobHandler for CoordinateTokenJob {
    async fn run(
        &self,
        ctx: JobContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AnalysisError> {
        let args: TokenJobArgs = parse_args(args)?;
        let output = self
            .0
            .run_token_pipeline(&ctx.job_id, &args.request_id, &args.token, &args.options)
            .await?;
        finish(&ctx, &output).await
    }
}

pub struct AggregateCrossTokenJob(pub Arc<AnalysisService>);

#[async_trait]
impl JobHandler for AggregateCrossTokenJob {
    async fn run(
        &self,
        ctx: JobContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, AnalysisError> {
        let args: AggregateArgs = parse_args(args)?;
        let response = self
            .0
            .aggregate_results(&args.tokens, &args.coordinator_ids, &args.options)
            .await?;
        finish(&ctx, &response).await
    }
}

/// Register every pipeline handler into a worker registry
pub fn register_handlers(registry: &mut JobRegistry, service: Arc<AnalysisService>) {
    registry.register(FN_FETCH_TOP_TRADERS, Arc::new(FetchTopTradersJob(service.clone())));
    registry.register(FN_FETCH_FIRST_BUYERS, Arc::new(FetchFirstBuyersJob(service.clone())));
    registry.register(FN_FETCH_RECENT_TRADES, Arc::new(FetchRecentTradesJob(service.clone())));
    registry.register(FN_FETCH_TOP_HOLDERS, Arc::new(FetchTopHoldersJob(service.clone())));
    registry.register(FN_FETCH_OHLCV_RALLIES, Arc::new(FetchOhlcvRalliesJob(service.clone())));
    registry.register(FN_FETCH_PNL_BATCH, Arc::new(FetchPnlBatchJob(service.clone())));
    registry.register(
        FN_FETCH_ENTRY_PRICES_BATCH,
        Arc::new(FetchEntryPricesBatchJob(service.clone())),
    );
    registry.register(FN_COORDINATE_TOKEN, Arc::new(CoordinateTokenJob(service.clone())));
    registry.register(FN_AGGREGATE_CROSS_TOKEN, Arc::new(AggregateCrossTokenJob(service)));
}
