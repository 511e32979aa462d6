use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Candle resolution supported by the chart endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CandleSize {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl CandleSize {
    /// Wire value used by the chart endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            CandleSize::Minute1 => "1m",
            CandleSize::Minute5 => "5m",
            CandleSize::Minute15 => "15m",
            CandleSize::Hour1 => "1h",
            CandleSize::Hour4 => "4h",
            CandleSize::Day1 => "1d",
        }
    }

    pub fn to_minutes(&self) -> i64 {
        match self {
            CandleSize::Minute1 => 1,
            CandleSize::Minute5 => 5,
            CandleSize::Minute15 => 15,
            CandleSize::Hour1 => 60,
            CandleSize::Hour4 => 240,
            CandleSize::Day1 => 1440,
        }
    }
}

impl Default for CandleSize {
    fn default() -> Self {
        CandleSize::Minute5
    }
}

/// Analysis window for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisTimeframe {
    #[serde(rename = "last_24h")]
    Last24h,
    #[serde(rename = "last_3d")]
    Last3d,
    #[serde(rename = "last_7d")]
    Last7d,
    #[serde(rename = "last_30d")]
    Last30d,
    #[serde(rename = "all")]
    All,
}

impl AnalysisTimeframe {
    /// Days of history to fetch for this window (chart endpoint takes 1..=90)
    pub fn to_days(&self) -> u32 {
        match self {
            AnalysisTimeframe::Last24h => 1,
            AnalysisTimeframe::Last3d => 3,
            AnalysisTimeframe::Last7d => 7,
            AnalysisTimeframe::Last30d => 30,
            AnalysisTimeframe::All => 90,
        }
    }
}

impl Default for AnalysisTimeframe {
    fn default() -> Self {
        AnalysisTimeframe::Last7d
    }
}

/// Token metadata resolved from the data provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    pub chain: String,
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub pair_address: Option<String>,
    #[serde(default)]
    pub liquidity_usd: f64,
    #[serde(default)]
    pub price_usd: f64,
    #[serde(default)]
    pub market_cap_usd: f64,
    #[serde(default)]
    pub total_supply: Option<f64>,
    #[serde(default)]
    pub holders: u64,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    #[serde(default)]
    pub lp_burn: f64,
    #[serde(default)]
    pub mint_authority_revoked: bool,
    #[serde(default)]
    pub freeze_authority_revoked: bool,
    #[serde(default)]
    pub created_at: Option<i64>,
}

fn default_decimals() -> u8 {
    6
}

/// One OHLCV candle. `unix_time` is in seconds and strictly increasing
/// within a series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub unix_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base-token volume
    pub volume: f64,
    /// Quote volume in USD
    pub volume_usd: f64,
}

impl Candle {
    pub fn is_green(&self) -> bool {
        self.close > self.open
    }

    /// Absolute open→close move as a percentage of the open
    pub fn body_move_pct(&self) -> f64 {
        if self.open <= 0.0 {
            return 0.0;
        }
        ((self.close - self.open) / self.open * 100.0).abs()
    }

    /// Signed open→close gain as a percentage of the open
    pub fn gain_pct(&self) -> f64 {
        if self.open <= 0.0 {
            return 0.0;
        }
        (self.close - self.open) / self.open * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RallyType {
    Explosive,
    Choppy,
    Grind,
    UltraChoppy,
    Standard,
}

impl RallyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RallyType::Explosive => "explosive",
            RallyType::Choppy => "choppy",
            RallyType::Grind => "grind",
            RallyType::UltraChoppy => "ultra_choppy",
            RallyType::Standard => "standard",
        }
    }
}

/// A contiguous upward price window detected in a candle series.
///
/// Indices refer to the series the rally was detected in. `start_price` is
/// the close of the candle before the window (or the first open at index 0).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rally {
    pub start_idx: usize,
    pub end_idx: usize,
    pub length: usize,
    pub total_gain: f64,
    pub peak_gain: f64,
    pub green_ratio: f64,
    pub green_count: usize,
    pub red_count: usize,
    pub rally_type: RallyType,
    pub combined_volume: f64,
    pub start_price: f64,
    pub end_price: f64,
    pub peak_price: f64,
    pub max_drawdown: f64,
    pub start_time: i64,
    pub end_time: i64,
}

/// Where a candidate wallet was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletSource {
    TopTrader,
    FirstBuyer,
    TopHolder,
    RecentTrader,
}

/// A wallet discovered by one or more sources, before qualification.
/// Merging candidates for the same address unions sources and sums the
/// per-source metrics; the merge is commutative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateWallet {
    pub address: String,
    pub sources: BTreeSet<WalletSource>,
    #[serde(default)]
    pub total_volume_usd: f64,
    #[serde(default)]
    pub holding_usd: Option<f64>,
    #[serde(default)]
    pub first_buy_time: Option<i64>,
    #[serde(default)]
    pub num_buys: u32,
    /// Per-buy extracted prices, kept for the consistency component
    #[serde(default)]
    pub prices: Vec<f64>,
}

impl CandidateWallet {
    pub fn new(address: impl Into<String>, source: WalletSource) -> Self {
        let mut sources = BTreeSet::new();
        sources.insert(source);
        Self {
            address: address.into(),
            sources,
            total_volume_usd: 0.0,
            holding_usd: None,
            first_buy_time: None,
            num_buys: 0,
            prices: Vec::new(),
        }
    }

    /// Fold another sighting of the same address into this candidate
    pub fn merge(&mut self, other: CandidateWallet) {
        self.sources.extend(other.sources);
        self.total_volume_usd += other.total_volume_usd;
        self.holding_usd = match (self.holding_usd, other.holding_usd) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.first_buy_time = match (self.first_buy_time, other.first_buy_time) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.num_buys += other.num_buys;
        self.prices.extend(other.prices);
    }
}

/// Wallet-level PnL for one token as reported by the provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WalletPnl {
    pub realized_multiplier: f64,
    pub total_multiplier: f64,
}

/// Entry price and timestamp for a wallet's position in one token
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EntryPrice {
    pub price_usd: f64,
    pub unix_time: i64,
}

/// Token all-time high resolved by the hybrid lookup
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenAth {
    pub price_usd: f64,
    pub unix_time: i64,
    #[serde(default)]
    pub market_cap_usd: Option<f64>,
}

/// A candidate that passed qualification for the subject token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualifiedWallet {
    pub address: String,
    pub sources: BTreeSet<WalletSource>,
    pub entry_price: f64,
    pub entry_time: i64,
    pub realized_multiplier: f64,
    pub total_multiplier: f64,
    pub entry_to_ath_multiplier: f64,
    pub distance_to_ath_pct: f64,
    #[serde(default)]
    pub holding_usd: Option<f64>,
    #[serde(default)]
    pub num_buys: u32,
    /// Per-buy prices carried over from discovery
    #[serde(default)]
    pub entry_prices: Vec<f64>,
    #[serde(default)]
    pub total_volume_usd: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    S,
    A,
    B,
    C,
}

/// Final ranked wallet as exported in the response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredWallet {
    pub address: String,
    pub tier: Tier,
    pub professional_score: f64,
    pub consistency_score: f64,
    pub entry_to_ath_multiplier: f64,
    pub realized_multiplier: f64,
    pub total_multiplier: f64,
    pub distance_to_ath_pct: f64,
    pub entry_price: f64,
    pub entry_time: i64,
    /// Display only; never feeds back into scoring
    #[serde(default)]
    pub entry_market_cap: Option<f64>,
    /// Display only; never feeds back into scoring
    #[serde(default)]
    pub ath_market_cap: Option<f64>,
    pub tokens_hit: Vec<String>,
    pub pumps_called: u32,
    pub avg_timing_minutes: f64,
    pub earliest_call_minutes: f64,
    #[serde(default)]
    pub high_confidence_count: Option<u32>,
}

/// Per-token snapshot persisted under `token_qualified:{address}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenQualifiedSnapshot {
    pub token_address: String,
    pub qualified_wallets: Vec<QualifiedWallet>,
    pub wallet_count: usize,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Request / response envelope
// ---------------------------------------------------------------------------

/// Token as supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub address: String,
    #[serde(default = "default_chain")]
    pub chain: String,
    pub ticker: String,
    pub name: String,
    #[serde(default)]
    pub pair_address: Option<String>,
}

fn default_chain() -> String {
    "solana".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOptions {
    #[serde(default = "default_min_roi")]
    pub min_roi_multiplier: f64,
    #[serde(default = "default_min_runner_hits")]
    pub min_runner_hits: usize,
    #[serde(default)]
    pub analysis_timeframe: AnalysisTimeframe,
    #[serde(default)]
    pub candle_size: CandleSize,
}

fn default_min_roi() -> f64 {
    5.0
}

fn default_min_runner_hits() -> usize {
    2
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            min_roi_multiplier: default_min_roi(),
            min_runner_hits: default_min_runner_hits(),
            analysis_timeframe: AnalysisTimeframe::default(),
            candle_size: CandleSize::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub tokens: Vec<TokenRequest>,
    #[serde(default)]
    pub options: AnalysisOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeData {
    pub avg_volume: f64,
    pub peak_volume: f64,
    pub volume_spike_ratio: f64,
}

/// Rally shaped for the response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RallyExport {
    pub start_time: i64,
    pub end_time: i64,
    pub total_gain_pct: f64,
    pub peak_gain_pct: f64,
    pub rally_type: RallyType,
    pub candle_count: usize,
    pub green_ratio_pct: f64,
    pub volume_data: VolumeData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenReport {
    pub token: TokenRequest,
    pub success: bool,
    pub rallies: usize,
    #[serde(default)]
    pub rally_details: Vec<RallyExport>,
    #[serde(default)]
    pub top_wallets: Vec<ScoredWallet>,
    #[serde(default)]
    pub pump_info: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub total_tokens: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_pumps: usize,
    pub cross_token_accounts: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub summary: AnalysisSummary,
    pub results: Vec<TokenReport>,
    pub cross_token_overlap: Vec<ScoredWallet>,
}
