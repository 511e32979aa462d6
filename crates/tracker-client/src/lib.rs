use analysis_core::{
    AnalysisError, Candle, CandidateWallet, CandleSize, Token, TokenAth, WalletPnl, WalletSource,
};
use chrono::Utc;
use provider_pool::{ApiKeyPool, RateLimiter, RequestAdapter};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://data.solanatracker.io";

/// Memecoin USD price sanity bound for swap-price extraction
const MAX_SANE_PRICE: f64 = 10.0;

/// Pagination safety cap when walking a token's trade history
const MAX_TRADE_PAGES: usize = 20;
const TRADE_PAGE_SIZE: usize = 100;

/// Typed client for the market-data provider. Every operation is a thin
/// projection of one endpoint; credentials rotate through the shared pool.
#[derive(Clone)]
pub struct MarketDataClient {
    client: Client,
    adapter: RequestAdapter,
}

/// 30-day cross-position summary for one wallet
#[derive(Debug, Clone)]
pub struct WalletSummary {
    pub realized_usd: f64,
    pub total_usd: f64,
    /// Positions that reached runner territory in the window
    pub runner_count: u32,
}

/// A wallet's aggregated entry into one token: mean price over its buys,
/// earliest timestamp, and the raw per-buy prices.
#[derive(Debug, Clone)]
pub struct EntryObservation {
    pub price_usd: f64,
    pub unix_time: i64,
    pub num_buys: u32,
    pub total_volume_usd: f64,
    pub prices: Vec<f64>,
}

impl MarketDataClient {
    pub fn new(api_keys: Vec<String>, cooldown_minutes: u64, rate_limit_per_minute: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(90))
            .build()
            .unwrap_or_else(|_| Client::new());

        let pool = Arc::new(ApiKeyPool::new(api_keys, cooldown_minutes));
        let limiter = RateLimiter::per_minute(rate_limit_per_minute);

        Self {
            client,
            adapter: RequestAdapter::new(pool, limiter),
        }
    }

    pub fn key_pool(&self) -> &Arc<ApiKeyPool> {
        self.adapter.pool()
    }

    fn get(&self, url: &str, credential: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("accept", "application/json")
            .header("x-api-key", credential)
    }

    /// Search tokens by symbol, name, or address. `min_liquidity` is also
    /// enforced client-side because the provider does not always honour it.
    pub async fn search_tokens(
        &self,
        query: &str,
        limit: usize,
        min_liquidity: f64,
        sort_by: &str,
    ) -> Result<Vec<Token>, AnalysisError> {
        let url = format!("{}/search", BASE_URL);
        let limit = limit.min(500).to_string();
        let min_liq = min_liquidity.to_string();

        let body: SearchResponse = self
            .adapter
            .send_json("search", |cred| {
                self.get(&url, cred).query(&[
                    ("query", query),
                    ("limit", limit.as_str()),
                    ("sortBy", sort_by),
                    ("sortOrder", "desc"),
                    ("minLiquidity", min_liq.as_str()),
                ])
            })
            .await?;

        if body.status.as_deref() == Some("error") {
            return Err(AnalysisError::ProviderBadData(
                "search: provider returned error status".to_string(),
            ));
        }

        let tokens = body
            .data
            .into_iter()
            .filter(|item| item.liquidity_usd >= min_liquidity)
            .map(|item| Token {
                address: item.mint,
                chain: "solana".to_string(),
                ticker: item.symbol,
                name: item.name,
                pair_address: item.pool_address,
                liquidity_usd: item.liquidity_usd,
                price_usd: item.price_usd,
                market_cap_usd: item.market_cap_usd,
                total_supply: item.total_supply,
                holders: item.holders,
                decimals: item.decimals.unwrap_or(6),
                lp_burn: item.lp_burn,
                mint_authority_revoked: false,
                freeze_authority_revoked: false,
                created_at: item.created_at,
            })
            .collect();

        Ok(tokens)
    }

    /// Token metadata with the primary (highest-liquidity) pool attached.
    /// `Ok(None)` when the token is unknown to the provider.
    pub async fn get_token_metadata(&self, address: &str) -> Result<Option<Token>, AnalysisError> {
        let url = format!("{}/tokens/{}", BASE_URL, address);

        let body: Option<TokenResponse> = self
            .adapter
            .send_json_opt("tokens", |cred| self.get(&url, cred))
            .await?;

        let Some(body) = body else {
            return Ok(None);
        };

        // Primary pool is the one with the deepest liquidity
        let primary = body
            .pools
            .iter()
            .max_by(|a, b| {
                a.liquidity
                    .usd
                    .partial_cmp(&b.liquidity.usd)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned();

        let Some(pool) = primary else {
            tracing::warn!(address, "token has no pools, treating as unknown");
            return Ok(None);
        };

        Ok(Some(Token {
            address: address.to_string(),
            chain: "solana".to_string(),
            ticker: body.token.symbol,
            name: body.token.name,
            pair_address: pool.pool_id,
            liquidity_usd: pool.liquidity.usd,
            price_usd: pool.price.usd,
            market_cap_usd: pool.market_cap.usd,
            total_supply: body.token.total_supply,
            holders: body.holders,
            decimals: body.token.decimals.unwrap_or(6),
            lp_burn: pool.lp_burn,
            mint_authority_revoked: pool.security.mint_authority.is_none(),
            freeze_authority_revoked: pool.security.freeze_authority.is_none(),
            created_at: pool.created_at,
        }))
    }

    /// OHLCV history, normalised to second timestamps and USD quote volume.
    /// `days_back` is clamped to the provider's 1..=90 range.
    pub async fn get_ohlcv(
        &self,
        address: &str,
        days_back: u32,
        resolution: CandleSize,
    ) -> Result<Vec<Candle>, AnalysisError> {
        let days_back = days_back.clamp(1, 90);
        let time_to = Utc::now().timestamp();
        let time_from = time_to - i64::from(days_back) * 86_400;
        let url = format!("{}/chart/{}", BASE_URL, address);
        let from = time_from.to_string();
        let to = time_to.to_string();

        let body: ChartResponse = self
            .adapter
            .send_json("chart", |cred| {
                self.get(&url, cred).query(&[
                    ("type", resolution.as_str()),
                    ("time_from", from.as_str()),
                    ("time_to", to.as_str()),
                    ("currency", "usd"),
                    ("removeOutliers", "true"),
                ])
            })
            .await?;

        let mut candles: Vec<Candle> = body
            .oclhv
            .into_iter()
            .map(|c| {
                // Provider reports ms; the series is kept in seconds
                let unix_time = if c.time > 10_000_000_000 {
                    c.time / 1000
                } else {
                    c.time
                };
                Candle {
                    unix_time,
                    open: c.open,
                    high: c.high,
                    low: c.low,
                    close: c.close,
                    volume: c.volume,
                    volume_usd: c.volume * c.close,
                }
            })
            .collect();

        candles.sort_by_key(|c| c.unix_time);
        candles.dedup_by_key(|c| c.unix_time);

        tracing::debug!(
            address,
            candles = candles.len(),
            resolution = resolution.as_str(),
            "ohlcv fetched"
        );
        Ok(candles)
    }

    /// Top traders for a token over a trailing window
    pub async fn get_top_traders(
        &self,
        address: &str,
        window_days: u32,
    ) -> Result<Vec<CandidateWallet>, AnalysisError> {
        let url = format!("{}/top-traders/{}", BASE_URL, address);
        let window = format!("{}d", window_days);

        let body: TopTradersResponse = self
            .adapter
            .send_json("top-traders", |cred| {
                self.get(&url, cred).query(&[("window", window.as_str())])
            })
            .await?;

        Ok(body
            .traders
            .into_iter()
            .filter(|t| !t.wallet.is_empty())
            .map(|t| {
                let mut candidate = CandidateWallet::new(t.wallet, WalletSource::TopTrader);
                candidate.total_volume_usd = t.total;
                candidate.first_buy_time = t.first_buy_time.map(normalize_unix);
                candidate
            })
            .collect())
    }

    /// Top holders pre-filtered by USD holding; heavier call, meant for the
    /// batch queue.
    pub async fn get_top_holders(
        &self,
        address: &str,
        min_holding_usd: f64,
        limit: usize,
    ) -> Result<Vec<CandidateWallet>, AnalysisError> {
        let url = format!("{}/tokens/{}/holders", BASE_URL, address);
        let limit = limit.min(1000).to_string();

        let body: HoldersResponse = self
            .adapter
            .send_json("holders", |cred| {
                self.get(&url, cred).query(&[("limit", limit.as_str())])
            })
            .await?;

        Ok(body
            .accounts
            .into_iter()
            .filter(|h| !h.wallet.is_empty() && h.value.usd >= min_holding_usd)
            .map(|h| {
                let mut candidate = CandidateWallet::new(h.wallet, WalletSource::TopHolder);
                candidate.holding_usd = Some(h.value.usd);
                candidate
            })
            .collect())
    }

    /// Earliest buyers of a token
    pub async fn get_first_buyers(&self, address: &str) -> Result<Vec<CandidateWallet>, AnalysisError> {
        let url = format!("{}/first-buyers/{}", BASE_URL, address);

        let body: Vec<FirstBuyerItem> = self
            .adapter
            .send_json("first-buyers", |cred| self.get(&url, cred))
            .await?;

        Ok(body
            .into_iter()
            .filter(|b| !b.wallet.is_empty())
            .map(|b| {
                let mut candidate = CandidateWallet::new(b.wallet, WalletSource::FirstBuyer);
                candidate.first_buy_time = b.first_buy_time.map(normalize_unix);
                candidate.total_volume_usd = b.total_invested;
                candidate
            })
            .collect())
    }

    /// Wallets that bought the token in a time window, aggregated per wallet
    /// from the paginated trade feed. Duplicate transactions are dropped by
    /// hash; pagination stops at the provider cap.
    pub async fn get_recent_trades(
        &self,
        address: &str,
        after_time: i64,
        before_time: i64,
    ) -> Result<Vec<CandidateWallet>, AnalysisError> {
        let buys = self
            .fetch_buys_in_window(address, after_time, before_time)
            .await?;
        let count = buys.len();
        let wallets = aggregate_buys(buys, WalletSource::RecentTrader);
        tracing::debug!(address, buys = count, wallets = wallets.len(), "recent trades aggregated");
        Ok(wallets)
    }

    /// Wallet-level PnL against one token. `Ok(None)` when the provider has
    /// no position data for the pair.
    pub async fn get_wallet_pnl(
        &self,
        wallet: &str,
        token: &str,
    ) -> Result<Option<WalletPnl>, AnalysisError> {
        let url = format!("{}/pnl/{}/{}", BASE_URL, wallet, token);

        let body: Option<PnlResponse> = self
            .adapter
            .send_json_opt("pnl", |cred| self.get(&url, cred))
            .await?;

        let Some(body) = body else {
            return Ok(None);
        };

        if body.total_invested <= 0.0 {
            return Ok(None);
        }

        Ok(Some(WalletPnl {
            realized_multiplier: 1.0 + body.realized / body.total_invested,
            total_multiplier: 1.0 + body.total / body.total_invested,
        }))
    }

    /// A wallet's entry into one token: all its buys in the trade feed,
    /// price-extracted and averaged. `Ok(None)` when no priced buy exists.
    pub async fn get_entry_price(
        &self,
        wallet: &str,
        token: &str,
    ) -> Result<Option<EntryObservation>, AnalysisError> {
        let url = format!("{}/trades/{}/by-wallet/{}", BASE_URL, token, wallet);

        let body: Option<TradesResponse> = self
            .adapter
            .send_json_opt("wallet-trades", |cred| {
                self.get(&url, cred)
                    .query(&[("sortDirection", "asc"), ("limit", "100")])
            })
            .await?;

        let Some(body) = body else {
            return Ok(None);
        };

        let mut prices = Vec::new();
        let mut timestamps = Vec::new();
        let mut total_volume_usd = 0.0;

        for tx in body.trades {
            if !tx.is_buy_of(token) {
                continue;
            }
            if let Some(price) = extract_swap_price(&tx, token) {
                prices.push(price);
                timestamps.push(normalize_unix(tx.time));
                total_volume_usd += tx.volume_usd;
            }
        }

        if prices.is_empty() {
            return Ok(None);
        }

        let mean_price = prices.iter().sum::<f64>() / prices.len() as f64;
        let first_time = timestamps.iter().copied().min().unwrap_or_default();

        Ok(Some(EntryObservation {
            price_usd: mean_price,
            unix_time: first_time,
            num_buys: prices.len() as u32,
            total_volume_usd,
            prices,
        }))
    }

    /// All-time high, resolved through a three-level hybrid: the provider's
    /// dedicated ATH endpoint, then the max of a 90-day 5-minute price
    /// history, then the max close of the candles already in hand.
    pub async fn get_token_ath(
        &self,
        address: &str,
        fallback_candles: &[Candle],
    ) -> Result<Option<TokenAth>, AnalysisError> {
        let url = format!("{}/tokens/{}/ath", BASE_URL, address);

        match self
            .adapter
            .send_json_opt::<AthResponse, _>("ath", |cred| self.get(&url, cred))
            .await
        {
            Ok(Some(body)) if body.highest_price > 0.0 => {
                return Ok(Some(TokenAth {
                    price_usd: body.highest_price,
                    unix_time: body.timestamp.map(normalize_unix).unwrap_or_default(),
                    market_cap_usd: body.highest_market_cap,
                }));
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(address, error = %e, "ath endpoint failed, falling back"),
        }

        // Second level: long price history
        match self.get_price_history_max(address, 90).await {
            Ok(Some(ath)) => return Ok(Some(ath)),
            Ok(None) => {}
            Err(e) => tracing::warn!(address, error = %e, "price history failed, falling back"),
        }

        // Last resort: the OHLCV series already fetched for rally detection
        let best = fallback_candles
            .iter()
            .filter(|c| c.close > 0.0)
            .max_by(|a, b| a.close.partial_cmp(&b.close).unwrap_or(std::cmp::Ordering::Equal));

        Ok(best.map(|c| TokenAth {
            price_usd: c.close,
            unix_time: c.unix_time,
            market_cap_usd: None,
        }))
    }

    /// 30-day performance summary for a wallet across all its positions.
    /// Used for historical enrichment of final candidates only; `Ok(None)`
    /// when the provider has nothing for the wallet.
    pub async fn get_wallet_summary(
        &self,
        wallet: &str,
    ) -> Result<Option<WalletSummary>, AnalysisError> {
        let url = format!("{}/pnl/{}", BASE_URL, wallet);

        let body: Option<WalletSummaryResponse> = self
            .adapter
            .send_json_opt("wallet-pnl", |cred| {
                self.get(&url, cred).query(&[("window", "30d")])
            })
            .await?;

        Ok(body.map(|b| WalletSummary {
            realized_usd: b.summary.realized,
            total_usd: b.summary.total,
            runner_count: b.summary.runners,
        }))
    }

    async fn get_price_history_max(
        &self,
        address: &str,
        days_back: i64,
    ) -> Result<Option<TokenAth>, AnalysisError> {
        let time_to = Utc::now().timestamp();
        let time_from = time_to - days_back * 86_400;
        let url = format!("{}/price/history", BASE_URL);
        let from = time_from.to_string();
        let to = time_to.to_string();

        let body: Option<PriceHistoryResponse> = self
            .adapter
            .send_json_opt("price-history", |cred| {
                self.get(&url, cred).query(&[
                    ("token", address),
                    ("type", "5m"),
                    ("time_from", from.as_str()),
                    ("time_to", to.as_str()),
                ])
            })
            .await?;

        let Some(body) = body else {
            return Ok(None);
        };

        let best = body.items.into_iter().filter(|p| p.value > 0.0).max_by(|a, b| {
            a.value
                .partial_cmp(&b.value)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(best.map(|p| TokenAth {
            price_usd: p.value,
            unix_time: normalize_unix(p.unix_time),
            market_cap_usd: None,
        }))
    }

    async fn fetch_buys_in_window(
        &self,
        address: &str,
        after_time: i64,
        before_time: i64,
    ) -> Result<Vec<BuyRecord>, AnalysisError> {
        let url = format!("{}/trades/{}", BASE_URL, address);
        let mut all_buys = Vec::new();
        let mut seen_txs: HashSet<String> = HashSet::new();
        let mut cursor: Option<String> = None;

        for page in 0..MAX_TRADE_PAGES {
            let after = after_time.to_string();
            let before = before_time.to_string();
            let limit = TRADE_PAGE_SIZE.to_string();
            let cursor_param = cursor.clone();

            let body: TradesResponse = self
                .adapter
                .send_json("trades", |cred| {
                    let mut builder = self.get(&url, cred).query(&[
                        ("after_time", after.as_str()),
                        ("before_time", before.as_str()),
                        ("sortDirection", "desc"),
                        ("limit", limit.as_str()),
                    ]);
                    if let Some(ref c) = cursor_param {
                        builder = builder.query(&[("cursor", c.as_str())]);
                    }
                    builder
                })
                .await?;

            let page_len = body.trades.len();
            for tx in body.trades {
                if !seen_txs.insert(tx.tx_hash.clone()) {
                    continue;
                }
                if !tx.is_buy_of(address) {
                    continue;
                }
                if let Some(price) = extract_swap_price(&tx, address) {
                    all_buys.push(BuyRecord {
                        wallet: tx.wallet.clone(),
                        unix_time: normalize_unix(tx.time),
                        volume_usd: tx.volume_usd,
                        price,
                    });
                }
            }

            if page_len < TRADE_PAGE_SIZE {
                break;
            }
            match body.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
            if page + 1 == MAX_TRADE_PAGES {
                tracing::warn!(address, "hit trade pagination cap, stopping");
            }
        }

        Ok(all_buys)
    }
}

/// One priced buy transaction
#[derive(Debug, Clone)]
pub struct BuyRecord {
    pub wallet: String,
    pub unix_time: i64,
    pub volume_usd: f64,
    pub price: f64,
}

/// Collapse per-transaction buys into one candidate per wallet: mean entry
/// price, earliest timestamp, summed volume.
pub fn aggregate_buys(buys: Vec<BuyRecord>, source: WalletSource) -> Vec<CandidateWallet> {
    let mut by_wallet: std::collections::HashMap<String, CandidateWallet> =
        std::collections::HashMap::new();

    for buy in buys {
        if buy.wallet.is_empty() || buy.price <= 0.0 {
            continue;
        }
        let entry = by_wallet
            .entry(buy.wallet.clone())
            .or_insert_with(|| CandidateWallet::new(buy.wallet.clone(), source));
        entry.total_volume_usd += buy.volume_usd;
        entry.num_buys += 1;
        entry.prices.push(buy.price);
        entry.first_buy_time = Some(match entry.first_buy_time {
            Some(t) => t.min(buy.unix_time),
            None => buy.unix_time,
        });
    }

    by_wallet.into_values().collect()
}

/// Extract a USD price per token from a swap transaction. Direct price
/// fields win when inside the sanity bound; otherwise the price is derived
/// from `volume_usd / token_amount` on whichever side references the mint.
pub fn extract_swap_price(tx: &TradeItem, mint: &str) -> Option<f64> {
    if let Some(price) = tx.price_usd {
        if price > 0.0 && price < MAX_SANE_PRICE {
            return Some(price);
        }
    }

    let token_amount = [&tx.from, &tx.to]
        .into_iter()
        .flatten()
        .find(|side| side.address == mint)
        .map(|side| side.amount)?;

    if token_amount > 0.0 && tx.volume_usd > 0.0 {
        let derived = tx.volume_usd / token_amount;
        if derived > 0.0 && derived < MAX_SANE_PRICE {
            return Some(derived);
        }
    }

    None
}

fn normalize_unix(t: i64) -> i64 {
    if t > 10_000_000_000 {
        t / 1000
    } else {
        t
    }
}

// ---------------------------------------------------------------------------
// Provider response structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    mint: String,
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "poolAddress")]
    pool_address: Option<String>,
    #[serde(default, rename = "liquidityUsd")]
    liquidity_usd: f64,
    #[serde(default, rename = "priceUsd")]
    price_usd: f64,
    #[serde(default, rename = "marketCapUsd")]
    market_cap_usd: f64,
    #[serde(default, rename = "totalSupply")]
    total_supply: Option<f64>,
    #[serde(default)]
    holders: u64,
    #[serde(default)]
    decimals: Option<u8>,
    #[serde(default, rename = "lpBurn")]
    lp_burn: f64,
    #[serde(default, rename = "createdAt")]
    created_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: TokenInfo,
    #[serde(default)]
    pools: Vec<PoolInfo>,
    #[serde(default)]
    holders: u64,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    decimals: Option<u8>,
    #[serde(default, rename = "totalSupply")]
    total_supply: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct PoolInfo {
    #[serde(default, rename = "poolId")]
    pool_id: Option<String>,
    #[serde(default)]
    liquidity: UsdValue,
    #[serde(default)]
    price: UsdValue,
    #[serde(default, rename = "marketCap")]
    market_cap: UsdValue,
    #[serde(default, rename = "lpBurn")]
    lp_burn: f64,
    #[serde(default)]
    security: PoolSecurity,
    #[serde(default, rename = "createdAt")]
    created_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct UsdValue {
    #[serde(default)]
    usd: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PoolSecurity {
    #[serde(default, rename = "mintAuthority")]
    mint_authority: Option<String>,
    #[serde(default, rename = "freezeAuthority")]
    freeze_authority: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    #[serde(default)]
    oclhv: Vec<ChartCandle>,
}

#[derive(Debug, Deserialize)]
struct ChartCandle {
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct TopTradersResponse {
    #[serde(default)]
    traders: Vec<TopTraderItem>,
}

#[derive(Debug, Deserialize)]
struct TopTraderItem {
    #[serde(default)]
    wallet: String,
    #[serde(default)]
    total: f64,
    #[serde(default, rename = "firstBuyTime")]
    first_buy_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct HoldersResponse {
    #[serde(default)]
    accounts: Vec<HolderItem>,
}

#[derive(Debug, Deserialize)]
struct HolderItem {
    #[serde(default)]
    wallet: String,
    #[serde(default)]
    value: UsdValue,
}

#[derive(Debug, Deserialize)]
struct FirstBuyerItem {
    #[serde(default)]
    wallet: String,
    #[serde(default, rename = "firstBuyTime")]
    first_buy_time: Option<i64>,
    #[serde(default, rename = "totalInvested")]
    total_invested: f64,
}

#[derive(Debug, Deserialize)]
struct TradesResponse {
    #[serde(default)]
    trades: Vec<TradeItem>,
    #[serde(default, rename = "nextCursor")]
    next_cursor: Option<String>,
}

/// One swap transaction from the trade feed
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradeItem {
    #[serde(default, rename = "tx")]
    pub tx_hash: String,
    #[serde(default)]
    pub wallet: String,
    #[serde(default)]
    pub time: i64,
    #[serde(default, rename = "type")]
    pub tx_type: String,
    #[serde(default, rename = "volumeUsd")]
    pub volume_usd: f64,
    #[serde(default, rename = "priceUsd")]
    pub price_usd: Option<f64>,
    #[serde(default)]
    pub from: Option<TradeSide>,
    #[serde(default)]
    pub to: Option<TradeSide>,
}

impl TradeItem {
    /// Buys either carry the `buy` type or receive the mint on the `to` side
    pub fn is_buy_of(&self, mint: &str) -> bool {
        if self.tx_type == "buy" {
            return true;
        }
        self.to.as_ref().is_some_and(|side| side.address == mint)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TradeSide {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub amount: f64,
}

#[derive(Debug, Deserialize)]
struct PnlResponse {
    #[serde(default)]
    realized: f64,
    #[serde(default)]
    total: f64,
    #[serde(default, rename = "totalInvested")]
    total_invested: f64,
}

#[derive(Debug, Deserialize)]
struct WalletSummaryResponse {
    #[serde(default)]
    summary: WalletSummaryBody,
}

#[derive(Debug, Default, Deserialize)]
struct WalletSummaryBody {
    #[serde(default)]
    realized: f64,
    #[serde(default)]
    total: f64,
    #[serde(default)]
    runners: u32,
}

#[derive(Debug, Deserialize)]
struct AthResponse {
    #[serde(default, rename = "highestPrice")]
    highest_price: f64,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default, rename = "highestMarketCap")]
    highest_market_cap: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PriceHistoryResponse {
    #[serde(default)]
    items: Vec<PricePoint>,
}

#[derive(Debug, Deserialize)]
struct PricePoint {
    #[serde(default, rename = "unixTime")]
    unix_time: i64,
    #[serde(default)]
    value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(price_usd: Option<f64>, volume_usd: f64, mint_side_amount: f64, mint: &str) -> TradeItem {
        TradeItem {
            tx_hash: "abc123".to_string(),
            wallet: "wallet-1".to_string(),
            time: 1_700_000_000,
            tx_type: "buy".to_string(),
            volume_usd,
            price_usd,
            from: Some(TradeSide {
                address: "So11111111111111111111111111111111111111112".to_string(),
                amount: 1.0,
            }),
            to: Some(TradeSide {
                address: mint.to_string(),
                amount: mint_side_amount,
            }),
        }
    }

    #[test]
    fn direct_price_wins_when_sane() {
        let tx = trade(Some(0.0031), 500.0, 100_000.0, "MINT");
        assert_eq!(extract_swap_price(&tx, "MINT"), Some(0.0031));
    }

    #[test]
    fn insane_direct_price_falls_back_to_volume() {
        let tx = trade(Some(4200.0), 500.0, 100_000.0, "MINT");
        let price = extract_swap_price(&tx, "MINT").unwrap();
        assert!((price - 0.005).abs() < 1e-12);
    }

    #[test]
    fn extraction_fails_without_usable_fields() {
        let tx = trade(None, 0.0, 100_000.0, "MINT");
        assert_eq!(extract_swap_price(&tx, "MINT"), None);

        // Derived price above the sanity bound is rejected too
        let tx = trade(None, 500.0, 10.0, "MINT");
        assert_eq!(extract_swap_price(&tx, "MINT"), None);
    }

    #[test]
    fn buys_aggregate_per_wallet() {
        let buys = vec![
            BuyRecord {
                wallet: "w1".to_string(),
                unix_time: 100,
                volume_usd: 50.0,
                price: 0.002,
            },
            BuyRecord {
                wallet: "w1".to_string(),
                unix_time: 90,
                volume_usd: 25.0,
                price: 0.004,
            },
            BuyRecord {
                wallet: "w2".to_string(),
                unix_time: 120,
                volume_usd: 10.0,
                price: 0.003,
            },
        ];

        let mut wallets = aggregate_buys(buys, WalletSource::RecentTrader);
        wallets.sort_by(|a, b| a.address.cmp(&b.address));

        assert_eq!(wallets.len(), 2);
        let w1 = &wallets[0];
        assert_eq!(w1.num_buys, 2);
        assert_eq!(w1.first_buy_time, Some(90));
        assert!((w1.total_volume_usd - 75.0).abs() < 1e-9);
        assert_eq!(w1.prices.len(), 2);
    }

    #[test]
    fn millisecond_timestamps_are_normalised() {
        assert_eq!(normalize_unix(1_700_000_000_000), 1_700_000_000);
        assert_eq!(normalize_unix(1_700_000_000), 1_700_000_000);
    }
}
