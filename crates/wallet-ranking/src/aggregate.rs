use crate::scoring::{assign_tier, professional_score, ScoreWeights};
use analysis_core::{QualifiedWallet, ScoredWallet, TokenAth};
use std::collections::HashMap;

/// Final output length for ranked wallet lists
pub const TOP_WALLET_LIMIT: usize = 20;
/// Cross-token overlap section cap
pub const OVERLAP_LIMIT: usize = 10;

/// Score one token's qualified wallets and order them best-first.
/// Ties break toward the earlier entry.
pub fn score_token_wallets(
    ticker: &str,
    wallets: &[QualifiedWallet],
    ath: &TokenAth,
    total_supply: Option<f64>,
    first_rally_start: i64,
    weights: &ScoreWeights,
) -> Vec<ScoredWallet> {
    let ath_market_cap = ath
        .market_cap_usd
        .or_else(|| total_supply.map(|s| ath.price_usd * s));

    let mut scored: Vec<ScoredWallet> = wallets
        .iter()
        .map(|w| {
            let (score, consistency) = professional_score(w, weights);
            let timing_minutes = (w.entry_time - first_rally_start) as f64 / 60.0;

            ScoredWallet {
                address: w.address.clone(),
                tier: assign_tier(1, w.distance_to_ath_pct, 0.0),
                professional_score: score,
                consistency_score: consistency,
                entry_to_ath_multiplier: w.entry_to_ath_multiplier,
                realized_multiplier: w.realized_multiplier,
                total_multiplier: w.total_multiplier,
                distance_to_ath_pct: w.distance_to_ath_pct,
                entry_price: w.entry_price,
                entry_time: w.entry_time,
                entry_market_cap: total_supply.map(|s| w.entry_price * s),
                ath_market_cap,
                tokens_hit: vec![ticker.to_string()],
                pumps_called: 1,
                avg_timing_minutes: timing_minutes,
                earliest_call_minutes: timing_minutes,
                high_confidence_count: None,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.professional_score
            .partial_cmp(&a.professional_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.entry_time.cmp(&b.entry_time))
    });

    scored
}

struct WalletAccumulator {
    entries: Vec<ScoredWallet>,
    tickers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CrossTokenRanking {
    /// Final ranked list: cross-token wallets first, single-token backfill
    /// to the output limit
    pub top_wallets: Vec<ScoredWallet>,
    /// Wallets qualifying in at least `min_runner_hits` tokens
    pub cross_token_overlap: Vec<ScoredWallet>,
    /// How many wallets crossed the overlap threshold, before the cap
    pub cross_token_count: usize,
}

/// Merge per-token rankings into the final cross-token ordering.
///
/// Every wallet hitting at least `min_runner_hits` tokens outranks every
/// wallet with fewer hits, regardless of single-token score; inside each
/// group the ordering is overlap count, then mean professional score.
pub fn aggregate_cross_token(
    per_token: &[(String, Vec<ScoredWallet>)],
    min_runner_hits: usize,
) -> CrossTokenRanking {
    let mut by_address: HashMap<String, WalletAccumulator> = HashMap::new();

    for (ticker, wallets) in per_token {
        for wallet in wallets {
            let acc = by_address
                .entry(wallet.address.clone())
                .or_insert_with(|| WalletAccumulator {
                    entries: Vec::new(),
                    tickers: Vec::new(),
                });
            acc.entries.push(wallet.clone());
            if !acc.tickers.contains(ticker) {
                acc.tickers.push(ticker.clone());
            }
        }
    }

    let mut merged: Vec<ScoredWallet> = by_address
        .into_iter()
        .map(|(address, acc)| merge_wallet(address, acc))
        .collect();

    let min_hits = min_runner_hits.max(1);
    let mut cross: Vec<ScoredWallet> = Vec::new();
    let mut singles: Vec<ScoredWallet> = Vec::new();
    for wallet in merged.drain(..) {
        if wallet.tokens_hit.len() >= min_hits {
            cross.push(wallet);
        } else {
            singles.push(wallet);
        }
    }

    cross.sort_by(|a, b| {
        b.tokens_hit
            .len()
            .cmp(&a.tokens_hit.len())
            .then(
                b.professional_score
                    .partial_cmp(&a.professional_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.entry_time.cmp(&b.entry_time))
    });
    singles.sort_by(|a, b| {
        b.professional_score
            .partial_cmp(&a.professional_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.entry_time.cmp(&b.entry_time))
    });

    let cross_token_count = cross.len();
    let cross_token_overlap: Vec<ScoredWallet> =
        cross.iter().take(OVERLAP_LIMIT).cloned().collect();

    let mut top_wallets = cross;
    for wallet in singles {
        if top_wallets.len() >= TOP_WALLET_LIMIT {
            break;
        }
        top_wallets.push(wallet);
    }
    top_wallets.truncate(TOP_WALLET_LIMIT);

    tracing::debug!(
        cross = cross_token_overlap.len(),
        total = top_wallets.len(),
        "cross-token aggregation complete"
    );

    CrossTokenRanking {
        top_wallets,
        cross_token_overlap,
        cross_token_count,
    }
}

/// Collapse one wallet's per-token entries into a single record. The
/// highest-scoring entry is the representative for price/display fields;
/// the professional score becomes the mean across tokens; tier is assigned
/// from cross-token pump count and distance statistics.
fn merge_wallet(address: String, acc: WalletAccumulator) -> ScoredWallet {
    let pump_count: u32 = acc.entries.iter().map(|e| e.pumps_called).sum();

    let avg_score = acc
        .entries
        .iter()
        .map(|e| e.professional_score)
        .sum::<f64>()
        / acc.entries.len() as f64;

    let distances: Vec<f64> = acc.entries.iter().map(|e| e.distance_to_ath_pct).collect();
    let avg_distance = distances.iter().sum::<f64>() / distances.len() as f64;
    let stdev_distance = sample_stdev(&distances);

    let timings: Vec<f64> = acc.entries.iter().map(|e| e.avg_timing_minutes).collect();
    let avg_timing = timings.iter().sum::<f64>() / timings.len() as f64;
    let earliest = acc
        .entries
        .iter()
        .map(|e| e.earliest_call_minutes)
        .fold(f64::INFINITY, f64::min);

    let representative = acc
        .entries
        .iter()
        .max_by(|a, b| {
            a.professional_score
                .partial_cmp(&b.professional_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .cloned()
        .unwrap_or_else(|| acc.entries[0].clone());

    let mut tokens_hit = acc.tickers;
    tokens_hit.sort();

    ScoredWallet {
        address,
        tier: assign_tier(pump_count, avg_distance, stdev_distance),
        professional_score: avg_score,
        consistency_score: representative.consistency_score,
        entry_to_ath_multiplier: representative.entry_to_ath_multiplier,
        realized_multiplier: representative.realized_multiplier,
        total_multiplier: representative.total_multiplier,
        distance_to_ath_pct: avg_distance,
        entry_price: representative.entry_price,
        entry_time: representative.entry_time,
        entry_market_cap: representative.entry_market_cap,
        ath_market_cap: representative.ath_market_cap,
        tokens_hit,
        pumps_called: pump_count,
        avg_timing_minutes: avg_timing,
        earliest_call_minutes: if earliest.is_finite() { earliest } else { 0.0 },
        high_confidence_count: None,
    }
}

fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::Tier;
    use std::collections::BTreeSet;

    fn qualified(address: &str, entry_to_ath: f64, entry_time: i64) -> QualifiedWallet {
        QualifiedWallet {
            address: address.to_string(),
            sources: BTreeSet::new(),
            entry_price: 0.001,
            entry_time,
            realized_multiplier: 2.0,
            total_multiplier: 3.0,
            entry_to_ath_multiplier: entry_to_ath,
            distance_to_ath_pct: (1.0 - 1.0 / entry_to_ath.max(1.0)) * 100.0,
            holding_usd: None,
            num_buys: 1,
            entry_prices: vec![0.001],
            total_volume_usd: 100.0,
        }
    }

    fn ath() -> TokenAth {
        TokenAth {
            price_usd: 0.01,
            unix_time: 1_700_100_000,
            market_cap_usd: None,
        }
    }

    #[test]
    fn token_ranking_orders_by_score_then_entry_time() {
        let wallets = vec![
            qualified("late-strong", 50.0, 2_000),
            qualified("early-strong", 50.0, 1_000),
            qualified("weak", 2.0, 500),
        ];
        let scored = score_token_wallets(
            "TEST",
            &wallets,
            &ath(),
            Some(1_000_000_000.0),
            10_000,
            &ScoreWeights::default(),
        );

        assert_eq!(scored[0].address, "early-strong");
        assert_eq!(scored[1].address, "late-strong");
        assert_eq!(scored[2].address, "weak");

        // Market caps are attached for display
        assert!(scored[0].entry_market_cap.is_some());
        assert!(scored[0].ath_market_cap.is_some());
        // Entry before the rally start reads as negative minutes
        assert!(scored[0].avg_timing_minutes < 0.0);
    }

    #[test]
    fn cross_token_wallet_outranks_stronger_single_token_wallet() {
        // W hit both tokens at modest multipliers; X hit one token huge
        let token_a = score_token_wallets(
            "A",
            &[qualified("W", 10.0, 1_000), qualified("X", 300.0, 900)],
            &ath(),
            None,
            10_000,
            &ScoreWeights::default(),
        );
        let token_b = score_token_wallets(
            "B",
            &[qualified("W", 5.0, 1_100)],
            &ath(),
            None,
            10_000,
            &ScoreWeights::default(),
        );

        let ranking = aggregate_cross_token(
            &[("A".to_string(), token_a), ("B".to_string(), token_b)],
            2,
        );

        assert_eq!(ranking.top_wallets[0].address, "W");
        assert_eq!(ranking.top_wallets[0].tokens_hit, vec!["A", "B"]);
        assert_eq!(ranking.top_wallets[1].address, "X");

        assert_eq!(ranking.cross_token_overlap.len(), 1);
        assert_eq!(ranking.cross_token_overlap[0].address, "W");
    }

    #[test]
    fn singles_backfill_to_the_limit() {
        let wallets: Vec<QualifiedWallet> = (0..30)
            .map(|i| qualified(&format!("w{}", i), 5.0 + i as f64, 1_000 + i as i64))
            .collect();
        let scored = score_token_wallets(
            "ONLY",
            &wallets,
            &ath(),
            None,
            10_000,
            &ScoreWeights::default(),
        );

        let ranking = aggregate_cross_token(&[("ONLY".to_string(), scored)], 2);

        assert_eq!(ranking.top_wallets.len(), TOP_WALLET_LIMIT);
        assert!(ranking.cross_token_overlap.is_empty());
        // Backfill preserved score order
        for pair in ranking.top_wallets.windows(2) {
            assert!(pair[0].professional_score >= pair[1].professional_score);
        }
    }

    #[test]
    fn overlap_section_is_capped_at_ten() {
        let make_token = |ticker: &str| {
            let wallets: Vec<QualifiedWallet> = (0..15)
                .map(|i| qualified(&format!("w{}", i), 10.0, 1_000 + i as i64))
                .collect();
            (
                ticker.to_string(),
                score_token_wallets(
                    ticker,
                    &wallets,
                    &ath(),
                    None,
                    10_000,
                    &ScoreWeights::default(),
                ),
            )
        };

        let ranking = aggregate_cross_token(&[make_token("A"), make_token("B")], 2);
        assert_eq!(ranking.cross_token_overlap.len(), OVERLAP_LIMIT);
    }

    #[test]
    fn merged_wallet_tier_uses_cross_token_stats() {
        // Same wallet hitting three tokens deep below ATH lands in tier B
        let tokens: Vec<(String, Vec<ScoredWallet>)> = ["A", "B", "C"]
            .iter()
            .map(|t| {
                (
                    t.to_string(),
                    score_token_wallets(
                        t,
                        &[qualified("W", 10.0, 1_000)],
                        &ath(),
                        None,
                        10_000,
                        &ScoreWeights::default(),
                    ),
                )
            })
            .collect();

        let ranking = aggregate_cross_token(&tokens, 2);
        let w = &ranking.top_wallets[0];
        assert_eq!(w.pumps_called, 3);
        // 10x entry-to-ath = 90% distance, consistent across tokens
        assert_eq!(w.tier, Tier::B);
    }
}
