use analysis_core::{CandidateWallet, QualifiedWallet, TokenAth, WalletSource};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracker_client::EntryObservation;

/// Sub-batch size for rate-limited fan-out. Fixed, not a fraction of the
/// total: larger batches exhausted the free-tier credit budget on start.
pub const PNL_SUB_BATCH_SIZE: usize = 3;

/// Seconds each sub-batch waits per index before touching the provider
pub const SUB_BATCH_STAGGER_SECS: u64 = 8;

/// A candidate that cleared qualification, with its PnL when one was
/// fetched. Pre-qualified sources carry zero multipliers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlQualified {
    pub candidate: CandidateWallet,
    pub realized_multiplier: f64,
    pub total_multiplier: f64,
}

/// Union all discovery sources into one candidate per address. The merge is
/// commutative: source completion order never changes the result.
pub fn merge_candidates(sources: Vec<Vec<CandidateWallet>>) -> Vec<CandidateWallet> {
    let mut by_address: HashMap<String, CandidateWallet> = HashMap::new();

    for source in sources {
        for candidate in source {
            if candidate.address.is_empty() {
                continue;
            }
            match by_address.get_mut(&candidate.address) {
                Some(existing) => existing.merge(candidate),
                None => {
                    by_address.insert(candidate.address.clone(), candidate);
                }
            }
        }
    }

    let mut merged: Vec<CandidateWallet> = by_address.into_values().collect();
    merged.sort_by(|a, b| a.address.cmp(&b.address));
    merged
}

/// Split candidates into those accepted on source strength alone and those
/// that must pass the PnL check. Top traders and first buyers skip the
/// round-trip; holders and recent traders go to the batch queue.
pub fn split_prequalified(
    candidates: Vec<CandidateWallet>,
) -> (Vec<CandidateWallet>, Vec<CandidateWallet>) {
    candidates.into_iter().partition(|c| {
        c.sources.contains(&WalletSource::TopTrader) || c.sources.contains(&WalletSource::FirstBuyer)
    })
}

/// Chunk fan-out work into rate-limit-sized sub-batches
pub fn chunk_batches<T>(items: Vec<T>) -> Vec<Vec<T>> {
    let mut batches = Vec::new();
    let mut current = Vec::with_capacity(PNL_SUB_BATCH_SIZE);
    for item in items {
        current.push(item);
        if current.len() == PNL_SUB_BATCH_SIZE {
            batches.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Qualification rule: either multiplier clears the threshold
pub fn passes_roi_gate(realized: f64, total: f64, min_roi_multiplier: f64) -> bool {
    realized >= min_roi_multiplier || total >= min_roi_multiplier
}

/// Build the final qualified record from a candidate, its entry, and the
/// token's ATH. Entries after the first rally's start are rejected: the
/// point is wallets that were in *before* the move.
pub fn build_qualified(
    qualified: &PnlQualified,
    entry: &EntryObservation,
    ath: &TokenAth,
    first_rally_start: i64,
) -> Option<QualifiedWallet> {
    if entry.price_usd <= 0.0 {
        return None;
    }
    if entry.unix_time > first_rally_start {
        return None;
    }

    let (entry_to_ath, distance_pct) = if ath.price_usd > 0.0 {
        (
            ath.price_usd / entry.price_usd,
            (((ath.price_usd - entry.price_usd) / ath.price_usd) * 100.0).max(0.0),
        )
    } else {
        (1.0, 0.0)
    };

    Some(QualifiedWallet {
        address: qualified.candidate.address.clone(),
        sources: qualified.candidate.sources.clone(),
        entry_price: entry.price_usd,
        entry_time: entry.unix_time,
        realized_multiplier: qualified.realized_multiplier,
        total_multiplier: qualified.total_multiplier,
        entry_to_ath_multiplier: entry_to_ath,
        distance_to_ath_pct: distance_pct,
        holding_usd: qualified.candidate.holding_usd,
        num_buys: entry.num_buys.max(qualified.candidate.num_buys),
        entry_prices: if entry.prices.is_empty() {
            qualified.candidate.prices.clone()
        } else {
            entry.prices.clone()
        },
        total_volume_usd: entry
            .total_volume_usd
            .max(qualified.candidate.total_volume_usd),
    })
}

/// The entry a candidate already carries from discovery, when the trade
/// feed produced priced buys for it. Saves a provider round-trip.
pub fn entry_from_candidate(candidate: &CandidateWallet) -> Option<EntryObservation> {
    if candidate.prices.is_empty() {
        return None;
    }
    let first_time = candidate.first_buy_time?;
    let mean = candidate.prices.iter().sum::<f64>() / candidate.prices.len() as f64;
    if mean <= 0.0 {
        return None;
    }
    Some(EntryObservation {
        price_usd: mean,
        unix_time: first_time,
        num_buys: candidate.num_buys.max(candidate.prices.len() as u32),
        total_volume_usd: candidate.total_volume_usd,
        prices: candidate.prices.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(address: &str, source: WalletSource) -> CandidateWallet {
        CandidateWallet::new(address, source)
    }

    #[test]
    fn merge_is_a_union_keyed_by_address() {
        let traders = vec![candidate("a", WalletSource::TopTrader)];
        let holders = vec![
            candidate("a", WalletSource::TopHolder),
            candidate("b", WalletSource::TopHolder),
        ];

        let merged = merge_candidates(vec![traders, holders]);
        assert_eq!(merged.len(), 2);

        let a = merged.iter().find(|c| c.address == "a").unwrap();
        assert!(a.sources.contains(&WalletSource::TopTrader));
        assert!(a.sources.contains(&WalletSource::TopHolder));
    }

    #[test]
    fn merge_is_commutative() {
        let mut one = candidate("a", WalletSource::RecentTrader);
        one.num_buys = 2;
        one.total_volume_usd = 100.0;
        one.prices = vec![0.001, 0.002];
        one.first_buy_time = Some(50);

        let mut two = candidate("a", WalletSource::TopHolder);
        two.holding_usd = Some(500.0);
        two.first_buy_time = Some(40);

        let forward = merge_candidates(vec![vec![one.clone()], vec![two.clone()]]);
        let backward = merge_candidates(vec![vec![two], vec![one]]);

        assert_eq!(forward.len(), 1);
        assert_eq!(forward[0].sources, backward[0].sources);
        assert_eq!(forward[0].first_buy_time, backward[0].first_buy_time);
        assert_eq!(forward[0].num_buys, backward[0].num_buys);
        assert_eq!(forward[0].first_buy_time, Some(40));
    }

    #[test]
    fn strong_sources_skip_the_pnl_gate() {
        let merged = merge_candidates(vec![
            vec![candidate("trader", WalletSource::TopTrader)],
            vec![candidate("buyer", WalletSource::FirstBuyer)],
            vec![candidate("holder", WalletSource::TopHolder)],
            vec![candidate("recent", WalletSource::RecentTrader)],
        ]);

        let (pre, pending) = split_prequalified(merged);
        let pre_addrs: Vec<&str> = pre.iter().map(|c| c.address.as_str()).collect();
        assert!(pre_addrs.contains(&"trader"));
        assert!(pre_addrs.contains(&"buyer"));
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn chunks_are_capped_at_three() {
        let candidates: Vec<CandidateWallet> = (0..7)
            .map(|i| candidate(&format!("w{}", i), WalletSource::TopHolder))
            .collect();
        let batches = chunk_batches(candidates);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 3);
        assert_eq!(batches[2].len(), 1);
    }

    #[test]
    fn roi_gate_accepts_either_multiplier() {
        assert!(passes_roi_gate(6.0, 1.0, 5.0));
        assert!(passes_roi_gate(1.0, 5.0, 5.0));
        assert!(!passes_roi_gate(4.9, 4.9, 5.0));
    }

    #[test]
    fn entries_after_the_rally_start_are_rejected() {
        let q = PnlQualified {
            candidate: candidate("w", WalletSource::TopHolder),
            realized_multiplier: 6.0,
            total_multiplier: 6.0,
        };
        let ath = TokenAth {
            price_usd: 0.01,
            unix_time: 2_000,
            market_cap_usd: None,
        };

        let early = EntryObservation {
            price_usd: 0.001,
            unix_time: 900,
            num_buys: 1,
            total_volume_usd: 50.0,
            prices: vec![0.001],
        };
        let late = EntryObservation {
            unix_time: 1_100,
            ..early.clone()
        };

        assert!(build_qualified(&q, &early, &ath, 1_000).is_some());
        assert!(build_qualified(&q, &late, &ath, 1_000).is_none());
    }

    #[test]
    fn qualified_record_carries_ath_math() {
        let q = PnlQualified {
            candidate: candidate("w", WalletSource::RecentTrader),
            realized_multiplier: 0.0,
            total_multiplier: 0.0,
        };
        let ath = TokenAth {
            price_usd: 0.01,
            unix_time: 2_000,
            market_cap_usd: None,
        };
        let entry = EntryObservation {
            price_usd: 0.001,
            unix_time: 500,
            num_buys: 3,
            total_volume_usd: 120.0,
            prices: vec![0.0009, 0.001, 0.0011],
        };

        let wallet = build_qualified(&q, &entry, &ath, 1_000).unwrap();
        assert!((wallet.entry_to_ath_multiplier - 10.0).abs() < 1e-9);
        assert!((wallet.distance_to_ath_pct - 90.0).abs() < 1e-9);
        assert_eq!(wallet.num_buys, 3);
        assert_eq!(wallet.entry_prices.len(), 3);
    }

    #[test]
    fn discovery_prices_double_as_an_entry() {
        let mut c = candidate("w", WalletSource::RecentTrader);
        c.prices = vec![0.001, 0.003];
        c.first_buy_time = Some(700);
        c.num_buys = 2;
        c.total_volume_usd = 80.0;

        let entry = entry_from_candidate(&c).unwrap();
        assert!((entry.price_usd - 0.002).abs() < 1e-12);
        assert_eq!(entry.unix_time, 700);

        // A holder discovered without trades has no entry to reuse
        let bare = candidate("h", WalletSource::TopHolder);
        assert!(entry_from_candidate(&bare).is_none());
    }
}
