use analysis_core::{QualifiedWallet, Tier};

/// Multiplier that maps to a score of 100
pub const DEFAULT_ROI_CEILING: f64 = 1000.0;

/// Logarithmic ROI → score conversion.
///
/// Bounds the ROI component so a single 500x position cannot drown the
/// entry-timing component. Score table at the default ceiling:
/// 1x → 0, 5x → 23.3, 10x → 33.3, 50x → 56.7, 100x → 66.7, 500x → 89.9,
/// 1000x → 100.
pub fn roi_to_score(multiplier: f64, ceiling: f64) -> f64 {
    if !multiplier.is_finite() || multiplier <= 1.0 {
        return 0.0;
    }
    (multiplier.log10() / ceiling.log10() * 100.0).min(100.0)
}

/// Entry-price consistency in [0, 100]: the inverse of the relative spread
/// of the wallet's own buy prices. A single buy earns half marks.
pub fn entry_consistency(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 50.0;
    }

    let mean = prices.iter().sum::<f64>() / prices.len() as f64;
    if mean <= 0.0 {
        return 50.0;
    }

    let variance = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / prices.len() as f64;
    let cv_pct = variance.sqrt() / mean * 100.0;
    (100.0 - cv_pct).clamp(0.0, 100.0)
}

/// Component weights for the per-token professional score
#[derive(Debug, Clone)]
pub struct ScoreWeights {
    /// Entry quality: how early relative to the token's ATH
    pub entry_weight: f64,
    /// Realised or total ROI, whichever is higher
    pub roi_weight: f64,
    /// Entry-price consistency across the wallet's buys
    pub consistency_weight: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            entry_weight: 0.60,
            roi_weight: 0.30,
            consistency_weight: 0.10,
        }
    }
}

/// Per-token professional score in [0, 100] plus the consistency component
pub fn professional_score(wallet: &QualifiedWallet, weights: &ScoreWeights) -> (f64, f64) {
    let entry_component = roi_to_score(wallet.entry_to_ath_multiplier, DEFAULT_ROI_CEILING);
    let roi_component = roi_to_score(
        wallet.realized_multiplier.max(wallet.total_multiplier),
        DEFAULT_ROI_CEILING,
    );
    let consistency = entry_consistency(&wallet.entry_prices);

    let score = weights.entry_weight * entry_component
        + weights.roi_weight * roi_component
        + weights.consistency_weight * consistency;

    (score.clamp(0.0, 100.0), consistency)
}

/// Tier from cross-token behaviour: how many of the requested tokens the
/// wallet hit, how far from each ATH it entered, and how stable that
/// distance is.
pub fn assign_tier(pump_count: u32, avg_distance_pct: f64, stdev_distance: f64) -> Tier {
    if pump_count >= 10 && avg_distance_pct >= 75.0 && stdev_distance < 15.0 {
        Tier::S
    } else if pump_count >= 6 && avg_distance_pct >= 60.0 && stdev_distance < 25.0 {
        Tier::A
    } else if pump_count >= 3 && avg_distance_pct >= 45.0 {
        Tier::B
    } else {
        Tier::C
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn wallet(entry_to_ath: f64, realized: f64, total: f64, prices: Vec<f64>) -> QualifiedWallet {
        QualifiedWallet {
            address: "wallet-1".to_string(),
            sources: BTreeSet::new(),
            entry_price: prices.first().copied().unwrap_or(0.001),
            entry_time: 1_700_000_000,
            realized_multiplier: realized,
            total_multiplier: total,
            entry_to_ath_multiplier: entry_to_ath,
            distance_to_ath_pct: 80.0,
            holding_usd: None,
            num_buys: prices.len() as u32,
            entry_prices: prices,
            total_volume_usd: 0.0,
        }
    }

    #[test]
    fn roi_score_worked_points() {
        assert_eq!(roi_to_score(1.0, DEFAULT_ROI_CEILING), 0.0);
        assert_eq!(roi_to_score(0.5, DEFAULT_ROI_CEILING), 0.0);
        assert!((roi_to_score(5.0, DEFAULT_ROI_CEILING) - 23.3).abs() < 0.1);
        assert!((roi_to_score(10.0, DEFAULT_ROI_CEILING) - 33.3).abs() < 0.1);
        assert!((roi_to_score(50.0, DEFAULT_ROI_CEILING) - 56.7).abs() < 0.1);
        assert!((roi_to_score(100.0, DEFAULT_ROI_CEILING) - 66.7).abs() < 0.1);
        assert!((roi_to_score(500.0, DEFAULT_ROI_CEILING) - 89.9).abs() < 0.1);
        assert_eq!(roi_to_score(1000.0, DEFAULT_ROI_CEILING), 100.0);
        // Clamped above the ceiling
        assert_eq!(roi_to_score(50_000.0, DEFAULT_ROI_CEILING), 100.0);
    }

    #[test]
    fn roi_score_is_strictly_increasing_above_one() {
        let mut last = 0.0;
        for m in [1.1, 2.0, 3.0, 7.5, 20.0, 80.0, 300.0, 999.0] {
            let score = roi_to_score(m, DEFAULT_ROI_CEILING);
            assert!(score > last, "score not increasing at {}x", m);
            assert!((0.0..=100.0).contains(&score));
            last = score;
        }
    }

    #[test]
    fn score_recomputes_from_components() {
        let w = wallet(10.0, 3.0, 6.0, vec![0.001, 0.0011, 0.0009]);
        let weights = ScoreWeights::default();
        let (score, consistency) = professional_score(&w, &weights);

        let expected = 0.6 * roi_to_score(10.0, DEFAULT_ROI_CEILING)
            + 0.3 * roi_to_score(6.0, DEFAULT_ROI_CEILING)
            + 0.1 * consistency;
        assert!((score - expected).abs() < 0.01);
    }

    #[test]
    fn single_buy_earns_half_consistency() {
        assert_eq!(entry_consistency(&[0.002]), 50.0);
        assert_eq!(entry_consistency(&[]), 50.0);
    }

    #[test]
    fn tight_buys_score_well_above_half() {
        // Three buys at slightly different prices
        let consistency = entry_consistency(&[0.0010, 0.0011, 0.0010]);
        assert!(consistency > 90.0);
    }

    #[test]
    fn scattered_buys_score_poorly() {
        let tight = entry_consistency(&[0.0010, 0.0011, 0.0010]);
        let wild = entry_consistency(&[0.0010, 0.0100, 0.0002]);
        assert!(wild < tight);
    }

    #[test]
    fn tier_table() {
        assert_eq!(assign_tier(12, 80.0, 10.0), Tier::S);
        assert_eq!(assign_tier(7, 65.0, 20.0), Tier::A);
        assert_eq!(assign_tier(4, 50.0, 40.0), Tier::B);
        assert_eq!(assign_tier(2, 90.0, 1.0), Tier::C);
        // Stdev gate keeps a scattered wallet out of S
        assert_eq!(assign_tier(12, 80.0, 20.0), Tier::A);
    }
}
