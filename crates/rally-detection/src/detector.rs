use analysis_core::{Candle, Rally, RallyType};

/// Detection thresholds. Tunable, but fixed for one invocation.
#[derive(Debug, Clone)]
pub struct RallyConfig {
    /// Per-candle gain required to consider a start, percent
    pub min_start_gain: f64,
    /// Window gain required to accept, percent
    pub min_total_gain: f64,
    /// Share of green candles required in the window
    pub min_green_ratio: f64,
    /// Candle-count upper bound per window
    pub max_rally_length: usize,
    /// Absolute move below which a candle counts as consolidation, percent
    pub consolidation_threshold: f64,
    /// Drawdown from the window peak that ends the rally, percent
    pub drawdown_end_threshold: f64,
    /// Ratio of current to average rally volume that signals exhaustion
    pub volume_exhaustion: f64,
}

impl Default for RallyConfig {
    fn default() -> Self {
        Self {
            min_start_gain: 1.5,
            min_total_gain: 20.0,
            min_green_ratio: 0.40,
            max_rally_length: 100,
            consolidation_threshold: 2.0,
            drawdown_end_threshold: -15.0,
            volume_exhaustion: 0.3,
        }
    }
}

struct VolumeBaseline {
    median: f64,
    use_fixed: bool,
}

/// Precision rally detector over an OHLCV series.
///
/// Detection is objective price-pattern matching: no assumptions about who
/// traded. The output feeds wallet discovery against each window.
pub struct RallyDetector {
    config: RallyConfig,
}

impl Default for RallyDetector {
    fn default() -> Self {
        Self::new(RallyConfig::default())
    }
}

impl RallyDetector {
    pub fn new(config: RallyConfig) -> Self {
        Self { config }
    }

    /// Detect all rallies in the series. Fewer than 5 candles yields an
    /// empty set, not an error.
    pub fn detect_all(&self, candles: &[Candle]) -> Vec<Rally> {
        if candles.len() < 5 {
            tracing::debug!(candles = candles.len(), "insufficient data for rally detection");
            return Vec::new();
        }

        let mut rallies = Vec::new();
        let mut i = 1;

        while i < candles.len() - 1 {
            match self.build_rally_window(candles, i) {
                Some(rally) => {
                    tracing::debug!(
                        start_idx = rally.start_idx,
                        length = rally.length,
                        total_gain = rally.total_gain,
                        rally_type = rally.rally_type.as_str(),
                        "rally window accepted"
                    );
                    // Resume past the window plus a short cool-off
                    i = rally.end_idx + 3;
                    rallies.push(rally);
                }
                None => i += 1,
            }
        }

        let raw = rallies.len();
        let deduplicated = self.deduplicate(rallies);
        tracing::info!(raw, unique = deduplicated.len(), "rally detection complete");
        deduplicated
    }

    /// Volume baseline from the candles before `idx`: IQR-filtered median
    /// with fixed floors when there is too little history.
    fn volume_baseline(&self, candles: &[Candle], idx: usize, lookback: usize) -> VolumeBaseline {
        if idx < 3 {
            return VolumeBaseline {
                median: 100.0,
                use_fixed: true,
            };
        }

        let start = idx.saturating_sub(lookback);
        let window = &candles[start..idx];
        if window.len() < 3 {
            return VolumeBaseline {
                median: 500.0,
                use_fixed: true,
            };
        }

        let mut volumes: Vec<f64> = window.iter().map(|c| c.volume_usd).collect();

        if volumes.len() > 5 {
            let mut sorted = volumes.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let q25 = sorted[(sorted.len() as f64 * 0.25) as usize];
            let q75 = sorted[(sorted.len() as f64 * 0.75) as usize];
            let iqr = q75 - q25;
            let filtered: Vec<f64> = volumes
                .iter()
                .copied()
                .filter(|&v| v >= q25 - 2.0 * iqr && v <= q75 + 2.0 * iqr)
                .collect();
            if !filtered.is_empty() {
                volumes = filtered;
            }
        }

        VolumeBaseline {
            median: median(&volumes),
            use_fixed: false,
        }
    }

    /// A valid start is green, gains at least `min_start_gain`, and clears a
    /// lenient volume threshold relative to the baseline.
    fn is_valid_rally_start(&self, candles: &[Candle], idx: usize) -> bool {
        let Some(current) = candles.get(idx) else {
            return false;
        };

        if !current.is_green() || current.open <= 0.0 {
            return false;
        }

        if current.gain_pct() < self.config.min_start_gain {
            return false;
        }

        let baseline = self.volume_baseline(candles, idx, 15);
        let current_volume = current.volume_usd;

        if baseline.use_fixed {
            current_volume >= 100.0
        } else {
            // Stricter for busier tokens
            let threshold = if baseline.median < 5000.0 {
                baseline.median * 0.3
            } else {
                baseline.median * 0.5
            };
            current_volume >= threshold
        }
    }

    /// True when momentum has faded at `current_idx` for a window that
    /// started at `start_idx`.
    fn detect_rally_end(&self, candles: &[Candle], start_idx: usize, current_idx: usize) -> bool {
        if current_idx < start_idx + 2 {
            return false;
        }

        let rally_length = current_idx - start_idx + 1;
        if rally_length < 3 {
            return false;
        }

        let recent_start = current_idx.saturating_sub(4).max(start_idx);
        let recent = &candles[recent_start..=current_idx];
        if recent.len() < 3 {
            return false;
        }

        // 1. Three consecutive small-bodied candles
        let small_moves = recent[recent.len() - 3..]
            .iter()
            .filter(|c| c.body_move_pct() < self.config.consolidation_threshold)
            .count();
        if small_moves >= 3 {
            return true;
        }

        // 2. Drawdown from the window peak
        let window = &candles[start_idx..=current_idx];
        let peak_price = window
            .iter()
            .map(|c| c.close)
            .fold(f64::MIN, f64::max);
        let current_price = candles[current_idx].close;
        if peak_price > 0.0 {
            let drawdown = (current_price - peak_price) / peak_price * 100.0;
            if drawdown < self.config.drawdown_end_threshold {
                return true;
            }
        }

        // 3. Volume exhaustion once the window is established
        let avg_volume = window.iter().map(|c| c.volume_usd).sum::<f64>() / window.len() as f64;
        let current_volume = candles[current_idx].volume_usd;
        if avg_volume > 0.0
            && current_volume < avg_volume * self.config.volume_exhaustion
            && rally_length >= 5
        {
            return true;
        }

        // 4. Red cluster in the last five candles
        if recent.len() >= 5 {
            let red_count = recent[recent.len() - 5..]
                .iter()
                .filter(|c| !c.is_green())
                .count();
            if red_count >= 3 {
                return true;
            }
        }

        false
    }

    /// Grow a window candle by candle from `start_idx`, then validate it.
    fn build_rally_window(&self, candles: &[Candle], start_idx: usize) -> Option<Rally> {
        if !self.is_valid_rally_start(candles, start_idx) {
            return None;
        }

        let max_idx = candles.len() - 1;
        let mut current_idx = start_idx;

        while current_idx < max_idx {
            if self.detect_rally_end(candles, start_idx, current_idx) {
                break;
            }
            if current_idx - start_idx + 1 >= self.config.max_rally_length {
                break;
            }
            current_idx += 1;
        }

        let window = &candles[start_idx..=current_idx];
        if window.len() < 2 {
            return None;
        }

        let green_count = window.iter().filter(|c| c.is_green()).count();
        let green_ratio = green_count as f64 / window.len() as f64;

        // Reference price: the close before the window, or the first open
        let start_price = if start_idx > 0 {
            candles[start_idx - 1].close
        } else {
            window[0].open
        };
        let end_price = window[window.len() - 1].close;
        let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
        let peak_price = closes.iter().copied().fold(f64::MIN, f64::max);

        if start_price <= 0.0 || end_price <= 0.0 {
            return None;
        }

        let total_gain = (end_price - start_price) / start_price * 100.0;
        let peak_gain = (peak_price - start_price) / start_price * 100.0;

        // Gains past 10,000% are data errors, not rallies
        if total_gain > 10_000.0 {
            return None;
        }

        if total_gain < self.config.min_total_gain {
            return None;
        }
        if green_ratio < self.config.min_green_ratio {
            return None;
        }

        let combined_volume = window.iter().map(|c| c.volume_usd).sum();
        let rally_type = classify_rally_type(window.len(), total_gain, peak_gain, green_ratio);

        Some(Rally {
            start_idx,
            end_idx: current_idx,
            length: window.len(),
            total_gain,
            peak_gain,
            green_ratio,
            green_count,
            red_count: window.len() - green_count,
            rally_type,
            combined_volume,
            start_price,
            end_price,
            peak_price,
            max_drawdown: max_drawdown(&closes),
            start_time: window[0].unix_time,
            end_time: window[window.len() - 1].unix_time,
        })
    }

    /// Drop windows that overlap an accepted one by more than 30% of the
    /// shorter length, unless the challenger's quality score clears the
    /// incumbent's by 1.3x, in which case it replaces it.
    pub(crate) fn deduplicate(&self, mut rallies: Vec<Rally>) -> Vec<Rally> {
        if rallies.is_empty() {
            return rallies;
        }

        rallies.sort_by_key(|r| r.start_idx);
        let mut accepted: Vec<Rally> = Vec::new();

        for rally in rallies {
            let mut overlaps = false;

            for i in 0..accepted.len() {
                let existing = &accepted[i];
                let overlap_start = rally.start_idx.max(existing.start_idx);
                let overlap_end = rally.end_idx.min(existing.end_idx);
                let overlap_length = if overlap_end >= overlap_start {
                    overlap_end - overlap_start + 1
                } else {
                    0
                };

                let shorter = rally.length.min(existing.length);
                if shorter == 0 {
                    continue;
                }
                let overlap_ratio = overlap_length as f64 / shorter as f64;

                if overlap_ratio > 0.3 {
                    overlaps = true;
                    if quality_score(&rally) > quality_score(existing) * 1.3 {
                        accepted[i] = rally.clone();
                    }
                    break;
                }
            }

            if !overlaps {
                accepted.push(rally);
            }
        }

        accepted.sort_by_key(|r| r.start_idx);
        accepted
    }
}

fn classify_rally_type(length: usize, total_gain: f64, peak_gain: f64, green_ratio: f64) -> RallyType {
    if length <= 6 && total_gain >= 40.0 && green_ratio >= 0.75 {
        return RallyType::Explosive;
    }
    if (4..=20).contains(&length) && total_gain >= 30.0 && green_ratio >= 0.55 {
        return RallyType::Choppy;
    }
    if (10..=50).contains(&length) && total_gain >= 80.0 && green_ratio >= 0.45 {
        return RallyType::Grind;
    }
    if length > 20 && green_ratio >= 0.40 && peak_gain >= 100.0 {
        return RallyType::UltraChoppy;
    }
    RallyType::Standard
}

/// Maximum peak-to-trough drawdown across the closes, percent (negative)
fn max_drawdown(closes: &[f64]) -> f64 {
    if closes.is_empty() {
        return 0.0;
    }
    let mut max_dd: f64 = 0.0;
    let mut peak = closes[0];
    for &price in closes {
        if price > peak {
            peak = price;
        }
        if peak > 0.0 {
            let dd = (price - peak) / peak * 100.0;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

fn quality_score(rally: &Rally) -> f64 {
    rally.peak_gain * rally.green_ratio * (rally.length as f64).sqrt()
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 100.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_handles_odd_and_even_lengths() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert_eq!(median(&[]), 100.0);
    }

    #[test]
    fn max_drawdown_tracks_peak_to_trough() {
        // Peak 200 then trough 100 = -50%
        let closes = [100.0, 200.0, 150.0, 100.0, 180.0];
        assert!((max_drawdown(&closes) - (-50.0)).abs() < 1e-9);
        assert_eq!(max_drawdown(&[]), 0.0);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify_rally_type(5, 45.0, 50.0, 0.8), RallyType::Explosive);
        assert_eq!(classify_rally_type(10, 35.0, 40.0, 0.6), RallyType::Choppy);
        assert_eq!(classify_rally_type(30, 90.0, 95.0, 0.5), RallyType::Grind);
        assert_eq!(classify_rally_type(25, 25.0, 120.0, 0.42), RallyType::UltraChoppy);
        assert_eq!(classify_rally_type(3, 21.0, 22.0, 0.67), RallyType::Standard);
    }
}
