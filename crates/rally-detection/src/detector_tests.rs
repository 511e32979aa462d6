use crate::detector::{RallyConfig, RallyDetector};
use crate::export::rally_to_export;
use analysis_core::{Candle, Rally, RallyType};

/// Build a series from (gain_pct, volume_usd) specs, starting at $0.001.
/// Each candle opens at the previous close; a zero gain yields a flat
/// (non-green) candle.
fn series(specs: &[(f64, f64)]) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(specs.len());
    let mut price = 0.001_f64;

    for (i, &(gain_pct, volume_usd)) in specs.iter().enumerate() {
        let open = price;
        let close = open * (1.0 + gain_pct / 100.0);
        price = close;
        candles.push(Candle {
            unix_time: 1_700_000_000 + i as i64 * 300,
            open,
            high: open.max(close) * 1.001,
            low: open.min(close) * 0.999,
            close,
            volume: volume_usd / close.max(f64::EPSILON),
            volume_usd,
        });
    }

    candles
}

fn flat(n: usize) -> Vec<(f64, f64)> {
    vec![(0.0, 1000.0); n]
}

fn green_run(n: usize, gain: f64) -> Vec<(f64, f64)> {
    vec![(gain, 5000.0); n]
}

fn red_run(n: usize) -> Vec<(f64, f64)> {
    vec![(-5.0, 500.0); n]
}

fn detector() -> RallyDetector {
    RallyDetector::new(RallyConfig::default())
}

fn assert_invariants(rallies: &[Rally]) {
    let config = RallyConfig::default();
    for rally in rallies {
        assert!(rally.end_idx >= rally.start_idx + 1);
        assert!(rally.total_gain >= config.min_total_gain);
        assert!(rally.green_ratio >= config.min_green_ratio);
    }

    // Pairwise overlap never exceeds 30% of the shorter window
    for (i, a) in rallies.iter().enumerate() {
        for b in rallies.iter().skip(i + 1) {
            let overlap_start = a.start_idx.max(b.start_idx);
            let overlap_end = a.end_idx.min(b.end_idx);
            let overlap = overlap_end.saturating_sub(overlap_start) + if overlap_end >= overlap_start { 1 } else { 0 };
            let shorter = a.length.min(b.length);
            assert!(
                (overlap as f64) <= 0.3 * shorter as f64 + 1e-9,
                "rallies {}..{} and {}..{} overlap too much",
                a.start_idx,
                a.end_idx,
                b.start_idx,
                b.end_idx
            );
        }
    }
}

#[test]
fn clear_rally_is_detected_once() {
    let mut specs = flat(20);
    specs.extend(green_run(8, 10.0));
    specs.extend(red_run(5));
    let candles = series(&specs);

    let rallies = detector().detect_all(&candles);

    assert_eq!(rallies.len(), 1);
    let rally = &rallies[0];
    assert_eq!(rally.start_idx, 20);
    assert!(rally.total_gain > 80.0);
    assert!(rally.green_ratio >= 0.75);
    assert!(matches!(
        rally.rally_type,
        RallyType::Explosive | RallyType::Choppy
    ));
    assert_invariants(&rallies);
}

#[test]
fn flat_series_yields_no_rallies() {
    let candles = series(&flat(60));
    assert!(detector().detect_all(&candles).is_empty());
}

#[test]
fn gentle_drift_below_start_gain_is_ignored() {
    // +1% green candles never clear the 1.5% start gain
    let specs: Vec<(f64, f64)> = (0..60)
        .map(|i| if i % 2 == 0 { (1.0, 2000.0) } else { (-1.0, 2000.0) })
        .collect();
    let candles = series(&specs);
    assert!(detector().detect_all(&candles).is_empty());
}

#[test]
fn short_series_yields_nothing() {
    let candles = series(&green_run(4, 10.0));
    assert!(detector().detect_all(&candles).is_empty());
}

#[test]
fn empty_series_yields_nothing() {
    assert!(detector().detect_all(&[]).is_empty());
}

#[test]
fn data_error_gain_is_rejected() {
    // A 300x single-candle spike reads as a data error, not a rally
    let mut specs = flat(10);
    specs.push((29_900.0, 5000.0));
    specs.extend(vec![(3.0, 5000.0); 3]);
    specs.extend(red_run(4));
    let candles = series(&specs);

    assert!(detector().detect_all(&candles).is_empty());
}

#[test]
fn two_separate_rallies_are_both_found() {
    let mut specs = flat(20);
    specs.extend(green_run(8, 10.0));
    specs.extend(red_run(6));
    specs.extend(flat(10));
    specs.extend(green_run(8, 10.0));
    specs.extend(red_run(5));
    let candles = series(&specs);

    let rallies = detector().detect_all(&candles);

    assert_eq!(rallies.len(), 2);
    assert!(rallies[0].start_idx < rallies[1].start_idx);
    assert!(rallies[0].end_idx < rallies[1].start_idx);
    assert_invariants(&rallies);
}

#[test]
fn dedup_replaces_only_on_clear_quality_win() {
    let detector = detector();
    let base = Rally {
        start_idx: 10,
        end_idx: 19,
        length: 10,
        total_gain: 50.0,
        peak_gain: 60.0,
        green_ratio: 0.6,
        green_count: 6,
        red_count: 4,
        rally_type: RallyType::Choppy,
        combined_volume: 10_000.0,
        start_price: 0.001,
        end_price: 0.0015,
        peak_price: 0.0016,
        max_drawdown: -5.0,
        start_time: 0,
        end_time: 9,
    };

    // Heavy overlap, marginally better: incumbent stays
    let marginal = Rally {
        start_idx: 12,
        end_idx: 21,
        peak_gain: 65.0,
        ..base.clone()
    };
    let kept = detector.deduplicate(vec![base.clone(), marginal]);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].start_idx, 10);

    // Heavy overlap, decisively better: challenger replaces
    let decisive = Rally {
        start_idx: 12,
        end_idx: 21,
        peak_gain: 200.0,
        green_ratio: 0.9,
        ..base.clone()
    };
    let kept = detector.deduplicate(vec![base.clone(), decisive]);
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].start_idx, 12);

    // Disjoint windows both survive
    let disjoint = Rally {
        start_idx: 40,
        end_idx: 49,
        ..base.clone()
    };
    let kept = detector.deduplicate(vec![base, disjoint]);
    assert_eq!(kept.len(), 2);
}

#[test]
fn export_shape_carries_volume_stats() {
    let mut specs = flat(20);
    specs.extend(green_run(8, 10.0));
    specs.extend(red_run(5));
    let candles = series(&specs);

    let rallies = detector().detect_all(&candles);
    assert_eq!(rallies.len(), 1);

    let export = rally_to_export(&rallies[0], &candles);
    assert_eq!(export.candle_count, rallies[0].length);
    assert!(export.total_gain_pct > 80.0);
    assert!(export.green_ratio_pct >= 75.0);
    assert!(export.volume_data.peak_volume >= export.volume_data.avg_volume);
    // Rally volume (5000) spikes well above the 1000 flat baseline
    assert!(export.volume_data.volume_spike_ratio > 3.0);
    assert_eq!(export.start_time, rallies[0].start_time);
}
