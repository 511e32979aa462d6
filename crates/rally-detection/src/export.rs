use analysis_core::{Candle, Rally, RallyExport, VolumeData};

/// Shape a rally for the response envelope. The volume spike ratio compares
/// the window's peak volume against the average of the last ten pre-rally
/// candles, falling back to the window's own average when history is short.
pub fn rally_to_export(rally: &Rally, candles: &[Candle]) -> RallyExport {
    let window = &candles[rally.start_idx..=rally.end_idx.min(candles.len() - 1)];

    let volumes: Vec<f64> = window.iter().map(|c| c.volume_usd).collect();
    let avg_volume = if volumes.is_empty() {
        0.0
    } else {
        volumes.iter().sum::<f64>() / volumes.len() as f64
    };
    let peak_volume = volumes.iter().copied().fold(0.0_f64, f64::max);

    let baseline: Vec<f64> = candles
        .iter()
        .filter(|c| c.unix_time < rally.start_time)
        .map(|c| c.volume_usd)
        .collect();
    let baseline_avg = if baseline.len() >= 10 {
        baseline[baseline.len() - 10..].iter().sum::<f64>() / 10.0
    } else {
        avg_volume
    };
    let volume_spike_ratio = if baseline_avg > 0.0 {
        round2(peak_volume / baseline_avg)
    } else {
        1.0
    };

    RallyExport {
        start_time: rally.start_time,
        end_time: rally.end_time,
        total_gain_pct: round2(rally.total_gain),
        peak_gain_pct: round2(rally.peak_gain),
        rally_type: rally.rally_type,
        candle_count: rally.length,
        green_ratio_pct: round1(rally.green_ratio * 100.0),
        volume_data: VolumeData {
            avg_volume,
            peak_volume,
            volume_spike_ratio,
        },
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
