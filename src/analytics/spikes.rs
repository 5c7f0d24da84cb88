//! Spike Detection
//!
//! Rolling z-score over an hourly flow-count series: each point is compared
//! against the mean and sample standard deviation of its trailing window.
//! Hours whose z-score strictly exceeds the threshold are flagged.

use chrono::{DateTime, Utc};

use super::HourlySeries;

/// Flag hour buckets whose count spikes against the trailing window.
///
/// The window covers the `window` most recent points including the current
/// one; at the start of the series whatever is available is used. A point
/// whose trailing standard deviation is zero (or undefined, fewer than two
/// points) has no meaningful z-score and is never flagged.
pub fn detect_spikes(series: &HourlySeries, window: usize, z_threshold: f64) -> Vec<DateTime<Utc>> {
    if series.is_empty() || window == 0 {
        return Vec::new();
    }

    let values: Vec<f64> = series.points.iter().map(|(_, count)| *count as f64).collect();
    let mut flagged = Vec::new();

    for i in 0..values.len() {
        let start = (i + 1).saturating_sub(window);
        let trailing = &values[start..=i];
        if trailing.len() < 2 {
            continue;
        }

        let n = trailing.len() as f64;
        let mean = trailing.iter().sum::<f64>() / n;
        let variance = trailing.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std_dev = variance.sqrt();
        if std_dev == 0.0 {
            continue;
        }

        let z = (values[i] - mean) / std_dev;
        if z > z_threshold {
            flagged.push(series.points[i].0);
        }
    }
    flagged
}
