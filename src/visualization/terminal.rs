// src/visualization/terminal.rs

use crate::processing::coordinator::DetectionResult;
use colored::Colorize;

/// Bars longer than this are clipped.
pub const MAX_BAR_LEN: usize = 120;

/// One line per scored sample: index, alert marker, value, z-score and a bar
/// whose length follows the value. Anomalies are drawn in red.
pub fn render_line(result: &DetectionResult) -> String {
    let alert = if result.is_anomaly {
        "ANOMALY".red().bold()
    } else {
        "       ".white()
    };

    let z_score = match result.z_score {
        Some(z) => format!("{z:+7.2}"),
        None => "    n/a".to_string(),
    };

    // Negative values draw an empty bar.
    let bar_len = (result.value().max(0.0).round() as usize).min(MAX_BAR_LEN);
    let bar = "|".repeat(bar_len);
    let bar = if result.is_anomaly { bar.red() } else { bar.white() };

    format!(
        "{:>8} {} {:>10.3} z={} {}",
        result.index(),
        alert,
        result.value(),
        z_score,
        bar
    )
}
