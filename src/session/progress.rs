pub const LIVE_MARKER: &str = "🔴 LIVE";

const FILLED: char = '▬';
const KNOB: char = '🔘';

/// `01:05 ▬▬▬🔘▬▬▬▬▬ 03:30`, or [`LIVE_MARKER`] for streams (`duration_ms == 0`).
pub fn progress_indicator(position_ms: u64, duration_ms: u64, width: usize) -> String {
    if duration_ms == 0 {
        return LIVE_MARKER.to_string();
    }
    let width = width.max(1);
    let position_ms = position_ms.min(duration_ms);
    let fraction = position_ms as f64 / duration_ms as f64;
    let knob = ((fraction * width as f64).round() as usize).min(width - 1);

    let bar: String = (0..width)
        .map(|i| if i == knob { KNOB } else { FILLED })
        .collect();

    format!(
        "{} {} {}",
        format_timestamp(position_ms),
        bar,
        format_timestamp(duration_ms)
    )
}

/// `mm:ss` below an hour, `h:mm:ss` above.
pub fn format_timestamp(ms: u64) -> String {
    let total = ms / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
