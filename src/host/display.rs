use crate::types::{Tally, MAX_OPTIONS};

/// Seconds at or below which the clock is shown as urgent
pub const URGENT_SECONDS: u32 = 5;

/// Question clock text: plain seconds below a minute, `M:SS` above
pub fn format_clock(seconds: Option<u32>) -> String {
    match seconds {
        None => "...".to_string(),
        Some(s) if s < 60 => s.to_string(),
        Some(s) => format!("{}:{:02}", s / 60, s % 60),
    }
}

pub fn is_urgent(seconds: Option<u32>) -> bool {
    matches!(seconds, Some(s) if s <= URGENT_SECONDS)
}

/// "3 / 10" style question counter
pub fn progress_label(index: usize, total: usize) -> String {
    format!("{} / {}", index + 1, total)
}

/// Bar heights for the reveal chart, relative to the most chosen option
pub fn bar_percentages(tally: &Tally) -> [u32; MAX_OPTIONS] {
    let max = u64::from(tally.iter().copied().max().unwrap_or(0).max(1));
    tally.map(|count| (u64::from(count) * 100 / max) as u32)
}
