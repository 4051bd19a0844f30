//! Terminal formatting helpers.

use podwatch_core::{NodeStatus, PNode};

/// First and last characters of a public key, e.g. `8dx2Fq..9hKa`.
pub fn short_key(pubkey: &str) -> String {
    let chars: Vec<char> = pubkey.chars().collect();
    if chars.len() <= 14 {
        return pubkey.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}..{}", head, tail)
}

/// Binary-prefixed size, e.g. `1.5 GiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

pub fn format_latency(latency_ms: Option<u32>) -> String {
    match latency_ms {
        Some(ms) => format!("{} ms", ms),
        None => "-".to_string(),
    }
}

/// Ten-cell bar for a 0–100 score. Rounds down so a low score never looks filled.
pub fn score_bar(score: f64) -> String {
    let filled = ((score / 10.0).floor() as isize).clamp(0, 10) as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(10 - filled))
}

pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

pub const NODE_TABLE_HEADER: &str =
    "RANK  PUBKEY          STATUS   TIER       SCORE  CREDITS       LATENCY   COUNTRY  VERSION";

/// One line of the `nodes` table.
pub fn node_row(node: &PNode) -> String {
    let status = match node.status {
        NodeStatus::Online => "online",
        NodeStatus::Offline => "offline",
    };
    format!(
        "{:>4}  {:<14}  {:<7}  {:<9}  {:>5.1}  {:>12.0}  {:>8}  {:<7}  {}",
        node.rank,
        short_key(&node.pubkey),
        status,
        node.tier.as_str(),
        node.score,
        node.credits,
        format_latency(node.latency_ms),
        node.country_code.as_deref().unwrap_or("-"),
        node.version.as_deref().unwrap_or("-"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_key() {
        assert_eq!(short_key("short"), "short");
        assert_eq!(
            short_key("8dx2FqWzLp3mV7nK2rT9hKa"),
            "8dx2Fq..9hKa"
        );
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GiB");
    }

    #[test]
    fn test_score_bar() {
        assert_eq!(score_bar(100.0), "[##########]");
        assert_eq!(score_bar(55.0), "[#####.....]");
        assert_eq!(score_bar(9.9), "[..........]");
        assert_eq!(score_bar(-5.0), "[..........]");
    }

    #[test]
    fn test_format_latency_and_percent() {
        assert_eq!(format_latency(Some(42)), "42 ms");
        assert_eq!(format_latency(None), "-");
        assert_eq!(format_percent(0.256), "25.6%");
    }
}
