//! Correlation ids for turns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique id for one orchestrator turn. Every log line of the turn
/// carries it.
pub fn generate_turn_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("turn-{ts:x}-{count:04x}")
}

/// Id of one round within a turn.
pub fn round_span_id(turn_id: &str, round: u32) -> String {
    format!("{turn_id}:r{round}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_ids_are_unique() {
        let a = generate_turn_id();
        let b = generate_turn_id();
        assert_ne!(a, b);
        assert!(a.starts_with("turn-"));
    }

    #[test]
    fn round_span_id_format() {
        assert_eq!(round_span_id("turn-1", 3), "turn-1:r3");
    }
}
