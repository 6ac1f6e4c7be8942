//! Small helpers shared across the crate: monotonic-seconds timestamps and
//! the ASCII-decimal integer encoding used inside transaction/block hashes
//! (spec.md §3: a deliberate wire-compatibility point, not varint).

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current UNIX timestamp in seconds.
pub fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs()
}

/// Encodes `n` as its base-10 ASCII representation.
pub fn ascii_decimal(n: u64) -> String {
    n.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_decimal_matches_display() {
        assert_eq!(ascii_decimal(0), "0");
        assert_eq!(ascii_decimal(42), "42");
    }

    #[test]
    fn timestamp_is_plausible() {
        // Sanity bound: sometime after this spec was written.
        assert!(timestamp() > 1_700_000_000);
    }
}
