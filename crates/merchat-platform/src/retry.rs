use std::time::Duration;

/// Attempt `n`'s delay (0-indexed): `base * factor^n + uniform(0.1, 0.3) * base * factor^n`.
///
/// Jitter is derived from the low bits of a monotonic clock read rather than
/// a randomness dependency, the way the reference `ChannelManager`'s backoff
/// does — keeps this crate's footprint aligned with the rest of the
/// workspace.
pub fn backoff_delay(attempt: u32, base_ms: u64, factor: f64) -> Duration {
    let scale = factor.powi(attempt as i32);
    let base = base_ms as f64 * scale;
    let jitter_fraction = 0.1 + 0.2 * jitter_unit();
    let total_ms = base + jitter_fraction * base;
    Duration::from_millis(total_ms.round() as u64)
}

/// A value in `[0, 1)` derived from the current monotonic instant's
/// sub-millisecond jitter, avoiding a `rand` dependency.
fn jitter_unit() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1_000_000) as f64 / 1_000_000.0
}

/// Whether an HTTP status code should be retried under the platform
/// client's policy (§4.2): transport errors, 5xx, 408, 429.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_with_attempt() {
        let d0 = backoff_delay(0, 1000, 2.0);
        let d1 = backoff_delay(1, 1000, 2.0);
        assert!(d1 > d0);
    }

    #[test]
    fn delay_includes_jitter_band() {
        let d = backoff_delay(0, 1000, 2.0);
        assert!(d.as_millis() >= 1100 && d.as_millis() <= 1300);
    }

    #[test]
    fn retryable_statuses() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(404));
        assert!(!is_retryable_status(401));
    }
}
