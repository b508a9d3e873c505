//! Timestamp utilities

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert whole seconds to a std duration
pub fn secs_to_duration(secs: u64) -> std::time::Duration {
    std::time::Duration::from_secs(secs)
}

/// Timestamp `secs` seconds before now; used as a lease cut-off
pub fn seconds_ago(secs: u64) -> DateTime<Utc> {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX);
    ChronoDuration::try_seconds(secs)
        .and_then(|lease| now().checked_sub_signed(lease))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // After 2000-01-01, before 2100-01-01
        assert!(timestamp.timestamp() > 946_684_800);
        assert!(timestamp.timestamp() < 4_102_444_800);
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        assert!(time2 > time1);
    }

    #[test]
    fn test_secs_to_duration() {
        assert_eq!(secs_to_duration(0), Duration::ZERO);
        assert_eq!(secs_to_duration(600), Duration::from_secs(600));
    }

    #[test]
    fn test_seconds_ago_is_in_the_past() {
        let cutoff = seconds_ago(60);
        let delta = now() - cutoff;
        assert!(delta.num_seconds() >= 59 && delta.num_seconds() <= 61);
    }

    #[test]
    fn test_seconds_ago_saturates_huge_values() {
        // Must not panic on overflow
        let _ = seconds_ago(u64::MAX);
    }
}
