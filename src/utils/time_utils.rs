use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};

pub struct TimeUtils;

impl TimeUtils {
    pub const MS_IN_S: i64 = 1000;
    pub const MS_IN_MIN: i64 = Self::MS_IN_S * 60;
    pub const MS_IN_3_MIN: i64 = Self::MS_IN_S * 60 * 3;
    pub const MS_IN_5_MIN: i64 = Self::MS_IN_S * 60 * 5;
    pub const MS_IN_15_MIN: i64 = Self::MS_IN_S * 60 * 15;
    pub const MS_IN_30_MIN: i64 = Self::MS_IN_S * 60 * 30;
    pub const MS_IN_H: i64 = Self::MS_IN_MIN * 60;
    pub const MS_IN_2_H: i64 = Self::MS_IN_MIN * 60 * 2;
    pub const MS_IN_4_H: i64 = Self::MS_IN_MIN * 60 * 4;
    pub const MS_IN_6_H: i64 = Self::MS_IN_MIN * 60 * 6;
    pub const MS_IN_8_H: i64 = Self::MS_IN_MIN * 60 * 8;
    pub const MS_IN_12_H: i64 = Self::MS_IN_MIN * 60 * 12;
    pub const MS_IN_D: i64 = Self::MS_IN_H * 24;
    pub const MS_IN_3_D: i64 = Self::MS_IN_H * 24 * 3;
    pub const MS_IN_W: i64 = Self::MS_IN_D * 7;
    pub const MS_IN_1_M: i64 = Self::MS_IN_D * 30;

    const INTERVALS: [(i64, &'static str); 16] = [
        (Self::MS_IN_S, "1s"),
        (Self::MS_IN_MIN, "1m"),
        (Self::MS_IN_3_MIN, "3m"),
        (Self::MS_IN_5_MIN, "5m"),
        (Self::MS_IN_15_MIN, "15m"),
        (Self::MS_IN_30_MIN, "30m"),
        (Self::MS_IN_H, "1h"),
        (Self::MS_IN_2_H, "2h"),
        (Self::MS_IN_4_H, "4h"),
        (Self::MS_IN_6_H, "6h"),
        (Self::MS_IN_8_H, "8h"),
        (Self::MS_IN_12_H, "12h"),
        (Self::MS_IN_D, "1d"),
        (Self::MS_IN_3_D, "3d"),
        (Self::MS_IN_W, "1w"),
        (Self::MS_IN_1_M, "1M"),
    ];

    /// Convert interval in milliseconds to exchange shorthand (e.g. `15m`, `4h`).
    pub fn interval_to_string(interval_ms: i64) -> &'static str {
        Self::INTERVALS
            .iter()
            .find(|(ms, _)| *ms == interval_ms)
            .map(|(_, label)| *label)
            .unwrap_or("unknown")
    }

    /// Inverse of `interval_to_string`. Case matters (`1m` vs `1M`).
    pub fn interval_from_str(label: &str) -> Result<i64> {
        Self::INTERVALS
            .iter()
            .find(|(_, l)| *l == label)
            .map(|(ms, _)| *ms)
            .ok_or_else(|| anyhow!("Unknown interval label '{}'", label))
    }
}

/// Candle open time as a UTC timestamp. Out-of-range values clamp to the epoch.
pub fn epoch_ms_to_utc(epoch_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(epoch_ms).unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_labels_round_trip() {
        assert_eq!(TimeUtils::interval_to_string(TimeUtils::MS_IN_4_H), "4h");
        assert_eq!(
            TimeUtils::interval_from_str("15m").unwrap(),
            TimeUtils::MS_IN_15_MIN
        );
        assert_eq!(TimeUtils::interval_from_str("1M").unwrap(), TimeUtils::MS_IN_1_M);
        assert!(TimeUtils::interval_from_str("7h").is_err());
        assert_eq!(TimeUtils::interval_to_string(12345), "unknown");
    }

    #[test]
    fn epoch_conversion() {
        let dt = epoch_ms_to_utc(1_700_000_000_000);
        assert_eq!(dt.timestamp_millis(), 1_700_000_000_000);
    }
}
