use serde::{Deserialize, Serialize};
use time::{Duration, PrimitiveDateTime};

/// Wall-clock minute packed as `YYMMDDHHMM` for ordering comparisons only.
///
/// Ordering holds within one century; the two-digit year wraps at 2100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct TargetWakeTime(pub u64);

/// When the next slot starts, relative to a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPlan {
    pub minutes_to_wait: u32,
    pub seconds_to_wait: u32,
    pub target: TargetWakeTime,
}

/// Add `minutes_to_add` to `now` with seconds dropped and pack the result.
pub fn encode_target(now: PrimitiveDateTime, minutes_to_add: i64) -> TargetWakeTime {
    let truncated = now
        - Duration::seconds(i64::from(now.second()))
        - Duration::nanoseconds(i64::from(now.nanosecond()));
    let at = truncated + Duration::minutes(minutes_to_add);

    let mut encoded = at.year().rem_euclid(100) as u64;
    for part in [
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
    ] {
        encoded = encoded * 100 + u64::from(part);
    }
    TargetWakeTime(encoded)
}

/// Plan the wait until the next multiple of `interval_minutes` past the hour.
pub fn next_slot(now: PrimitiveDateTime, interval_minutes: u32) -> SlotPlan {
    let minutes_to_wait = interval_minutes - u32::from(now.minute()) % interval_minutes;
    SlotPlan {
        minutes_to_wait,
        seconds_to_wait: minutes_to_wait * 60 - u32::from(now.second()),
        target: encode_target(now, i64::from(minutes_to_wait)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn packs_calendar_fields() {
        assert_eq!(
            encode_target(datetime!(2024-03-07 09:05:59), 0),
            TargetWakeTime(24_03_07_09_05)
        );
    }

    #[test]
    fn rolls_over_month_and_orders_after_earlier_slot() {
        let rolled = encode_target(datetime!(2024-01-31 23:55:00), 10);
        assert_eq!(rolled, TargetWakeTime(24_02_01_00_05));
        assert!(rolled > encode_target(datetime!(2024-01-31 23:50:00), 0));
    }

    #[test]
    fn rolls_over_year() {
        let rolled = encode_target(datetime!(2024-12-31 23:55:30), 10);
        assert_eq!(rolled, TargetWakeTime(25_01_01_00_05));
        assert!(rolled > encode_target(datetime!(2024-12-31 23:59:59), 0));
    }

    #[test]
    fn handles_leap_day() {
        assert_eq!(
            encode_target(datetime!(2024-02-28 23:58:00), 3),
            TargetWakeTime(24_02_29_00_01)
        );
    }

    #[test]
    fn plans_next_ten_minute_boundary() {
        let plan = next_slot(datetime!(2024-06-01 12:09:15), 10);
        assert_eq!(plan.minutes_to_wait, 1);
        assert_eq!(plan.seconds_to_wait, 45);
        assert_eq!(plan.target, TargetWakeTime(24_06_01_12_10));

        // Exactly on a boundary waits for the following one
        let plan = next_slot(datetime!(2024-06-01 12:20:00), 10);
        assert_eq!(plan.minutes_to_wait, 10);
        assert_eq!(plan.seconds_to_wait, 600);
        assert_eq!(plan.target, TargetWakeTime(24_06_01_12_30));
    }
}
