//! Near-future time offers in the signal timezone.

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};

/// Offset the signals are quoted in (Brazil, UTC-03:00).
pub const SIGNAL_UTC_OFFSET_SECS: i32 = -3 * 3600;

/// Number of labels offered per menu.
pub const OFFER_COUNT: usize = 5;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

fn signal_offset() -> FixedOffset {
    FixedOffset::east_opt(SIGNAL_UTC_OFFSET_SECS).unwrap_or(Utc.fix())
}

/// `HH:MM` labels for the five minutes starting one minute after `now`.
pub fn offer_times(now: DateTime<Utc>) -> Vec<String> {
    let start = now.with_timezone(&signal_offset()) + Duration::minutes(1);
    (0..OFFER_COUNT as i64)
        .map(|i| (start + Duration::minutes(i)).format("%H:%M").to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveTime, TimeZone, Timelike};

    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, h, m, s).unwrap()
    }

    fn minutes_of(label: &str) -> u32 {
        let t = NaiveTime::parse_from_str(label, "%H:%M").unwrap();
        t.hour() * 60 + t.minute()
    }

    #[test]
    fn five_sequential_labels_in_utc_minus_three() {
        let times = offer_times(at(17, 31, 20));
        assert_eq!(times, vec!["14:32", "14:33", "14:34", "14:35", "14:36"]);
    }

    #[test]
    fn first_label_is_after_now() {
        for (h, m, s) in [(0, 0, 0), (12, 30, 59), (3, 0, 1), (23, 59, 59)] {
            let now = at(h, m, s);
            let local = now.with_timezone(&signal_offset());
            let now_minutes = local.hour() * 60 + local.minute();
            let times = offer_times(now);

            assert_eq!(times.len(), OFFER_COUNT);
            assert_eq!(minutes_of(&times[0]), (now_minutes + 1) % 1440);
            for pair in times.windows(2) {
                assert_eq!((minutes_of(&pair[0]) + 1) % 1440, minutes_of(&pair[1]));
            }
        }
    }

    #[test]
    fn wraps_past_midnight() {
        // 02:57 UTC is 23:57 local.
        let times = offer_times(at(2, 57, 0));
        assert_eq!(times, vec!["23:58", "23:59", "00:00", "00:01", "00:02"]);
    }

    #[test]
    fn labels_are_distinct() {
        let times = offer_times(at(9, 0, 0));
        let mut deduped = times.clone();
        deduped.dedup();
        assert_eq!(deduped, times);
    }

    #[test]
    fn fixed_clock_returns_its_instant() {
        let clock = FixedClock(at(1, 2, 3));
        assert_eq!(clock.now(), at(1, 2, 3));
    }
}
