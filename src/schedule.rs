// src/schedule.rs
//! Send-window gate for unattended runs. Each morning edition is due during
//! the first minutes after 08:00 in its home time zone.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

/// Minutes after the hour during which an edition is still due (inclusive).
pub const WINDOW_MINUTES: u32 = 20;

#[derive(Debug, Clone, Copy)]
pub struct Edition {
    pub label: &'static str,
    pub tz: Tz,
    pub hour: u32,
}

pub const EDITIONS: [Edition; 2] = [
    Edition {
        label: "NY 08:00",
        tz: chrono_tz::America::New_York,
        hour: 8,
    },
    Edition {
        label: "BJ 08:00",
        tz: chrono_tz::Asia::Shanghai,
        hour: 8,
    },
];

impl Edition {
    /// Local wall clock in `[hour:00, hour:WINDOW_MINUTES]`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);
        local.hour() == self.hour && local.minute() <= WINDOW_MINUTES
    }
}

/// Every scheduled edition, in send order.
pub fn scheduled_editions() -> Vec<String> {
    EDITIONS.iter().map(|e| e.label.to_string()).collect()
}

/// Editions whose window contains `now`.
pub fn editions_due(now: DateTime<Utc>) -> Vec<String> {
    EDITIONS
        .iter()
        .filter(|e| e.is_due(now))
        .map(|e| e.label.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn new_york_follows_daylight_saving() {
        // EDT (UTC-4)
        assert_eq!(editions_due(at(2025, 7, 1, 12, 5)), vec!["NY 08:00"]);
        // EST (UTC-5)
        assert_eq!(editions_due(at(2025, 1, 15, 13, 10)), vec!["NY 08:00"]);
        assert!(editions_due(at(2025, 1, 15, 12, 10)).is_empty());
    }

    #[test]
    fn beijing_window_is_inclusive_of_its_last_minute() {
        assert_eq!(editions_due(at(2025, 6, 10, 0, 0)), vec!["BJ 08:00"]);
        assert_eq!(editions_due(at(2025, 6, 10, 0, 20)), vec!["BJ 08:00"]);
        assert!(editions_due(at(2025, 6, 10, 0, 21)).is_empty());
        assert!(editions_due(at(2025, 6, 9, 23, 59)).is_empty());
    }

    #[test]
    fn scheduled_order_is_ny_then_bj() {
        assert_eq!(scheduled_editions(), vec!["NY 08:00", "BJ 08:00"]);
    }
}
