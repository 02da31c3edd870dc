//! Trade reminder scheduling.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;
use tracing::warn;

/// Next instant a trade reminder is due, or nothing when disabled.
///
/// Both firing and alert-driven resets reschedule relative to the instant
/// they happen, so the next due time is always in the future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderTimer {
    interval: Option<TimeDelta>,
    next_at: Option<DateTime<Utc>>,
}

impl ReminderTimer {
    /// First reminder is due one interval after `now`. `None` disables it.
    pub fn new(interval: Option<Duration>, now: DateTime<Utc>) -> Self {
        let interval = interval
            .filter(|d| !d.is_zero())
            .and_then(|d| TimeDelta::from_std(d).ok());

        let mut timer = Self {
            interval,
            next_at: None,
        };
        timer.reschedule(now);
        timer
    }

    pub fn disabled() -> Self {
        Self {
            interval: None,
            next_at: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.next_at.is_some()
    }

    pub fn next_at(&self) -> Option<DateTime<Utc>> {
        self.next_at
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_at.is_some_and(|at| now >= at)
    }

    /// Push the next reminder to `now + interval`.
    pub fn reschedule(&mut self, now: DateTime<Utc>) {
        let Some(interval) = self.interval else {
            return;
        };

        self.next_at = now.checked_add_signed(interval);
        if self.next_at.is_none() {
            warn!("Reminder interval overflows the calendar; reminders disabled");
            self.interval = None;
        }
    }
}
