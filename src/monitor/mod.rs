//! P&L monitoring core.
//!
//! - `alert`: NORMAL / ABOVE / BELOW zone machine, one transition per crossing
//! - `reminder`: trade reminder timer, reset on fire and on alerts
//! - `runner`: the single-threaded polling loop tying fetch, alerts and
//!   reminders together

mod alert;
mod clock;
mod reminder;
mod runner;

pub use alert::{AlertState, AlertZone, ZoneTransition};
pub use clock::{Clock, SystemClock};
pub use reminder::ReminderTimer;
pub use runner::{CycleReport, MonitorLoop};
