//! # P&L Guard
//!
//! Watches the aggregate unrealized P&L of a Paradex account and sends a
//! Telegram alert when it crosses a configured threshold, plus a periodic
//! trade reminder.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `exchange`: Paradex positions client with retry/backoff
//! - `monitor`: Alert zone state machine, reminder timer and polling loop
//! - `notify`: Telegram notifications and message formatting
//! - `utils`: Shared decimal formatting helpers

pub mod config;
pub mod exchange;
pub mod monitor;
pub mod notify;
pub mod utils;

pub use config::Config;
