//! Operator notifications.
//!
//! The monitor talks to a [`Notifier`]; [`TelegramNotifier`] is the
//! production implementation. Delivery failures are returned as values and
//! never abort a monitoring cycle.

pub mod format;
mod telegram;

pub use telegram::TelegramNotifier;

use crate::exchange::Position;
use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Notification delivery failures.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivery channel for P&L alerts and trade reminders.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Report that total P&L crossed `threshold`, with the positions behind it.
    async fn send_alert(
        &self,
        total_pnl: Decimal,
        threshold: Decimal,
        positions: &[Position],
    ) -> Result<(), NotifyError>;

    /// Nudge the operator to place a trade.
    async fn send_reminder(&self) -> Result<(), NotifyError>;
}
