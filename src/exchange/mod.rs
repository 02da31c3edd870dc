//! Exchange integration for P&L monitoring.
//!
//! ## Paradex
//! Read-only REST access to the account's positions:
//! - Bearer-token authenticated `GET /positions`
//! - Bounded retries with exponential backoff
//! - Filtering to open positions
//!
//! The monitor only sees the [`PositionSource`] trait, so scripted sources
//! can stand in for the exchange.

mod client;
pub mod mock;
mod retry;
mod traits;
mod types;

pub use client::ParadexClient;
pub use mock::{MockFetch, MockPositionSource};
pub use retry::{Exhausted, RetryPolicy};
pub use traits::{FetchError, PositionSource};
pub use types::*;
