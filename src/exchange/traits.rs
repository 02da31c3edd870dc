//! Venue-agnostic seam between the monitor loop and the exchange client.

use super::types::Position;
use async_trait::async_trait;
use thiserror::Error;

/// Why a position fetch produced no data.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Every attempt failed at the transport or HTTP status level.
    #[error("positions unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },

    /// The exchange answered but the body could not be decoded.
    #[error("malformed positions response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Source of the current open position set.
///
/// Implementations filter out closed positions; an empty `Vec` means the
/// account is flat, which is distinct from an error.
#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn fetch_positions(&self) -> Result<Vec<Position>, FetchError>;
}
