//! Scripted position source for paper runs and tests.

use super::traits::{FetchError, PositionSource};
use super::types::*;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted fetch result.
#[derive(Debug, Clone)]
pub enum MockFetch {
    Positions(Vec<Position>),
    Unavailable,
    Malformed,
}

/// Replays a queue of fetch results, one per call.
///
/// Once the script runs out every further call reports the exchange as
/// unavailable. Clones share the same queue and counters.
#[derive(Debug, Clone, Default)]
pub struct MockPositionSource {
    script: Arc<Mutex<VecDeque<MockFetch>>>,
    calls: Arc<AtomicU64>,
}

impl MockPositionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script one open position per entry, each carrying the given P&L.
    pub fn from_pnls(pnls: &[Decimal]) -> Self {
        let source = Self::new();
        for pnl in pnls {
            source.push(MockFetch::Positions(vec![mock_position("BTC-USD-PERP", *pnl)]));
        }
        source
    }

    pub fn push(&self, fetch: MockFetch) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(fetch);
        }
    }

    /// Number of fetches served so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

/// Build an open position with the given market and unrealized P&L.
pub fn mock_position(market: &str, unrealized_pnl: Decimal) -> Position {
    Position {
        market: market.to_string(),
        unrealized_pnl,
        side: if unrealized_pnl >= Decimal::ZERO {
            PositionSide::Long
        } else {
            PositionSide::Short
        },
        size: Decimal::ONE,
        liquidation_price: None,
        status: PositionStatus::Open,
    }
}

#[async_trait]
impl PositionSource for MockPositionSource {
    async fn fetch_positions(&self) -> Result<Vec<Position>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(MockFetch::Positions(positions)) => Ok(positions),
            Some(MockFetch::Malformed) => {
                let response: PositionsResponse = serde_json::from_str(r#"{"results": 42}"#)?;
                Ok(response.results)
            }
            Some(MockFetch::Unavailable) | None => Err(FetchError::Unavailable {
                attempts: 4,
                last_error: "mock exchange unavailable".to_string(),
            }),
        }
    }
}
