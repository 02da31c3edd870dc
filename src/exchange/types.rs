//! Type definitions for Paradex API responses.

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

/// Envelope returned by `GET /positions`.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionsResponse {
    #[serde(default)]
    pub results: Vec<Position>,
}

/// One exchange position as reported by Paradex.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Position {
    #[serde(default = "unknown_market")]
    pub market: String,
    #[serde(default, deserialize_with = "decimal_or_zero")]
    pub unrealized_pnl: Decimal,
    #[serde(default)]
    pub side: PositionSide,
    #[serde(default, deserialize_with = "decimal_or_zero")]
    pub size: Decimal,
    /// `None` when the exchange reports no liquidation price
    #[serde(default, deserialize_with = "optional_decimal")]
    pub liquidation_price: Option<Decimal>,
    #[serde(default)]
    pub status: PositionStatus,
}

/// Position direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
            PositionSide::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Lifecycle status of a position. Only `Open` positions reach the monitor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PositionStatus {
    Open,
    Closed,
    #[default]
    Other,
}

impl<'de> Deserialize<'de> for PositionStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.to_ascii_uppercase().as_str() {
            "OPEN" => PositionStatus::Open,
            "CLOSED" => PositionStatus::Closed,
            _ => PositionStatus::Other,
        })
    }
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }
}

/// Sum of unrealized P&L over a position set. An empty set sums to zero.
///
/// Returns `None` if the sum does not fit in a `Decimal`.
pub fn total_unrealized_pnl(positions: &[Position]) -> Option<Decimal> {
    positions
        .iter()
        .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.unrealized_pnl))
}

fn unknown_market() -> String {
    "Unknown".to_string()
}

/// Paradex encodes decimals as strings; plain JSON numbers are accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDecimal {
    Text(String),
    Number(serde_json::Number),
}

fn parse_raw<E: de::Error>(raw: RawDecimal) -> Result<Option<Decimal>, E> {
    let text = match raw {
        RawDecimal::Text(s) => s,
        RawDecimal::Number(n) => n.to_string(),
    };
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(text))
        .map(Some)
        .map_err(|e| E::custom(format!("invalid decimal '{}': {}", text, e)))
}

fn decimal_or_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    let raw = Option::<RawDecimal>::deserialize(deserializer)?;
    match raw {
        Some(raw) => Ok(parse_raw(raw)?.unwrap_or_default()),
        None => Ok(Decimal::ZERO),
    }
}

fn optional_decimal<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Decimal>, D::Error> {
    match Option::<RawDecimal>::deserialize(deserializer)? {
        Some(raw) => parse_raw(raw),
        None => Ok(None),
    }
}
