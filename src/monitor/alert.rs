//! Threshold zone tracking with one alert per crossing.

use rust_decimal::Decimal;
use std::fmt;

/// Where total P&L sits relative to the two thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AlertZone {
    /// Strictly between the thresholds
    #[default]
    Normal,
    /// At or above the upper threshold
    Above,
    /// At or below the lower threshold
    Below,
}

impl AlertZone {
    /// Classify a P&L figure. The upper threshold is checked first, so an
    /// inverted pair (`upper < lower`) resolves to `Above` when both hold.
    pub fn classify(pnl: Decimal, upper: Decimal, lower: Decimal) -> Self {
        if pnl >= upper {
            AlertZone::Above
        } else if pnl <= lower {
            AlertZone::Below
        } else {
            AlertZone::Normal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertZone::Normal => "NORMAL",
            AlertZone::Above => "ABOVE",
            AlertZone::Below => "BELOW",
        }
    }
}

impl fmt::Display for AlertZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A change of zone.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTransition {
    pub previous: AlertZone,
    pub current: AlertZone,
    pub pnl: Decimal,
    /// The crossed threshold; `None` when returning to `Normal`
    pub threshold: Option<Decimal>,
}

impl ZoneTransition {
    /// True when the operator should be alerted (entering Above or Below).
    pub fn is_alert(&self) -> bool {
        self.threshold.is_some()
    }

    pub fn is_recovery(&self) -> bool {
        self.current == AlertZone::Normal
    }
}

/// Three-state machine turning raw P&L into at most one transition per
/// zone change. Pure: no I/O, no clock.
#[derive(Debug, Clone, Default)]
pub struct AlertState {
    zone: AlertZone,
}

impl AlertState {
    /// Start in `Normal`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zone(&self) -> AlertZone {
        self.zone
    }

    /// Feed one P&L observation.
    ///
    /// Returns `None` while the zone is unchanged.
    pub fn transition(
        &mut self,
        pnl: Decimal,
        upper: Decimal,
        lower: Decimal,
    ) -> Option<ZoneTransition> {
        let target = AlertZone::classify(pnl, upper, lower);
        if target == self.zone {
            return None;
        }

        let previous = std::mem::replace(&mut self.zone, target);
        let threshold = match target {
            AlertZone::Above => Some(upper),
            AlertZone::Below => Some(lower),
            AlertZone::Normal => None,
        };

        Some(ZoneTransition {
            previous,
            current: target,
            pnl,
            threshold,
        })
    }
}
