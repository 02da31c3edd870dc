//! Message formatting for Telegram notifications (legacy Markdown).

use crate::exchange::Position;
use crate::utils::decimal::format_signed;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Fixed trade reminder text.
pub const REMINDER_MESSAGE: &str = "🕐 Hourly trade reminder: place at least 1 trade.\n\
If you already traded, ignore this. If you didn't, stop pretending you're waiting for confirmation.";

/// Format a threshold alert with one block per position.
pub fn format_alert_message(
    total_pnl: Decimal,
    threshold: Decimal,
    positions: &[Position],
    at: DateTime<Utc>,
) -> String {
    let emoji = if total_pnl >= Decimal::ZERO { "🟢" } else { "🔴" };

    let mut lines = vec![
        format!("{} *Paradex P&L Alert*", emoji),
        format!("📅 Time: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        format!("💰 Total Unrealized P&L: `{} USDC`", format_signed(total_pnl, 2)),
        format!("⚠️ Threshold Triggered: `{}`", threshold),
        String::new(),
        "*Market Details:*".to_string(),
    ];

    for p in positions {
        let liq = p
            .liquidation_price
            .map(|price| price.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        lines.push(format!(
            "- *{}* ({})\n  P&L: `{}`\n  Size: {} | Liq: {}",
            p.market,
            p.side,
            format_signed(p.unrealized_pnl, 2),
            p.size,
            liq
        ));
    }

    lines.join("\n")
}
