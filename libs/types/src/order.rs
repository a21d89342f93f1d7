//! Order-flow records and the long-lived session aggregates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A decoded order lifecycle notification embedded in a raw-bytes block.
///
/// Fields the decoder could not recover stay empty (or `None`); the raw
/// bytes are always retained for diagnostics so the audit sequence is
/// gap-free even for unparseable messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Message-type code, e.g. "D" for a new order.
    pub msg_type: String,
    /// Human-readable name for the code ("New Order"); unmapped codes pass
    /// through verbatim.
    pub type_name: String,
    pub seq_num: Option<u32>,
    pub transact_time: String,
    pub price: Decimal,
    /// Side name ("Buy"/"Sell"); unmapped side codes pass through verbatim.
    pub side: String,
    pub symbol: String,
    pub cl_ord_id: String,
    pub order_qty: Option<i32>,
    pub raw: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

impl OrderEvent {
    /// Sentinel marker for events the parser could not decode at all.
    pub fn is_parse_error(&self) -> bool {
        self.msg_type == "ERROR"
    }
}

/// One row of the reconstructed order book.
///
/// Entries are append-only: a replace or cancel inserts a new row and flips
/// `is_active` on the predecessor, preserving the full lifecycle history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookEntry {
    pub order_id: String,
    pub transact_time: String,
    pub side: String,
    pub ticker: String,
    pub price: Decimal,
    pub order_qty: i32,
    pub cum_qty: i32,
    /// Remaining unfilled quantity.
    pub leaves_qty: i32,
    pub market_id: String,
    pub account: String,
    pub last_modified: DateTime<Utc>,
    /// Self-reference for replace chains; equals `order_id` for originals.
    pub orig_order_id: String,
    pub text: String,
    pub is_active: bool,
}

/// Net position per instrument, mutated in place as order events and
/// position snapshots arrive.
///
/// Snapshots are keyed by `instrument` while order-derived updates are keyed
/// by `ticker`; the two identifiers are not guaranteed to coincide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentPosition {
    pub instrument: String,
    pub ticker: String,
    pub net: i32,
    pub open_long: i32,
    pub open_short: i32,
}

/// Capital figures plus message/capital limit usage projected from the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalUsage {
    pub open_capital: f64,
    pub accrued_capital: f64,
    pub total_capital: f64,
    pub message_limit: u32,
    pub used_messages: u32,
    pub capital_limit: f64,
    pub used_capital: f64,
}

impl CapitalUsage {
    pub fn message_usage_percent(&self) -> f64 {
        if self.message_limit == 0 {
            return 0.0;
        }
        f64::from(self.used_messages) / f64::from(self.message_limit) * 100.0
    }

    pub fn capital_usage_percent(&self) -> f64 {
        if self.capital_limit == 0.0 {
            return 0.0;
        }
        self.used_capital / self.capital_limit * 100.0
    }
}

impl Default for CapitalUsage {
    fn default() -> Self {
        Self {
            open_capital: 0.0,
            accrued_capital: 0.0,
            total_capital: 0.0,
            message_limit: 115_200,
            used_messages: 0,
            capital_limit: 100_000.0,
            used_capital: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_percentages() {
        let usage = CapitalUsage {
            used_messages: 57_600,
            used_capital: 25_000.0,
            ..CapitalUsage::default()
        };
        assert!((usage.message_usage_percent() - 50.0).abs() < 1e-9);
        assert!((usage.capital_usage_percent() - 25.0).abs() < 1e-9);
    }

    #[test]
    fn zero_limits_do_not_divide_by_zero() {
        let usage = CapitalUsage {
            message_limit: 0,
            capital_limit: 0.0,
            used_messages: 10,
            used_capital: 10.0,
            ..CapitalUsage::default()
        };
        assert_eq!(usage.message_usage_percent(), 0.0);
        assert_eq!(usage.capital_usage_percent(), 0.0);
    }
}
