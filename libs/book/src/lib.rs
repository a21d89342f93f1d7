//! # Order Book / Position Reconstruction
//!
//! Pure state machine consuming ordered order events and position/capital
//! snapshots and maintaining the client-visible mirror of server state:
//! an append-only order book, per-instrument net positions, the raw
//! order-event log, the server log and capital usage.
//!
//! Everything here is synchronous and in-memory. Concurrency is the
//! caller's concern; all mutation is expected to be serialized onto a
//! single logical writer.

pub mod bounded;

pub use bounded::BoundedLog;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use types::{
    CapitalSnapshot, CapitalUsage, InstrumentPosition, LogRecord, OrderBookEntry, OrderEvent,
    PositionSnapshot,
};

/// Cap on each retained log (book entries, raw events, server log lines).
pub const RETENTION_LIMIT: usize = 1000;

/// Order quantity assumed when an event does not carry tag 38.
pub const DEFAULT_ORDER_QTY: i32 = 100;

/// What applying one order event did to the book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookUpdate {
    /// A new active entry was inserted.
    Inserted,
    /// The active entry was superseded by a replacement entry.
    Replaced,
    /// The active entry was closed out by a terminal cancel entry.
    Cancelled,
    /// A replace or cancel referenced an order id with no active entry;
    /// reported and dropped, no retroactive repair.
    UnknownOrder { cl_ord_id: String },
    /// The message-type code drives no book transition; the event is still
    /// retained in the raw log.
    Ignored,
}

/// Reconstructed session state.
#[derive(Debug)]
pub struct RiskBook {
    orders: BoundedLog<OrderBookEntry>,
    events: BoundedLog<OrderEvent>,
    logs: BoundedLog<LogRecord>,
    positions: Vec<InstrumentPosition>,
    capital: CapitalUsage,
}

impl Default for RiskBook {
    fn default() -> Self {
        Self::new()
    }
}

impl RiskBook {
    pub fn new() -> Self {
        Self {
            orders: BoundedLog::new(RETENTION_LIMIT),
            events: BoundedLog::new(RETENTION_LIMIT),
            logs: BoundedLog::new(RETENTION_LIMIT),
            positions: Vec::new(),
            capital: CapitalUsage::default(),
        }
    }

    /// Book entries, newest first, full replace/cancel history included.
    pub fn orders(&self) -> &BoundedLog<OrderBookEntry> {
        &self.orders
    }

    /// Raw order-event log, newest first, parse errors included.
    pub fn events(&self) -> &BoundedLog<OrderEvent> {
        &self.events
    }

    /// Server log lines, newest first.
    pub fn logs(&self) -> &BoundedLog<LogRecord> {
        &self.logs
    }

    pub fn positions(&self) -> &[InstrumentPosition] {
        &self.positions
    }

    pub fn capital(&self) -> &CapitalUsage {
        &self.capital
    }

    pub fn record_log(&mut self, record: LogRecord) {
        self.logs.push(record);
    }

    /// Apply a server position snapshot, keyed by instrument id.
    ///
    /// Snapshot fields are taken verbatim; only order-derived updates
    /// recompute net locally.
    pub fn apply_position(&mut self, snapshot: &PositionSnapshot) {
        if let Some(position) = self
            .positions
            .iter_mut()
            .find(|p| p.instrument == snapshot.instrument)
        {
            position.net = snapshot.net;
            position.open_long = snapshot.open_long;
            position.open_short = snapshot.open_short;
            return;
        }
        self.positions.push(InstrumentPosition {
            instrument: snapshot.instrument.clone(),
            // Display ticker falls back to the last dot-separated segment of
            // the instrument id until something better is known.
            ticker: snapshot
                .instrument
                .rsplit('.')
                .next()
                .unwrap_or(&snapshot.instrument)
                .to_string(),
            net: snapshot.net,
            open_long: snapshot.open_long,
            open_short: snapshot.open_short,
        });
    }

    /// Project a capital snapshot into the usage aggregate.
    pub fn apply_capital(&mut self, snapshot: &CapitalSnapshot) {
        self.capital.open_capital = snapshot.open;
        self.capital.accrued_capital = snapshot.accrued;
        self.capital.total_capital = snapshot.total;
        self.capital.used_capital = snapshot.total;
    }

    /// Apply one decoded order event.
    ///
    /// The event is always retained in the raw log and counted against the
    /// message limit, whatever its type; only "D"/"G"/"F" drive book state.
    pub fn apply_order_event(&mut self, event: OrderEvent) -> BookUpdate {
        self.capital.used_messages = self.capital.used_messages.saturating_add(1);

        let update = match event.msg_type.as_str() {
            "D" => self.apply_new(&event),
            "G" => self.apply_replace(&event),
            "F" => self.apply_cancel(&event),
            other => {
                debug!(msg_type = other, "order event drives no book transition");
                BookUpdate::Ignored
            }
        };
        self.events.push(event);
        update
    }

    fn apply_new(&mut self, event: &OrderEvent) -> BookUpdate {
        let qty = event.order_qty.unwrap_or(DEFAULT_ORDER_QTY);
        let entry = OrderBookEntry {
            order_id: event.cl_ord_id.clone(),
            transact_time: event.transact_time.clone(),
            side: event.side.clone(),
            ticker: event.symbol.clone(),
            price: event.price,
            order_qty: qty,
            cum_qty: 0,
            leaves_qty: qty,
            market_id: String::new(),
            account: String::new(),
            last_modified: event.received_at,
            orig_order_id: event.cl_ord_id.clone(),
            text: String::new(),
            is_active: true,
        };
        self.update_position_from_order(event, qty);
        self.orders.push(entry);
        BookUpdate::Inserted
    }

    fn apply_replace(&mut self, event: &OrderEvent) -> BookUpdate {
        let Some(original) = deactivate(&mut self.orders, &event.cl_ord_id) else {
            warn!(cl_ord_id = %event.cl_ord_id, "replace for unknown order dropped");
            return BookUpdate::UnknownOrder {
                cl_ord_id: event.cl_ord_id.clone(),
            };
        };

        // Fields the incoming message omits are inherited from the original.
        let replacement = OrderBookEntry {
            order_id: format!("{}-M", event.cl_ord_id),
            transact_time: inherit(&event.transact_time, &original.transact_time),
            side: inherit(&event.side, &original.side),
            ticker: inherit(&event.symbol, &original.ticker),
            price: if event.price > Decimal::ZERO {
                event.price
            } else {
                original.price
            },
            order_qty: original.order_qty,
            cum_qty: original.cum_qty,
            leaves_qty: original.order_qty - original.cum_qty,
            market_id: original.market_id.clone(),
            account: original.account.clone(),
            last_modified: event.received_at,
            orig_order_id: original.order_id.clone(),
            text: "Modified".to_string(),
            is_active: true,
        };
        self.orders.push(replacement);
        BookUpdate::Replaced
    }

    fn apply_cancel(&mut self, event: &OrderEvent) -> BookUpdate {
        let Some(original) = deactivate(&mut self.orders, &event.cl_ord_id) else {
            warn!(cl_ord_id = %event.cl_ord_id, "cancel for unknown order dropped");
            return BookUpdate::UnknownOrder {
                cl_ord_id: event.cl_ord_id.clone(),
            };
        };

        // Cancel does not reverse the position delta booked by the original
        // New; see DESIGN.md.
        let terminal = OrderBookEntry {
            order_id: original.order_id.clone(),
            transact_time: inherit(&event.transact_time, &original.transact_time),
            side: original.side.clone(),
            ticker: original.ticker.clone(),
            price: original.price,
            order_qty: original.order_qty,
            cum_qty: original.cum_qty,
            leaves_qty: 0,
            market_id: original.market_id.clone(),
            account: original.account.clone(),
            last_modified: event.received_at,
            orig_order_id: original.order_id.clone(),
            text: "Cancelled".to_string(),
            is_active: false,
        };
        self.orders.push(terminal);
        BookUpdate::Cancelled
    }

    /// Order-derived position update, keyed by ticker.
    ///
    /// The instrument id stays empty here: order events carry only the
    /// ticker, and ticker and instrument id are not guaranteed to coincide,
    /// so nothing is unified silently.
    fn update_position_from_order(&mut self, event: &OrderEvent, qty: i32) {
        if event.symbol.is_empty() {
            return;
        }
        let idx = match self.positions.iter().position(|p| p.ticker == event.symbol) {
            Some(idx) => idx,
            None => {
                self.positions.push(InstrumentPosition {
                    instrument: String::new(),
                    ticker: event.symbol.clone(),
                    net: 0,
                    open_long: 0,
                    open_short: 0,
                });
                self.positions.len() - 1
            }
        };
        let position = &mut self.positions[idx];
        match event.side.as_str() {
            "Buy" => position.open_long += qty,
            "Sell" => position.open_short += qty,
            _ => return,
        }
        position.net = position.open_long - position.open_short;
    }
}

/// Flip the active entry for `cl_ord_id` to inactive, returning a snapshot
/// of it for field inheritance.
fn deactivate(orders: &mut BoundedLog<OrderBookEntry>, cl_ord_id: &str) -> Option<OrderBookEntry> {
    let entry = orders
        .iter_mut()
        .find(|o| o.is_active && o.order_id == cl_ord_id)?;
    entry.is_active = false;
    Some(entry.clone())
}

fn inherit(incoming: &str, original: &str) -> String {
    if incoming.is_empty() {
        original.to_string()
    } else {
        incoming.to_string()
    }
}
