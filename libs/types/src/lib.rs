//! # Riskwatch Shared Types
//!
//! Data model for the risk-control session protocol: the transient records
//! decoded off the wire (positions, capital, log lines, control directives)
//! and the long-lived aggregates reconstructed from them (order book entries,
//! per-instrument positions, capital usage).
//!
//! ## Design Philosophy
//!
//! - **Transient vs. long-lived**: wire snapshots are consumed and projected
//!   into aggregates, then discarded; aggregates live for the session.
//! - **Zero-copy wire structs**: fixed-layout payloads are `zerocopy`-enabled
//!   so decoding never allocates for the fixed part.
//! - **No precision loss**: order prices are `rust_decimal::Decimal`, never
//!   `f64`; only capital figures are `f64` because the wire carries them so.

pub mod messages;
pub mod order;
pub mod wire;

pub use messages::{
    CapitalSnapshot, ConnectionStatus, ControlDirective, ControlKind, ControlParseError,
    LogRecord, PositionSnapshot, Severity,
};
pub use order::{CapitalUsage, InstrumentPosition, OrderBookEntry, OrderEvent};
pub use wire::{trim_code, CapitalWire, PositionWire, INSTRUMENT_CODE_LEN};
