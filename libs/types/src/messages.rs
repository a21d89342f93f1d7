//! Transient records decoded from the session stream.
//!
//! Everything in this module is consumed once by the reconstructor and then
//! discarded; the long-lived aggregates live in [`crate::order`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Log severity, carried on the wire as a single-character type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Map a wire tag byte to a severity. Returns `None` for tags that do
    /// not denote a log payload.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'D' => Some(Severity::Debug),
            b'I' => Some(Severity::Info),
            b'W' => Some(Severity::Warning),
            b'E' => Some(Severity::Error),
            _ => None,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Severity::Debug => b'D',
            Severity::Info => b'I',
            Severity::Warning => b'W',
            Severity::Error => b'E',
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Debug => "Debug",
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        };
        f.write_str(name)
    }
}

/// One free-text log line reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-instrument position snapshot as reported by the server.
///
/// `net == open_long - open_short` is the expected relationship but the wire
/// does not enforce it; the reconstructor recomputes net itself for
/// order-derived updates and only trusts these fields verbatim for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    /// Instrument code, NUL-trimmed from the fixed 12-byte wire field.
    pub instrument: String,
    pub net: i32,
    pub open_long: i32,
    pub open_short: i32,
    pub captured_at: DateTime<Utc>,
}

/// Account capital snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalSnapshot {
    pub open: f64,
    pub accrued: f64,
    pub total: f64,
    pub captured_at: DateTime<Utc>,
}

/// Kinds of risk control the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlKind {
    Halt,
    MaxOrderRate,
    MaxTransaction,
    MaxAbsShares,
    MaxShortShares,
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControlKind::Halt => "Halt",
            ControlKind::MaxOrderRate => "MaxOrderRate",
            ControlKind::MaxTransaction => "MaxTransaction",
            ControlKind::MaxAbsShares => "MaxAbsShares",
            ControlKind::MaxShortShares => "MaxShortShares",
        };
        f.write_str(name)
    }
}

impl FromStr for ControlKind {
    type Err = ControlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Case-insensitive, matching how operators type them.
        match s.to_ascii_lowercase().as_str() {
            "halt" => Ok(ControlKind::Halt),
            "maxorderrate" => Ok(ControlKind::MaxOrderRate),
            "maxtransaction" => Ok(ControlKind::MaxTransaction),
            "maxabsshares" => Ok(ControlKind::MaxAbsShares),
            "maxshortshares" => Ok(ControlKind::MaxShortShares),
            _ => Err(ControlParseError::UnknownKind(s.to_string())),
        }
    }
}

/// Errors from parsing the textual `scope,kind,value` directive form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControlParseError {
    #[error("control directive must be 'scope,kind,value', got {parts} parts")]
    WrongShape { parts: usize },
    #[error("unknown control kind: {0}")]
    UnknownKind(String),
}

/// A scoped risk-control setting pushed to the server.
///
/// An empty `value` is a removal/clear directive; the wire has no separate
/// message for clearing a control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlDirective {
    pub scope: String,
    pub kind: ControlKind,
    pub value: String,
}

impl ControlDirective {
    pub fn is_clear(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Display for ControlDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.scope, self.kind, self.value)
    }
}

impl FromStr for ControlDirective {
    type Err = ControlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(3, ',').collect();
        if parts.len() != 3 {
            return Err(ControlParseError::WrongShape { parts: parts.len() });
        }
        Ok(ControlDirective {
            scope: parts[0].to_string(),
            kind: parts[1].parse()?,
            value: parts[2].to_string(),
        })
    }
}

/// Connectivity state transition emitted by a transport adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected { endpoint: String },
    Disconnected { reason: String },
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_tag_round_trip() {
        for sev in [
            Severity::Debug,
            Severity::Info,
            Severity::Warning,
            Severity::Error,
        ] {
            assert_eq!(Severity::from_tag(sev.tag()), Some(sev));
        }
        assert_eq!(Severity::from_tag(b'P'), None);
    }

    #[test]
    fn control_directive_display_parse_round_trip() {
        let directive = ControlDirective {
            scope: "GLOBAL".to_string(),
            kind: ControlKind::MaxOrderRate,
            value: "250".to_string(),
        };
        let text = directive.to_string();
        assert_eq!(text, "GLOBAL,MaxOrderRate,250");
        assert_eq!(text.parse::<ControlDirective>().unwrap(), directive);
    }

    #[test]
    fn control_parse_is_case_insensitive() {
        let directive: ControlDirective = "desk7,halt,1".parse().unwrap();
        assert_eq!(directive.kind, ControlKind::Halt);
    }

    #[test]
    fn empty_value_is_clear_directive() {
        let directive: ControlDirective = "GLOBAL,MaxAbsShares,".parse().unwrap();
        assert!(directive.is_clear());
        assert_eq!(directive.to_string(), "GLOBAL,MaxAbsShares,");
    }

    #[test]
    fn timestamped_records_round_trip_through_serde() {
        let record = LogRecord {
            severity: Severity::Error,
            message: "capital limit breached".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(serde_json::from_str::<LogRecord>(&json).unwrap(), record);

        let snapshot = PositionSnapshot {
            instrument: "PLKGHM000017".to_string(),
            net: -50,
            open_long: 0,
            open_short: 50,
            captured_at: Utc::now(),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(
            serde_json::from_str::<PositionSnapshot>(&json).unwrap(),
            snapshot
        );
    }

    #[test]
    fn malformed_control_is_rejected() {
        assert!(matches!(
            "onlyscope".parse::<ControlDirective>(),
            Err(ControlParseError::WrongShape { parts: 1 })
        ));
        assert!(matches!(
            "scope,NotAControl,5".parse::<ControlDirective>(),
            Err(ControlParseError::UnknownKind(_))
        ));
    }
}
