//! Order-event parser for raw I/O-bytes payloads.
//!
//! The preferred format is a '|'-delimited list of `tag=value` fields in the
//! FIX dialect the gateway speaks. Payloads without that structure get a
//! best-effort pattern scan instead, and anything that defeats both paths
//! becomes a sentinel parse-error event rather than a dropped message, so
//! the raw message log stays a complete audit sequence.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use types::OrderEvent;

static SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2,6}\b").expect("symbol pattern is valid"));
static PRICE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+\.\d+").expect("price pattern is valid"));

/// Display name for a FIX message-type code; unmapped codes pass through.
pub fn type_name(code: &str) -> String {
    match code {
        "D" => "New Order",
        "F" => "Cancel Order",
        "G" => "Modify Order",
        "8" => "Execution Report",
        "9" => "Cancel Reject",
        "0" => "Heartbeat",
        "A" => "Logon",
        "5" => "Logout",
        other => return other.to_string(),
    }
    .to_string()
}

/// Side name for a FIX side code; unmapped codes pass through.
pub fn side_name(code: &str) -> String {
    match code {
        "1" => "Buy",
        "2" => "Sell",
        "3" => "Buy minus",
        "4" => "Sell plus",
        "5" => "Sell short",
        "6" => "Sell short exempt",
        other => return other.to_string(),
    }
    .to_string()
}

/// Decode one raw I/O-bytes payload into an order event.
///
/// Never fails: undecodable input yields a sentinel event whose `msg_type`
/// is "ERROR" and which still carries the raw bytes.
pub fn decode_order_event(raw: &[u8], received_at: DateTime<Utc>) -> OrderEvent {
    let Ok(text) = std::str::from_utf8(raw) else {
        debug!(bytes = raw.len(), "order event is not valid UTF-8");
        return parse_error_event(raw, received_at);
    };

    let mut event = empty_event(raw, received_at);
    if text.contains("8=FIX") {
        parse_tagged(text, &mut event);
    } else {
        scan_freeform(text, &mut event);
    }
    event
}

fn empty_event(raw: &[u8], received_at: DateTime<Utc>) -> OrderEvent {
    OrderEvent {
        msg_type: String::new(),
        type_name: String::new(),
        seq_num: None,
        transact_time: String::new(),
        price: Decimal::ZERO,
        side: String::new(),
        symbol: String::new(),
        cl_ord_id: String::new(),
        order_qty: None,
        raw: raw.to_vec(),
        received_at,
    }
}

/// Sentinel for input the parser could not decode at all.
pub fn parse_error_event(raw: &[u8], received_at: DateTime<Utc>) -> OrderEvent {
    let mut event = empty_event(raw, received_at);
    event.msg_type = "ERROR".to_string();
    event.type_name = "Parse Error".to_string();
    event
}

fn parse_tagged(text: &str, event: &mut OrderEvent) {
    for field in text.split('|') {
        let Some((tag, value)) = field.split_once('=') else {
            continue;
        };
        match tag {
            "35" => {
                event.msg_type = value.to_string();
                event.type_name = type_name(value);
            }
            "34" => event.seq_num = value.parse().ok(),
            "52" => event.transact_time = value.to_string(),
            "44" => {
                if let Ok(price) = value.parse() {
                    event.price = price;
                }
            }
            "54" => event.side = side_name(value),
            "55" => event.symbol = value.to_string(),
            "11" => event.cl_ord_id = value.to_string(),
            "38" => event.order_qty = value.parse().ok(),
            _ => {}
        }
    }
}

/// Pattern scan for payloads without tag=value structure. Fields that match
/// nothing stay empty; that is not a decode failure.
fn scan_freeform(text: &str, event: &mut OrderEvent) {
    event.msg_type = "UNKNOWN".to_string();
    event.type_name = "Raw Message".to_string();
    event.cl_ord_id = "N/A".to_string();

    if text.contains("BUY") {
        event.side = "Buy".to_string();
    } else if text.contains("SELL") {
        event.side = "Sell".to_string();
    }
    if event.side.is_empty() {
        return;
    }

    if let Some(m) = SYMBOL_RE
        .find_iter(text)
        .find(|m| m.as_str() != "BUY" && m.as_str() != "SELL")
    {
        event.symbol = m.as_str().to_string();
    }
    if let Some(m) = PRICE_RE.find(text) {
        if let Ok(price) = m.as_str().parse() {
            event.price = price;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn decode(text: &str) -> OrderEvent {
        decode_order_event(text.as_bytes(), Utc::now())
    }

    #[test]
    fn tagged_new_order_decodes_all_fields() {
        let event = decode(
            "8=FIX.4.4|9=100|35=D|34=1042|52=20250828-10:15:00.123|44=37.25|54=1|55=KGH|11=ORD100001|38=250|",
        );
        assert_eq!(event.msg_type, "D");
        assert_eq!(event.type_name, "New Order");
        assert_eq!(event.seq_num, Some(1042));
        assert_eq!(event.transact_time, "20250828-10:15:00.123");
        assert_eq!(event.price, dec!(37.25));
        assert_eq!(event.side, "Buy");
        assert_eq!(event.symbol, "KGH");
        assert_eq!(event.cl_ord_id, "ORD100001");
        assert_eq!(event.order_qty, Some(250));
        assert!(!event.is_parse_error());
    }

    #[test]
    fn unmapped_codes_pass_through_verbatim() {
        let event = decode("8=FIX.4.4|35=X|54=9|");
        assert_eq!(event.msg_type, "X");
        assert_eq!(event.type_name, "X");
        assert_eq!(event.side, "9");
    }

    #[test]
    fn freeform_scan_finds_side_symbol_and_price() {
        let event = decode("EXEC BUY 200 PKO @ 41.80 ok");
        assert_eq!(event.msg_type, "UNKNOWN");
        assert_eq!(event.type_name, "Raw Message");
        assert_eq!(event.side, "Buy");
        assert_eq!(event.symbol, "EXEC");
        assert_eq!(event.price, dec!(41.80));
    }

    #[test]
    fn freeform_without_side_keyword_leaves_fields_empty() {
        let event = decode("just some text 12.5");
        assert_eq!(event.side, "");
        assert_eq!(event.symbol, "");
        assert_eq!(event.price, Decimal::ZERO);
        assert!(!event.is_parse_error());
    }

    #[test]
    fn invalid_utf8_yields_sentinel_with_raw_bytes() {
        let raw = [0xFF, 0xFE, 0x00, 0x41];
        let event = decode_order_event(&raw, Utc::now());
        assert!(event.is_parse_error());
        assert_eq!(event.type_name, "Parse Error");
        assert_eq!(event.raw, raw);
    }

    #[test]
    fn bad_numeric_values_degrade_to_defaults() {
        let event = decode("8=FIX.4.4|35=D|34=notanum|44=abc|38=xyz|");
        assert_eq!(event.seq_num, None);
        assert_eq!(event.price, Decimal::ZERO);
        assert_eq!(event.order_qty, None);
    }
}
