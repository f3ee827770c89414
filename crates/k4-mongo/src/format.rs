//! Per-kind record formatting applied by the writer before each bulk insert.
//!
//! Every kind converts `timestamp` and `receipt_timestamp` from epoch seconds
//! to BSON datetimes. Book records are additionally reduced to
//! `{exchange, symbol, timestamp, receipt_timestamp, delta, bid, ask}` where
//! `bid`/`ask` are the BSON-encoded price-level documents, taken from
//! `delta` when present and from `book` otherwise.

use bson::{Binary, Bson, Document, doc, spec::BinarySubtype};
use k4_core::error::K4Error;
use k4_core::time_util::secs_to_datetime;
use k4_core::types::EventKind;

/// A record transform: `record -> stored document`.
pub type RecordFormatter = Box<dyn Fn(Document) -> Result<Document, K4Error> + Send + Sync>;

const TIMESTAMP_FIELDS: [&str; 2] = ["timestamp", "receipt_timestamp"];

/// Select the formatter for a sink's kind.
pub fn formatter_for(kind: EventKind) -> RecordFormatter {
    match kind {
        EventKind::Book => Box::new(format_book),
        _ => Box::new(format_passthrough),
    }
}

/// Timestamps converted, every other field untouched.
pub fn format_passthrough(mut record: Document) -> Result<Document, K4Error> {
    convert_timestamps(&mut record)?;
    Ok(record)
}

/// Reduced book shape with binary-encoded sides.
pub fn format_book(mut record: Document) -> Result<Document, K4Error> {
    convert_timestamps(&mut record)?;

    let is_delta = matches!(record.get("delta"), Some(b) if *b != Bson::Null);
    let source = if is_delta { "delta" } else { "book" };
    let sides = match record.get(source) {
        Some(Bson::Document(d)) => d,
        Some(other) => return Err(wrong_type(source, other, "a document")),
        None => return Err(K4Error::missing(source)),
    };
    let bid = encode_side(sides, source, "bid")?;
    let ask = encode_side(sides, source, "ask")?;

    Ok(doc! {
        "exchange": take_required(&mut record, "exchange")?,
        "symbol": take_required(&mut record, "symbol")?,
        "timestamp": record.remove("timestamp").unwrap_or(Bson::Null),
        "receipt_timestamp": record.remove("receipt_timestamp").unwrap_or(Bson::Null),
        "delta": is_delta,
        "bid": bid,
        "ask": ask,
    })
}

/// Convert both timestamp fields in place. Absent, null and zero become null.
pub fn convert_timestamps(record: &mut Document) -> Result<(), K4Error> {
    for field in TIMESTAMP_FIELDS {
        let converted = to_datetime(field, record.get(field))?;
        record.insert(field, converted);
    }
    Ok(())
}

fn to_datetime(field: &str, value: Option<&Bson>) -> Result<Bson, K4Error> {
    let secs = match value {
        None | Some(Bson::Null) => return Ok(Bson::Null),
        // already converted
        Some(Bson::DateTime(dt)) => return Ok(Bson::DateTime(*dt)),
        Some(Bson::Double(f)) => *f,
        Some(Bson::Int32(n)) => f64::from(*n),
        Some(Bson::Int64(n)) => *n as f64,
        Some(other) => return Err(wrong_type(field, other, "epoch seconds")),
    };
    Ok(secs_to_datetime(secs).map_or(Bson::Null, Bson::DateTime))
}

/// BSON-encode `sides.<side>` as a generic binary payload.
fn encode_side(sides: &Document, source: &str, side: &str) -> Result<Bson, K4Error> {
    let levels = match sides.get(side) {
        Some(Bson::Document(d)) => d,
        Some(other) => return Err(wrong_type(&format!("{source}.{side}"), other, "a document")),
        None => return Err(K4Error::missing(format!("{source}.{side}"))),
    };
    let mut bytes = Vec::new();
    levels
        .to_writer(&mut bytes)
        .map_err(|e| K4Error::Encode(format!("{source}.{side}: {e}")))?;
    Ok(Bson::Binary(Binary {
        subtype: BinarySubtype::Generic,
        bytes,
    }))
}

fn take_required(record: &mut Document, field: &str) -> Result<Bson, K4Error> {
    match record.remove(field) {
        None | Some(Bson::Null) => Err(K4Error::missing(field)),
        Some(v) => Ok(v),
    }
}

fn wrong_type(field: &str, value: &Bson, expected: &str) -> K4Error {
    K4Error::MalformedRecord {
        field: field.to_string(),
        reason: format!("has type {:?}, expected {expected}", value.element_type()),
    }
}
