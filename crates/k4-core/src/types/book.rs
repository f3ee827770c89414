//! Order book events: full snapshots and incremental deltas.
//!
//! Both sides are `price -> size` maps. In a delta, a size of zero means the
//! level was removed. When rendered, bids are ordered best-first
//! (**descending**) and asks best-first (**ascending**).

use std::collections::BTreeMap;

use bson::{Bson, Document, doc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::record::NumericFormat;

/// One side of a book: price -> size.
pub type PriceLevels = BTreeMap<Decimal, Decimal>;

/// Bid and ask price levels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookSides {
    #[serde(default)]
    pub bid: PriceLevels,
    #[serde(default)]
    pub ask: PriceLevels,
}

impl BookSides {
    pub fn is_empty(&self) -> bool {
        self.bid.is_empty() && self.ask.is_empty()
    }

    /// Render as `{ bid: {...}, ask: {...} }` with price strings as keys.
    pub fn to_document(&self, fmt: &NumericFormat) -> Document {
        doc! {
            "bid": levels_document(self.bid.iter().rev(), fmt),
            "ask": levels_document(self.ask.iter(), fmt),
        }
    }
}

/// Render an iterator of levels as a document in iteration order.
///
/// Prices are always keys, so they are rendered as strings regardless of
/// `numeric_type`; sizes follow `numeric_type`.
fn levels_document<'a>(levels: impl Iterator<Item = (&'a Decimal, &'a Decimal)>, fmt: &NumericFormat) -> Document {
    let mut out = Document::new();
    for (price, size) in levels {
        out.insert(price.to_string(), fmt.num(*size));
    }
    out
}

/// An order book update for one symbol.
///
/// `book` is the full book after the update. `delta` is present when the
/// update was incremental and holds only the changed levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub exchange: String,
    pub symbol: String,
    #[serde(default)]
    pub book: BookSides,
    #[serde(default)]
    pub delta: Option<BookSides>,
    #[serde(default)]
    pub sequence_number: Option<u64>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl OrderBook {
    pub fn is_delta(&self) -> bool {
        self.delta.is_some()
    }

    /// Full-book record without a `delta` field.
    pub fn snapshot_document(&self, fmt: &NumericFormat) -> Document {
        let mut out = self.header(fmt);
        out.insert("book", self.book.to_document(fmt));
        out
    }

    /// Record for this update as received: the full book, plus `delta` when
    /// the update was incremental.
    pub fn to_document(&self, fmt: &NumericFormat) -> Document {
        let mut out = self.snapshot_document(fmt);
        if let Some(delta) = &self.delta {
            out.insert("delta", delta.to_document(fmt));
        }
        out
    }

    fn header(&self, fmt: &NumericFormat) -> Document {
        doc! {
            "exchange": self.exchange.as_str(),
            "symbol": self.symbol.as_str(),
            "timestamp": fmt.opt_secs(self.timestamp),
            "sequence_number": self.sequence_number.map_or_else(|| fmt.none(), |n| Bson::Int64(n as i64)),
            "checksum": fmt.opt_str(self.checksum.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sample() -> OrderBook {
        let mut book = BookSides::default();
        book.bid.insert(d("99"), d("3"));
        book.bid.insert(d("100"), d("1"));
        book.ask.insert(d("102"), d("4"));
        book.ask.insert(d("101"), d("2"));
        OrderBook {
            exchange: "X".into(),
            symbol: "BTC-USD".into(),
            book,
            delta: None,
            sequence_number: Some(7),
            checksum: None,
            timestamp: Some(1_700_000_000.0),
        }
    }

    #[test]
    fn bids_descending_asks_ascending() {
        let doc = sample().book.to_document(&NumericFormat::default());
        let bid_keys: Vec<_> = doc.get_document("bid").unwrap().keys().cloned().collect();
        let ask_keys: Vec<_> = doc.get_document("ask").unwrap().keys().cloned().collect();
        assert_eq!(bid_keys, ["100", "99"]);
        assert_eq!(ask_keys, ["101", "102"]);
    }

    #[test]
    fn snapshot_has_no_delta_field() {
        let mut ob = sample();
        ob.delta = Some(BookSides::default());
        let fmt = NumericFormat::default();
        assert!(!ob.snapshot_document(&fmt).contains_key("delta"));
        assert!(ob.to_document(&fmt).contains_key("delta"));
        assert!(ob.to_document(&fmt).contains_key("book"));
    }

    #[test]
    fn parses_from_json() {
        let ob: OrderBook = serde_json::from_str(
            r#"{"exchange":"X","symbol":"BTC-USD","book":{"bid":{"100":"1"},"ask":{"101":"2"}},"timestamp":1700000000.0}"#,
        )
        .unwrap();
        assert_eq!(ob.book.bid.get(&d("100")), Some(&d("1")));
        assert!(!ob.is_delta());
    }
}
