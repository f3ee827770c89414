//! Normalized market data events: the payloads handed to the sinks.
//!
//! Every event carries `exchange`, `symbol` and an optional exchange
//! `timestamp`. Numeric quantities are [`Decimal`] so that the configured
//! [`NumericFormat`] decides how they land in the database.
//!
//! # Timestamp convention
//!
//! All timestamps are **seconds since Unix epoch** as `f64`. `None` means the
//! exchange did not provide one; the feed substitutes the receipt time.

use bson::{Bson, Document, doc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::book::OrderBook;
use super::enums::{EventKind, Side};
use super::record::NumericFormat;

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

/// A single trade execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub exchange: String,
    pub symbol: String,
    pub side: Side,
    pub amount: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub trade_type: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl Trade {
    pub fn to_document(&self, fmt: &NumericFormat) -> Document {
        doc! {
            "exchange": self.exchange.as_str(),
            "symbol": self.symbol.as_str(),
            "side": self.side.as_str(),
            "amount": fmt.num(self.amount),
            "price": fmt.num(self.price),
            "id": fmt.opt_str(self.id.as_deref()),
            "type": fmt.opt_str(self.trade_type.as_deref()),
            "timestamp": fmt.opt_secs(self.timestamp),
        }
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// Best bid / best ask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub exchange: String,
    pub symbol: String,
    pub bid: Decimal,
    pub ask: Decimal,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl Ticker {
    pub fn to_document(&self, fmt: &NumericFormat) -> Document {
        doc! {
            "exchange": self.exchange.as_str(),
            "symbol": self.symbol.as_str(),
            "bid": fmt.num(self.bid),
            "ask": fmt.num(self.ask),
            "timestamp": fmt.opt_secs(self.timestamp),
        }
    }
}

// ---------------------------------------------------------------------------
// Funding
// ---------------------------------------------------------------------------

/// Perpetual funding rate update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Funding {
    pub exchange: String,
    pub symbol: String,
    #[serde(default)]
    pub mark_price: Option<Decimal>,
    pub rate: Decimal,
    #[serde(default)]
    pub next_funding_time: Option<f64>,
    #[serde(default)]
    pub predicted_rate: Option<Decimal>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl Funding {
    pub fn to_document(&self, fmt: &NumericFormat) -> Document {
        doc! {
            "exchange": self.exchange.as_str(),
            "symbol": self.symbol.as_str(),
            "mark_price": fmt.opt_num(self.mark_price),
            "rate": fmt.num(self.rate),
            "next_funding_time": fmt.opt_secs(self.next_funding_time),
            "predicted_rate": fmt.opt_num(self.predicted_rate),
            "timestamp": fmt.opt_secs(self.timestamp),
        }
    }
}

// ---------------------------------------------------------------------------
// Open interest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenInterest {
    pub exchange: String,
    pub symbol: String,
    pub open_interest: Decimal,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl OpenInterest {
    pub fn to_document(&self, fmt: &NumericFormat) -> Document {
        doc! {
            "exchange": self.exchange.as_str(),
            "symbol": self.symbol.as_str(),
            "open_interest": fmt.num(self.open_interest),
            "timestamp": fmt.opt_secs(self.timestamp),
        }
    }
}

// ---------------------------------------------------------------------------
// Liquidation
// ---------------------------------------------------------------------------

/// A forced liquidation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Liquidation {
    pub exchange: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl Liquidation {
    pub fn to_document(&self, fmt: &NumericFormat) -> Document {
        doc! {
            "exchange": self.exchange.as_str(),
            "symbol": self.symbol.as_str(),
            "side": self.side.as_str(),
            "quantity": fmt.num(self.quantity),
            "price": fmt.num(self.price),
            "id": fmt.opt_str(self.id.as_deref()),
            "status": fmt.opt_str(self.status.as_deref()),
            "timestamp": fmt.opt_secs(self.timestamp),
        }
    }
}

// ---------------------------------------------------------------------------
// Candle
// ---------------------------------------------------------------------------

/// OHLCV bar over `[start, stop)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub exchange: String,
    pub symbol: String,
    pub start: f64,
    pub stop: f64,
    pub interval: String,
    #[serde(default)]
    pub trades: Option<u64>,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: Decimal,
    #[serde(default)]
    pub closed: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl Candle {
    pub fn to_document(&self, fmt: &NumericFormat) -> Document {
        doc! {
            "exchange": self.exchange.as_str(),
            "symbol": self.symbol.as_str(),
            "start": self.start,
            "stop": self.stop,
            "interval": self.interval.as_str(),
            "trades": self.trades.map_or_else(|| fmt.none(), |n| Bson::Int64(n as i64)),
            "open": fmt.num(self.open),
            "close": fmt.num(self.close),
            "high": fmt.num(self.high),
            "low": fmt.num(self.low),
            "volume": fmt.num(self.volume),
            "closed": self.closed.map_or_else(|| fmt.none(), Bson::Boolean),
            "timestamp": fmt.opt_secs(self.timestamp),
        }
    }
}

// ---------------------------------------------------------------------------
// MarketEvent: tagged union handed to the feeds
// ---------------------------------------------------------------------------

/// A tagged union of all event types.
///
/// On the wire (NDJSON input) the variant is selected by a `kind` field whose
/// values match [`EventKind`], e.g. `{"kind":"trades", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketEvent {
    #[serde(rename = "trades")]
    Trade(Trade),
    Ticker(Ticker),
    Funding(Funding),
    OpenInterest(OpenInterest),
    #[serde(rename = "liquidations")]
    Liquidation(Liquidation),
    #[serde(rename = "candles")]
    Candle(Candle),
    Book(OrderBook),
}

impl MarketEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Trade(_) => EventKind::Trades,
            Self::Ticker(_) => EventKind::Ticker,
            Self::Funding(_) => EventKind::Funding,
            Self::OpenInterest(_) => EventKind::OpenInterest,
            Self::Liquidation(_) => EventKind::Liquidations,
            Self::Candle(_) => EventKind::Candles,
            Self::Book(_) => EventKind::Book,
        }
    }

    pub fn exchange(&self) -> &str {
        match self {
            Self::Trade(e) => &e.exchange,
            Self::Ticker(e) => &e.exchange,
            Self::Funding(e) => &e.exchange,
            Self::OpenInterest(e) => &e.exchange,
            Self::Liquidation(e) => &e.exchange,
            Self::Candle(e) => &e.exchange,
            Self::Book(e) => &e.exchange,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Trade(e) => &e.symbol,
            Self::Ticker(e) => &e.symbol,
            Self::Funding(e) => &e.symbol,
            Self::OpenInterest(e) => &e.symbol,
            Self::Liquidation(e) => &e.symbol,
            Self::Candle(e) => &e.symbol,
            Self::Book(e) => &e.symbol,
        }
    }

    /// Exchange timestamp, if the exchange supplied a non-zero one.
    pub fn timestamp(&self) -> Option<f64> {
        let ts = match self {
            Self::Trade(e) => e.timestamp,
            Self::Ticker(e) => e.timestamp,
            Self::Funding(e) => e.timestamp,
            Self::OpenInterest(e) => e.timestamp,
            Self::Liquidation(e) => e.timestamp,
            Self::Candle(e) => e.timestamp,
            Self::Book(e) => e.timestamp,
        };
        ts.filter(|t| *t != 0.0)
    }

    /// Render the event as a record. Book events include `delta` when the
    /// update was incremental.
    pub fn to_document(&self, fmt: &NumericFormat) -> Document {
        match self {
            Self::Trade(e) => e.to_document(fmt),
            Self::Ticker(e) => e.to_document(fmt),
            Self::Funding(e) => e.to_document(fmt),
            Self::OpenInterest(e) => e.to_document(fmt),
            Self::Liquidation(e) => e.to_document(fmt),
            Self::Candle(e) => e.to_document(fmt),
            Self::Book(e) => e.to_document(fmt),
        }
    }
}

// ---------------------------------------------------------------------------
// Display impls
// ---------------------------------------------------------------------------

impl std::fmt::Display for MarketEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trade(t) => write!(
                f,
                "Trade({}:{} {} {}x{})",
                t.exchange,
                t.symbol,
                t.side.as_str(),
                t.price,
                t.amount
            ),
            Self::Book(b) => write!(
                f,
                "Book({}:{} delta={} bids={} asks={})",
                b.exchange,
                b.symbol,
                b.is_delta(),
                b.book.bid.len(),
                b.book.ask.len()
            ),
            other => write!(f, "{}({}:{})", other.kind(), other.exchange(), other.symbol()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NumericType;

    #[test]
    fn trade_from_tagged_json() {
        let ev: MarketEvent = serde_json::from_str(
            r#"{"kind":"trades","exchange":"BINANCE","symbol":"BTC-USDT","side":"buy","amount":"0.5","price":"30000.1","id":"42","timestamp":1700000000.25}"#,
        )
        .unwrap();
        assert_eq!(ev.kind(), EventKind::Trades);
        assert_eq!(ev.symbol(), "BTC-USDT");
        assert_eq!(ev.timestamp(), Some(1_700_000_000.25));

        let doc = ev.to_document(&NumericFormat::default());
        assert_eq!(doc.get_str("price").unwrap(), "30000.1");
        assert_eq!(doc.get_str("side").unwrap(), "buy");
        assert_eq!(doc.get("type"), Some(&Bson::Null));
        assert_eq!(doc.get_f64("timestamp").unwrap(), 1_700_000_000.25);
    }

    #[test]
    fn zero_timestamp_counts_as_absent() {
        let ev: MarketEvent = serde_json::from_str(
            r#"{"kind":"open_interest","exchange":"X","symbol":"S","open_interest":"10","timestamp":0}"#,
        )
        .unwrap();
        assert_eq!(ev.timestamp(), None);
    }

    #[test]
    fn funding_optional_fields_use_none_to() {
        let ev: MarketEvent =
            serde_json::from_str(r#"{"kind":"funding","exchange":"X","symbol":"S","rate":"0.0001"}"#).unwrap();
        let fmt = NumericFormat::new(NumericType::Float, Some(Bson::Int32(0)));
        let doc = ev.to_document(&fmt);
        assert_eq!(doc.get_f64("rate").unwrap(), 0.0001);
        assert_eq!(doc.get("mark_price"), Some(&Bson::Int32(0)));
        assert_eq!(doc.get("timestamp"), Some(&Bson::Int32(0)));
    }

    #[test]
    fn candle_document_fields() {
        let ev: MarketEvent = serde_json::from_str(
            r#"{"kind":"candles","exchange":"X","symbol":"S","start":60.0,"stop":120.0,"interval":"1m",
                "trades":12,"open":"1","close":"2","high":"3","low":"0.5","volume":"100","closed":true}"#,
        )
        .unwrap();
        let doc = ev.to_document(&NumericFormat::default());
        assert_eq!(doc.get_i64("trades").unwrap(), 12);
        assert!(doc.get_bool("closed").unwrap());
        assert_eq!(doc.get_str("low").unwrap(), "0.5");
    }
}
