//! Enumerations used throughout the sink system.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// Logical kind of a normalized market-data event.
///
/// A sink instance is bound to exactly one kind and never mixes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Trades,
    Book,
    Funding,
    Ticker,
    OpenInterest,
    Liquidations,
    Candles,
}

/// Default destination collection per kind.
const DEFAULT_COLLECTIONS: [(EventKind, &str); 7] = [
    (EventKind::Trades, "trades"),
    (EventKind::Book, "book"),
    (EventKind::Funding, "funding"),
    (EventKind::Ticker, "ticker"),
    (EventKind::OpenInterest, "open_interest"),
    (EventKind::Liquidations, "liquidations"),
    (EventKind::Candles, "candles"),
];

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [EventKind; 7] = [
        Self::Trades,
        Self::Book,
        Self::Funding,
        Self::Ticker,
        Self::OpenInterest,
        Self::Liquidations,
        Self::Candles,
    ];

    /// Collection written to when the sink config has no `key` override.
    pub fn default_collection(self) -> &'static str {
        DEFAULT_COLLECTIONS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, name)| *name)
            .unwrap_or("events")
    }

    /// Default `snapshot_interval` for kinds that throttle or decimate.
    ///
    /// Funding and open interest count seconds between admitted updates; the
    /// book counts deltas between full snapshots. Other kinds return `None`.
    pub fn default_snapshot_interval(self) -> Option<u64> {
        match self {
            Self::Funding | Self::OpenInterest => Some(60),
            Self::Book => Some(1000),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.default_collection())
    }
}

// ---------------------------------------------------------------------------
// Trade side
// ---------------------------------------------------------------------------

/// Aggressor side of a trade or liquidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

// ---------------------------------------------------------------------------
// Numeric representation
// ---------------------------------------------------------------------------

/// How decimal values are rendered when an event becomes a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NumericType {
    /// Exact decimal string, e.g. `"30000.50"`.
    #[default]
    Str,
    /// IEEE-754 double. Lossy for long decimals.
    Float,
}
