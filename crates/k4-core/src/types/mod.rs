//! Core data types: event kinds, normalized market data events, and the
//! rules for rendering them as database records.

pub mod book;
pub mod enums;
pub mod market_data;
pub mod record;

pub use book::*;
pub use enums::*;
pub use market_data::*;
pub use record::*;
