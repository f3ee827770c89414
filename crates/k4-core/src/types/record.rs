//! Rendering rules for turning typed event fields into BSON record values.
//!
//! The `numeric_type` and `none_to` sink options live here: every decimal
//! goes through [`NumericFormat::num`] and every absent optional value
//! through [`NumericFormat::none`].

use bson::Bson;
use rust_decimal::{Decimal, prelude::ToPrimitive};

use super::enums::NumericType;

/// Value rendering options shared by all event kinds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumericFormat {
    pub numeric_type: NumericType,
    /// Substitute for absent values. `None` writes an explicit BSON null.
    pub none_to: Option<Bson>,
}

impl NumericFormat {
    pub fn new(numeric_type: NumericType, none_to: Option<Bson>) -> Self {
        Self { numeric_type, none_to }
    }

    /// Render a decimal according to `numeric_type`.
    #[inline]
    pub fn num(&self, v: Decimal) -> Bson {
        match self.numeric_type {
            NumericType::Str => Bson::String(v.to_string()),
            NumericType::Float => Bson::Double(v.to_f64().unwrap_or(f64::NAN)),
        }
    }

    /// The value written in place of an absent field.
    #[inline]
    pub fn none(&self) -> Bson {
        self.none_to.clone().unwrap_or(Bson::Null)
    }

    #[inline]
    pub fn opt_num(&self, v: Option<Decimal>) -> Bson {
        v.map_or_else(|| self.none(), |d| self.num(d))
    }

    #[inline]
    pub fn opt_str(&self, v: Option<&str>) -> Bson {
        v.map_or_else(|| self.none(), |s| Bson::String(s.to_owned()))
    }

    /// Epoch-seconds fields stay doubles; the writer converts the two
    /// timestamp fields later.
    #[inline]
    pub fn opt_secs(&self, v: Option<f64>) -> Bson {
        v.map_or_else(|| self.none(), Bson::Double)
    }
}
