//! Exact decimal amounts.
//!
//! Amounts are stored as exact decimals so that no precision is lost between
//! writes. They are only converted to plain JSON numbers when serialized for a
//! client.

use std::{fmt, str::FromStr};

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{
    de::{self, Visitor},
    Deserializer, Serialize, Serializer,
};
use serde_json::Number;
use validator::ValidationError;

/// The number of decimal places accepted for amounts.
pub const AMOUNT_SCALE: i64 = 2;

/// Convert an exact decimal into a plain number for output.
///
/// Integral values become integers, so a stored `3000.00` is rendered as
/// `3000` rather than `3000.0` or `3000.00000001`. Everything else becomes the
/// shortest floating point number that reads back as the same decimal.
///
/// # Examples
///
/// ```
/// # use std::str::FromStr;
/// # use bigdecimal::BigDecimal;
/// # use bookkeeping_api::bookkeeping::domain::decimal::normalize;
/// let amount = BigDecimal::from_str("3000.00").unwrap();
///
/// assert_eq!("3000", normalize(Some(&amount)).unwrap().to_string());
/// assert_eq!(None, normalize(None));
/// ```
pub fn normalize(value: Option<&BigDecimal>) -> Option<Number> {
    let value = value?;

    if value.is_integer() {
        if let Some(integer) = value.to_i64() {
            return Some(Number::from(integer));
        }
    }

    // The decimal representation is always a valid float literal; parsing it
    // gives the nearest float without any binary expansion noise.
    let float = value
        .to_string()
        .parse::<f64>()
        .ok()
        .or_else(|| value.to_f64())
        .unwrap_or_default();

    Number::from_f64(float).or_else(|| Some(Number::from(0)))
}

/// Serialize an amount through [`normalize`].
pub fn serialize<S: Serializer>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error> {
    normalize(Some(value)).serialize(serializer)
}

/// Deserialize an amount from either a JSON number or a numeric string.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigDecimal, D::Error> {
    deserializer.deserialize_any(AmountVisitor)
}

/// Deserialize an optional amount, as used by partial updates.
pub fn deserialize_optional<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<BigDecimal>, D::Error> {
    deserializer.deserialize_option(OptionalAmountVisitor)
}

/// Validate an amount provided by a client: it may not be negative and may not
/// carry more than two decimal places.
pub fn validate_amount(value: &BigDecimal) -> Result<(), ValidationError> {
    if value < &BigDecimal::from(0) {
        return Err(ValidationError::new("negative_amount"));
    }

    if value.with_scale(AMOUNT_SCALE) != *value {
        return Err(ValidationError::new("precision"));
    }

    Ok(())
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = BigDecimal;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a decimal amount")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        Ok(BigDecimal::from(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(BigDecimal::from(value))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        if !value.is_finite() {
            return Err(E::invalid_value(de::Unexpected::Float(value), &self));
        }

        // `Display` for floats yields the shortest string that round trips, so
        // `19.99` is read as exactly `19.99`.
        BigDecimal::from_str(&value.to_string()).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        BigDecimal::from_str(value.trim())
            .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))
    }
}

struct OptionalAmountVisitor;

impl<'de> Visitor<'de> for OptionalAmountVisitor {
    type Value = Option<BigDecimal>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an optional decimal amount")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserialize(deserializer).map(Some)
    }
}
