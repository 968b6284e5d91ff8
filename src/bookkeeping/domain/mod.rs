//! Domain types for the bookkeeping resources.
//!
//! Every resource implements [`Resource`], which is everything the generic
//! repositories, the pagination engine, and the services need to know about an
//! entity type.

use std::fmt::{self, Debug};

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{
    de::{self, DeserializeOwned, Visitor},
    Deserialize, Deserializer, Serialize,
};
use thiserror::Error;
use validator::{Validate, ValidationError};

pub mod accounts;
pub mod balances;
pub mod decimal;
pub mod goals;
pub mod ids;
pub mod line_containers;
pub mod line_item_categories;
pub mod shop_types;
pub mod shops;

pub use self::{
    accounts::{Account, AccountType},
    balances::Balance,
    goals::{Goal, GoalType},
    ids::{InvalidIdError, ResourceId, UserId},
    line_containers::{LineContainer, LineItem, PaymentType},
    line_item_categories::LineItemCategory,
    shop_types::ShopType,
    shops::Shop,
};

/// An entity type that is owned by a single user and managed through the
/// generic CRUD pipeline.
pub trait Resource:
    Clone + Debug + PartialEq + Serialize + Validate + Send + Sync + Unpin + 'static
{
    /// Human readable name used in messages and logs.
    const NAME: &'static str;

    /// Fields that may be used to sort a listing.
    const SORTABLE: &'static [&'static str];

    /// Data required to create a new instance.
    type New: Debug + DeserializeOwned + Validate + Send + Sync;

    /// The fields that may be changed by a partial update. Fields that are not
    /// part of the patch, such as the owner and the identifier, are immutable.
    type Patch: Clone + Debug + DeserializeOwned + Validate + Send + Sync;

    /// Exact-match query parameters accepted when listing.
    type Filter: Debug + DeserializeOwned + Validate + Send + Sync + Into<Vec<Constraint>>;

    fn from_new(id: ResourceId, owner: UserId, new: Self::New) -> Self;

    fn id(&self) -> ResourceId;

    /// The owner of the resource. Records without an owner are never
    /// accessible to anyone.
    fn owner(&self) -> Option<&UserId>;

    /// Shallow merge a patch onto the resource.
    fn apply_patch(&mut self, patch: Self::Patch);

    /// Read a field by its public name. Used for filtering and sorting.
    fn field(&self, name: &str) -> Option<FieldValue>;

    /// Determine if the resource satisfies an exact-match constraint.
    fn matches(&self, constraint: &Constraint) -> bool {
        self.field(constraint.field).as_ref() == Some(&constraint.value)
    }

    /// The other resources this one points at.
    fn references(&self) -> Vec<ReferencedId> {
        vec![]
    }

    /// Relations resolved inline when listing.
    fn default_populate() -> Vec<PopulatePath> {
        vec![]
    }
}

/// A value of a filterable or sortable field.
#[derive(Clone, Debug, PartialEq, PartialOrd)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Decimal(BigDecimal),
    Text(String),
    Id(ResourceId),
    Timestamp(DateTime<Utc>),
}

/// An exact-match constraint on a single field.
#[derive(Clone, Debug, PartialEq)]
pub struct Constraint {
    pub field: &'static str,
    pub value: FieldValue,
}

impl Constraint {
    pub fn new(field: &'static str, value: FieldValue) -> Self {
        Self { field, value }
    }
}

/// Collects the provided values of a filter into constraints, skipping any
/// that were not provided.
#[derive(Default)]
pub(crate) struct Constraints(Vec<Constraint>);

impl Constraints {
    pub fn with<T: Into<FieldValue>>(mut self, field: &'static str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.0.push(Constraint::new(field, value.into()));
        }

        self
    }

    pub fn build(self) -> Vec<Constraint> {
        self.0
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<u8> for FieldValue {
    fn from(value: u8) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u16> for FieldValue {
    fn from(value: u16) -> Self {
        Self::Integer(value.into())
    }
}

impl From<BigDecimal> for FieldValue {
    fn from(value: BigDecimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<ResourceId> for FieldValue {
    fn from(value: ResourceId) -> Self {
        Self::Id(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

/// A pointer to another resource. It serializes as the bare identifier until it
/// is populated, at which point it serializes as the embedded resource.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Reference<T> {
    Id(ResourceId),
    Populated(Box<T>),
}

impl<T: Resource> Reference<T> {
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Id(id) => *id,
            Self::Populated(resource) => resource.id(),
        }
    }

    pub fn populated(&self) -> Option<&T> {
        match self {
            Self::Id(_) => None,
            Self::Populated(resource) => Some(resource),
        }
    }
}

impl<T> From<ResourceId> for Reference<T> {
    fn from(id: ResourceId) -> Self {
        Self::Id(id)
    }
}

/// The kind of resource a reference points at.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ReferenceKind {
    Account,
    LineItemCategory,
    Shop,
    ShopType,
}

/// A reference held by a resource, along with the field it was found in.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ReferencedId {
    pub field: &'static str,
    pub kind: ReferenceKind,
    pub id: ResourceId,
}

impl ReferencedId {
    pub fn new(field: &'static str, kind: ReferenceKind, id: ResourceId) -> Self {
        Self { field, kind, id }
    }
}

/// A relation to resolve inline, optionally with relations of the resolved
/// resource to resolve in turn.
///
/// Paths use the public field names, with `.` separating nested fields, eg
/// `lineItems.account`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PopulatePath {
    pub path: &'static str,
    pub populate: Vec<PopulatePath>,
}

impl PopulatePath {
    pub fn new(path: &'static str) -> Self {
        Self {
            path,
            populate: vec![],
        }
    }

    pub fn with_nested(path: &'static str, populate: Vec<PopulatePath>) -> Self {
        Self { path, populate }
    }
}

/// A stored enum value that does not match any known variant.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Reject a partial update that does not change anything.
pub(crate) fn require_changes(is_empty: bool) -> Result<(), ValidationError> {
    if is_empty {
        Err(ValidationError::new("empty_patch"))
    } else {
        Ok(())
    }
}

/// Deserialize a string field with surrounding whitespace removed.
pub(crate) fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|value| value.trim().to_owned())
}

/// Deserialize an optional string field with surrounding whitespace removed.
pub(crate) fn trimmed_optional<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Option::<String>::deserialize(deserializer)
        .map(|value| value.map(|value| value.trim().to_owned()))
}

/// Deserialize a string field that a partial update may clear. A missing
/// field is `None` (with `#[serde(default)]`) and `null` is `Some(None)`.
pub(crate) fn trimmed_nullable<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Option<String>>, D::Error> {
    trimmed_optional(deserializer).map(Some)
}

/// Deserialize a point in time from an RFC 3339 string, a `YYYY-MM-DD` date
/// (midnight UTC), or a number of milliseconds since the Unix epoch.
pub(crate) fn flexible_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<DateTime<Utc>, D::Error> {
    FlexibleDate::deserialize(deserializer).map(|date| date.0)
}

/// The optional form of [`flexible_date`], as used by patches and filters.
pub(crate) fn flexible_date_optional<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Option::<FlexibleDate>::deserialize(deserializer).map(|date| date.map(|date| date.0))
}

struct FlexibleDate(DateTime<Utc>);

impl<'de> Deserialize<'de> for FlexibleDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FlexibleDateVisitor).map(Self)
    }
}

struct FlexibleDateVisitor;

impl FlexibleDateVisitor {
    fn date_from_millis<E: de::Error>(&self, millis: i64) -> Result<DateTime<Utc>, E> {
        Utc.timestamp_millis_opt(millis)
            .single()
            .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(millis), self))
    }
}

impl<'de> Visitor<'de> for FlexibleDateVisitor {
    type Value = DateTime<Utc>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("an RFC 3339 date and time, a YYYY-MM-DD date, or epoch milliseconds")
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        self.date_from_millis(value)
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        let millis = i64::try_from(value)
            .map_err(|_| E::invalid_value(de::Unexpected::Unsigned(value), &self))?;

        self.date_from_millis(millis)
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        let value = value.trim();

        if let Ok(date) = DateTime::parse_from_rfc3339(value) {
            return Ok(date.with_timezone(&Utc));
        }

        if let Ok(millis) = value.parse::<i64>() {
            return self.date_from_millis(millis);
        }

        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|midnight| Utc.from_utc_datetime(&midnight))
            .ok_or_else(|| E::invalid_value(de::Unexpected::Str(value), &self))
    }
}
