use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// The identifier of a persisted resource. Rendered as an opaque string.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ResourceId(Uuid);

/// A raw identifier that is not in the expected format.
#[derive(Debug, Error, Eq, PartialEq)]
#[error("malformed identifier: {0:?}")]
pub struct InvalidIdError(pub String);

impl ResourceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-provided identifier.
    ///
    /// This happens before any store lookup so that a malformed identifier can
    /// be reported separately from one that simply matches nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// # use bookkeeping_api::bookkeeping::domain::ids::ResourceId;
    /// assert!(ResourceId::parse("not-an-id").is_err());
    /// assert!(ResourceId::parse("6c1f3c1e-4b8c-4d6f-9a8e-2f1b7c3d9e10").is_ok());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, InvalidIdError> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| InvalidIdError(raw.to_owned()))
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ResourceId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl FromStr for ResourceId {
    type Err = InvalidIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The identity of an authenticated user. This is the only dimension used for
/// access control.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct UserId(String);

impl UserId {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_rejects_malformed_ids() {
        let error = ResourceId::parse("5ebac534954b54139806c112").expect_err("object ids are not uuids");

        assert_eq!(InvalidIdError("5ebac534954b54139806c112".to_owned()), error);
    }

    #[test]
    fn parse_round_trips_display() {
        let id = ResourceId::new();

        assert_eq!(id, ResourceId::parse(&id.to_string()).expect("valid id"));
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = ResourceId::new();

        assert_eq!(
            serde_json::Value::String(id.to_string()),
            serde_json::to_value(id).unwrap()
        );
    }
}
