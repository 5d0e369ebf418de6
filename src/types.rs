//! Core types for live projections.

use crate::error::MappingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier selecting which collection partition to subscribe to.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey(String);

impl ScopeKey {
    pub fn new(key: impl Into<String>) -> Self {
        ScopeKey(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeKey({})", self.0)
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScopeKey {
    fn from(s: &str) -> Self {
        ScopeKey(s.to_string())
    }
}

impl From<String> for ScopeKey {
    fn from(s: String) -> Self {
        ScopeKey(s)
    }
}

/// Source of "now" for estimating server timestamps that are still pending.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock frozen at a single instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// How a server timestamp that has not been finalized yet is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampBehavior {
    /// Estimate from the local clock.
    #[default]
    Estimate,
    /// Use the last finalized value, if there was one.
    Previous,
    /// Leave the value unresolved.
    None,
}

/// A timestamp assigned by the server, possibly not yet known to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ServerTimestamp {
    /// Written locally, waiting for the server to assign the real value.
    Pending { previous: Option<DateTime<Utc>> },
    /// Assigned by the server.
    Finalized { at: DateTime<Utc> },
}

impl ServerTimestamp {
    pub fn pending() -> Self {
        ServerTimestamp::Pending { previous: None }
    }

    pub fn finalized(at: DateTime<Utc>) -> Self {
        ServerTimestamp::Finalized { at }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ServerTimestamp::Pending { .. })
    }

    /// Read the timestamp as an absolute instant.
    pub fn resolve(&self, behavior: TimestampBehavior, clock: &dyn Clock) -> Option<DateTime<Utc>> {
        match (*self, behavior) {
            (ServerTimestamp::Finalized { at }, _) => Some(at),
            (ServerTimestamp::Pending { .. }, TimestampBehavior::Estimate) => Some(clock.now()),
            (ServerTimestamp::Pending { previous }, TimestampBehavior::Previous) => previous,
            (ServerTimestamp::Pending { .. }, TimestampBehavior::None) => None,
        }
    }
}

/// A single field value of a raw record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(ServerTimestamp),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Bool(_) => "bool",
            FieldValue::Integer(_) => "integer",
            FieldValue::Double(_) => "double",
            FieldValue::String(_) => "string",
            FieldValue::Timestamp(_) => "timestamp",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<ServerTimestamp> for FieldValue {
    fn from(ts: ServerTimestamp) -> Self {
        FieldValue::Timestamp(ts)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(at: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(ServerTimestamp::finalized(at))
    }
}

/// Wire-level record emitted by a subscription source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Storage-assigned identifier.
    pub id: String,

    /// Field name to value.
    pub fields: BTreeMap<String, FieldValue>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Read a string field.
    pub fn get_str(&self, field: &str) -> Result<&str, MappingError> {
        match self.get(field) {
            Some(FieldValue::String(s)) => Ok(s),
            Some(other) => Err(self.wrong_type(field, "string", other)),
            None => Err(self.missing(field)),
        }
    }

    /// Read a server timestamp field, resolving pending values per `behavior`.
    pub fn get_timestamp(
        &self,
        field: &str,
        behavior: TimestampBehavior,
        clock: &dyn Clock,
    ) -> Result<DateTime<Utc>, MappingError> {
        match self.get(field) {
            Some(FieldValue::Timestamp(ts)) => {
                ts.resolve(behavior, clock)
                    .ok_or_else(|| MappingError::UnresolvedTimestamp {
                        record_id: self.id.clone(),
                        field: field.to_string(),
                    })
            }
            Some(other) => Err(self.wrong_type(field, "timestamp", other)),
            None => Err(self.missing(field)),
        }
    }

    fn missing(&self, field: &str) -> MappingError {
        MappingError::MissingField {
            record_id: self.id.clone(),
            field: field.to_string(),
        }
    }

    fn wrong_type(&self, field: &str, expected: &'static str, found: &FieldValue) -> MappingError {
        tracing::trace!(record = %self.id, field, found = found.kind(), "field type mismatch");
        MappingError::WrongType {
            record_id: self.id.clone(),
            field: field.to_string(),
            expected,
        }
    }
}

/// Typed, display-ready record produced from a raw record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainRecord {
    pub id: String,
    pub name: String,
    /// Formatted as `yyyy-MM-dd HH:mm`.
    pub created_at: String,
}

/// Sort direction of a collection query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    Ascending,
    #[default]
    Descending,
}

/// Query a projection issues against a subscription source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionQuery {
    pub scope: ScopeKey,
    pub collection: String,
    pub order_by: String,
    pub direction: OrderDirection,
}

impl CollectionQuery {
    /// Path of the scoped collection, `users/{scope}/{collection}`.
    pub fn path(&self) -> String {
        collection_path(&self.scope, &self.collection)
    }
}

pub(crate) fn collection_path(scope: &ScopeKey, collection: &str) -> String {
    format!("users/{}/{}", scope, collection)
}

/// Terminal failure reported by a subscription.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFailure {
    /// Human-readable message, surfaced verbatim to the consumer.
    pub message: String,
}

impl SubscriptionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for SubscriptionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
