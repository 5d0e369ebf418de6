//! Raw record to domain record mapping.

use crate::config::{MalformedRecordPolicy, ProjectionConfig};
use crate::error::{MappingError, Result};
use crate::types::{Clock, DomainRecord, RawRecord, SystemClock, TimestampBehavior};
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use tracing::warn;

/// Display pattern for creation times (`yyyy-MM-dd HH:mm`).
pub const CREATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Turns raw wire records into typed domain values.
pub trait RecordMapper: Send {
    type Output: Clone + Send + Sync + 'static;

    fn map(&self, raw: &RawRecord) -> std::result::Result<Self::Output, MappingError>;
}

/// Format an instant for display. Seconds and below are dropped.
pub fn format_created_at(at: DateTime<Utc>, offset: &FixedOffset) -> String {
    at.with_timezone(offset).format(CREATED_AT_FORMAT).to_string()
}

/// Maps raw records to [`DomainRecord`]s.
#[derive(Clone)]
pub struct DomainRecordMapper {
    name_field: String,
    created_at_field: String,
    behavior: TimestampBehavior,
    offset: FixedOffset,
    clock: Arc<dyn Clock>,
}

impl DomainRecordMapper {
    pub fn from_config(config: &ProjectionConfig) -> Result<Self> {
        Ok(Self {
            name_field: config.name_field.clone(),
            created_at_field: config.order_by.clone(),
            behavior: config.timestamp_behavior,
            offset: config.display_offset()?,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the clock used to estimate pending timestamps.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}

impl RecordMapper for DomainRecordMapper {
    type Output = DomainRecord;

    fn map(&self, raw: &RawRecord) -> std::result::Result<DomainRecord, MappingError> {
        let name = raw.get_str(&self.name_field)?;
        let created_at = raw.get_timestamp(&self.created_at_field, self.behavior, &*self.clock)?;

        Ok(DomainRecord {
            id: raw.id.clone(),
            name: name.to_string(),
            created_at: format_created_at(created_at, &self.offset),
        })
    }
}

/// Map a whole snapshot, keeping the source order.
pub(crate) fn map_snapshot<M: RecordMapper>(
    mapper: &M,
    records: &[RawRecord],
    policy: MalformedRecordPolicy,
) -> std::result::Result<Vec<M::Output>, MappingError> {
    match policy {
        MalformedRecordPolicy::Fail => records.iter().map(|raw| mapper.map(raw)).collect(),
        MalformedRecordPolicy::Skip => Ok(records
            .iter()
            .filter_map(|raw| match mapper.map(raw) {
                Ok(mapped) => Some(mapped),
                Err(e) => {
                    warn!(record = %raw.id, error = %e, "skipping malformed record");
                    None
                }
            })
            .collect()),
    }
}
