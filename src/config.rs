//! Projection configuration.

use crate::error::{ProjectionError, Result};
use crate::types::{OrderDirection, TimestampBehavior};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

/// What to do with a record that cannot be mapped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MalformedRecordPolicy {
    /// Drop the record and apply the rest of the snapshot.
    #[default]
    Skip,
    /// Reject the whole snapshot and report the mapping error.
    Fail,
}

/// Projection configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    /// Collection name under the scope, e.g. `users/{scope}/tags`.
    /// Default: "tags"
    pub collection: String,

    /// Field holding the display name.
    /// Default: "name"
    pub name_field: String,

    /// Creation timestamp field; the query is ordered by it.
    /// Default: "createdAt"
    pub order_by: String,

    /// Default: descending (most recent first)
    pub direction: OrderDirection,

    /// How pending server timestamps are read.
    pub timestamp_behavior: TimestampBehavior,

    pub malformed_records: MalformedRecordPolicy,

    /// Offset applied when formatting `created_at`, in minutes east of UTC.
    /// Default: 0
    pub utc_offset_minutes: i32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            collection: "tags".to_string(),
            name_field: "name".to_string(),
            order_by: "createdAt".to_string(),
            direction: OrderDirection::Descending,
            timestamp_behavior: TimestampBehavior::Estimate,
            malformed_records: MalformedRecordPolicy::Skip,
            utc_offset_minutes: 0,
        }
    }
}

impl ProjectionConfig {
    /// Parse a JSON configuration; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ProjectionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration can drive a projection.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("collection", &self.collection),
            ("name_field", &self.name_field),
            ("order_by", &self.order_by),
        ] {
            if value.trim().is_empty() {
                return Err(ProjectionError::InvalidConfig(format!("{} must not be empty", key)));
            }
        }
        self.display_offset()?;
        Ok(())
    }

    /// Offset used for formatting creation times.
    pub fn display_offset(&self) -> Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ProjectionError::InvalidConfig(format!(
                    "utc_offset_minutes out of range: {}",
                    self.utc_offset_minutes
                ))
            })
    }
}
