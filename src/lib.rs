//! # Tag Feed
//!
//! Live, ordered views over remotely managed record collections.
//!
//! ## Core Concepts
//!
//! - **Sources**: remote stores that push full-collection snapshots for a
//!   scoped, ordered query until released
//! - **Projections**: map each snapshot to typed records and keep
//!   `data` / `is_loading` / `error` consistent with the latest notification
//! - **Handles**: caller-held tokens that release a subscription exactly once
//! - **Proxies**: request/response stubs for a single remote service
//!
//! ## Example
//!
//! ```ignore
//! use tagfeed::{LiveProjection, MemorySource, ProjectionConfig, RawRecord, ScopeKey};
//!
//! let source = MemorySource::new();
//! let scope = ScopeKey::new("uid-1");
//! source.set(&scope, RawRecord::new("t1")
//!     .with_field("name", "alpha")
//!     .with_field("createdAt", Utc::now()));
//!
//! let mut projection = LiveProjection::new(source.clone(), ProjectionConfig::default())?;
//! let handle = projection.activate(scope);
//! projection.process_pending();
//! assert_eq!(projection.state().records()[0].name, "alpha");
//!
//! projection.deactivate(&handle);
//! ```

pub mod config;
pub mod error;
pub mod projection;
pub mod remote;
pub mod source;
pub mod types;

// Re-exports
pub use config::{MalformedRecordPolicy, ProjectionConfig};
pub use error::{MappingError, ProjectionError, ProxyError, Result};
pub use projection::{
    format_created_at, DomainRecordMapper, HandleId, LiveProjection, ProjectionHandle,
    ProjectionReader, ProjectionState, RecordMapper, CREATED_AT_FORMAT,
};
pub use remote::{ServiceEndpoint, ServiceProxy};
pub use source::{Delivery, Disposer, MemorySource, Notification, NotificationSink, SubscriptionSource};
pub use types::*;
