//! Live collection projections.
//!
//! A [`LiveProjection`] owns one subscription to a scoped, ordered remote
//! collection and republishes it as typed records plus loading and error
//! state:
//! - `activate` opens a subscription (closing any previous one first)
//! - every snapshot replaces the data with a freshly mapped sequence
//! - a failure sets the error and keeps the last data
//! - `deactivate`, re-activation and drop release the subscription exactly once
//!
//! Nothing is retried automatically; a consumer that wants to retry calls
//! `activate` again.
//!
//! # Example
//!
//! ```ignore
//! let mut projection = LiveProjection::new(source, ProjectionConfig::default())?;
//! let handle = projection.activate("uid-1");
//!
//! while projection.wait_for_update(Duration::from_secs(1)) {
//!     let state = projection.state();
//!     if state.has_error() {
//!         eprintln!("{}", state.error);
//!         break;
//!     }
//!     for tag in state.records() {
//!         println!("{} {}", tag.created_at, tag.name);
//!     }
//! }
//!
//! projection.deactivate(&handle);
//! ```

mod handle;
mod live;
mod mapper;
mod state;

pub use handle::{HandleId, ProjectionHandle};
pub use live::{LiveProjection, ProjectionReader};
pub use mapper::{format_created_at, DomainRecordMapper, RecordMapper, CREATED_AT_FORMAT};
pub use state::ProjectionState;
