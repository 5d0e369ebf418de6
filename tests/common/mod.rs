//! Shared helpers for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tagfeed::{
    CollectionQuery, Disposer, DomainRecordMapper, FixedClock, LiveProjection, NotificationSink,
    ProjectionConfig, RawRecord, SubscriptionSource,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

/// Clock used for pending timestamp estimates in tests.
pub fn test_clock() -> FixedClock {
    FixedClock(at(2024, 6, 1, 18, 45, 59))
}

pub fn tag(id: &str, name: &str, created_at: DateTime<Utc>) -> RawRecord {
    RawRecord::new(id)
        .with_field("name", name)
        .with_field("createdAt", created_at)
}

/// A subscription registered with a [`ScriptedSource`].
#[derive(Clone)]
pub struct Registration {
    pub query: CollectionQuery,
    pub sink: NotificationSink,
    pub disposals: Arc<AtomicUsize>,
}

impl Registration {
    pub fn disposal_count(&self) -> usize {
        self.disposals.load(Ordering::SeqCst)
    }
}

/// Source that only delivers what the test tells it to.
///
/// Keeps every sink it was handed, even after disposal, so tests can deliver
/// late notifications.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    registrations: Arc<Mutex<Vec<Registration>>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registration(&self, index: usize) -> Registration {
        self.registrations.lock()[index].clone()
    }

    pub fn latest(&self) -> Registration {
        self.registrations
            .lock()
            .last()
            .cloned()
            .expect("no subscription registered")
    }

    pub fn subscribe_count(&self) -> usize {
        self.registrations.lock().len()
    }

    /// "subscribe <scope>" / "dispose <scope>" in call order.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

impl SubscriptionSource for ScriptedSource {
    fn subscribe(&self, query: &CollectionQuery, sink: NotificationSink) -> Disposer {
        let disposals = Arc::new(AtomicUsize::new(0));
        self.log.lock().push(format!("subscribe {}", query.scope));
        self.registrations.lock().push(Registration {
            query: query.clone(),
            sink,
            disposals: disposals.clone(),
        });

        let log = self.log.clone();
        let scope = query.scope.clone();
        Disposer::new(move || {
            disposals.fetch_add(1, Ordering::SeqCst);
            log.lock().push(format!("dispose {}", scope));
        })
    }
}

/// Projection whose pending timestamps are estimated with [`test_clock`].
pub fn projection_with<S: SubscriptionSource>(source: S, config: ProjectionConfig) -> LiveProjection<S> {
    let mapper = DomainRecordMapper::from_config(&config)
        .unwrap()
        .with_clock(test_clock());
    LiveProjection::with_mapper(source, config, mapper).unwrap()
}
