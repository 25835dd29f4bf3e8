//! Booking admission control.
//!
//! [`SchedulingEngine`] is the single authority deciding whether a lesson may
//! be booked. A request passes, in order, the shape gate, the duration gate,
//! the containment gate (some same-day window covers it) and the overlap gate
//! (no existing booking intersects it) before it is committed to the
//! [`BookingStore`]. The first failing gate decides the rejection.
//!
//! Containment through commit runs under a per-instructor lock, so two
//! requests racing for the same slot are serialized and exactly one wins.

mod admission;
mod error;
mod gates;
mod mutations;
mod queries;

pub use error::EngineError;

pub(crate) use gates::check_id;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::warn;

use crate::store::{AvailabilityStore, BookingStore, StoreResult};

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SchedulingEngine {
    availability: Arc<dyn AvailabilityStore>,
    bookings: Arc<dyn BookingStore>,
    /// Instructor id → admission lock, held from the containment query through
    /// commit. Entries nobody holds are dropped after each admission.
    admission_locks: DashMap<String, Arc<Mutex<()>>>,
    store_timeout: Duration,
}

impl SchedulingEngine {
    pub fn new(
        availability: Arc<dyn AvailabilityStore>,
        bookings: Arc<dyn BookingStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            availability,
            bookings,
            admission_locks: DashMap::new(),
            store_timeout,
        }
    }

    /// Engine over a single store implementing both traits.
    pub fn with_store<S>(store: Arc<S>, store_timeout: Duration) -> Self
    where
        S: AvailabilityStore + BookingStore + 'static,
    {
        Self::new(store.clone(), store, store_timeout)
    }

    fn admission_lock(&self, instructor_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.admission_locks.get(instructor_id) {
            return lock.value().clone();
        }
        self.admission_locks
            .entry(instructor_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    fn release_admission_lock(&self, instructor_id: &str) {
        self.admission_locks
            .remove_if(instructor_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Run one store call under the timeout. Failures and timeouts both surface
/// as `StoreUnavailable`; nothing is retried here.
pub(crate) async fn bounded<T, F>(timeout: Duration, op: &'static str, call: F) -> Result<T, EngineError>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!("store call {op} failed: {e}");
            metrics::counter!(crate::observability::STORE_FAILURES_TOTAL, "kind" => "error")
                .increment(1);
            Err(e.into())
        }
        Err(_) => {
            warn!("store call {op} timed out after {timeout:?}");
            metrics::counter!(crate::observability::STORE_FAILURES_TOTAL, "kind" => "timeout")
                .increment(1);
            Err(EngineError::StoreUnavailable(format!(
                "{op} timed out after {timeout:?}"
            )))
        }
    }
}
