//! Persistence seams for windows and bookings.
//!
//! Stores are dumb: they assign ids and keep records, nothing more. Every
//! admission rule lives in [`crate::engine`].

mod memory;
mod wal_store;

pub use memory::{InMemoryStore, StoreStats};
pub use wal_store::WalStore;

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing storage failed or is gone (I/O error, writer shut down).
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Insert a window under a freshly assigned id. Duplicates are allowed.
    async fn add_window(&self, window: NewAvailability) -> StoreResult<AvailabilityWindow>;

    /// Delete the window if present; absent ids are a no-op.
    async fn remove_window(&self, id: Ulid) -> StoreResult<()>;

    async fn windows_by_instructor(&self, instructor_id: &str) -> StoreResult<Vec<AvailabilityWindow>>;

    async fn all_windows(&self) -> StoreResult<Vec<AvailabilityWindow>>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Insert a booking under a freshly assigned id. Performs no overlap or
    /// containment checks.
    async fn add_booking(&self, booking: BookingRequest) -> StoreResult<Booking>;

    /// Delete the booking if present; absent ids are a no-op.
    async fn remove_booking(&self, id: Ulid) -> StoreResult<()>;

    async fn bookings_by_instructor(&self, instructor_id: &str) -> StoreResult<Vec<Booking>>;

    async fn bookings_by_student(&self, student_id: &str) -> StoreResult<Vec<Booking>>;

    async fn all_bookings(&self) -> StoreResult<Vec<Booking>>;

    /// Whether any booking of the instructor intersects the half-open `span`.
    /// Touching endpoints do not count.
    async fn exists_overlapping(&self, instructor_id: &str, span: Span) -> StoreResult<bool>;
}
