use std::time::Instant;

use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::model::*;
use crate::observability;
use crate::store::StoreError;

use super::{EngineError, SchedulingEngine, bounded, gates};

fn reject(request: &BookingRequest, rejection: Rejection) -> Admission {
    debug!(
        "rejected booking {} with {} at [{}, {}): {rejection}",
        request.student_id, request.instructor_id, request.start, request.end
    );
    Admission::Rejected(rejection)
}

impl SchedulingEngine {
    /// Decide whether a lesson may be booked and commit it if so.
    ///
    /// Rejections are returned as `Ok(Admission::Rejected(..))`; only store
    /// faults and cancellation are errors.
    pub async fn request_booking(&self, request: BookingRequest) -> Result<Admission, EngineError> {
        self.request_booking_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// As [`request_booking`](Self::request_booking), abandoning the request
    /// if `cancel` fires before the commit starts.
    pub async fn request_booking_with_cancel(
        &self,
        request: BookingRequest,
        cancel: &CancellationToken,
    ) -> Result<Admission, EngineError> {
        let started = Instant::now();
        let instructor_id = request.instructor_id.clone();
        let result = self.admit(request, cancel).await;
        self.release_admission_lock(&instructor_id);
        metrics::histogram!(observability::ADMISSION_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        metrics::counter!(observability::ADMISSIONS_TOTAL, "outcome" => observability::outcome_label(&result))
            .increment(1);
        result
    }

    async fn admit(
        &self,
        request: BookingRequest,
        cancel: &CancellationToken,
    ) -> Result<Admission, EngineError> {
        // Gates 1-2 are pure: no store is touched for malformed requests.
        let span = match gates::validate_shape(&request)
            .and_then(|span| gates::check_duration(&span).map(|()| span))
        {
            Ok(span) => span,
            Err(rejection) => return Ok(reject(&request, rejection)),
        };

        let lock = self.admission_lock(&request.instructor_id);
        let admission = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            guard = lock.lock_owned() => guard,
        };

        let windows = bounded(
            self.store_timeout,
            "windows_by_instructor",
            self.availability.windows_by_instructor(&request.instructor_id),
        )
        .await?;
        if gates::covering_window(&windows, &span).is_none() {
            return Ok(reject(&request, Rejection::OutsideAvailability));
        }

        let taken = bounded(
            self.store_timeout,
            "exists_overlapping",
            self.bookings.exists_overlapping(&request.instructor_id, span),
        )
        .await?;
        if taken {
            return Ok(reject(&request, Rejection::SlotConflict));
        }

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let booking = self.commit(request, admission).await?;
        debug!(
            "admitted booking {} for {} with {} at [{}, {})",
            booking.id, booking.student_id, booking.instructor_id, booking.span.start, booking.span.end
        );
        Ok(Admission::Admitted(booking))
    }

    /// Write the booking on its own task, which keeps the instructor lock
    /// until the store answers. A commit that outlives the timeout (or the
    /// caller) still finishes before anyone else can admit into the slot.
    async fn commit(
        &self,
        request: BookingRequest,
        admission: OwnedMutexGuard<()>,
    ) -> Result<Booking, EngineError> {
        let bookings = self.bookings.clone();
        let mut commit = tokio::spawn(async move {
            let _admission = admission;
            bookings.add_booking(request).await
        });
        let result = bounded(self.store_timeout, "add_booking", async {
            (&mut commit)
                .await
                .unwrap_or_else(|e| Err(StoreError::Unavailable(format!("commit task failed: {e}"))))
        })
        .await;
        if result.is_err() && !commit.is_finished() {
            warn!("add_booking still running after timeout; instructor stays locked until it settles");
        }
        result
    }
}
