use tracing::debug;
use ulid::Ulid;

use crate::model::*;

use super::gates::{check_id, check_span};
use super::{EngineError, SchedulingEngine, bounded};

fn check_record_id(id: Ulid) -> Result<(), EngineError> {
    if id.is_nil() {
        return Err(EngineError::InvalidRequest("id must not be nil"));
    }
    Ok(())
}

impl SchedulingEngine {
    /// Publish a window. Instructors manage their own overlaps, so only the
    /// shape is checked.
    pub async fn add_availability(
        &self,
        window: NewAvailability,
    ) -> Result<AvailabilityWindow, EngineError> {
        check_id(&window.instructor_id, "instructor id is required")
            .map_err(EngineError::InvalidRequest)?;
        check_span(window.start, window.end).map_err(EngineError::InvalidRequest)?;

        let added = bounded(self.store_timeout, "add_window", self.availability.add_window(window)).await?;
        debug!(
            "published window {} for {} at [{}, {})",
            added.id, added.instructor_id, added.span.start, added.span.end
        );
        Ok(added)
    }

    /// Delete a window. Existing bookings inside it are left untouched.
    pub async fn remove_availability(&self, id: Ulid) -> Result<(), EngineError> {
        check_record_id(id)?;
        bounded(self.store_timeout, "remove_window", self.availability.remove_window(id)).await
    }

    /// Delete a booking. Removing an unknown id succeeds.
    pub async fn remove_booking(&self, id: Ulid) -> Result<(), EngineError> {
        check_record_id(id)?;
        bounded(self.store_timeout, "remove_booking", self.bookings.remove_booking(id)).await
    }
}
