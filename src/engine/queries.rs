use crate::model::*;

use super::gates::check_id;
use super::{EngineError, SchedulingEngine, bounded};

impl SchedulingEngine {
    pub async fn bookings_by_instructor(&self, instructor_id: &str) -> Result<Vec<Booking>, EngineError> {
        check_id(instructor_id, "instructor id is required").map_err(EngineError::InvalidRequest)?;
        bounded(
            self.store_timeout,
            "bookings_by_instructor",
            self.bookings.bookings_by_instructor(instructor_id),
        )
        .await
    }

    pub async fn bookings_by_student(&self, student_id: &str) -> Result<Vec<Booking>, EngineError> {
        check_id(student_id, "student id is required").map_err(EngineError::InvalidRequest)?;
        bounded(
            self.store_timeout,
            "bookings_by_student",
            self.bookings.bookings_by_student(student_id),
        )
        .await
    }

    pub async fn all_bookings(&self) -> Result<Vec<Booking>, EngineError> {
        bounded(self.store_timeout, "all_bookings", self.bookings.all_bookings()).await
    }

    pub async fn availability_by_instructor(
        &self,
        instructor_id: &str,
    ) -> Result<Vec<AvailabilityWindow>, EngineError> {
        check_id(instructor_id, "instructor id is required").map_err(EngineError::InvalidRequest)?;
        bounded(
            self.store_timeout,
            "windows_by_instructor",
            self.availability.windows_by_instructor(instructor_id),
        )
        .await
    }

    pub async fn all_availability(&self) -> Result<Vec<AvailabilityWindow>, EngineError> {
        bounded(self.store_timeout, "all_windows", self.availability.all_windows()).await
    }
}
