//! Read-only calendar views for presentation. No business rules live here.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;

use crate::engine::{EngineError, bounded, check_id};
use crate::model::*;
use crate::store::{AvailabilityStore, BookingStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstructorCalendar {
    pub instructor_id: String,
    pub windows: Vec<AvailabilityWindow>,
    pub bookings: Vec<Booking>,
}

/// One instructor's day. `open` is the union of the day's windows minus the
/// day's bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayView {
    pub instructor_id: String,
    pub date: NaiveDate,
    pub windows: Vec<AvailabilityWindow>,
    pub bookings: Vec<Booking>,
    pub open: Vec<Span>,
}

pub struct QueryFacade {
    availability: Arc<dyn AvailabilityStore>,
    bookings: Arc<dyn BookingStore>,
    store_timeout: Duration,
}

impl QueryFacade {
    pub fn new(
        availability: Arc<dyn AvailabilityStore>,
        bookings: Arc<dyn BookingStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            availability,
            bookings,
            store_timeout,
        }
    }

    pub fn with_store<S>(store: Arc<S>, store_timeout: Duration) -> Self
    where
        S: AvailabilityStore + BookingStore + 'static,
    {
        Self::new(store.clone(), store, store_timeout)
    }

    /// Every window of every instructor, grouped by instructor then by start.
    pub async fn all_availability(&self) -> Result<Vec<AvailabilityWindow>, EngineError> {
        let mut windows =
            bounded(self.store_timeout, "all_windows", self.availability.all_windows()).await?;
        windows.sort_by(|a, b| {
            a.instructor_id
                .cmp(&b.instructor_id)
                .then(a.span.start.cmp(&b.span.start))
        });
        Ok(windows)
    }

    pub async fn all_bookings(&self) -> Result<Vec<Booking>, EngineError> {
        let mut bookings =
            bounded(self.store_timeout, "all_bookings", self.bookings.all_bookings()).await?;
        bookings.sort_by(|a, b| {
            a.instructor_id
                .cmp(&b.instructor_id)
                .then(a.span.start.cmp(&b.span.start))
        });
        Ok(bookings)
    }

    pub async fn instructor_calendar(&self, instructor_id: &str) -> Result<InstructorCalendar, EngineError> {
        check_id(instructor_id, "instructor id is required").map_err(EngineError::InvalidRequest)?;
        let (mut windows, mut bookings) = futures::try_join!(
            bounded(
                self.store_timeout,
                "windows_by_instructor",
                self.availability.windows_by_instructor(instructor_id),
            ),
            bounded(
                self.store_timeout,
                "bookings_by_instructor",
                self.bookings.bookings_by_instructor(instructor_id),
            ),
        )?;
        windows.sort_by_key(|w| w.span.start);
        bookings.sort_by_key(|b| b.span.start);
        Ok(InstructorCalendar {
            instructor_id: instructor_id.to_string(),
            windows,
            bookings,
        })
    }

    /// A student's lessons in chronological order.
    pub async fn student_schedule(&self, student_id: &str) -> Result<Vec<Booking>, EngineError> {
        check_id(student_id, "student id is required").map_err(EngineError::InvalidRequest)?;
        let mut bookings = bounded(
            self.store_timeout,
            "bookings_by_student",
            self.bookings.bookings_by_student(student_id),
        )
        .await?;
        bookings.sort_by_key(|b| b.span.start);
        Ok(bookings)
    }

    /// Windows and bookings starting on `date` (UTC), with the time still open.
    pub async fn instructor_day(&self, instructor_id: &str, date: NaiveDate) -> Result<DayView, EngineError> {
        let calendar = self.instructor_calendar(instructor_id).await?;
        let day = day_of(day_start(date));

        let windows: Vec<AvailabilityWindow> = calendar
            .windows
            .into_iter()
            .filter(|w| day_of(w.span.start) == day)
            .collect();
        let bookings: Vec<Booking> = calendar
            .bookings
            .into_iter()
            .filter(|b| day_of(b.span.start) == day)
            .collect();

        let published: Vec<Span> = windows.iter().map(|w| w.span).collect();
        let taken: Vec<Span> = bookings.iter().map(|b| b.span).collect();
        let open = open_time(&published, &taken);

        Ok(DayView {
            instructor_id: calendar.instructor_id,
            date,
            windows,
            bookings,
            open,
        })
    }
}

/// Time covered by some window and by no booking, as disjoint spans in
/// order. Sweeps every window and booking boundary once; input order does
/// not matter and touching pieces are joined.
fn open_time(windows: &[Span], taken: &[Span]) -> Vec<Span> {
    // (at, window depth change, booking depth change)
    let mut edges: Vec<(Ms, i32, i32)> = Vec::with_capacity(2 * (windows.len() + taken.len()));
    for w in windows {
        edges.push((w.start, 1, 0));
        edges.push((w.end, -1, 0));
    }
    for t in taken {
        edges.push((t.start, 0, 1));
        edges.push((t.end, 0, -1));
    }
    edges.sort_unstable_by_key(|&(at, _, _)| at);

    let mut open: Vec<Span> = Vec::new();
    let (mut published, mut booked) = (0, 0);
    let mut since: Option<Ms> = None;
    for (at, window_step, booking_step) in edges {
        if let Some(from) = since
            && from < at
            && published > 0
            && booked == 0
        {
            match open.last_mut() {
                Some(last) if last.end == from => last.end = at,
                _ => open.push(Span::new(from, at)),
            }
        }
        published += window_step;
        booked += booking_step;
        since = Some(at);
    }
    open
}
