use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, UTC. The only time type.
pub type Ms = i64;

pub const MINUTE_MS: Ms = 60_000;
pub const HOUR_MS: Ms = 60 * MINUTE_MS;
pub const DAY_MS: Ms = 24 * HOUR_MS;

/// Convert a UTC timestamp at the boundary into engine time.
pub fn ms_from_utc(t: DateTime<Utc>) -> Ms {
    t.timestamp_millis()
}

/// UTC calendar day number of an instant (days since the epoch).
pub fn day_of(t: Ms) -> i64 {
    t.div_euclid(DAY_MS)
}

/// Midnight (UTC) opening the given calendar date.
pub fn day_start(date: NaiveDate) -> Ms {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or_default()
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Length of the span, saturating at `Ms::MAX` for spans wider than `i64` can hold.
    pub fn duration_ms(&self) -> Ms {
        self.end.saturating_sub(self.start)
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` fully contains `other`.
    pub fn contains_span(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

// ── Records ──────────────────────────────────────────────────────

/// An instructor-published time window during which lessons may be booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Ulid,
    pub instructor_id: String,
    pub span: Span,
}

/// A confirmed lesson held by a student.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub student_id: String,
    pub instructor_id: String,
    pub span: Span,
}

/// Unvalidated input for publishing a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAvailability {
    pub instructor_id: String,
    pub start: Ms,
    pub end: Ms,
}

impl NewAvailability {
    pub fn new(instructor_id: impl Into<String>, start: Ms, end: Ms) -> Self {
        Self {
            instructor_id: instructor_id.into(),
            start,
            end,
        }
    }
}

/// Unvalidated input for reserving a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub student_id: String,
    pub instructor_id: String,
    pub start: Ms,
    pub end: Ms,
}

impl BookingRequest {
    pub fn new(
        student_id: impl Into<String>,
        instructor_id: impl Into<String>,
        start: Ms,
        end: Ms,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            instructor_id: instructor_id.into(),
            start,
            end,
        }
    }
}

// ── Admission outcome ────────────────────────────────────────────

/// Why a booking request was not admitted. These are expected outcomes, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Missing ids, zero timestamps, or `end <= start`.
    InvalidRequest(&'static str),
    /// Lessons are sold in 60 or 120 minute units only.
    InvalidDuration,
    /// No same-day window of the instructor covers the interval.
    OutsideAvailability,
    /// The interval intersects an existing booking of the instructor.
    SlotConflict,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::InvalidRequest(reason) => write!(f, "invalid request: {reason}"),
            Rejection::InvalidDuration => write!(f, "lesson must last 60 or 120 minutes"),
            Rejection::OutsideAvailability => {
                write!(f, "requested time is outside the instructor's availability")
            }
            Rejection::SlotConflict => write!(f, "requested time overlaps an existing booking"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted(Booking),
    Rejected(Rejection),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }

    pub fn booking(&self) -> Option<&Booking> {
        match self {
            Admission::Admitted(b) => Some(b),
            Admission::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Admission::Admitted(_) => None,
            Admission::Rejected(r) => Some(*r),
        }
    }
}

// ── Per-instructor ledger ────────────────────────────────────────

/// Everything stored for one instructor. Both lists are sorted by `span.start`.
#[derive(Debug, Clone, Default)]
pub struct InstructorLedger {
    pub windows: Vec<AvailabilityWindow>,
    pub bookings: Vec<Booking>,
}

impl InstructorLedger {
    /// Insert a window maintaining sort order by span.start.
    pub fn insert_window(&mut self, window: AvailabilityWindow) {
        let pos = self
            .windows
            .binary_search_by_key(&window.span.start, |w| w.span.start)
            .unwrap_or_else(|e| e);
        self.windows.insert(pos, window);
    }

    pub fn remove_window(&mut self, id: Ulid) -> Option<AvailabilityWindow> {
        let pos = self.windows.iter().position(|w| w.id == id)?;
        Some(self.windows.remove(pos))
    }

    /// Insert a booking maintaining sort order by span.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    /// Bookings whose span intersects the query.
    /// Uses binary search to skip bookings starting at or after `query.end`.
    pub fn overlapping_bookings(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.start < query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end > query.start)
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty() && self.bookings.is_empty()
    }
}

/// Flat event records. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    AvailabilityAdded(AvailabilityWindow),
    AvailabilityRemoved { id: Ulid, instructor_id: String },
    BookingAdmitted(Booking),
    BookingRemoved { id: Ulid, instructor_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn booking(start: Ms, end: Ms) -> Booking {
        Booking {
            id: Ulid::new(),
            student_id: "student@example.com".into(),
            instructor_id: "instructor@example.com".into(),
            span: Span::new(start, end),
        }
    }

    #[test]
    fn span_overlap() {
        let a = Span::new(100, 200);
        let b = Span::new(150, 250);
        let c = Span::new(200, 300);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent, not overlapping
    }

    #[test]
    fn duration_of_extreme_span_saturates() {
        assert_eq!(Span::new(-1, Ms::MAX).duration_ms(), Ms::MAX);
        assert_eq!(Span::new(Ms::MIN, 0).duration_ms(), Ms::MAX);
        assert_eq!(Span::new(10, 70).duration_ms(), 60);
    }

    #[test]
    fn span_contains_span() {
        let outer = Span::new(100, 400);
        let inner = Span::new(150, 300);
        let partial = Span::new(50, 200);
        assert!(outer.contains_span(&inner));
        assert!(outer.contains_span(&outer)); // self-containment
        assert!(!outer.contains_span(&partial));
    }

    #[test]
    fn day_of_uses_utc_calendar_days() {
        let morning = ms_from_utc(Utc.with_ymd_and_hms(2025, 5, 6, 0, 0, 0).unwrap());
        let night = ms_from_utc(Utc.with_ymd_and_hms(2025, 5, 6, 23, 59, 59).unwrap());
        let next = ms_from_utc(Utc.with_ymd_and_hms(2025, 5, 7, 0, 0, 0).unwrap());
        assert_eq!(day_of(morning), day_of(night));
        assert_eq!(day_of(next), day_of(morning) + 1);
        assert_eq!(day_start(NaiveDate::from_ymd_opt(2025, 5, 6).unwrap()), morning);
    }

    #[test]
    fn day_of_before_epoch_rounds_down() {
        assert_eq!(day_of(-1), -1);
        assert_eq!(day_of(0), 0);
    }

    #[test]
    fn ledger_keeps_bookings_sorted() {
        let mut ledger = InstructorLedger::default();
        ledger.insert_booking(booking(300, 400));
        ledger.insert_booking(booking(100, 200));
        ledger.insert_booking(booking(200, 300));
        let starts: Vec<Ms> = ledger.bookings.iter().map(|b| b.span.start).collect();
        assert_eq!(starts, vec![100, 200, 300]);
    }

    #[test]
    fn overlapping_bookings_skips_adjacent() {
        let mut ledger = InstructorLedger::default();
        ledger.insert_booking(booking(100, 200));
        ledger.insert_booking(booking(450, 600));
        ledger.insert_booking(booking(1000, 1100));

        let hits: Vec<_> = ledger.overlapping_bookings(&Span::new(200, 500)).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].span, Span::new(450, 600));
    }

    #[test]
    fn overlapping_large_booking_spanning_query() {
        let mut ledger = InstructorLedger::default();
        ledger.insert_booking(booking(0, 10_000));
        assert_eq!(ledger.overlapping_bookings(&Span::new(500, 600)).count(), 1);
    }

    #[test]
    fn remove_nonexistent_returns_none() {
        let mut ledger = InstructorLedger::default();
        ledger.insert_booking(booking(100, 200));
        assert!(ledger.remove_booking(Ulid::new()).is_none());
        assert!(ledger.remove_window(Ulid::new()).is_none());
        assert_eq!(ledger.bookings.len(), 1);
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingAdmitted(booking(HOUR_MS, 2 * HOUR_MS));
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
