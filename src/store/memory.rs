use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use ulid::Ulid;

use crate::model::*;

use super::{AvailabilityStore, BookingStore, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub instructors: usize,
    pub windows: usize,
    pub bookings: usize,
}

/// Canonical in-process store. Records are grouped per instructor so the
/// admission path only ever touches one ledger.
pub struct InMemoryStore {
    ledgers: DashMap<String, InstructorLedger>,
    /// Reverse lookup: window id → instructor id
    window_owner: DashMap<Ulid, String>,
    /// Reverse lookup: booking id → instructor id
    booking_owner: DashMap<Ulid, String>,
    /// Student id → booking ids held by that student.
    student_bookings: DashMap<String, Vec<Ulid>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            ledgers: DashMap::new(),
            window_owner: DashMap::new(),
            booking_owner: DashMap::new(),
            student_bookings: DashMap::new(),
        }
    }

    // ── Event application ────────────────────────────────────

    /// Apply one event. The only mutation path, shared by direct writes and WAL replay.
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::AvailabilityAdded(window) => {
                self.window_owner
                    .insert(window.id, window.instructor_id.clone());
                self.ledgers
                    .entry(window.instructor_id.clone())
                    .or_default()
                    .insert_window(window.clone());
            }
            Event::AvailabilityRemoved { id, instructor_id } => {
                if let Some(mut ledger) = self.ledgers.get_mut(instructor_id) {
                    ledger.remove_window(*id);
                }
                self.window_owner.remove(id);
            }
            Event::BookingAdmitted(booking) => {
                self.booking_owner
                    .insert(booking.id, booking.instructor_id.clone());
                self.student_bookings
                    .entry(booking.student_id.clone())
                    .or_default()
                    .push(booking.id);
                self.ledgers
                    .entry(booking.instructor_id.clone())
                    .or_default()
                    .insert_booking(booking.clone());
            }
            Event::BookingRemoved { id, instructor_id } => {
                let removed = self
                    .ledgers
                    .get_mut(instructor_id)
                    .and_then(|mut ledger| ledger.remove_booking(*id));
                if let Some(booking) = removed
                    && let Some(mut ids) = self.student_bookings.get_mut(&booking.student_id)
                {
                    ids.retain(|b| b != id);
                }
                self.booking_owner.remove(id);
            }
        }
    }

    /// Stamp a new window with a fresh id.
    pub fn window_record(window: NewAvailability) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Ulid::new(),
            instructor_id: window.instructor_id,
            span: Span {
                start: window.start,
                end: window.end,
            },
        }
    }

    /// Stamp an admitted booking with a fresh id.
    pub fn booking_record(request: BookingRequest) -> Booking {
        Booking {
            id: Ulid::new(),
            student_id: request.student_id,
            instructor_id: request.instructor_id,
            span: Span {
                start: request.start,
                end: request.end,
            },
        }
    }

    /// The removal event for a stored window, or `None` if the id is unknown.
    pub fn window_removal(&self, id: Ulid) -> Option<Event> {
        let instructor_id = self.window_owner.get(&id)?.value().clone();
        Some(Event::AvailabilityRemoved { id, instructor_id })
    }

    /// The removal event for a stored booking, or `None` if the id is unknown.
    pub fn booking_removal(&self, id: Ulid) -> Option<Event> {
        let instructor_id = self.booking_owner.get(&id)?.value().clone();
        Some(Event::BookingRemoved { id, instructor_id })
    }

    // ── Reads ────────────────────────────────────────────────

    pub fn windows_for(&self, instructor_id: &str) -> Vec<AvailabilityWindow> {
        self.ledgers
            .get(instructor_id)
            .map(|l| l.windows.clone())
            .unwrap_or_default()
    }

    pub fn bookings_for(&self, instructor_id: &str) -> Vec<Booking> {
        self.ledgers
            .get(instructor_id)
            .map(|l| l.bookings.clone())
            .unwrap_or_default()
    }

    pub fn bookings_for_student(&self, student_id: &str) -> Vec<Booking> {
        let ids = self
            .student_bookings
            .get(student_id)
            .map(|e| e.value().clone())
            .unwrap_or_default();
        ids.into_iter()
            .filter_map(|id| {
                let instructor_id = self.booking_owner.get(&id)?.value().clone();
                let ledger = self.ledgers.get(&instructor_id)?;
                let found = ledger.bookings.iter().find(|b| b.id == id).cloned();
                found
            })
            .collect()
    }

    pub fn every_window(&self) -> Vec<AvailabilityWindow> {
        self.ledgers
            .iter()
            .flat_map(|l| l.windows.clone())
            .collect()
    }

    pub fn every_booking(&self) -> Vec<Booking> {
        self.ledgers
            .iter()
            .flat_map(|l| l.bookings.clone())
            .collect()
    }

    pub fn has_overlap(&self, instructor_id: &str, span: &Span) -> bool {
        self.ledgers
            .get(instructor_id)
            .is_some_and(|l| l.overlapping_bookings(span).next().is_some())
    }

    /// Minimal event list that recreates the current state. Used for compaction.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::new();
        for ledger in self.ledgers.iter() {
            events.extend(ledger.windows.iter().cloned().map(Event::AvailabilityAdded));
            events.extend(ledger.bookings.iter().cloned().map(Event::BookingAdmitted));
        }
        events
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            instructors: 0,
            windows: 0,
            bookings: 0,
        };
        for ledger in self.ledgers.iter() {
            if ledger.is_empty() {
                continue;
            }
            stats.instructors += 1;
            stats.windows += ledger.windows.len();
            stats.bookings += ledger.bookings.len();
        }
        stats
    }
}

#[async_trait]
impl AvailabilityStore for InMemoryStore {
    async fn add_window(&self, window: NewAvailability) -> StoreResult<AvailabilityWindow> {
        let window = Self::window_record(window);
        self.apply_event(&Event::AvailabilityAdded(window.clone()));
        Ok(window)
    }

    async fn remove_window(&self, id: Ulid) -> StoreResult<()> {
        if let Some(event) = self.window_removal(id) {
            self.apply_event(&event);
        }
        Ok(())
    }

    async fn windows_by_instructor(&self, instructor_id: &str) -> StoreResult<Vec<AvailabilityWindow>> {
        Ok(self.windows_for(instructor_id))
    }

    async fn all_windows(&self) -> StoreResult<Vec<AvailabilityWindow>> {
        Ok(self.every_window())
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn add_booking(&self, booking: BookingRequest) -> StoreResult<Booking> {
        let booking = Self::booking_record(booking);
        self.apply_event(&Event::BookingAdmitted(booking.clone()));
        Ok(booking)
    }

    async fn remove_booking(&self, id: Ulid) -> StoreResult<()> {
        if let Some(event) = self.booking_removal(id) {
            self.apply_event(&event);
        }
        Ok(())
    }

    async fn bookings_by_instructor(&self, instructor_id: &str) -> StoreResult<Vec<Booking>> {
        Ok(self.bookings_for(instructor_id))
    }

    async fn bookings_by_student(&self, student_id: &str) -> StoreResult<Vec<Booking>> {
        Ok(self.bookings_for_student(student_id))
    }

    async fn all_bookings(&self) -> StoreResult<Vec<Booking>> {
        Ok(self.every_booking())
    }

    async fn exists_overlapping(&self, instructor_id: &str, span: Span) -> StoreResult<bool> {
        Ok(self.has_overlap(instructor_id, &span))
    }
}
