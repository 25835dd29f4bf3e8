//! Property tests: the engine agrees with a naive reference model of the
//! admission rules, and the stored bookings never violate them.

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use lessonbook::engine::SchedulingEngine;
use lessonbook::model::*;
use lessonbook::store::InMemoryStore;

/// 2026-01-01T00:00:00Z
const BASE: Ms = 1_767_225_600_000;
const QUARTER: Ms = 15 * MINUTE_MS;

#[derive(Debug, Clone)]
enum Op {
    Publish {
        instructor: u8,
        day: i64,
        start_hour: i64,
        hours: i64,
    },
    Request {
        student: u8,
        instructor: u8,
        day: i64,
        quarter: i64,
        minutes: i64,
    },
    Cancel {
        pick: usize,
    },
}

fn instructor_id(n: u8) -> String {
    format!("instructor{n}@example.com")
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => (0u8..3, 0i64..3, 0i64..21, 1i64..10).prop_map(|(instructor, day, start_hour, hours)| {
            Op::Publish { instructor, day, start_hour, hours }
        }),
        4 => (
            0u8..5,
            0u8..3,
            0i64..3,
            0i64..96,
            prop::sample::select(vec![30i64, 60, 61, 90, 120, 180]),
        )
            .prop_map(|(student, instructor, day, quarter, minutes)| Op::Request {
                student,
                instructor,
                day,
                quarter,
                minutes,
            }),
        1 => any::<usize>().prop_map(|pick| Op::Cancel { pick }),
    ]
}

/// Straightforward restatement of the admission rules over plain vectors.
#[derive(Default)]
struct Model {
    windows: Vec<(String, Span)>,
    bookings: Vec<Booking>,
}

impl Model {
    fn decide(&self, instructor: &str, span: Span) -> Option<Rejection> {
        let minutes = span.duration_ms() / MINUTE_MS;
        if span.duration_ms() % MINUTE_MS != 0 || (minutes != 60 && minutes != 120) {
            return Some(Rejection::InvalidDuration);
        }
        let covered = self.windows.iter().any(|(owner, w)| {
            owner == instructor
                && day_of(w.start) == day_of(span.start)
                && w.start <= span.start
                && span.end <= w.end
        });
        if !covered {
            return Some(Rejection::OutsideAvailability);
        }
        let clash = self
            .bookings
            .iter()
            .any(|b| b.instructor_id == instructor && b.span.start < span.end && span.start < b.span.end);
        if clash {
            return Some(Rejection::SlotConflict);
        }
        None
    }
}

async fn run(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let store = Arc::new(InMemoryStore::new());
    let engine = SchedulingEngine::with_store(store, Duration::from_secs(1));
    let mut model = Model::default();

    for op in ops {
        match op {
            Op::Publish { instructor, day, start_hour, hours } => {
                let start = BASE + day * DAY_MS + start_hour * HOUR_MS;
                let window = engine
                    .add_availability(NewAvailability::new(instructor_id(instructor), start, start + hours * HOUR_MS))
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                model.windows.push((window.instructor_id, window.span));
            }
            Op::Request { student, instructor, day, quarter, minutes } => {
                let start = BASE + day * DAY_MS + quarter * QUARTER;
                let span = Span::new(start, start + minutes * MINUTE_MS);
                let instructor = instructor_id(instructor);
                let expected = model.decide(&instructor, span);

                let admission = engine
                    .request_booking(BookingRequest::new(
                        format!("student{student}@example.com"),
                        instructor.as_str(),
                        span.start,
                        span.end,
                    ))
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;

                match (expected, admission) {
                    (None, Admission::Admitted(booking)) => {
                        prop_assert_eq!(booking.span, span);
                        model.bookings.push(booking);
                    }
                    (Some(want), Admission::Rejected(got)) => prop_assert_eq!(want, got),
                    (want, got) => {
                        return Err(TestCaseError::fail(format!("model said {want:?}, engine said {got:?}")));
                    }
                }
            }
            Op::Cancel { pick } => {
                if model.bookings.is_empty() {
                    continue;
                }
                let booking = model.bookings.remove(pick % model.bookings.len());
                engine
                    .remove_booking(booking.id)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }
        }
    }

    let mut stored = engine
        .all_bookings()
        .await
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(stored.len(), model.bookings.len());

    for booking in &stored {
        let minutes = booking.span.duration_ms() / MINUTE_MS;
        prop_assert!(minutes == 60 || minutes == 120);
        prop_assert!(model.windows.iter().any(|(owner, w)| owner == &booking.instructor_id
            && day_of(w.start) == day_of(booking.span.start)
            && w.contains_span(&booking.span)));
    }

    stored.sort_by(|a, b| a.instructor_id.cmp(&b.instructor_id).then(a.span.start.cmp(&b.span.start)));
    for pair in stored.windows(2) {
        if pair[0].instructor_id == pair[1].instructor_id {
            prop_assert!(!pair[0].span.overlaps(&pair[1].span), "overlap: {:?}", pair);
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn engine_matches_reference_model(ops in prop::collection::vec(op(), 1..60)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(run(ops))?;
    }
}
