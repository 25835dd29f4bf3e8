use crate::limits::*;
use crate::model::*;

/// Shared precondition for every identifier the engine accepts.
pub(crate) fn check_id(id: &str, blank: &'static str) -> Result<(), &'static str> {
    if id.trim().is_empty() {
        return Err(blank);
    }
    if id.len() > MAX_ID_LEN {
        return Err("identifier too long");
    }
    Ok(())
}

/// Non-zero timestamps with `end > start`.
pub(crate) fn check_span(start: Ms, end: Ms) -> Result<Span, &'static str> {
    if start == 0 {
        return Err("start time is required");
    }
    if end == 0 {
        return Err("end time is required");
    }
    if end <= start {
        return Err("end time must be after start time");
    }
    Ok(Span::new(start, end))
}

/// Gate 1: request shape.
pub(crate) fn validate_shape(request: &BookingRequest) -> Result<Span, Rejection> {
    check_id(&request.student_id, "student id is required").map_err(Rejection::InvalidRequest)?;
    check_id(&request.instructor_id, "instructor id is required")
        .map_err(Rejection::InvalidRequest)?;
    check_span(request.start, request.end).map_err(Rejection::InvalidRequest)
}

/// Gate 2: lessons come in fixed lengths only.
pub(crate) fn check_duration(span: &Span) -> Result<(), Rejection> {
    if LESSON_DURATIONS_MS.contains(&span.duration_ms()) {
        Ok(())
    } else {
        Err(Rejection::InvalidDuration)
    }
}

/// Gate 3: some window starting on the booking's calendar day covers it.
pub(crate) fn covering_window<'a>(
    windows: &'a [AvailabilityWindow],
    span: &Span,
) -> Option<&'a AvailabilityWindow> {
    let day = day_of(span.start);
    windows
        .iter()
        .filter(|w| day_of(w.span.start) == day)
        .find(|w| w.span.contains_span(span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    const H: Ms = HOUR_MS;
    const M: Ms = MINUTE_MS;
    const D: Ms = DAY_MS;

    fn window(start: Ms, end: Ms) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Ulid::new(),
            instructor_id: "i@example.com".into(),
            span: Span::new(start, end),
        }
    }

    fn request(start: Ms, end: Ms) -> BookingRequest {
        BookingRequest::new("s@example.com", "i@example.com", start, end)
    }

    #[test]
    fn shape_rejects_blank_ids() {
        let mut r = request(D + 10 * H, D + 11 * H);
        r.student_id = "   ".into();
        assert_eq!(
            validate_shape(&r),
            Err(Rejection::InvalidRequest("student id is required"))
        );

        let mut r = request(D + 10 * H, D + 11 * H);
        r.instructor_id = String::new();
        assert_eq!(
            validate_shape(&r),
            Err(Rejection::InvalidRequest("instructor id is required"))
        );
    }

    #[test]
    fn shape_rejects_overlong_id() {
        let mut r = request(D + 10 * H, D + 11 * H);
        r.student_id = "x".repeat(MAX_ID_LEN + 1);
        assert_eq!(
            validate_shape(&r),
            Err(Rejection::InvalidRequest("identifier too long"))
        );
    }

    #[test]
    fn shape_rejects_zero_and_inverted_times() {
        assert!(matches!(
            validate_shape(&request(0, D)),
            Err(Rejection::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_shape(&request(D, 0)),
            Err(Rejection::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_shape(&request(D + H, D + H)),
            Err(Rejection::InvalidRequest(_))
        ));
        assert!(matches!(
            validate_shape(&request(D + 2 * H, D + H)),
            Err(Rejection::InvalidRequest(_))
        ));
        assert_eq!(
            validate_shape(&request(D + H, D + 2 * H)),
            Ok(Span::new(D + H, D + 2 * H))
        );
    }

    #[test]
    fn duration_allows_only_one_or_two_hours() {
        assert!(check_duration(&Span::new(0, H)).is_ok());
        assert!(check_duration(&Span::new(0, 2 * H)).is_ok());
        for bad in [30 * M, 59 * M, 61 * M, 90 * M, 119 * M, 121 * M, 3 * H] {
            assert_eq!(
                check_duration(&Span::new(0, bad)),
                Err(Rejection::InvalidDuration),
                "{bad}ms should be rejected"
            );
        }
    }

    #[test]
    fn containment_requires_full_cover() {
        let windows = vec![window(D + 9 * H, D + 17 * H)];
        assert!(covering_window(&windows, &Span::new(D + 9 * H, D + 10 * H)).is_some());
        assert!(covering_window(&windows, &Span::new(D + 15 * H, D + 17 * H)).is_some());
        assert!(covering_window(&windows, &Span::new(D + 8 * H, D + 9 * H)).is_none());
        assert!(covering_window(&windows, &Span::new(D + 16 * H, D + 18 * H)).is_none());
    }

    #[test]
    fn containment_does_not_stitch_adjacent_windows() {
        // Two windows touching at 12:00 do not jointly cover 11:00-13:00.
        let windows = vec![window(D + 9 * H, D + 12 * H), window(D + 12 * H, D + 17 * H)];
        assert!(covering_window(&windows, &Span::new(D + 11 * H, D + 13 * H)).is_none());
    }

    #[test]
    fn containment_is_scoped_to_the_start_date() {
        // Window opened the previous evening and running past midnight.
        let windows = vec![window(D - 2 * H, D + 2 * H)];
        assert!(covering_window(&windows, &Span::new(D, D + H)).is_none());
        assert!(covering_window(&windows, &Span::new(D - 2 * H, D - H)).is_some());
    }

    #[test]
    fn containment_picks_any_qualifying_window() {
        let windows = vec![
            window(D + 9 * H, D + 10 * H),
            window(2 * D + 9 * H, 2 * D + 17 * H),
            window(D + 13 * H, D + 17 * H),
        ];
        let hit = covering_window(&windows, &Span::new(D + 14 * H, D + 15 * H)).unwrap();
        assert_eq!(hit.span, Span::new(D + 13 * H, D + 17 * H));
    }
}
