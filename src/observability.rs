use std::net::SocketAddr;

use crate::engine::EngineError;
use crate::model::{Admission, Rejection};

// ── Admission metrics ───────────────────────────────────────────

/// Counter: booking requests decided. Labels: outcome.
pub const ADMISSIONS_TOTAL: &str = "lessonbook_admissions_total";

/// Histogram: end-to-end admission latency in seconds, lock wait included.
pub const ADMISSION_DURATION_SECONDS: &str = "lessonbook_admission_duration_seconds";

// ── Store metrics ───────────────────────────────────────────────

/// Counter: store calls that failed or timed out. Labels: kind.
pub const STORE_FAILURES_TOTAL: &str = "lessonbook_store_failures_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "lessonbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "lessonbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for an admission result.
pub fn outcome_label(result: &Result<Admission, EngineError>) -> &'static str {
    match result {
        Ok(Admission::Admitted(_)) => "admitted",
        Ok(Admission::Rejected(Rejection::InvalidRequest(_))) => "invalid_request",
        Ok(Admission::Rejected(Rejection::InvalidDuration)) => "invalid_duration",
        Ok(Admission::Rejected(Rejection::OutsideAvailability)) => "outside_availability",
        Ok(Admission::Rejected(Rejection::SlotConflict)) => "slot_conflict",
        Err(EngineError::InvalidRequest(_)) => "invalid_request",
        Err(EngineError::StoreUnavailable(_)) => "store_unavailable",
        Err(EngineError::Cancelled) => "cancelled",
    }
}
