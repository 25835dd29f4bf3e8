use crate::store::StoreError;

/// Faults and precondition failures. Rejected bookings are not errors; see
/// [`crate::model::Admission`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    InvalidRequest(&'static str),
    /// The store failed or did not answer within the configured timeout.
    /// A booking commit that timed out may still land; the instructor stays
    /// locked until it does, so a retry sees either the booking or a free slot.
    StoreUnavailable(String),
    /// The caller cancelled before a commit was started.
    Cancelled,
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::InvalidRequest(reason) => write!(f, "invalid request: {reason}"),
            EngineError::StoreUnavailable(e) => write!(f, "store unavailable: {e}"),
            EngineError::Cancelled => write!(f, "request cancelled"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => EngineError::StoreUnavailable(msg),
        }
    }
}
