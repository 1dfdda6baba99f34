use crate::hike_session::HikeStatus;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// The sample was dropped, the session keeps running.
    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    /// A mutator was called on a session that does not allow it.
    #[error("Cannot {operation} a {status} hike session")]
    InvalidState {
        operation: &'static str,
        status: HikeStatus,
    },

    /// The location source reported a permission or hardware failure.
    #[error("Location source unavailable: {0}")]
    SourceUnavailable(String),
}
