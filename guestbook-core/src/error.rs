use std::time::Duration;

use guestbook_moderation::RejectReason;
use guestbook_utils::formatting::format_wait_hint;

use crate::validation::FieldError;

/// Failures surfaced to callers. Display strings are safe to show to clients;
/// underlying causes are logged where they happen and never carried here.
#[derive(Debug, thiserror::Error)]
pub enum GuestbookError {
    #[error("{}", format_wait_hint(*retry_after))]
    RateLimited { retry_after: Duration },
    #[error("Please fix the highlighted fields.")]
    ValidationFailed(Vec<FieldError>),
    #[error("{0}")]
    ModerationRejected(RejectReason),
    #[error("Unable to verify message safety. Please try again later.")]
    ModerationUnavailable,
    #[error("Database error.")]
    PersistenceFailure,
    #[error("Access denied.")]
    AccessDenied,
}

impl GuestbookError {
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::ValidationFailed(errors) => errors,
            _ => &[],
        }
    }
}
