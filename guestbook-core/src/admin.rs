use tracing::debug;

use crate::error::GuestbookError;
use crate::identity::SessionIdentity;

/// Allow the call only when the session provider marked the caller as admin.
pub fn require_admin(caller: Option<&SessionIdentity>) -> Result<(), GuestbookError> {
    match caller {
        Some(identity) if identity.is_admin => Ok(()),
        _ => {
            debug!(
                authenticated = caller.is_some(),
                "admin-only guestbook operation denied"
            );
            Err(GuestbookError::AccessDenied)
        }
    }
}
