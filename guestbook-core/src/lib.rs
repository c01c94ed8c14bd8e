pub mod admin;
pub mod error;
pub mod identity;
pub mod pipeline;
pub mod validation;

use guestbook_database::Database;
use guestbook_moderation::ModerationChain;

pub use error::GuestbookError;
pub use identity::SessionIdentity;
pub use pipeline::SubmitRequest;

/// Shared service handle: everything a request needs to run the pipeline.
#[derive(Clone, Debug)]
pub struct Guestbook {
    pub db: Database,
    pub moderation: ModerationChain,
}

impl Guestbook {
    pub fn new(db: Database, moderation: ModerationChain) -> Self {
        Self { db, moderation }
    }
}
