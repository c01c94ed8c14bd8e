pub mod error;
pub mod guestbook;
pub mod session;

use axum::{
    Router,
    routing::{delete, get},
};

use guestbook_core::Guestbook;

/// State shared by every handler.
#[derive(Clone, Debug)]
pub struct ApiState {
    pub guestbook: Guestbook,
    /// Honour `x-forwarded-for` and `x-session-*` headers from an upstream proxy.
    pub trust_proxy_headers: bool,
}

/// All guestbook routes.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/api/guestbook",
            get(guestbook::list_entries)
                .post(guestbook::submit_entry)
                .delete(guestbook::purge_entries),
        )
        .route("/api/guestbook/{id}", delete(guestbook::delete_entry))
        .route("/health", get(guestbook::health))
        .with_state(state)
}
