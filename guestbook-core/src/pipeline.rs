use tracing::{debug, error, info};
use uuid::Uuid;

use guestbook_database::impls::entries::{append_entry, clear_entries, list_entries, remove_entry};
use guestbook_database::impls::rate_limit::check_rate_limit;
use guestbook_database::model::entry::Entry;
use guestbook_database::model::rate_limit::{ActionClass, RateLimitDecision};
use guestbook_moderation::{ModerationInput, Verdict};
use guestbook_utils::pagination::inclusive_window;
use guestbook_utils::time::now_unix_millis;

use crate::Guestbook;
use crate::admin::require_admin;
use crate::error::GuestbookError;
use crate::identity::{SessionIdentity, rate_limit_identity, resolve_identity};
use crate::validation::validate_submission;

/// Raw form input for a new entry.
#[derive(Clone, Debug, Default)]
pub struct SubmitRequest {
    /// Transport-level caller key (e.g. client IP), used for anonymous rate limiting.
    pub client_key: String,
    /// Typed display name; ignored when a session identity is present.
    pub name: Option<String>,
    pub message: String,
}

impl Guestbook {
    /// Run a submission through rate limiting, identity resolution, validation
    /// and moderation, then persist it.
    pub async fn submit(
        &self,
        request: SubmitRequest,
        session: Option<&SessionIdentity>,
    ) -> Result<Entry, GuestbookError> {
        let identity_key = rate_limit_identity(session, &request.client_key);
        self.enforce_rate_limit(&identity_key, ActionClass::GuestbookWrite)
            .await?;

        let identity = resolve_identity(session, request.name.as_deref());
        let message = request.message.trim();

        let name_to_check = (!identity.verified).then_some(identity.name.as_str());
        let field_errors = validate_submission(name_to_check, message);
        if !field_errors.is_empty() {
            debug!(
                errors = field_errors.len(),
                "guestbook submission failed validation"
            );
            return Err(GuestbookError::ValidationFailed(field_errors));
        }

        let verdict = self
            .moderation
            .review(ModerationInput {
                name: &identity.name,
                message,
                name_is_trusted: identity.verified,
            })
            .await;
        match verdict {
            Verdict::Approved => {}
            Verdict::Rejected(reason) => return Err(GuestbookError::ModerationRejected(reason)),
            Verdict::Unavailable => return Err(GuestbookError::ModerationUnavailable),
        }

        let entry = Entry {
            id: Uuid::new_v4(),
            name: identity.name,
            message: message.to_owned(),
            timestamp: now_unix_millis(),
            avatar: identity.avatar,
            verified: identity.verified,
            provider: identity.provider,
        };

        append_entry(&self.db, &entry).await.map_err(|source| {
            error!(?source, "failed to persist guestbook entry");
            GuestbookError::PersistenceFailure
        })?;

        info!(
            entry_id = %entry.id,
            verified = entry.verified,
            provider = entry.provider.map(|p| p.as_str()),
            "guestbook entry created"
        );

        Ok(entry)
    }

    /// Entries in the inclusive index window `[start, end]`, newest first.
    pub async fn list(&self, start: u64, end: u64) -> Result<Vec<Entry>, GuestbookError> {
        list_entries(&self.db, start, end).await.map_err(|source| {
            error!(?source, start, end, "failed to list guestbook entries");
            GuestbookError::PersistenceFailure
        })
    }

    /// `limit` entries starting at `offset`; `limit` is clamped to the page maximum.
    pub async fn list_page(&self, offset: u64, limit: u64) -> Result<Vec<Entry>, GuestbookError> {
        let (start, end) = inclusive_window(offset, limit);
        self.list(start, end).await
    }

    /// Remove one entry. Returns `Ok(false)` when no entry has that id.
    pub async fn delete(
        &self,
        id: Uuid,
        caller: Option<&SessionIdentity>,
    ) -> Result<bool, GuestbookError> {
        require_admin(caller)?;

        let removed = remove_entry(&self.db, id).await.map_err(|source| {
            error!(?source, entry_id = %id, "failed to delete guestbook entry");
            GuestbookError::PersistenceFailure
        })?;

        info!(entry_id = %id, removed, "guestbook entry delete requested");
        Ok(removed)
    }

    /// Remove every entry.
    pub async fn purge_all(&self, caller: Option<&SessionIdentity>) -> Result<(), GuestbookError> {
        require_admin(caller)?;

        clear_entries(&self.db).await.map_err(|source| {
            error!(?source, "failed to purge guestbook entries");
            GuestbookError::PersistenceFailure
        })?;

        info!("guestbook purged");
        Ok(())
    }

    /// Count a hit for `identity_key` and fail with `RateLimited` once over quota.
    pub async fn enforce_rate_limit(
        &self,
        identity_key: &str,
        action: ActionClass,
    ) -> Result<(), GuestbookError> {
        let decision = check_rate_limit(&self.db, identity_key, action)
            .await
            .map_err(|source| {
                error!(?source, action = action.as_str(), "rate limit check failed");
                GuestbookError::PersistenceFailure
            })?;

        match decision {
            RateLimitDecision::Allowed { .. } => Ok(()),
            RateLimitDecision::Limited { retry_after } => {
                info!(
                    identity = identity_key,
                    action = action.as_str(),
                    retry_after_ms = retry_after.as_millis() as u64,
                    "rate limit exceeded"
                );
                Err(GuestbookError::RateLimited { retry_after })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::task::JoinSet;
    use uuid::Uuid;

    use guestbook_database::impls::entries::count_entries;
    use guestbook_database::model::entry::Provider;
    use guestbook_database::model::rate_limit::{ActionClass, RateLimitPolicy};
    use guestbook_database::{Database, KvStore};
    use guestbook_moderation::{LexicalFilter, ModerationChain, RejectReason};

    use super::SubmitRequest;
    use crate::validation::Field;
    use crate::{Guestbook, GuestbookError, SessionIdentity};

    fn guestbook() -> Guestbook {
        Guestbook::new(
            Database::in_memory("test"),
            ModerationChain::new(LexicalFilter::preset(), None),
        )
    }

    fn anonymous(name: &str, message: &str) -> SubmitRequest {
        SubmitRequest {
            client_key: "203.0.113.7".to_owned(),
            name: Some(name.to_owned()),
            message: message.to_owned(),
        }
    }

    fn session(is_admin: bool) -> SessionIdentity {
        SessionIdentity {
            name: "Satoru Gojo".to_owned(),
            avatar_url: Some("https://avatars.githubusercontent.com/u/6".to_owned()),
            is_admin,
        }
    }

    async fn stored(guestbook: &Guestbook) -> u64 {
        count_entries(&guestbook.db).await.unwrap()
    }

    #[tokio::test]
    async fn anonymous_submission_is_readable_immediately() {
        let guestbook = guestbook();

        let entry = guestbook
            .submit(anonymous("Alice", "Hello there!"), None)
            .await
            .unwrap();
        assert_eq!(entry.name, "Alice");
        assert_eq!(entry.message, "Hello there!");
        assert_eq!(entry.avatar, None);
        assert_eq!(entry.provider, None);
        assert!(!entry.verified);

        let newest = guestbook.list(0, 0).await.unwrap();
        assert_eq!(newest, vec![entry]);
    }

    #[tokio::test]
    async fn reads_observe_each_write_despite_cache() {
        let guestbook = guestbook();
        assert!(guestbook.list(0, 9).await.unwrap().is_empty());

        guestbook
            .submit(anonymous("Alice", "first post"), None)
            .await
            .unwrap();
        assert_eq!(guestbook.list(0, 9).await.unwrap().len(), 1);

        guestbook
            .submit(anonymous("Bob", "second post"), None)
            .await
            .unwrap();
        let page = guestbook.list_page(0, 10).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "Bob");
    }

    #[tokio::test]
    async fn authenticated_submission_uses_session_identity() {
        let guestbook = guestbook();

        let entry = guestbook
            .submit(anonymous("Impostor", "Throughout heaven and earth"), Some(&session(false)))
            .await
            .unwrap();

        assert!(entry.verified);
        assert_eq!(entry.name, "Satoru Gojo");
        assert_eq!(
            entry.avatar.as_deref(),
            Some("https://avatars.githubusercontent.com/u/6")
        );
        assert_eq!(entry.provider, Some(Provider::Github));
    }

    #[tokio::test]
    async fn invalid_fields_are_reported_together() {
        let guestbook = guestbook();

        let err = guestbook
            .submit(anonymous("A", "\u{1F600}\u{1F600}\u{1F600}"), None)
            .await
            .unwrap_err();
        let fields: Vec<Field> = err.field_errors().iter().map(|e| e.field).collect();
        assert_eq!(fields, vec![Field::Name, Field::Message]);
        assert_eq!(stored(&guestbook).await, 0);
    }

    #[tokio::test]
    async fn session_name_skips_name_validation() {
        let guestbook = guestbook();
        let identity = SessionIdentity {
            name: "X".to_owned(),
            avatar_url: None,
            is_admin: false,
        };

        let entry = guestbook
            .submit(
                SubmitRequest {
                    client_key: "203.0.113.7".to_owned(),
                    name: None,
                    message: "Hello there!".to_owned(),
                },
                Some(&identity),
            )
            .await
            .unwrap();
        assert_eq!(entry.name, "X");
    }

    #[tokio::test]
    async fn profanity_is_rejected_without_persisting() {
        let guestbook = guestbook();

        let err = guestbook
            .submit(anonymous("Alice", "buy cheap followers now"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GuestbookError::ModerationRejected(RejectReason::Profanity)
        ));
        assert!(err.to_string().contains("Profanity"));
        assert_eq!(stored(&guestbook).await, 0);
    }

    #[tokio::test]
    async fn sixth_write_in_window_is_rate_limited() {
        let guestbook = guestbook();

        for i in 0..5 {
            guestbook
                .submit(anonymous("Alice", &format!("message {i}")), None)
                .await
                .unwrap();
        }

        let err = guestbook
            .submit(anonymous("Alice", "message 6"), None)
            .await
            .unwrap_err();
        let GuestbookError::RateLimited { retry_after } = err else {
            panic!("expected rate limit, got {err:?}");
        };
        assert!(retry_after <= Duration::from_secs(60));
        assert!(err.to_string().starts_with("Too many messages."));
        assert_eq!(stored(&guestbook).await, 5);

        let other_client = SubmitRequest {
            client_key: "198.51.100.1".to_owned(),
            ..anonymous("Bob", "different caller")
        };
        assert!(guestbook.submit(other_client, None).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_attempts_still_count_against_quota() {
        let guestbook = guestbook();

        for _ in 0..5 {
            let _ = guestbook.submit(anonymous("A", "x"), None).await;
        }

        let err = guestbook
            .submit(anonymous("Alice", "Hello there!"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GuestbookError::RateLimited { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_burst_cannot_exceed_quota() {
        let mut db = Database::in_memory("test");
        db.configure_rate_limit(RateLimitPolicy {
            action: ActionClass::GuestbookWrite,
            max_hits: 5,
            window: Duration::from_secs(60),
        });
        let guestbook = Guestbook::new(db, ModerationChain::new(LexicalFilter::preset(), None));

        let mut tasks = JoinSet::new();
        for i in 0..20 {
            let guestbook = guestbook.clone();
            tasks.spawn(async move {
                guestbook
                    .submit(anonymous("Alice", &format!("burst {i}")), None)
                    .await
                    .is_ok()
            });
        }

        let mut accepted = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap() {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 5);
        assert_eq!(stored(&guestbook).await, 5);
    }

    #[tokio::test]
    async fn admin_delete_round_trip() {
        let guestbook = guestbook();
        let entry = guestbook
            .submit(anonymous("Alice", "Hello there!"), None)
            .await
            .unwrap();
        let keep = guestbook
            .submit(anonymous("Bob", "Hello there!"), None)
            .await
            .unwrap();

        assert!(guestbook.delete(entry.id, Some(&session(true))).await.unwrap());

        let remaining = guestbook.list(0, 99).await.unwrap();
        assert_eq!(remaining, vec![keep]);
        assert!(
            !remaining
                .iter()
                .any(|e| e.name == entry.name
                    && e.message == entry.message
                    && e.timestamp == entry.timestamp)
        );

        let missing = guestbook.delete(Uuid::new_v4(), Some(&session(true))).await;
        assert!(!missing.unwrap());
    }

    #[tokio::test]
    async fn purge_is_idempotent() {
        let guestbook = guestbook();
        guestbook
            .submit(anonymous("Alice", "Hello there!"), None)
            .await
            .unwrap();

        guestbook.purge_all(Some(&session(true))).await.unwrap();
        assert!(guestbook.list(0, 9).await.unwrap().is_empty());

        guestbook.purge_all(Some(&session(true))).await.unwrap();
        assert!(guestbook.list(0, 9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_admins_cannot_mutate() {
        let guestbook = guestbook();
        let entry = guestbook
            .submit(anonymous("Alice", "Hello there!"), None)
            .await
            .unwrap();

        for caller in [None, Some(session(false))] {
            assert!(matches!(
                guestbook.delete(entry.id, caller.as_ref()).await,
                Err(GuestbookError::AccessDenied)
            ));
            assert!(matches!(
                guestbook.delete(Uuid::new_v4(), caller.as_ref()).await,
                Err(GuestbookError::AccessDenied)
            ));
            assert!(matches!(
                guestbook.purge_all(caller.as_ref()).await,
                Err(GuestbookError::AccessDenied)
            ));
        }

        assert_eq!(guestbook.list(0, 9).await.unwrap(), vec![entry]);
    }

    // Nothing listens on port 1, so every store call fails fast.
    fn unreachable_store() -> Guestbook {
        let store = KvStore::redis("redis://127.0.0.1:1").unwrap();
        Guestbook::new(
            Database::new(store, "test"),
            ModerationChain::new(LexicalFilter::preset(), None),
        )
    }

    #[tokio::test]
    async fn store_outage_is_a_generic_database_error() {
        let guestbook = unreachable_store();

        let err = guestbook
            .submit(anonymous("Alice", "Hello there!"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GuestbookError::PersistenceFailure));
        assert_eq!(err.to_string(), "Database error.");

        assert!(matches!(
            guestbook.list(0, 9).await,
            Err(GuestbookError::PersistenceFailure)
        ));
        assert!(matches!(
            guestbook.purge_all(Some(&session(true))).await,
            Err(GuestbookError::PersistenceFailure)
        ));
    }

    #[tokio::test]
    async fn access_denied_never_touches_the_store() {
        let guestbook = unreachable_store();

        assert!(matches!(
            guestbook.delete(Uuid::new_v4(), Some(&session(false))).await,
            Err(GuestbookError::AccessDenied)
        ));
        assert!(matches!(
            guestbook.purge_all(None).await,
            Err(GuestbookError::AccessDenied)
        ));
    }
}
