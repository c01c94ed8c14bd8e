use crate::database::Database;
use crate::model::rate_limit::{ActionClass, RateLimitDecision};

fn rate_limit_key(db: &Database, action: ActionClass, identity_key: &str) -> String {
    db.key(format!("ratelimit:{}:{}", action.as_str(), identity_key))
}

/// Count one hit for `identity_key` against the quota of `action`.
///
/// The hit is counted even when it ends up rejected, so a caller hammering the
/// endpoint keeps the window closed.
pub async fn check_rate_limit(
    db: &Database,
    identity_key: &str,
    action: ActionClass,
) -> anyhow::Result<RateLimitDecision> {
    let policy = db.rate_limits().policy(action);
    let key = rate_limit_key(db, action, identity_key);
    let hits = db.store().incr_with_window(&key, policy.window).await?;

    if hits.count > policy.max_hits {
        return Ok(RateLimitDecision::Limited {
            retry_after: hits.ttl,
        });
    }

    Ok(RateLimitDecision::Allowed {
        remaining: policy.max_hits - hits.count,
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::check_rate_limit;
    use crate::database::Database;
    use crate::model::rate_limit::{ActionClass, RateLimitDecision, RateLimitPolicy};

    #[tokio::test(start_paused = true)]
    async fn quota_then_limited_then_reset() {
        let mut db = Database::in_memory("test");
        db.configure_rate_limit(RateLimitPolicy {
            action: ActionClass::GuestbookWrite,
            max_hits: 5,
            window: Duration::from_secs(60),
        });

        for expected_remaining in (0..5).rev() {
            let decision = check_rate_limit(&db, "client:1.2.3.4", ActionClass::GuestbookWrite)
                .await
                .unwrap();
            assert_eq!(
                decision,
                RateLimitDecision::Allowed {
                    remaining: expected_remaining
                }
            );
        }

        let limited = check_rate_limit(&db, "client:1.2.3.4", ActionClass::GuestbookWrite)
            .await
            .unwrap();
        assert_eq!(
            limited,
            RateLimitDecision::Limited {
                retry_after: Duration::from_secs(60)
            }
        );

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(
            check_rate_limit(&db, "client:1.2.3.4", ActionClass::GuestbookWrite)
                .await
                .unwrap()
                .is_allowed()
        );
    }

    #[tokio::test]
    async fn identities_and_actions_are_counted_separately() {
        let mut db = Database::in_memory("test");
        db.configure_rate_limit(RateLimitPolicy {
            action: ActionClass::GuestbookWrite,
            max_hits: 1,
            window: Duration::from_secs(60),
        });

        let first = check_rate_limit(&db, "client:a", ActionClass::GuestbookWrite);
        assert!(first.await.unwrap().is_allowed());
        let repeat = check_rate_limit(&db, "client:a", ActionClass::GuestbookWrite);
        assert!(!repeat.await.unwrap().is_allowed());

        let other_identity = check_rate_limit(&db, "client:b", ActionClass::GuestbookWrite);
        assert!(other_identity.await.unwrap().is_allowed());
        let other_action = check_rate_limit(&db, "client:a", ActionClass::GuestbookRead);
        assert!(other_action.await.unwrap().is_allowed());
    }
}
