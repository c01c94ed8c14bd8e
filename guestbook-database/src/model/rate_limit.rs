use std::time::Duration;

pub const DEFAULT_WRITE_RATE_LIMIT_MAX_HITS: u64 = 5;
pub const DEFAULT_WRITE_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
pub const DEFAULT_READ_RATE_LIMIT_MAX_HITS: u64 = 60;
pub const DEFAULT_READ_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Class of action a caller is being counted for. Each class has its own quota.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionClass {
    GuestbookWrite,
    GuestbookRead,
}

impl ActionClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GuestbookWrite => "guestbook-write",
            Self::GuestbookRead => "guestbook-read",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub action: ActionClass,
    pub max_hits: u64,
    pub window: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { remaining: u64 },
    Limited { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Configured quota per action class.
#[derive(Clone, Debug)]
pub struct RateLimits {
    write: RateLimitPolicy,
    read: RateLimitPolicy,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            write: RateLimitPolicy {
                action: ActionClass::GuestbookWrite,
                max_hits: DEFAULT_WRITE_RATE_LIMIT_MAX_HITS,
                window: DEFAULT_WRITE_RATE_LIMIT_WINDOW,
            },
            read: RateLimitPolicy {
                action: ActionClass::GuestbookRead,
                max_hits: DEFAULT_READ_RATE_LIMIT_MAX_HITS,
                window: DEFAULT_READ_RATE_LIMIT_WINDOW,
            },
        }
    }
}

impl RateLimits {
    pub fn policy(&self, action: ActionClass) -> RateLimitPolicy {
        match action {
            ActionClass::GuestbookWrite => self.write,
            ActionClass::GuestbookRead => self.read,
        }
    }

    pub fn set(&mut self, policy: RateLimitPolicy) {
        let slot = match policy.action {
            ActionClass::GuestbookWrite => &mut self.write,
            ActionClass::GuestbookRead => &mut self.read,
        };
        *slot = RateLimitPolicy {
            max_hits: policy.max_hits.max(1),
            window: policy.window.max(Duration::from_secs(1)),
            ..policy
        };
    }
}
