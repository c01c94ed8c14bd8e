use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// External identity source an authenticated entry came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Github,
    Google,
    Discord,
    Twitter,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Google => "google",
            Self::Discord => "discord",
            Self::Twitter => "twitter",
        }
    }
}

/// One persisted guestbook message.
///
/// Absent optional fields are skipped on serialization so the stored row never
/// carries `null` placeholders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub name: String,
    pub message: String,
    /// Epoch milliseconds, assigned at write time.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
}

fn is_false(value: &bool) -> bool {
    !*value
}
