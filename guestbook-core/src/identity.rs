use guestbook_database::model::entry::Provider;

/// Identity vouched for by the session provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionIdentity {
    pub name: String,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub name: String,
    pub avatar: Option<String>,
    pub verified: bool,
    pub provider: Option<Provider>,
}

/// Avatar host fragments checked in order; the first hit names the provider.
pub const PROVIDER_AVATAR_HOSTS: &[(&str, Provider)] = &[
    ("githubusercontent.com", Provider::Github),
    ("googleusercontent.com", Provider::Google),
    ("discordapp.com", Provider::Discord),
    ("discordapp.net", Provider::Discord),
    ("twimg.com", Provider::Twitter),
];

pub fn provider_from_avatar(avatar_url: &str) -> Option<Provider> {
    let avatar_url = avatar_url.to_ascii_lowercase();
    PROVIDER_AVATAR_HOSTS
        .iter()
        .find(|(fragment, _)| avatar_url.contains(fragment))
        .map(|(_, provider)| *provider)
}

/// Decide who is posting. A session identity always wins over a typed name.
pub fn resolve_identity(session: Option<&SessionIdentity>, raw_name: Option<&str>) -> ResolvedIdentity {
    match session {
        Some(session) => ResolvedIdentity {
            name: session.name.clone(),
            avatar: session.avatar_url.clone(),
            verified: true,
            provider: session.avatar_url.as_deref().and_then(provider_from_avatar),
        },
        None => ResolvedIdentity {
            name: raw_name.map(str::trim).unwrap_or_default().to_owned(),
            avatar: None,
            verified: false,
            provider: None,
        },
    }
}

/// Key the rate limiter counts under.
pub fn rate_limit_identity(session: Option<&SessionIdentity>, client_key: &str) -> String {
    match session {
        Some(session) => format!("session:{}", session.name),
        None => format!("client:{client_key}"),
    }
}
