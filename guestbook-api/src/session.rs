use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};

use guestbook_core::SessionIdentity;
use guestbook_utils::parse::parse_flag;

use crate::ApiState;

pub const SESSION_NAME_HEADER: &str = "x-session-name";
pub const SESSION_AVATAR_HEADER: &str = "x-session-avatar";
pub const SESSION_ADMIN_HEADER: &str = "x-session-admin";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Who is calling: the session identity (if any) and a transport-level key
/// for anonymous rate limiting.
#[derive(Clone, Debug)]
pub struct Caller {
    pub session: Option<SessionIdentity>,
    pub client_key: String,
}

impl FromRequestParts<ApiState> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &ApiState) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        if !state.trust_proxy_headers {
            return Ok(Self {
                session: None,
                client_key: peer.unwrap_or_else(|| "unknown".to_owned()),
            });
        }

        let client_key = header_str(&parts.headers, FORWARDED_FOR_HEADER)
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .or(peer)
            .unwrap_or_else(|| "unknown".to_owned());

        Ok(Self {
            session: session_from_headers(&parts.headers),
            client_key,
        })
    }
}

/// Identity asserted by the upstream session proxy, if it sent one.
pub fn session_from_headers(headers: &HeaderMap) -> Option<SessionIdentity> {
    let name = header_str(headers, SESSION_NAME_HEADER)?.trim();
    if name.is_empty() {
        return None;
    }

    let avatar_url = header_str(headers, SESSION_AVATAR_HEADER)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned);
    let is_admin = header_str(headers, SESSION_ADMIN_HEADER)
        .and_then(parse_flag)
        .unwrap_or(false);

    Some(SessionIdentity {
        name: name.to_owned(),
        avatar_url,
        is_admin,
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}
