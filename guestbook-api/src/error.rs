use std::collections::BTreeMap;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use guestbook_core::GuestbookError;

/// HTTP rendering of a pipeline failure or a request axum could not extract.
#[derive(Debug)]
pub enum ApiError {
    Guestbook(GuestbookError),
    /// Malformed body, path or query, with axum's status and explanation.
    Rejected { status: StatusCode, message: String },
}

impl From<GuestbookError> for ApiError {
    fn from(err: GuestbookError) -> Self {
        Self::Guestbook(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = match self {
            Self::Guestbook(err) => err,
            Self::Rejected { status, message } => {
                return (status, Json(json!({ "error": message }))).into_response();
            }
        };
        let status = match &err {
            GuestbookError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GuestbookError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GuestbookError::ModerationRejected(_) => StatusCode::BAD_REQUEST,
            GuestbookError::ModerationUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GuestbookError::PersistenceFailure => StatusCode::INTERNAL_SERVER_ERROR,
            GuestbookError::AccessDenied => StatusCode::FORBIDDEN,
        };

        let mut body = json!({ "error": err.to_string() });

        if !err.field_errors().is_empty() {
            let fields: BTreeMap<&str, &str> = err
                .field_errors()
                .iter()
                .map(|e| (e.field.as_str(), e.message.as_str()))
                .collect();
            body["fieldErrors"] = json!(fields);
        }

        let retry_after_secs = match &err {
            GuestbookError::RateLimited { retry_after } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
            _ => None,
        };
        if let Some(secs) = retry_after_secs {
            body["retryAfter"] = json!(secs);
        }

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }

        response
    }
}
