use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use guestbook_core::{SubmitRequest, identity::rate_limit_identity};
use guestbook_database::model::entry::Entry;
use guestbook_database::model::rate_limit::ActionClass;

use crate::ApiState;
use crate::error::ApiError;
use crate::session::Caller;

pub const DEFAULT_PAGE_SIZE: u64 = 20;

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_page_size")]
    pub limit: u64,
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub entry: Entry,
}

#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    pub entries: Vec<Entry>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub removed: bool,
}

pub async fn submit_entry(
    State(state): State<ApiState>,
    caller: Caller,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<EntryResponse>), ApiError> {
    let Json(body) = body?;
    let request = SubmitRequest {
        client_key: caller.client_key,
        name: body.name,
        message: body.message,
    };

    let entry = state
        .guestbook
        .submit(request, caller.session.as_ref())
        .await?;

    Ok((StatusCode::CREATED, Json(EntryResponse { entry })))
}

pub async fn list_entries(
    State(state): State<ApiState>,
    caller: Caller,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<EntriesResponse>, ApiError> {
    let Query(query) = query?;
    let identity = rate_limit_identity(caller.session.as_ref(), &caller.client_key);
    state
        .guestbook
        .enforce_rate_limit(&identity, ActionClass::GuestbookRead)
        .await?;

    let entries = state.guestbook.list_page(query.offset, query.limit).await?;
    Ok(Json(EntriesResponse { entries }))
}

pub async fn delete_entry(
    State(state): State<ApiState>,
    caller: Caller,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let Path(id) = id?;
    let removed = state.guestbook.delete(id, caller.session.as_ref()).await?;
    Ok(Json(DeleteResponse { removed }))
}

pub async fn purge_entries(
    State(state): State<ApiState>,
    caller: Caller,
) -> Result<StatusCode, ApiError> {
    state.guestbook.purge_all(caller.session.as_ref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health() -> &'static str {
    "ok"
}
