use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    AppState,
    appresult::AppResult,
    model::{Emoji, Snapshot},
    sync::Synchronizer,
};

use super::{reloaded, require_member};

#[derive(Debug, Deserialize)]
pub(crate) struct PostBody {
    content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReactBody {
    emoji: Emoji,
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_anonymous_post(
    State(sync): State<Synchronizer>,
    session: Session,
    Json(PostBody { content }): Json<PostBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_member(&sync, &session).await?;
    sync.add_anonymous_post(&content).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_anonymous_post(
    State(sync): State<Synchronizer>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_member(&sync, &session).await?;
    sync.delete_anonymous_post(id).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn toggle_like(
    State(sync): State<Synchronizer>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_member(&sync, &session).await?;
    sync.toggle_like(id).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_tmi_post(
    State(sync): State<Synchronizer>,
    session: Session,
    Json(PostBody { content }): Json<PostBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_member(&sync, &session).await?;
    sync.add_tmi_post(&content).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_tmi_post(
    State(sync): State<Synchronizer>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_member(&sync, &session).await?;
    sync.delete_tmi_post(id).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn toggle_reaction(
    State(sync): State<Synchronizer>,
    session: Session,
    Path(id): Path<i64>,
    Json(ReactBody { emoji }): Json<ReactBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_member(&sync, &session).await?;
    sync.toggle_reaction(id, emoji).await?;
    Ok(reloaded(&sync))
}
