use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{AppState, appresult::AppResult, model::Snapshot, sync::Synchronizer};

use super::{reloaded, require_admin};

#[derive(Debug, Deserialize)]
pub(crate) struct RuleBody {
    text: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VisibilityBody {
    visible: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderBody {
    ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnnouncementBody {
    text: String,
    visible: bool,
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_rule(
    State(sync): State<Synchronizer>,
    session: Session,
    Json(RuleBody { text }): Json<RuleBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_admin(&sync, &session).await?;
    sync.add_rule(&text).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_rule(
    State(sync): State<Synchronizer>,
    session: Session,
    Path(id): Path<i64>,
    Json(RuleBody { text }): Json<RuleBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_admin(&sync, &session).await?;
    sync.update_rule(id, &text).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn set_rule_visibility(
    State(sync): State<Synchronizer>,
    session: Session,
    Path(id): Path<i64>,
    Json(VisibilityBody { visible }): Json<VisibilityBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_admin(&sync, &session).await?;
    sync.set_rule_visibility(id, visible).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_rule(
    State(sync): State<Synchronizer>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_admin(&sync, &session).await?;
    sync.delete_rule(id).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn reorder_rules(
    State(sync): State<Synchronizer>,
    session: Session,
    Json(OrderBody { ids }): Json<OrderBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_admin(&sync, &session).await?;
    sync.reorder_rules(&ids).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_announcement(
    State(sync): State<Synchronizer>,
    session: Session,
    Json(AnnouncementBody { text, visible }): Json<AnnouncementBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_admin(&sync, &session).await?;
    sync.update_announcement(&text, visible).await?;
    Ok(reloaded(&sync))
}
