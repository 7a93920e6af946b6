use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use tower_sessions::Session;

use crate::{
    AppState,
    appresult::{AppError, AppResult},
    model::{ADMIN_ID, MemberPatch, Snapshot},
    sync::{NewMember, Synchronizer},
};

use super::{reloaded, require_admin};

#[debug_handler(state = AppState)]
pub(crate) async fn add_member(
    State(sync): State<Synchronizer>,
    session: Session,
    Json(member): Json<NewMember>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_admin(&sync, &session).await?;
    sync.add_member(member).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn update_member(
    State(sync): State<Synchronizer>,
    session: Session,
    Path(id): Path<i64>,
    Json(patch): Json<MemberPatch>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_admin(&sync, &session).await?;
    sync.update_member(id, patch).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_member(
    State(sync): State<Synchronizer>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_admin(&sync, &session).await?;
    if id == ADMIN_ID {
        return Err(AppError::bad_request("the administrator account cannot be deleted"));
    }
    sync.delete_member(id).await?;
    Ok(reloaded(&sync))
}
