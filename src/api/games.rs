use std::sync::Arc;

use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    AppState,
    appresult::AppResult,
    model::{Choice, Snapshot},
    sync::Synchronizer,
};

use super::{reloaded, require_admin, require_member};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewGameBody {
    option_a: String,
    option_b: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct VoteBody {
    choice: Choice,
}

#[debug_handler(state = AppState)]
pub(crate) async fn start_game(
    State(sync): State<Synchronizer>,
    session: Session,
    Json(NewGameBody { option_a, option_b }): Json<NewGameBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_admin(&sync, &session).await?;
    sync.start_game(&option_a, &option_b).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn end_game(State(sync): State<Synchronizer>, session: Session) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_admin(&sync, &session).await?;
    sync.end_game().await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn vote(
    State(sync): State<Synchronizer>,
    session: Session,
    Json(VoteBody { choice }): Json<VoteBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_member(&sync, &session).await?;
    sync.vote(choice).await?;
    Ok(reloaded(&sync))
}
