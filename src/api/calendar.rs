use std::sync::Arc;

use axum::{
    Json, debug_handler,
    extract::{Path, State},
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{
    AppState,
    appresult::{AppError, AppResult},
    model::{MEETING_COUNT, Snapshot},
    sync::{Synchronizer, parse_date},
};

use super::{reloaded, require_member};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MeetingRecordBody {
    meeting_number: i64,
    content: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn toggle_availability(
    State(sync): State<Synchronizer>,
    session: Session,
    Path(date): Path<String>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_member(&sync, &session).await?;
    if parse_date(&date).is_none() {
        return Err(AppError::bad_request(format!("expected YYYY-MM-DD, got {date:?}")));
    }

    sync.toggle_availability(&date).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn add_meeting_record(
    State(sync): State<Synchronizer>,
    session: Session,
    Json(MeetingRecordBody { meeting_number, content }): Json<MeetingRecordBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_member(&sync, &session).await?;
    if !(1..=MEETING_COUNT).contains(&meeting_number) {
        return Err(AppError::bad_request(format!(
            "meeting number must be between 1 and {MEETING_COUNT}"
        )));
    }

    sync.add_meeting_record(meeting_number, &content).await?;
    Ok(reloaded(&sync))
}

#[debug_handler(state = AppState)]
pub(crate) async fn delete_meeting_record(
    State(sync): State<Synchronizer>,
    session: Session,
    Path(id): Path<i64>,
) -> AppResult<Json<Arc<Snapshot>>> {
    let sync = require_member(&sync, &session).await?;
    sync.delete_meeting_record(id).await?;
    Ok(reloaded(&sync))
}
