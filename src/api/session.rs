use std::sync::Arc;

use axum::{Json, debug_handler, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::info;

use crate::{
    AppState,
    appresult::{AppError, AppResult},
    model::Snapshot,
    sync::{MIN_PASSWORD_LEN, PasswordChange, Synchronizer},
};

use super::{MEMBER_ID, client, reloaded};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginBody {
    member_id: i64,
    password: String,
}

/// Logs this browser in. Other browsers keep their own sessions.
#[debug_handler(state = AppState)]
pub(crate) async fn login(
    State(sync): State<Synchronizer>,
    session: Session,
    Json(LoginBody { member_id, password }): Json<LoginBody>,
) -> AppResult<Json<Arc<Snapshot>>> {
    if !sync.verify_password(member_id, &password).await {
        return Err(AppError::unauthorized("wrong member or password"));
    }
    let Some(member) = sync.snapshot().member(member_id).cloned() else {
        return Err(AppError::unauthorized("wrong member or password"));
    };

    session.cycle_id().await?;
    session.insert(MEMBER_ID, member.id).await?;
    info!(member_id, "client logged in");

    Ok(reloaded(&sync.acting_as(Some(member))))
}

#[debug_handler(state = AppState)]
pub(crate) async fn logout(State(sync): State<Synchronizer>, session: Session) -> Json<Arc<Snapshot>> {
    session.clear().await;
    reloaded(&sync.acting_as(None))
}

#[derive(Debug, Deserialize)]
pub(crate) struct PasswordBody {
    current: String,
    new: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn change_password(
    State(sync): State<Synchronizer>,
    session: Session,
    Json(PasswordBody { current, new }): Json<PasswordBody>,
) -> AppResult<StatusCode> {
    let client = client(&sync, &session).await?;
    match client.change_own_password(&current, &new).await? {
        PasswordChange::Changed => Ok(StatusCode::NO_CONTENT),
        PasswordChange::NotLoggedIn => Err(AppError::unauthorized("log in first")),
        PasswordChange::WrongPassword => Err(AppError::forbidden("current password does not match")),
        PasswordChange::TooShort => Err(AppError::bad_request(format!(
            "password needs at least {MIN_PASSWORD_LEN} characters"
        ))),
    }
}
