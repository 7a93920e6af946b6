//! JSON endpoints over the synchronizer. Mutations answer with the snapshot
//! published by the reload that followed them.
//!
//! Each browser logs in on its own cookie session. Handlers act through
//! [`Synchronizer::acting_as`] with the member stored there.

mod board;
mod calendar;
mod games;
mod members;
mod posts;
mod random;
mod session;
mod ws;

use std::sync::Arc;

use axum::{
    Json, Router, debug_handler,
    extract::State,
    routing::{delete, get, post, put},
};
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer, cookie::SameSite};

use crate::{
    AppState,
    appresult::{AppError, AppResult},
    model::{Member, Snapshot},
    sync::Synchronizer,
};

/// Cookie session key holding the id of the member logged in on that browser.
pub(crate) const MEMBER_ID: &str = "member_id";

/// The API under `/api` with its cookie session layer.
pub fn app(sync: Synchronizer) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(30)));

    Router::new()
        .nest("/api", router())
        .with_state(AppState { sync })
        .layer(session_layer)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/snapshot", get(snapshot))
        .route("/ws", get(ws::snapshot_ws))
        .route("/session/login", post(session::login))
        .route("/session/logout", post(session::logout))
        .route("/session/password", post(session::change_password))
        .route("/availability/{date}", post(calendar::toggle_availability))
        .route("/meetings", post(calendar::add_meeting_record))
        .route("/meetings/{id}", delete(calendar::delete_meeting_record))
        .route("/rules", post(board::add_rule))
        .route("/rules/order", put(board::reorder_rules))
        .route("/rules/{id}", put(board::update_rule).delete(board::delete_rule))
        .route("/rules/{id}/visibility", put(board::set_rule_visibility))
        .route("/announcement", put(board::update_announcement))
        .route("/games", post(games::start_game))
        .route("/games/end", post(games::end_game))
        .route("/games/vote", post(games::vote))
        .route("/anonymous", post(posts::add_anonymous_post))
        .route("/anonymous/{id}", delete(posts::delete_anonymous_post))
        .route("/anonymous/{id}/like", post(posts::toggle_like))
        .route("/tmi", post(posts::add_tmi_post))
        .route("/tmi/{id}", delete(posts::delete_tmi_post))
        .route("/tmi/{id}/react", post(posts::toggle_reaction))
        .route("/members", post(members::add_member))
        .route("/members/{id}", put(members::update_member).delete(members::delete_member))
        .route("/random/roulette", get(random::roulette))
        .route("/random/ladder", get(random::ladder))
}

#[debug_handler(state = AppState)]
async fn snapshot(State(sync): State<Synchronizer>, session: Session) -> AppResult<Json<Arc<Snapshot>>> {
    let client = client(&sync, &session).await?;
    Ok(reloaded(&client))
}

/// The member logged in on this cookie, looked up in the current snapshot.
/// Members deleted since they logged in resolve to `None`.
async fn session_member(sync: &Synchronizer, session: &Session) -> AppResult<Option<Member>> {
    let member = session
        .get::<i64>(MEMBER_ID)
        .await?
        .and_then(|id| sync.snapshot().member(id).cloned());
    Ok(member)
}

async fn client(sync: &Synchronizer, session: &Session) -> AppResult<Synchronizer> {
    Ok(sync.acting_as(session_member(sync, session).await?))
}

async fn require_member(sync: &Synchronizer, session: &Session) -> AppResult<Synchronizer> {
    let Some(member) = session_member(sync, session).await? else {
        return Err(AppError::unauthorized("log in first"));
    };
    Ok(sync.acting_as(Some(member)))
}

async fn require_admin(sync: &Synchronizer, session: &Session) -> AppResult<Synchronizer> {
    let Some(member) = session_member(sync, session).await? else {
        return Err(AppError::unauthorized("log in first"));
    };
    if !member.is_admin {
        return Err(AppError::forbidden("administrators only"));
    }
    Ok(sync.acting_as(Some(member)))
}

fn reloaded(sync: &Synchronizer) -> Json<Arc<Snapshot>> {
    Json(sync.snapshot())
}
