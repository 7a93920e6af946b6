use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{State, WebSocketUpgrade, ws::Message},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tower_sessions::Session;
use tracing::{debug, warn};

use crate::{AppState, appresult::AppResult, model::Snapshot, sync::Synchronizer};

use super::MEMBER_ID;

/// Pushes the snapshot once on connect and again after every publish.
/// `current_user` is the member logged in on the connecting cookie.
#[debug_handler(state = AppState)]
pub(crate) async fn snapshot_ws(
    State(sync): State<Synchronizer>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let member_id = session.get::<i64>(MEMBER_ID).await?;

    Ok(ws.on_upgrade(async move |stream| {
        let mut rx = sync.watch();
        let (mut sender, mut receiver) = stream.split();

        let mut publish_task = tokio::spawn(async move {
            loop {
                let published = rx.borrow_and_update().clone();
                let current_user = member_id.and_then(|id| published.member(id).cloned());
                let snapshot = Snapshot {
                    current_user,
                    ..Arc::unwrap_or_clone(published)
                };
                let json = match serde_json::to_string(&snapshot) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(error = %e, "failed to serialize snapshot");
                        break;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
                if rx.changed().await.is_err() {
                    break;
                }
            }
        });

        let mut receive_task = tokio::spawn(async move {
            // clients only listen; anything they send is dropped
            while let Some(Ok(msg)) = receiver.next().await {
                if let Message::Close(_) = msg {
                    break;
                }
            }
        });

        tokio::select! {
            _ = &mut publish_task => receive_task.abort(),
            _ = &mut receive_task => publish_task.abort(),
        };
        debug!("snapshot socket closed");
    }))
}
