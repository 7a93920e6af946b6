use axum::{
    Json, debug_handler,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    appresult::{AppError, AppResult},
    model::Member,
    random::{self, Ladder},
    sync::Synchronizer,
};

const MAX_LADDER_COLUMNS: usize = 10;

#[debug_handler(state = AppState)]
pub(crate) async fn roulette(State(sync): State<Synchronizer>) -> Json<Option<Member>> {
    let snapshot = sync.snapshot();
    Json(random::roulette(&snapshot.users, &mut rand::rng()).cloned())
}

#[derive(Debug, Deserialize)]
pub(crate) struct LadderQuery {
    columns: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct LadderGame {
    ladder: Ladder,
    assignments: Vec<usize>,
}

/// Defaults to one column per member.
#[debug_handler(state = AppState)]
pub(crate) async fn ladder(
    State(sync): State<Synchronizer>,
    Query(LadderQuery { columns }): Query<LadderQuery>,
) -> AppResult<Json<LadderGame>> {
    let columns = columns.unwrap_or_else(|| sync.snapshot().users.iter().filter(|m| !m.is_admin).count());
    if !(2..=MAX_LADDER_COLUMNS).contains(&columns) {
        return Err(AppError::bad_request(format!(
            "a ladder needs between 2 and {MAX_LADDER_COLUMNS} columns"
        )));
    }

    let ladder = Ladder::generate(columns, &mut rand::rng());
    let assignments = ladder.assignments();
    Ok(Json(LadderGame { ladder, assignments }))
}
