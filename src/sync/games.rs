use serde_json::json;

use super::{SyncResult, Synchronizer, skip};
use crate::{
    db::DbBalanceVote,
    model::Choice,
    store::{Filter, Query, Relation, row, schema},
};

impl Synchronizer {
    /// Casting the same choice twice withdraws the vote, a different choice replaces it.
    pub async fn vote(&self, choice: Choice) -> SyncResult<()> {
        const ACTION: &str = "vote";

        let Some(member) = self.current_member().await else {
            return skip(ACTION, "not logged in");
        };
        let Some(game_id) = self.snapshot().balance_game.active.as_ref().map(|g| g.id) else {
            return skip(ACTION, "no active game");
        };

        self.mutate(ACTION, async {
            let key = Filter::new().eq("game_id", game_id).eq("user_id", member.id);
            let existing: Vec<DbBalanceVote> = self
                .fetch(Query::on(Relation::BalanceVotes).matching(key.clone()).limit(1))
                .await?;

            match existing.first() {
                Some(vote) if vote.vote == choice.as_str() => {
                    self.store.delete(Relation::BalanceVotes, key).await?;
                }
                Some(_) => {
                    self.store
                        .update(Relation::BalanceVotes, key, row(json!({ "vote": choice.as_str() })))
                        .await?;
                }
                None => {
                    self.store
                        .insert(
                            Relation::BalanceVotes,
                            row(json!({ "game_id": game_id, "user_id": member.id, "vote": choice.as_str() })),
                        )
                        .await?;
                }
            }
            Ok(())
        })
        .await
    }

    /// Closes whatever game is running, then opens the new one.
    pub async fn start_game(&self, option_a: &str, option_b: &str) -> SyncResult<()> {
        const ACTION: &str = "start_game";

        let (option_a, option_b) = (option_a.trim(), option_b.trim());
        if option_a.is_empty() || option_b.is_empty() {
            return skip(ACTION, "empty option");
        }

        self.mutate(ACTION, async {
            self.close_active_games().await?;
            self.store
                .insert(
                    Relation::BalanceGames,
                    row(json!({ "option_a": option_a, "option_b": option_b })),
                )
                .await?;
            Ok(())
        })
        .await
    }

    pub async fn end_game(&self) -> SyncResult<()> {
        self.mutate("end_game", async {
            self.close_active_games().await?;
            Ok(())
        })
        .await
    }

    async fn close_active_games(&self) -> SyncResult<u64> {
        let closed = self
            .store
            .update(
                Relation::BalanceGames,
                Filter::new().eq("is_active", true),
                row(json!({ "is_active": false, "ended_at": schema::now_rfc3339()? })),
            )
            .await?;
        Ok(closed)
    }
}
