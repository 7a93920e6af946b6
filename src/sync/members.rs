use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};

use super::{SyncResult, Synchronizer, skip};
use crate::{
    db::DbPassword,
    model::{ADMIN_ID, MemberPatch},
    store::{Filter, Query, Relation, decode, row},
};

pub const MIN_PASSWORD_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    pub name: String,
    pub nickname: String,
    pub emoji: String,
    #[serde(default)]
    pub is_admin: bool,
    /// Falls back to the default member password.
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordChange {
    Changed,
    NotLoggedIn,
    WrongPassword,
    TooShort,
}

impl Synchronizer {
    /// Looks `id` up in the loaded snapshot. Unknown ids leave the session as it was.
    pub async fn login(&self, id: i64) -> bool {
        let Some(member) = self.snapshot().member(id).cloned() else {
            debug!(member_id = id, "login for unknown member ignored");
            return false;
        };

        info!(member_id = id, "logged in");
        self.session.login(member.clone()).await;
        self.publish_current_user(Some(member));
        true
    }

    pub async fn logout(&self) {
        if let Some(member) = self.session.current().await {
            info!(member_id = member.id, "logged out");
        }
        self.session.logout().await;
        self.publish_current_user(None);
    }

    /// Reads the stored password directly instead of trusting the snapshot.
    /// Unknown members and failed reads never verify.
    pub async fn verify_password(&self, id: i64, candidate: &str) -> bool {
        let query = Query::on(Relation::Users).columns(&["password"]).eq("id", id);
        let stored = match self.store.maybe_single(query).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return false,
            Err(e) => {
                error!(member_id = id, error = %e, "failed to read password");
                return false;
            }
        };

        match decode::<DbPassword>(vec![stored]) {
            Ok(rows) => rows
                .first()
                .is_some_and(|r| self.credentials.matches(&r.password, candidate)),
            Err(e) => {
                error!(member_id = id, error = %e, "malformed password row");
                false
            }
        }
    }

    pub async fn change_password(&self, id: i64, password: &str) -> SyncResult<()> {
        self.mutate("change_password", async {
            let sealed = self.credentials.seal(password);
            self.store
                .update(Relation::Users, Filter::new().eq("id", id), row(json!({ "password": sealed })))
                .await?;
            Ok(())
        })
        .await
    }

    /// The logged-in member replaces their own password.
    pub async fn change_own_password(&self, current: &str, new: &str) -> SyncResult<PasswordChange> {
        let Some(member) = self.current_member().await else {
            return Ok(PasswordChange::NotLoggedIn);
        };
        if new.chars().count() < MIN_PASSWORD_LEN {
            return Ok(PasswordChange::TooShort);
        }
        if !self.verify_password(member.id, current).await {
            return Ok(PasswordChange::WrongPassword);
        }

        self.change_password(member.id, new).await?;
        Ok(PasswordChange::Changed)
    }

    /// Editing the logged-in member also refreshes the session copy.
    pub async fn update_member(&self, id: i64, patch: MemberPatch) -> SyncResult<()> {
        const ACTION: &str = "update_member";

        if patch.is_empty() {
            return skip(ACTION, "nothing to change");
        }

        self.mutate(ACTION, async {
            let affected = self
                .store
                .update(Relation::Users, Filter::new().eq("id", id), patch.to_row())
                .await?;

            if affected == 0 {
                return Ok(());
            }
            if let Some(mut current) = self.session.current().await.filter(|m| m.id == id) {
                patch.apply(&mut current);
                self.session.login(current).await;
            }
            Ok(())
        })
        .await
    }

    pub async fn add_member(&self, member: NewMember) -> SyncResult<()> {
        const ACTION: &str = "add_member";

        let (name, nickname) = (member.name.trim(), member.nickname.trim());
        if name.is_empty() || nickname.is_empty() {
            return skip(ACTION, "missing name");
        }

        self.mutate(ACTION, async {
            let mut new = row(json!({
                "name": name,
                "nickname": nickname,
                "emoji": member.emoji,
                "is_admin": member.is_admin,
            }));
            if let Some(password) = &member.password {
                new.insert("password".into(), self.credentials.seal(password).into());
            }
            self.store.insert(Relation::Users, new).await?;
            Ok(())
        })
        .await
    }

    /// Removes a member with everything they wrote or marked. The administrator stays.
    pub async fn delete_member(&self, id: i64) -> SyncResult<()> {
        const ACTION: &str = "delete_member";

        if id == ADMIN_ID {
            return skip(ACTION, "administrator");
        }

        self.mutate(ACTION, async {
            let by_member = || Filter::new().eq("user_id", id);
            for relation in [
                Relation::BalanceVotes,
                Relation::AnonymousPostLikes,
                Relation::UserPostReactions,
                Relation::Availability,
                Relation::MeetingRecords,
            ] {
                self.store.delete(relation, by_member()).await?;
            }

            let posts = self
                .store
                .select(Query::on(Relation::AnonymousPosts).columns(&["id"]).eq("author_id", id))
                .await?;
            for post in posts.iter().filter_map(|p| p.get("id").and_then(|v| v.as_i64())) {
                self.store
                    .delete(Relation::AnonymousPostLikes, Filter::new().eq("post_id", post))
                    .await?;
            }
            self.store
                .delete(Relation::AnonymousPosts, Filter::new().eq("author_id", id))
                .await?;

            let posts = self
                .store
                .select(Query::on(Relation::UserPosts).columns(&["id"]).eq("user_id", id))
                .await?;
            for post in posts.iter().filter_map(|p| p.get("id").and_then(|v| v.as_i64())) {
                self.store
                    .delete(Relation::UserPostReactions, Filter::new().eq("post_id", post))
                    .await?;
            }
            self.store.delete(Relation::UserPosts, by_member()).await?;

            self.store.delete(Relation::Users, Filter::new().eq("id", id)).await?;

            if self.session.current().await.is_some_and(|m| m.id == id) {
                self.session.logout().await;
            }
            Ok(())
        })
        .await
    }
}
