use serde_json::json;

use super::{SyncResult, Synchronizer, calendar::today, skip};
use crate::{
    model::{Emoji, Member},
    store::{Filter, Relation, Row, row},
};

fn may_remove(member: &Member, author_id: i64) -> bool {
    member.is_admin || member.id == author_id
}

impl Synchronizer {
    /// The author is stored but never published next to the post.
    pub async fn add_anonymous_post(&self, content: &str) -> SyncResult<()> {
        const ACTION: &str = "add_anonymous_post";

        let Some(member) = self.current_member().await else {
            return skip(ACTION, "not logged in");
        };
        let content = content.trim();
        if content.is_empty() {
            return skip(ACTION, "empty content");
        }

        self.mutate(ACTION, async {
            self.store
                .insert(
                    Relation::AnonymousPosts,
                    row(json!({ "content": content, "author_id": member.id })),
                )
                .await?;
            Ok(())
        })
        .await
    }

    pub async fn delete_anonymous_post(&self, id: i64) -> SyncResult<()> {
        const ACTION: &str = "delete_anonymous_post";

        let Some(member) = self.current_member().await else {
            return skip(ACTION, "not logged in");
        };
        let Some(author_id) = self.snapshot().anonymous_post(id).map(|p| p.author_id) else {
            return skip(ACTION, "no such post");
        };
        if !may_remove(&member, author_id) {
            return skip(ACTION, "not the author");
        }

        self.mutate(ACTION, async {
            self.store
                .delete(Relation::AnonymousPostLikes, Filter::new().eq("post_id", id))
                .await?;
            self.store
                .delete(Relation::AnonymousPosts, Filter::new().eq("id", id))
                .await?;
            Ok(())
        })
        .await
    }

    pub async fn toggle_like(&self, post_id: i64) -> SyncResult<()> {
        const ACTION: &str = "toggle_like";

        let Some(member) = self.current_member().await else {
            return skip(ACTION, "not logged in");
        };

        self.mutate(ACTION, async {
            let key = Filter::new().eq("post_id", post_id).eq("user_id", member.id);
            self.toggle(Relation::AnonymousPostLikes, key, Row::new()).await?;
            Ok(())
        })
        .await
    }

    /// Posts under the logged-in member's name, dated today.
    pub async fn add_tmi_post(&self, content: &str) -> SyncResult<()> {
        const ACTION: &str = "add_tmi_post";

        let Some(member) = self.current_member().await else {
            return skip(ACTION, "not logged in");
        };
        let content = content.trim();
        if content.is_empty() {
            return skip(ACTION, "empty content");
        }

        self.mutate(ACTION, async {
            let date = today()?;
            self.store
                .insert(
                    Relation::UserPosts,
                    row(json!({ "user_id": member.id, "content": content, "date": date })),
                )
                .await?;
            Ok(())
        })
        .await
    }

    pub async fn delete_tmi_post(&self, id: i64) -> SyncResult<()> {
        const ACTION: &str = "delete_tmi_post";

        let Some(member) = self.current_member().await else {
            return skip(ACTION, "not logged in");
        };
        let Some(author_id) = self.snapshot().tmi_post(id).map(|p| p.user_id) else {
            return skip(ACTION, "no such post");
        };
        if !may_remove(&member, author_id) {
            return skip(ACTION, "not the author");
        }

        self.mutate(ACTION, async {
            self.store
                .delete(Relation::UserPostReactions, Filter::new().eq("post_id", id))
                .await?;
            self.store.delete(Relation::UserPosts, Filter::new().eq("id", id)).await?;
            Ok(())
        })
        .await
    }

    /// Each emoji toggles on its own; a member may hold several on one post.
    pub async fn toggle_reaction(&self, post_id: i64, emoji: Emoji) -> SyncResult<()> {
        const ACTION: &str = "toggle_reaction";

        let Some(member) = self.current_member().await else {
            return skip(ACTION, "not logged in");
        };

        self.mutate(ACTION, async {
            let key = Filter::new()
                .eq("post_id", post_id)
                .eq("user_id", member.id)
                .eq("emoji", emoji.as_str());
            self.toggle(Relation::UserPostReactions, key, Row::new()).await?;
            Ok(())
        })
        .await
    }
}
