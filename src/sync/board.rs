use std::collections::BTreeSet;

use serde_json::json;

use super::{SyncResult, Synchronizer, skip};
use crate::{
    db::DbRule,
    store::{Filter, Query, Relation, row, schema},
};

/// The announcement is a single row under a fixed id.
pub const ANNOUNCEMENT_ID: i64 = 1;

impl Synchronizer {
    /// Appends a rule after the current last one.
    pub async fn add_rule(&self, text: &str) -> SyncResult<()> {
        const ACTION: &str = "add_rule";

        let text = text.trim();
        if text.is_empty() {
            return skip(ACTION, "empty text");
        }

        self.mutate(ACTION, async {
            let last = self
                .store
                .maybe_single(
                    Query::on(Relation::Rules)
                        .columns(&["order_num"])
                        .order("order_num", false),
                )
                .await?;
            let order = last
                .and_then(|r| r.get("order_num").and_then(|v| v.as_i64()))
                .unwrap_or(0)
                + 1;

            self.store
                .insert(Relation::Rules, row(json!({ "text": text, "order_num": order })))
                .await?;
            Ok(())
        })
        .await
    }

    pub async fn update_rule(&self, id: i64, text: &str) -> SyncResult<()> {
        const ACTION: &str = "update_rule";

        let text = text.trim();
        if text.is_empty() {
            return skip(ACTION, "empty text");
        }

        self.mutate(ACTION, async {
            self.store
                .update(Relation::Rules, Filter::new().eq("id", id), row(json!({ "text": text })))
                .await?;
            Ok(())
        })
        .await
    }

    pub async fn set_rule_visibility(&self, id: i64, visible: bool) -> SyncResult<()> {
        self.mutate("set_rule_visibility", async {
            self.store
                .update(Relation::Rules, Filter::new().eq("id", id), row(json!({ "visible": visible })))
                .await?;
            Ok(())
        })
        .await
    }

    pub async fn delete_rule(&self, id: i64) -> SyncResult<()> {
        self.mutate("delete_rule", async {
            self.store.delete(Relation::Rules, Filter::new().eq("id", id)).await?;
            Ok(())
        })
        .await
    }

    /// `ids` is the complete new order of the published rules. A list that
    /// leaves out or invents a rule is ignored without a reload.
    pub async fn reorder_rules(&self, ids: &[i64]) -> SyncResult<()> {
        const ACTION: &str = "reorder_rules";

        let current: BTreeSet<i64> = self.snapshot().rules.iter().map(|r| r.id).collect();
        let wanted: BTreeSet<i64> = ids.iter().copied().collect();
        if wanted.len() != ids.len() || wanted != current {
            return skip(ACTION, "incomplete order");
        }

        self.mutate(ACTION, async {
            for (index, id) in ids.iter().enumerate() {
                self.store
                    .update(
                        Relation::Rules,
                        Filter::new().eq("id", *id),
                        row(json!({ "order_num": index as i64 + 1 })),
                    )
                    .await?;
            }
            Ok(())
        })
        .await
    }

    pub async fn update_announcement(&self, text: &str, visible: bool) -> SyncResult<()> {
        self.mutate("update_announcement", async {
            let changes = row(json!({
                "text": text,
                "visible": visible,
                "updated_at": schema::now_rfc3339()?,
            }));
            let affected = self
                .store
                .update(Relation::Announcement, Filter::new().eq("id", ANNOUNCEMENT_ID), changes.clone())
                .await?;
            if affected == 0 {
                let mut announcement = changes;
                announcement.insert("id".into(), ANNOUNCEMENT_ID.into());
                self.store.insert(Relation::Announcement, announcement).await?;
            }
            Ok(())
        })
        .await
    }
}
