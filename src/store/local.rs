use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

use crate::{model::ADMIN_ID, storage::DeviceStorage};

use super::{
    Change, Filter, Query, Relation, RemoteStore, Row, StoreError, StoreResult, compare_values, schema,
    seed,
};

/// Device storage key holding the offline data set.
pub const DATA_KEY: &str = "smalltalk-data";

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Document {
    tables: BTreeMap<Relation, Vec<Row>>,
    // last id handed out per auto-increment relation
    #[serde(default)]
    sequences: BTreeMap<Relation, i64>,
}

/// Offline operating mode: every relation lives in memory and the whole data
/// set is written back to device storage after each write.
pub struct LocalStore {
    document: RwLock<Document>,
    storage: Arc<dyn DeviceStorage>,
    tx: broadcast::Sender<Change>,
}

impl LocalStore {
    pub fn open(storage: Arc<dyn DeviceStorage>) -> StoreResult<Self> {
        let mut document = match storage.get(DATA_KEY)? {
            Some(json) => match serde_json::from_str::<Document>(&json) {
                Ok(document) => document,
                Err(e) => {
                    warn!(error = %e, "stored data set is unreadable, starting over from the seed");
                    Document { tables: seed::initial_tables()?, ..Default::default() }
                }
            },
            None => Document { tables: seed::initial_tables()?, ..Default::default() },
        };

        for relation in Relation::ALL {
            document.tables.entry(relation).or_default();
        }
        let users = document.tables.entry(Relation::Users).or_default();
        if !users.iter().any(|u| u.get("id") == Some(&Value::from(ADMIN_ID))) {
            debug!("restoring the administrator account");
            users.insert(0, seed::admin_row());
        }

        storage.set(DATA_KEY, &serde_json::to_string(&document)?)?;

        Ok(Self {
            document: RwLock::new(document),
            storage,
            tx: broadcast::channel(64).0,
        })
    }

    fn persist(&self, document: &Document) -> StoreResult<()> {
        self.storage.set(DATA_KEY, &serde_json::to_string(document)?)?;
        Ok(())
    }

    /// Writes `next` to device storage, then makes it the live document.
    /// A failed write leaves `document` untouched.
    fn commit(&self, document: &mut Document, next: Document) -> StoreResult<()> {
        self.persist(&next)?;
        *document = next;
        Ok(())
    }

    fn notify(&self, relation: Relation) {
        // nobody listening is fine
        let _ = self.tx.send(Change { relation });
    }
}

fn next_id(document: &mut Document, relation: Relation) -> i64 {
    let highest = document
        .tables
        .get(&relation)
        .into_iter()
        .flatten()
        .filter_map(|r| r.get("id").and_then(Value::as_i64))
        .max()
        .unwrap_or(0);
    let sequence = document.sequences.entry(relation).or_insert(0);
    *sequence = (*sequence).max(highest) + 1;
    *sequence
}

fn same_key(a: &Row, b: &Row, columns: &[&str]) -> bool {
    columns
        .iter()
        .all(|c| a.get(*c).unwrap_or(&Value::Null) == b.get(*c).unwrap_or(&Value::Null))
}

#[async_trait]
impl RemoteStore for LocalStore {
    async fn select(&self, query: Query) -> StoreResult<Vec<Row>> {
        let columns = query.selected_columns()?;
        query.filter.check(query.relation)?;
        if let Some(order) = &query.order {
            schema::column(query.relation, &order.column)?;
        }

        let document = self.document.read().await;
        let mut rows: Vec<&Row> = document
            .tables
            .get(&query.relation)
            .into_iter()
            .flatten()
            .filter(|r| query.filter.matches(r))
            .collect();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.ascending { ordering } else { ordering.reverse() }
            });
        }

        Ok(rows
            .into_iter()
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|r| {
                columns
                    .iter()
                    .map(|c| (c.name.to_owned(), r.get(c.name).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect())
    }

    async fn insert(&self, relation: Relation, row: Row) -> StoreResult<()> {
        let mut row = schema::prepare_insert(relation, row)?;

        let mut document = self.document.write().await;
        let mut next = document.clone();
        let auto_id = matches!(
            relation.schema().column("id").map(|c| c.fill),
            Some(schema::Fill::AutoId)
        );
        if auto_id && !row.contains_key("id") {
            let id = next_id(&mut next, relation);
            row.insert("id".to_owned(), Value::from(id));
        }

        let rows = next.tables.entry(relation).or_default();
        let unique = relation.schema().unique;
        let duplicate = rows.iter().any(|existing| {
            same_key(existing, &row, &["id"]) || (!unique.is_empty() && same_key(existing, &row, unique))
        });
        if duplicate {
            return Err(StoreError::Conflict { relation });
        }
        rows.push(row);

        self.commit(&mut document, next)?;
        drop(document);
        self.notify(relation);
        Ok(())
    }

    async fn update(&self, relation: Relation, filter: Filter, changes: Row) -> StoreResult<u64> {
        filter.check(relation)?;
        for column in changes.keys() {
            schema::column(relation, column)?;
        }

        let mut document = self.document.write().await;
        let mut next = document.clone();
        let mut affected = 0;
        for row in next
            .tables
            .entry(relation)
            .or_default()
            .iter_mut()
            .filter(|r| filter.matches(r))
        {
            row.extend(changes.clone());
            affected += 1;
        }

        if affected > 0 {
            self.commit(&mut document, next)?;
            drop(document);
            self.notify(relation);
        }
        Ok(affected)
    }

    async fn delete(&self, relation: Relation, filter: Filter) -> StoreResult<u64> {
        filter.check(relation)?;

        let mut document = self.document.write().await;
        let mut next = document.clone();
        let rows = next.tables.entry(relation).or_default();
        let before = rows.len();
        rows.retain(|r| !filter.matches(r));
        let affected = (before - rows.len()) as u64;

        if affected > 0 {
            self.commit(&mut document, next)?;
            drop(document);
            self.notify(relation);
        }
        Ok(affected)
    }

    fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::{
        model::ADMIN_PASSWORD,
        storage::{MemoryStorage, StorageError},
        store::{decode, row},
    };

    /// Memory storage whose writes can be switched off.
    #[derive(Default)]
    struct ReadOnlyAfterOpen {
        inner: MemoryStorage,
        read_only: AtomicBool,
    }

    impl DeviceStorage for ReadOnlyAfterOpen {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.read_only.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StorageError> {
            self.inner.remove(key)
        }
    }

    fn open() -> (LocalStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = LocalStore::open(storage.clone()).unwrap();
        (store, storage)
    }

    #[tokio::test]
    async fn fresh_store_is_seeded() {
        let (store, storage) = open();

        let users = store.select(Query::on(Relation::Users).order("id", true)).await.unwrap();
        assert_eq!(users.len(), 11);
        assert_eq!(users[0]["id"], json!(ADMIN_ID));
        assert_eq!(users[0]["password"], json!(ADMIN_PASSWORD));

        let active = store
            .select(Query::on(Relation::BalanceGames).eq("is_active", true))
            .await
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["option_a"], json!("짜장면"));

        assert!(storage.get(DATA_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn admin_is_restored_when_missing() {
        let (store, storage) = open();
        store
            .delete(Relation::Users, Filter::new().eq("id", ADMIN_ID))
            .await
            .unwrap();

        let reopened = LocalStore::open(storage).unwrap();
        let admin = reopened
            .maybe_single(Query::on(Relation::Users).eq("id", ADMIN_ID))
            .await
            .unwrap();
        assert!(admin.is_some());
    }

    #[tokio::test]
    async fn writes_survive_reopening() {
        let (store, storage) = open();
        store
            .insert(Relation::Availability, row(json!({ "date": "2025-03-10", "user_id": 2 })))
            .await
            .unwrap();

        let reopened = LocalStore::open(storage).unwrap();
        let rows = reopened
            .select(Query::on(Relation::Availability).columns(&["date", "user_id"]))
            .await
            .unwrap();
        assert_eq!(rows, vec![row(json!({ "date": "2025-03-10", "user_id": 2 }))]);
    }

    #[tokio::test]
    async fn unreadable_data_falls_back_to_seed() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(DATA_KEY, "{not json").unwrap();

        let store = LocalStore::open(storage).unwrap();
        let rules = store.select(Query::on(Relation::Rules)).await.unwrap();
        assert_eq!(rules.len(), 3);
    }

    #[tokio::test]
    async fn unique_pairs_are_enforced() {
        let (store, _) = open();
        let like = row(json!({ "post_id": 1, "user_id": 4 }));

        store.insert(Relation::AnonymousPostLikes, like.clone()).await.unwrap();
        let err = store.insert(Relation::AnonymousPostLikes, like).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { relation: Relation::AnonymousPostLikes }));

        // same member, different emoji is a different reaction
        store
            .insert(Relation::UserPostReactions, row(json!({ "post_id": 2, "user_id": 1, "emoji": "🔥" })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_delete() {
        let (store, _) = open();
        store.insert(Relation::Rules, row(json!({ "text": "네 번째" }))).await.unwrap();
        store.delete(Relation::Rules, Filter::new().eq("id", 4)).await.unwrap();
        store.insert(Relation::Rules, row(json!({ "text": "다섯 번째" }))).await.unwrap();

        let ids: Vec<i64> = store
            .select(Query::on(Relation::Rules).columns(&["id"]).order("id", true))
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r["id"].as_i64())
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 5]);
    }

    #[tokio::test]
    async fn update_and_delete_report_affected_rows_and_notify() {
        let (store, _) = open();
        let mut changes = store.subscribe();

        let updated = store
            .update(Relation::Rules, Filter::new().eq("id", 2), row(json!({ "visible": false })))
            .await
            .unwrap();
        assert_eq!(updated, 1);
        assert_eq!(changes.recv().await.unwrap(), Change { relation: Relation::Rules });

        let deleted = store
            .delete(Relation::Rules, Filter::new().eq("id", 99))
            .await
            .unwrap();
        assert_eq!(deleted, 0);
        assert!(changes.try_recv().is_err());

        #[derive(serde::Deserialize)]
        struct Visible {
            visible: bool,
        }
        let rule: Vec<Visible> = decode(
            store
                .select(Query::on(Relation::Rules).columns(&["visible"]).eq("id", 2))
                .await
                .unwrap(),
        )
        .unwrap();
        assert!(!rule[0].visible);
    }

    #[tokio::test]
    async fn select_orders_descending_and_limits() {
        let (store, _) = open();

        let posts = store
            .select(Query::on(Relation::AnonymousPosts).order("created_at", false).limit(1))
            .await
            .unwrap();
        // post 1 was written three hours ago, post 2 five
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0]["id"], json!(1));
    }

    #[tokio::test]
    async fn unknown_filter_column_is_an_error() {
        let (store, _) = open();
        let err = store
            .select(Query::on(Relation::Rules).eq("colour", "red"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));
    }

    #[tokio::test]
    async fn failed_persist_leaves_data_unchanged() {
        let storage = Arc::new(ReadOnlyAfterOpen::default());
        let store = LocalStore::open(storage.clone()).unwrap();
        let mut changes = store.subscribe();
        let stored = storage.get(DATA_KEY).unwrap();
        storage.read_only.store(true, Ordering::SeqCst);

        let err = store
            .insert(Relation::Rules, row(json!({ "text": "네 번째" })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Storage(_)));
        store
            .update(Relation::Rules, Filter::new().eq("id", 1), row(json!({ "text": "바뀜" })))
            .await
            .unwrap_err();
        store
            .delete(Relation::Rules, Filter::new().eq("id", 2))
            .await
            .unwrap_err();

        let rules = store
            .select(Query::on(Relation::Rules).columns(&["id", "text"]).order("id", true))
            .await
            .unwrap();
        assert_eq!(rules.len(), 3);
        assert_ne!(rules[0]["text"], json!("바뀜"));
        assert!(changes.try_recv().is_err());
        assert_eq!(storage.get(DATA_KEY).unwrap(), stored);

        // the failed insert did not burn an id either
        storage.read_only.store(false, Ordering::SeqCst);
        store.insert(Relation::Rules, row(json!({ "text": "네 번째" }))).await.unwrap();
        let newest = store
            .select(Query::on(Relation::Rules).columns(&["id"]).order("id", false).limit(1))
            .await
            .unwrap();
        assert_eq!(newest[0]["id"], json!(4));
    }
}
