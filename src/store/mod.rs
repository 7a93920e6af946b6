//! The remote store capability surface: named relations with row-level
//! select / insert / update / delete and a change-notification stream.

mod local;
pub mod schema;
mod seed;
mod sqlite;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::broadcast;

pub use local::{DATA_KEY, LocalStore};
pub use sqlite::SqliteStore;

pub type Row = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("malformed row: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timestamp formatting failed: {0}")]
    Time(#[from] time::error::Format),

    #[error("{relation} has no column {column}")]
    UnknownColumn { relation: Relation, column: String },

    #[error("{relation} requires a value for {column}")]
    MissingColumn { relation: Relation, column: &'static str },

    #[error("duplicate row in {relation}")]
    Conflict { relation: Relation },

    #[error("cannot store {0} in a column")]
    Unsupported(Value),

    #[error("device storage: {0}")]
    Storage(#[from] crate::storage::StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Users,
    Rules,
    BalanceGames,
    BalanceVotes,
    AnonymousPosts,
    AnonymousPostLikes,
    UserPosts,
    UserPostReactions,
    Announcement,
    Availability,
    MeetingRecords,
}

impl Relation {
    pub const ALL: [Relation; 11] = [
        Relation::Users,
        Relation::Rules,
        Relation::BalanceGames,
        Relation::BalanceVotes,
        Relation::AnonymousPosts,
        Relation::AnonymousPostLikes,
        Relation::UserPosts,
        Relation::UserPostReactions,
        Relation::Announcement,
        Relation::Availability,
        Relation::MeetingRecords,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            Relation::Users => "users",
            Relation::Rules => "rules",
            Relation::BalanceGames => "balance_games",
            Relation::BalanceVotes => "balance_votes",
            Relation::AnonymousPosts => "anonymous_posts",
            Relation::AnonymousPostLikes => "anonymous_post_likes",
            Relation::UserPosts => "user_posts",
            Relation::UserPostReactions => "user_post_reactions",
            Relation::Announcement => "announcement",
            Relation::Availability => "availability",
            Relation::MeetingRecords => "meeting_records",
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// A change notification. Carries which relation was written, never the rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Change {
    pub relation: Relation,
}

/// Equality conditions, all of which must hold.
#[derive(Debug, Clone, Default)]
pub struct Filter(Vec<(String, Value)>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.0.push((column.to_owned(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.0
    }

    /// Fails on the first condition naming a column `relation` does not have.
    pub fn check(&self, relation: Relation) -> StoreResult<()> {
        for (column, _) in &self.0 {
            schema::column(relation, column)?;
        }
        Ok(())
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.0
            .iter()
            .all(|(column, value)| row.get(column).unwrap_or(&Value::Null) == value)
    }
}

#[derive(Debug, Clone)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone)]
pub struct Query {
    pub relation: Relation,
    pub columns: Option<Vec<String>>,
    pub filter: Filter,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn on(relation: Relation) -> Self {
        Self {
            relation,
            columns: None,
            filter: Filter::new(),
            order: None,
            limit: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = Some(columns.iter().map(|c| (*c).to_owned()).collect());
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filter = self.filter.eq(column, value);
        self
    }

    pub fn matching(mut self, filter: Filter) -> Self {
        self.filter.0.extend(filter.0);
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order { column: column.to_owned(), ascending });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The column names this query reads, checked against the relation schema.
    pub fn selected_columns(&self) -> StoreResult<Vec<&'static schema::Column>> {
        match &self.columns {
            Some(names) => names.iter().map(|n| schema::column(self.relation, n)).collect(),
            None => Ok(self.relation.schema().columns.iter().collect()),
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select(&self, query: Query) -> StoreResult<Vec<Row>>;

    async fn insert(&self, relation: Relation, row: Row) -> StoreResult<()>;

    /// Returns the number of rows changed.
    async fn update(&self, relation: Relation, filter: Filter, changes: Row) -> StoreResult<u64>;

    /// Returns the number of rows removed.
    async fn delete(&self, relation: Relation, filter: Filter) -> StoreResult<u64>;

    fn subscribe(&self) -> broadcast::Receiver<Change>;

    async fn maybe_single(&self, query: Query) -> StoreResult<Option<Row>> {
        Ok(self.select(query.limit(1)).await?.into_iter().next())
    }
}

/// Turns a `json!({...})` object into a row. Anything else yields an empty row.
pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

pub fn decode<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, serde_json::Error> {
    rows.into_iter()
        .map(|r| serde_json::from_value(Value::Object(r)))
        .collect()
}

/// Total order over the scalar values a column can hold. Nulls sort first.
pub(crate) fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => a.to_string().cmp(&b.to_string()),
    }
}
