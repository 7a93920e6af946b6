use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    QueryBuilder, Row as _, Sqlite, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
};
use tokio::sync::broadcast;
use tracing::info;

use super::{
    Change, Filter, Query, Relation, RemoteStore, Row, StoreError, StoreResult,
    schema::{self, Column, Kind},
};

/// The relational backend. Identifiers are only ever taken from the static
/// schema, values always go through bind parameters.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    tx: broadcast::Sender<Change>,
}

impl SqliteStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;
        info!(database_url, "database connected");

        Self::new(pool).await
    }

    pub async fn new(pool: SqlitePool) -> StoreResult<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("database migrations completed");

        Ok(Self {
            pool,
            tx: broadcast::channel(64).0,
        })
    }

    fn notify(&self, relation: Relation) {
        let _ = self.tx.send(Change { relation });
    }
}

fn push_value(qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) -> StoreResult<()> {
    match value {
        Value::Null => {
            qb.push_bind(None::<String>);
        }
        Value::Bool(b) => {
            qb.push_bind(*b);
        }
        Value::Number(n) => match n.as_i64() {
            Some(i) => {
                qb.push_bind(i);
            }
            None => {
                qb.push_bind(n.as_f64());
            }
        },
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        other => return Err(StoreError::Unsupported(other.clone())),
    }
    Ok(())
}

fn push_where(qb: &mut QueryBuilder<'_, Sqlite>, relation: Relation, filter: &Filter) -> StoreResult<()> {
    for (i, (name, value)) in filter.conditions().iter().enumerate() {
        let column = schema::column(relation, name)?;
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        qb.push(column.name);
        if value.is_null() {
            qb.push(" IS NULL");
        } else {
            qb.push(" = ");
            push_value(qb, value)?;
        }
    }
    Ok(())
}

fn decode_row(row: &SqliteRow, columns: &[&Column]) -> StoreResult<Row> {
    let mut decoded = Row::new();
    for column in columns {
        let value = match column.kind {
            Kind::Int => Value::from(row.try_get::<Option<i64>, _>(column.name)?),
            Kind::Bool => Value::from(row.try_get::<Option<bool>, _>(column.name)?),
            Kind::Text => Value::from(row.try_get::<Option<String>, _>(column.name)?),
        };
        decoded.insert(column.name.to_owned(), value);
    }
    Ok(decoded)
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn select(&self, query: Query) -> StoreResult<Vec<Row>> {
        let columns = query.selected_columns()?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(column.name);
        }
        qb.push(" FROM ").push(query.relation.table_name());
        push_where(&mut qb, query.relation, &query.filter)?;
        if let Some(order) = &query.order {
            let column = schema::column(query.relation, &order.column)?;
            qb.push(" ORDER BY ")
                .push(column.name)
                .push(if order.ascending { " ASC" } else { " DESC" });
        }
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(|r| decode_row(r, &columns)).collect()
    }

    async fn insert(&self, relation: Relation, row: Row) -> StoreResult<()> {
        let row = schema::prepare_insert(relation, row)?;

        let mut qb = QueryBuilder::<Sqlite>::new("INSERT INTO ");
        qb.push(relation.table_name()).push(" (");
        for (i, name) in row.keys().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(schema::column(relation, name)?.name);
        }
        qb.push(") VALUES (");
        for (i, value) in row.values().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            push_value(&mut qb, value)?;
        }
        qb.push(")");

        match qb.build().execute(&self.pool).await {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(StoreError::Conflict { relation });
            }
            Err(e) => return Err(e.into()),
        }

        self.notify(relation);
        Ok(())
    }

    async fn update(&self, relation: Relation, filter: Filter, changes: Row) -> StoreResult<u64> {
        if changes.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE ");
        qb.push(relation.table_name()).push(" SET ");
        for (i, (name, value)) in changes.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            qb.push(schema::column(relation, name)?.name).push(" = ");
            push_value(&mut qb, value)?;
        }
        push_where(&mut qb, relation, &filter)?;

        let affected = match qb.build().execute(&self.pool).await {
            Ok(result) => result.rows_affected(),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(StoreError::Conflict { relation });
            }
            Err(e) => return Err(e.into()),
        };

        if affected > 0 {
            self.notify(relation);
        }
        Ok(affected)
    }

    async fn delete(&self, relation: Relation, filter: Filter) -> StoreResult<u64> {
        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM ");
        qb.push(relation.table_name());
        push_where(&mut qb, relation, &filter)?;

        let affected = qb.build().execute(&self.pool).await?.rows_affected();
        if affected > 0 {
            self.notify(relation);
        }
        Ok(affected)
    }

    fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}
