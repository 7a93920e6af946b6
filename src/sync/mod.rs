//! The single source of truth for what the front end shows. Every read goes
//! through [`Synchronizer::load`], every write is followed by a full reload.

mod board;
mod calendar;
mod games;
mod members;
mod posts;
pub mod projection;

use std::{future::Future, sync::Arc};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::{
    sync::{broadcast::error::RecvError, watch},
    task::JoinHandle,
};
use tracing::{debug, error, warn};

use crate::{
    credentials::{Credentials, Plaintext},
    model::{Member, Snapshot},
    session::Session,
    store::{Filter, Query, Relation, RemoteStore, Row, StoreError, decode},
};

pub use board::ANNOUNCEMENT_ID;
pub use calendar::parse_date;
pub use members::{MIN_PASSWORD_LEN, NewMember, PasswordChange};
pub use projection::Tables;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed {relation} row: {source}")]
    Decode {
        relation: Relation,
        source: serde_json::Error,
    },
}

#[derive(Clone)]
pub struct Synchronizer {
    store: Arc<dyn RemoteStore>,
    session: Session,
    credentials: Arc<dyn Credentials>,
    tx: Arc<watch::Sender<Arc<Snapshot>>>,
    actor: Actor,
}

/// Who mutations are attributed to.
#[derive(Clone)]
enum Actor {
    /// The member held by the device session.
    Device,
    /// A member resolved per request by the HTTP shell.
    Client(Option<Member>),
}

/// Keeps the change subscription alive. Dropping it unsubscribes.
pub struct Realtime {
    handle: JoinHandle<()>,
}

impl Drop for Realtime {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl Synchronizer {
    pub fn new(store: Arc<dyn RemoteStore>, session: Session) -> Self {
        Self::with_credentials(store, session, Arc::new(Plaintext))
    }

    pub fn with_credentials(
        store: Arc<dyn RemoteStore>,
        session: Session,
        credentials: Arc<dyn Credentials>,
    ) -> Self {
        Self {
            store,
            session,
            credentials,
            tx: Arc::new(watch::Sender::new(Arc::new(Snapshot::default()))),
            actor: Actor::Device,
        }
    }

    /// A handle over the same store and snapshot that acts as `member`
    /// instead of the device session.
    pub fn acting_as(&self, member: Option<Member>) -> Self {
        Self {
            actor: Actor::Client(member),
            ..self.clone()
        }
    }

    /// The last successfully loaded snapshot. A client handle sees its own
    /// member as `current_user`.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let snapshot = self.tx.borrow().clone();
        match &self.actor {
            Actor::Device => snapshot,
            Actor::Client(member) => Arc::new(Snapshot {
                current_user: member.clone(),
                ..(*snapshot).clone()
            }),
        }
    }

    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.tx.subscribe()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn current_member(&self) -> Option<Member> {
        match &self.actor {
            Actor::Device => self.session.current().await,
            Actor::Client(member) => member.clone(),
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, query: Query) -> SyncResult<Vec<T>> {
        let relation = query.relation;
        let rows = self.store.select(query).await?;
        decode(rows).map_err(|source| SyncError::Decode { relation, source })
    }

    /// Reads every relation concurrently and publishes the projected snapshot.
    /// Nothing is published unless every read succeeds.
    pub async fn load(&self) -> SyncResult<Arc<Snapshot>> {
        let (
            users,
            rules,
            games,
            votes,
            anonymous_posts,
            anonymous_likes,
            user_posts,
            user_reactions,
            announcement,
            availability,
            meeting_records,
        ) = tokio::try_join!(
            self.fetch(
                Query::on(Relation::Users)
                    .columns(&["id", "name", "nickname", "emoji", "is_admin"])
                    .order("id", true)
            ),
            self.fetch(Query::on(Relation::Rules).order("order_num", true)),
            self.fetch(Query::on(Relation::BalanceGames).order("created_at", false)),
            self.fetch(Query::on(Relation::BalanceVotes)),
            self.fetch(Query::on(Relation::AnonymousPosts).order("created_at", false)),
            self.fetch(Query::on(Relation::AnonymousPostLikes)),
            self.fetch(Query::on(Relation::UserPosts).order("created_at", false)),
            self.fetch(Query::on(Relation::UserPostReactions)),
            self.fetch(Query::on(Relation::Announcement).eq("id", ANNOUNCEMENT_ID).limit(1)),
            self.fetch(Query::on(Relation::Availability)),
            self.fetch(Query::on(Relation::MeetingRecords).order("created_at", true)),
        )?;

        let tables = Tables {
            users,
            rules,
            games,
            votes,
            anonymous_posts,
            anonymous_likes,
            user_posts,
            user_reactions,
            announcement,
            availability,
            meeting_records,
        };

        let current_user = self.session.current().await;
        let snapshot = Arc::new(projection::snapshot(&tables, current_user));
        self.tx.send_replace(snapshot.clone());

        debug!(
            members = snapshot.users.len(),
            rules = snapshot.rules.len(),
            "snapshot published"
        );
        Ok(snapshot)
    }

    /// Full reload. A failure is logged and the previous snapshot stays, but
    /// the loading flag is cleared either way.
    pub async fn resync(&self) {
        if let Err(e) = self.load().await {
            error!(error = %e, "failed to load data");
            self.tx.send_if_modified(|snapshot| {
                if !snapshot.loading {
                    return false;
                }
                Arc::make_mut(snapshot).loading = false;
                true
            });
        }
    }

    /// Runs one write, then reloads whatever the outcome.
    async fn mutate<T>(&self, action: &'static str, write: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        let result = write.await;
        match &result {
            Ok(_) => debug!(action, "mutation applied"),
            Err(e) => error!(action, error = %e, "mutation failed"),
        }
        self.resync().await;
        result
    }

    /// Deletes the row keyed by `key` if there is one, otherwise inserts `key`
    /// merged with `extra`. Returns whether the row exists afterwards.
    async fn toggle(&self, relation: Relation, key: Filter, extra: Row) -> SyncResult<bool> {
        let existing = self
            .store
            .maybe_single(Query::on(relation).columns(&["id"]).matching(key.clone()))
            .await?;
        if existing.is_some() {
            self.store.delete(relation, key).await?;
            return Ok(false);
        }

        let mut row = extra;
        for (column, value) in key.conditions() {
            row.insert(column.clone(), value.clone());
        }
        self.store.insert(relation, row).await?;
        Ok(true)
    }

    /// Replaces the published member without a reload.
    fn publish_current_user(&self, member: Option<Member>) {
        self.tx.send_modify(|snapshot| Arc::make_mut(snapshot).current_user = member);
    }

    /// Reloads on every change notification until the returned handle is dropped.
    pub fn spawn_realtime(&self) -> Realtime {
        let mut changes = self.store.subscribe();
        let sync = self.clone();

        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        debug!(relation = %change.relation, "change received");
                        sync.resync().await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "change stream lagged");
                        sync.resync().await;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("change stream closed");
        });

        Realtime { handle }
    }

    /// Subscribes, then performs the initial load.
    pub async fn mount(&self) -> Realtime {
        let realtime = self.spawn_realtime();
        self.resync().await;
        realtime
    }
}

/// Logs a skipped mutation. Unmet preconditions never reach the store.
fn skip(action: &'static str, reason: &'static str) -> SyncResult<()> {
    debug!(action, reason, "mutation skipped");
    Ok(())
}
