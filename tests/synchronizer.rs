use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::json;
use smalltalk::{
    model::{ADMIN_ID, ADMIN_PASSWORD, Choice, Emoji, MEMBER_PASSWORD, MemberPatch, Snapshot},
    session::Session,
    storage::MemoryStorage,
    store::{
        Change, Filter, LocalStore, Query, Relation, RemoteStore, Row, SqliteStore, StoreError, StoreResult, row,
    },
    sync::{NewMember, PasswordChange, Synchronizer},
};
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::broadcast;

fn setup_local_store() -> Arc<LocalStore> {
    Arc::new(LocalStore::open(Arc::new(MemoryStorage::new())).unwrap())
}

fn setup_sync(store: Arc<dyn RemoteStore>) -> Synchronizer {
    Synchronizer::new(store, Session::restore(Arc::new(MemoryStorage::new())))
}

async fn logged_in(store: Arc<dyn RemoteStore>, member_id: i64) -> Synchronizer {
    let sync = setup_sync(store);
    sync.load().await.unwrap();
    assert!(sync.login(member_id).await);
    sync
}

async fn setup_sqlite_store() -> Arc<SqliteStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    Arc::new(SqliteStore::new(pool).await.unwrap())
}

/// Waits until the published snapshot satisfies `done`.
async fn published(sync: &Synchronizer, done: impl Fn(&Snapshot) -> bool) -> Arc<Snapshot> {
    let mut rx = sync.watch();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if done(&snapshot) {
                return snapshot;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("snapshot was never published")
}

#[tokio::test]
async fn first_load_clears_the_loading_flag() {
    let sync = setup_sync(setup_local_store());
    assert!(sync.snapshot().loading);

    let snapshot = sync.load().await.unwrap();

    assert!(!snapshot.loading);
    assert_eq!(snapshot.users.len(), 11);
    assert_eq!(snapshot.rules.iter().map(|r| r.order).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(snapshot.balance_game.active.as_ref().unwrap().option_a, "짜장면");
    assert!(snapshot.announcement.visible);
    assert_eq!(snapshot.tmi_posts.anonymous.len(), 2);
    assert_eq!(snapshot.tmi_posts.by_user.len(), 2);
}

#[tokio::test]
async fn availability_toggle_round_trip() {
    let sync = logged_in(setup_local_store(), 2).await;
    let before = sync.snapshot().availability.clone();

    sync.toggle_availability("2025-03-10").await.unwrap();
    assert_eq!(sync.snapshot().available_on("2025-03-10"), &[2]);

    sync.toggle_availability("2025-03-10").await.unwrap();
    assert!(sync.snapshot().available_on("2025-03-10").is_empty());
    assert_eq!(sync.snapshot().availability, before);
}

#[tokio::test]
async fn malformed_date_is_ignored() {
    let sync = logged_in(setup_local_store(), 2).await;

    sync.toggle_availability("2025-3-10").await.unwrap();

    assert!(sync.snapshot().availability.is_empty());
}

#[tokio::test]
async fn like_and_reaction_toggles_are_idempotent_pairs() {
    let sync = logged_in(setup_local_store(), 4).await;
    let before = sync.snapshot().tmi_posts.clone();

    sync.toggle_like(1).await.unwrap();
    let liked = sync.snapshot().anonymous_post(1).unwrap().clone();
    assert_eq!(liked.likes, 1);
    assert_eq!(liked.liked_by, vec![4]);

    sync.toggle_reaction(2, Emoji::Fire).await.unwrap();
    sync.toggle_reaction(2, Emoji::Heart).await.unwrap();
    let reactions = sync.snapshot().tmi_post(2).unwrap().reactions.clone();
    assert_eq!(reactions[&Emoji::Fire], vec![4]);
    assert_eq!(reactions[&Emoji::Heart], vec![3, 4]);

    sync.toggle_like(1).await.unwrap();
    sync.toggle_reaction(2, Emoji::Fire).await.unwrap();
    sync.toggle_reaction(2, Emoji::Heart).await.unwrap();
    assert_eq!(sync.snapshot().tmi_posts, before);
}

#[tokio::test]
async fn votes_toggle_and_switch() {
    let sync = logged_in(setup_local_store(), 5).await;
    let active = |sync: &Synchronizer| sync.snapshot().balance_game.active.clone().unwrap();

    sync.vote(Choice::A).await.unwrap();
    assert_eq!(active(&sync).votes_a, vec![5]);

    sync.vote(Choice::B).await.unwrap();
    assert!(active(&sync).votes_a.is_empty());
    assert_eq!(active(&sync).votes_b, vec![5]);

    sync.vote(Choice::B).await.unwrap();
    assert!(active(&sync).votes(Choice::A).is_empty());
    assert!(active(&sync).votes(Choice::B).is_empty());
}

#[tokio::test]
async fn voting_needs_a_member_and_an_active_game() {
    let store = setup_local_store();

    let anonymous = setup_sync(store.clone());
    anonymous.load().await.unwrap();
    anonymous.vote(Choice::A).await.unwrap();
    assert!(anonymous.snapshot().balance_game.active.as_ref().unwrap().votes_a.is_empty());

    let member = logged_in(store, 1).await;
    member.end_game().await.unwrap();
    member.vote(Choice::A).await.unwrap();
    let snapshot = member.snapshot();
    assert!(snapshot.balance_game.active.is_none());
    assert!(snapshot.balance_game.history[0].votes_a.is_empty());
}

#[tokio::test]
async fn starting_a_game_retires_the_running_one() {
    let sync = logged_in(setup_local_store(), ADMIN_ID).await;

    sync.start_game("피자", "치킨").await.unwrap();

    let games = sync.snapshot().balance_game.clone();
    let active = games.active.unwrap();
    assert_eq!((active.option_a.as_str(), active.option_b.as_str()), ("피자", "치킨"));
    assert!(active.ended_at.is_none());

    assert_eq!(games.history.len(), 1);
    let noodles = &games.history[0];
    assert_eq!(noodles.option_a, "짜장면");
    assert!(noodles.ended_at.unwrap() >= noodles.created_at);
}

#[tokio::test]
async fn login_with_unknown_id_keeps_the_session() {
    let sync = logged_in(setup_local_store(), 3).await;
    let fox = sync.snapshot().member(3).cloned();

    assert!(!sync.login(99).await);

    assert_eq!(sync.current_member().await, fox);
    assert_eq!(sync.snapshot().current_user, fox);
}

#[tokio::test]
async fn session_survives_reloads_and_logout_clears_it() {
    let sync = logged_in(setup_local_store(), 3).await;

    sync.load().await.unwrap();
    assert_eq!(sync.snapshot().current_user.as_ref().map(|m| m.id), Some(3));

    sync.logout().await;
    assert!(sync.snapshot().current_user.is_none());
    sync.load().await.unwrap();
    assert!(sync.snapshot().current_user.is_none());
}

#[tokio::test]
async fn password_change_replaces_the_old_password() {
    let sync = logged_in(setup_local_store(), 6).await;
    assert!(sync.verify_password(6, MEMBER_PASSWORD).await);
    assert!(sync.verify_password(ADMIN_ID, ADMIN_PASSWORD).await);
    assert!(!sync.verify_password(42, MEMBER_PASSWORD).await);

    assert_eq!(sync.change_own_password("wrong", "bunny-1").await.unwrap(), PasswordChange::WrongPassword);
    assert_eq!(sync.change_own_password(MEMBER_PASSWORD, "abc").await.unwrap(), PasswordChange::TooShort);
    assert_eq!(
        sync.change_own_password(MEMBER_PASSWORD, "bunny-1").await.unwrap(),
        PasswordChange::Changed
    );

    assert!(!sync.verify_password(6, MEMBER_PASSWORD).await);
    assert!(sync.verify_password(6, "bunny-1").await);
}

#[tokio::test]
async fn rules_append_reorder_and_hide() {
    let sync = logged_in(setup_local_store(), ADMIN_ID).await;

    sync.add_rule("지각하면 커피 사기 ☕").await.unwrap();
    let rules = sync.snapshot().rules.clone();
    assert_eq!(rules.last().map(|r| (r.id, r.order)), Some((4, 4)));

    sync.reorder_rules(&[4, 3, 2]).await.unwrap();
    assert_eq!(sync.snapshot().rules.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3, 4]);

    sync.reorder_rules(&[4, 3, 2, 1]).await.unwrap();
    assert_eq!(sync.snapshot().rules.iter().map(|r| r.id).collect::<Vec<_>>(), vec![4, 3, 2, 1]);

    sync.set_rule_visibility(4, false).await.unwrap();
    sync.update_rule(3, "울지 않기").await.unwrap();
    sync.delete_rule(1).await.unwrap();

    let rules = sync.snapshot().rules.clone();
    assert_eq!(rules.len(), 3);
    assert!(!rules[0].visible);
    assert_eq!(rules[1].text, "울지 않기");
}

#[tokio::test]
async fn incomplete_rule_order_publishes_nothing() {
    let sync = logged_in(setup_local_store(), ADMIN_ID).await;
    let rx = sync.watch();

    sync.reorder_rules(&[3, 2]).await.unwrap();
    sync.reorder_rules(&[3, 2, 1, 1]).await.unwrap();
    sync.reorder_rules(&[3, 2, 1, 9]).await.unwrap();

    assert!(!rx.has_changed().unwrap());
    assert_eq!(sync.snapshot().rules.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[tokio::test]
async fn announcement_updates_in_place() {
    let sync = logged_in(setup_local_store(), ADMIN_ID).await;

    sync.update_announcement("회비 걷습니다", false).await.unwrap();

    let snapshot = sync.snapshot();
    let announcement = &snapshot.announcement;
    assert_eq!(announcement.text, "회비 걷습니다");
    assert!(!announcement.visible);
}

#[tokio::test]
async fn anonymous_posts_are_removed_by_author_or_admin_only() {
    let store = setup_local_store();
    let stranger = logged_in(store.clone(), 2).await;
    stranger.toggle_like(1).await.unwrap();

    stranger.delete_anonymous_post(1).await.unwrap();
    assert!(stranger.snapshot().anonymous_post(1).is_some());

    let author = logged_in(store.clone(), 1).await;
    author.delete_anonymous_post(1).await.unwrap();
    assert!(author.snapshot().anonymous_post(1).is_none());

    let likes = store.select(Query::on(Relation::AnonymousPostLikes).eq("post_id", 1)).await.unwrap();
    assert!(likes.is_empty());
}

#[tokio::test]
async fn tmi_posts_are_dated_today_and_deleted_with_reactions() {
    let sync = logged_in(setup_local_store(), 7).await;

    sync.add_tmi_post("  오늘 점심은 떡볶이  ").await.unwrap();
    let post = sync.snapshot().tmi_posts.by_user[0].clone();
    assert_eq!(post.user_id, 7);
    assert_eq!(post.content, "오늘 점심은 떡볶이");
    assert!(smalltalk::sync::parse_date(&post.date).is_some());
    assert_eq!(post.reactions.len(), 4);

    sync.toggle_reaction(post.id, Emoji::Laugh).await.unwrap();
    sync.delete_tmi_post(post.id).await.unwrap();
    assert!(sync.snapshot().tmi_post(post.id).is_none());
}

#[tokio::test]
async fn meeting_records_group_per_meeting() {
    let sync = logged_in(setup_local_store(), 8).await;

    sync.add_meeting_record(1, "첫 만남 🍻").await.unwrap();
    sync.add_meeting_record(11, "없는 모임").await.unwrap();
    sync.add_meeting_record(2, "   ").await.unwrap();

    let snapshot = sync.snapshot();
    assert_eq!(snapshot.meeting_records.len(), 1);
    let grouped = snapshot.meetings_by_number();
    assert_eq!(grouped[&1].len(), 1);

    sync.delete_meeting_record(snapshot.meeting_records[0].id).await.unwrap();
    assert!(sync.snapshot().meeting_records.is_empty());
}

#[tokio::test]
async fn client_handles_act_without_touching_the_device_session() {
    let sync = logged_in(setup_local_store(), ADMIN_ID).await;
    let rabbit = sync.snapshot().member(4).cloned();

    let client = sync.acting_as(rabbit);
    client.toggle_availability("2025-05-05").await.unwrap();
    assert_eq!(client.snapshot().current_user.as_ref().map(|m| m.id), Some(4));
    assert_eq!(client.snapshot().available_on("2025-05-05"), &[4]);

    assert_eq!(sync.current_member().await.map(|m| m.id), Some(ADMIN_ID));
    assert_eq!(sync.snapshot().current_user.as_ref().map(|m| m.id), Some(ADMIN_ID));

    let anonymous = sync.acting_as(None);
    anonymous.toggle_availability("2025-05-06").await.unwrap();
    assert!(sync.snapshot().available_on("2025-05-06").is_empty());
}

#[tokio::test]
async fn member_edits_reach_the_session() {
    let store = setup_local_store();
    let member = logged_in(store.clone(), 9).await;

    let patch = MemberPatch {
        nickname: Some("늑대".into()),
        ..Default::default()
    };
    member.update_member(9, patch).await.unwrap();

    assert_eq!(member.current_member().await.unwrap().nickname, "늑대");
    assert_eq!(member.snapshot().current_user.as_ref().unwrap().nickname, "늑대");
}

#[tokio::test]
async fn members_come_and_go_but_the_admin_stays() {
    let sync = logged_in(setup_local_store(), ADMIN_ID).await;

    sync.add_member(NewMember {
        name: "사용자11".into(),
        nickname: "거북이".into(),
        emoji: "🐢".into(),
        is_admin: false,
        password: None,
    })
    .await
    .unwrap();
    let turtle = sync.snapshot().users.iter().find(|m| m.nickname == "거북이").cloned().unwrap();
    assert!(sync.verify_password(turtle.id, MEMBER_PASSWORD).await);

    sync.delete_member(turtle.id).await.unwrap();
    sync.delete_member(ADMIN_ID).await.unwrap();

    let snapshot = sync.snapshot();
    assert!(snapshot.member(turtle.id).is_none());
    assert!(snapshot.member(ADMIN_ID).is_some());
}

#[tokio::test]
async fn deleting_a_member_drops_their_marks() {
    let store = setup_local_store();
    let member = logged_in(store.clone(), 3).await;
    member.toggle_availability("2025-03-10").await.unwrap();
    member.vote(Choice::A).await.unwrap();

    let admin = logged_in(store, ADMIN_ID).await;
    admin.delete_member(3).await.unwrap();

    let snapshot = admin.snapshot();
    assert!(snapshot.available_on("2025-03-10").is_empty());
    assert!(snapshot.balance_game.active.as_ref().unwrap().votes_a.is_empty());
    assert!(snapshot.tmi_posts.anonymous.iter().all(|p| p.author_id != 3));
    assert!(snapshot.tmi_posts.by_user.iter().all(|p| !p.reactions[&Emoji::Heart].contains(&3)));
}

/// Delegates to a local store but can be told to fail every read.
struct FlakyStore {
    inner: LocalStore,
    failing: AtomicBool,
}

#[async_trait]
impl RemoteStore for FlakyStore {
    async fn select(&self, query: Query) -> StoreResult<Vec<Row>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.select(query).await
    }

    async fn insert(&self, relation: Relation, row: Row) -> StoreResult<()> {
        self.inner.insert(relation, row).await
    }

    async fn update(&self, relation: Relation, filter: Filter, changes: Row) -> StoreResult<u64> {
        self.inner.update(relation, filter, changes).await
    }

    async fn delete(&self, relation: Relation, filter: Filter) -> StoreResult<u64> {
        self.inner.delete(relation, filter).await
    }

    fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.inner.subscribe()
    }
}

#[tokio::test]
async fn failed_load_keeps_the_previous_snapshot() {
    let store = Arc::new(FlakyStore {
        inner: LocalStore::open(Arc::new(MemoryStorage::new())).unwrap(),
        failing: AtomicBool::new(false),
    });
    let sync = logged_in(store.clone(), 2).await;
    let before = sync.snapshot();

    store.failing.store(true, Ordering::SeqCst);
    assert!(sync.load().await.is_err());
    assert!(sync.toggle_availability("2025-03-10").await.is_err());

    store
        .inner
        .insert(Relation::Availability, row(json!({ "date": "2025-03-10", "user_id": 2 })))
        .await
        .unwrap();
    sync.resync().await;
    assert_eq!(sync.snapshot(), before);

    store.failing.store(false, Ordering::SeqCst);
    sync.resync().await;
    assert_eq!(sync.snapshot().available_on("2025-03-10"), &[2]);
}

#[tokio::test]
async fn failed_first_load_still_clears_the_loading_flag() {
    let store = Arc::new(FlakyStore {
        inner: LocalStore::open(Arc::new(MemoryStorage::new())).unwrap(),
        failing: AtomicBool::new(true),
    });
    let sync = setup_sync(store.clone());
    let _realtime = sync.mount().await;

    let snapshot = sync.snapshot();
    assert!(!snapshot.loading);
    assert!(snapshot.users.is_empty());

    store.failing.store(false, Ordering::SeqCst);
    sync.resync().await;
    assert_eq!(sync.snapshot().users.len(), 11);
}

#[tokio::test]
async fn other_clients_reload_on_change() {
    let store = setup_local_store();
    let watcher = setup_sync(store.clone());
    let _realtime = watcher.mount().await;
    assert!(!watcher.snapshot().loading);

    let writer = logged_in(store, 10).await;
    writer.toggle_availability("2025-04-01").await.unwrap();

    let snapshot = published(&watcher, |s| s.available_on("2025-04-01") == [10]).await;
    assert!(snapshot.current_user.is_none());
}

#[tokio::test]
async fn dropped_subscription_stops_reloading() {
    let store = setup_local_store();
    let watcher = setup_sync(store.clone());
    let realtime = watcher.mount().await;
    drop(realtime);
    tokio::task::yield_now().await;

    let writer = logged_in(store, 10).await;
    writer.toggle_availability("2025-04-01").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(watcher.snapshot().availability.is_empty());
}

#[tokio::test]
async fn sqlite_backend_round_trip() {
    let store = setup_sqlite_store().await;
    let admin = logged_in(store.clone(), ADMIN_ID).await;

    admin
        .add_member(NewMember {
            name: "사용자1".into(),
            nickname: "토끼".into(),
            emoji: "🐰".into(),
            is_admin: false,
            password: Some("carrot".into()),
        })
        .await
        .unwrap();
    admin.start_game("짜장면", "짬뽕").await.unwrap();
    admin.start_game("피자", "치킨").await.unwrap();

    let rabbit = logged_in(store, 1).await;
    assert!(rabbit.verify_password(1, "carrot").await);

    rabbit.toggle_availability("2025-03-10").await.unwrap();
    rabbit.vote(Choice::B).await.unwrap();

    let snapshot = rabbit.snapshot();
    assert_eq!(snapshot.available_on("2025-03-10"), &[1]);
    let active = snapshot.balance_game.active.as_ref().unwrap();
    assert_eq!(active.option_a, "피자");
    assert_eq!(active.votes_b, vec![1]);
    assert_eq!(snapshot.balance_game.history.len(), 1);
    assert!(snapshot.balance_game.history[0].ended_at.is_some());

    rabbit.toggle_availability("2025-03-10").await.unwrap();
    assert!(rabbit.snapshot().availability.is_empty());
}
