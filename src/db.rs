//! Rows as the store hands them out, in storage naming.

use serde::Deserialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, Deserialize)]
pub struct DbUser {
    pub id: i64,
    pub name: String,
    pub nickname: String,
    pub emoji: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbRule {
    pub id: i64,
    pub text: String,
    pub order_num: i64,
    pub visible: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbBalanceGame {
    pub id: i64,
    pub option_a: String,
    pub option_b: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbBalanceVote {
    pub game_id: i64,
    pub user_id: i64,
    // "A" | "B"
    pub vote: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbAnonymousPost {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbAnonymousPostLike {
    pub post_id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbUserPost {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbUserPostReaction {
    pub post_id: i64,
    pub user_id: i64,
    pub emoji: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbAnnouncement {
    pub text: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbAvailability {
    pub date: String,
    pub user_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbMeetingRecord {
    pub id: i64,
    pub meeting_number: i64,
    pub user_id: i64,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbPassword {
    pub password: String,
}
