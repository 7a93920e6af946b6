//! The view models published to the front end.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::store::Row;

/// Member id of the built-in administrator account.
pub const ADMIN_ID: i64 = 0;

// Seed passwords of the offline data set. Newly added members start with the member one.
pub const ADMIN_PASSWORD: &str = "950520";
pub const MEMBER_PASSWORD: &str = "0520";

pub const MEETING_COUNT: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub nickname: String,
    pub emoji: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPatch {
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub emoji: Option<String>,
    pub is_admin: Option<bool>,
}

impl MemberPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.nickname.is_none() && self.emoji.is_none() && self.is_admin.is_none()
    }

    pub fn apply(&self, member: &mut Member) {
        if let Some(name) = &self.name {
            member.name = name.clone();
        }
        if let Some(nickname) = &self.nickname {
            member.nickname = nickname.clone();
        }
        if let Some(emoji) = &self.emoji {
            member.emoji = emoji.clone();
        }
        if let Some(is_admin) = self.is_admin {
            member.is_admin = is_admin;
        }
    }

    /// The storage-named columns this patch touches.
    pub fn to_row(&self) -> Row {
        let mut changes = Row::new();
        if let Some(name) = &self.name {
            changes.insert("name".into(), Value::from(name.as_str()));
        }
        if let Some(nickname) = &self.nickname {
            changes.insert("nickname".into(), Value::from(nickname.as_str()));
        }
        if let Some(emoji) = &self.emoji {
            changes.insert("emoji".into(), Value::from(emoji.as_str()));
        }
        if let Some(is_admin) = self.is_admin {
            changes.insert("is_admin".into(), Value::from(is_admin));
        }
        changes
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub id: i64,
    pub text: String,
    pub order: i64,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    A,
    B,
}

impl Choice {
    pub fn as_str(self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
        }
    }
}

impl FromStr for Choice {
    type Err = UnknownSymbol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Choice::A),
            "B" => Ok(Choice::B),
            _ => Err(UnknownSymbol(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceGame {
    pub id: i64,
    pub option_a: String,
    pub option_b: String,
    pub votes_a: Vec<i64>,
    pub votes_b: Vec<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<OffsetDateTime>,
}

impl BalanceGame {
    pub fn votes(&self, choice: Choice) -> &[i64] {
        match choice {
            Choice::A => &self.votes_a,
            Choice::B => &self.votes_b,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceGames {
    pub active: Option<BalanceGame>,
    pub history: Vec<BalanceGame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousPost {
    pub id: i64,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub likes: usize,
    pub liked_by: Vec<i64>,
    // kept for moderation, never shown next to the post
    pub author_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Emoji {
    #[serde(rename = "👍")]
    ThumbsUp,
    #[serde(rename = "🔥")]
    Fire,
    #[serde(rename = "😂")]
    Laugh,
    #[serde(rename = "❤️")]
    Heart,
}

impl Emoji {
    pub const ALL: [Emoji; 4] = [Emoji::ThumbsUp, Emoji::Fire, Emoji::Laugh, Emoji::Heart];

    pub fn as_str(self) -> &'static str {
        match self {
            Emoji::ThumbsUp => "👍",
            Emoji::Fire => "🔥",
            Emoji::Laugh => "😂",
            Emoji::Heart => "❤️",
        }
    }
}

impl fmt::Display for Emoji {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emoji {
    type Err = UnknownSymbol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Emoji::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownSymbol(s.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSymbol(pub String);

impl fmt::Display for UnknownSymbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown symbol {:?}", self.0)
    }
}

impl std::error::Error for UnknownSymbol {}

pub type Reactions = BTreeMap<Emoji, Vec<i64>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmiPost {
    pub id: i64,
    pub user_id: i64,
    pub content: String,
    pub date: String,
    pub reactions: Reactions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmiPosts {
    pub anonymous: Vec<AnonymousPost>,
    pub by_user: Vec<TmiPost>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub text: String,
    pub visible: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingRecord {
    pub id: i64,
    pub meeting_number: i64,
    pub user_id: i64,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Everything the front end renders, rebuilt from scratch on every load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub loading: bool,
    pub users: Vec<Member>,
    pub current_user: Option<Member>,
    pub availability: BTreeMap<String, Vec<i64>>,
    pub rules: Vec<Rule>,
    pub balance_game: BalanceGames,
    pub tmi_posts: TmiPosts,
    pub meeting_records: Vec<MeetingRecord>,
    pub announcement: Announcement,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            loading: true,
            users: Vec::new(),
            current_user: None,
            availability: BTreeMap::new(),
            rules: Vec::new(),
            balance_game: BalanceGames::default(),
            tmi_posts: TmiPosts::default(),
            meeting_records: Vec::new(),
            announcement: Announcement::default(),
        }
    }
}

impl Snapshot {
    pub fn member(&self, id: i64) -> Option<&Member> {
        self.users.iter().find(|m| m.id == id)
    }

    pub fn available_on(&self, date: &str) -> &[i64] {
        self.availability.get(date).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn anonymous_post(&self, id: i64) -> Option<&AnonymousPost> {
        self.tmi_posts.anonymous.iter().find(|p| p.id == id)
    }

    pub fn tmi_post(&self, id: i64) -> Option<&TmiPost> {
        self.tmi_posts.by_user.iter().find(|p| p.id == id)
    }

    /// Records of every meeting number, oldest first.
    pub fn meetings_by_number(&self) -> BTreeMap<i64, Vec<&MeetingRecord>> {
        let mut grouped: BTreeMap<i64, Vec<&MeetingRecord>> =
            (1..=MEETING_COUNT).map(|n| (n, Vec::new())).collect();
        for record in &self.meeting_records {
            grouped.entry(record.meeting_number).or_default().push(record);
        }
        for records in grouped.values_mut() {
            records.sort_by_key(|r| r.created_at);
        }
        grouped
    }
}
