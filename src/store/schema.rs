use serde_json::Value;
use time::{OffsetDateTime, UtcOffset, format_description::BorrowedFormatItem, macros::format_description};
use uuid::Uuid;

use crate::model::MEMBER_PASSWORD;

use super::{Relation, Row, StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Int,
    Text,
    Bool,
}

/// What a store puts in a column the insert left out.
#[derive(Debug, Clone, Copy)]
pub enum Fill {
    Required,
    Null,
    AutoId,
    Uuid,
    Now,
    Bool(bool),
    Int(i64),
    Text(&'static str),
}

#[derive(Debug)]
pub struct Column {
    pub name: &'static str,
    pub kind: Kind,
    pub fill: Fill,
}

#[derive(Debug)]
pub struct Table {
    pub columns: &'static [Column],
    // at most one unique key per relation besides the primary key
    pub unique: &'static [&'static str],
}

const fn int(name: &'static str, fill: Fill) -> Column {
    Column { name, kind: Kind::Int, fill }
}

const fn text(name: &'static str, fill: Fill) -> Column {
    Column { name, kind: Kind::Text, fill }
}

const fn flag(name: &'static str, fill: Fill) -> Column {
    Column { name, kind: Kind::Bool, fill }
}

static USERS: Table = Table {
    columns: &[
        int("id", Fill::AutoId),
        text("name", Fill::Required),
        text("nickname", Fill::Required),
        text("emoji", Fill::Required),
        flag("is_admin", Fill::Bool(false)),
        text("password", Fill::Text(MEMBER_PASSWORD)),
    ],
    unique: &[],
};

static RULES: Table = Table {
    columns: &[
        int("id", Fill::AutoId),
        text("text", Fill::Required),
        int("order_num", Fill::Int(0)),
        flag("visible", Fill::Bool(true)),
        text("created_at", Fill::Now),
    ],
    unique: &[],
};

static BALANCE_GAMES: Table = Table {
    columns: &[
        int("id", Fill::AutoId),
        text("option_a", Fill::Required),
        text("option_b", Fill::Required),
        flag("is_active", Fill::Bool(true)),
        text("created_at", Fill::Now),
        text("ended_at", Fill::Null),
    ],
    unique: &[],
};

static BALANCE_VOTES: Table = Table {
    columns: &[
        text("id", Fill::Uuid),
        int("game_id", Fill::Required),
        int("user_id", Fill::Required),
        text("vote", Fill::Required),
        text("created_at", Fill::Now),
    ],
    unique: &["game_id", "user_id"],
};

static ANONYMOUS_POSTS: Table = Table {
    columns: &[
        int("id", Fill::AutoId),
        text("content", Fill::Required),
        int("author_id", Fill::Required),
        text("created_at", Fill::Now),
    ],
    unique: &[],
};

static ANONYMOUS_POST_LIKES: Table = Table {
    columns: &[
        text("id", Fill::Uuid),
        int("post_id", Fill::Required),
        int("user_id", Fill::Required),
        text("created_at", Fill::Now),
    ],
    unique: &["post_id", "user_id"],
};

static USER_POSTS: Table = Table {
    columns: &[
        int("id", Fill::AutoId),
        int("user_id", Fill::Required),
        text("content", Fill::Required),
        text("date", Fill::Required),
        text("created_at", Fill::Now),
    ],
    unique: &[],
};

static USER_POST_REACTIONS: Table = Table {
    columns: &[
        text("id", Fill::Uuid),
        int("post_id", Fill::Required),
        int("user_id", Fill::Required),
        text("emoji", Fill::Required),
        text("created_at", Fill::Now),
    ],
    unique: &["post_id", "user_id", "emoji"],
};

static ANNOUNCEMENT: Table = Table {
    columns: &[
        int("id", Fill::AutoId),
        text("text", Fill::Text("")),
        flag("visible", Fill::Bool(false)),
        text("updated_at", Fill::Now),
    ],
    unique: &[],
};

static AVAILABILITY: Table = Table {
    columns: &[
        text("id", Fill::Uuid),
        text("date", Fill::Required),
        int("user_id", Fill::Required),
        text("created_at", Fill::Now),
    ],
    unique: &["date", "user_id"],
};

static MEETING_RECORDS: Table = Table {
    columns: &[
        int("id", Fill::AutoId),
        int("meeting_number", Fill::Required),
        int("user_id", Fill::Required),
        text("content", Fill::Required),
        text("created_at", Fill::Now),
    ],
    unique: &[],
};

impl Relation {
    pub fn schema(self) -> &'static Table {
        match self {
            Relation::Users => &USERS,
            Relation::Rules => &RULES,
            Relation::BalanceGames => &BALANCE_GAMES,
            Relation::BalanceVotes => &BALANCE_VOTES,
            Relation::AnonymousPosts => &ANONYMOUS_POSTS,
            Relation::AnonymousPostLikes => &ANONYMOUS_POST_LIKES,
            Relation::UserPosts => &USER_POSTS,
            Relation::UserPostReactions => &USER_POST_REACTIONS,
            Relation::Announcement => &ANNOUNCEMENT,
            Relation::Availability => &AVAILABILITY,
            Relation::MeetingRecords => &MEETING_RECORDS,
        }
    }
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&'static Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub fn column(relation: Relation, name: &str) -> StoreResult<&'static Column> {
    relation
        .schema()
        .column(name)
        .ok_or_else(|| StoreError::UnknownColumn { relation, column: name.to_owned() })
}

// RFC 3339 with a fixed number of fraction digits, so text order is time order
const TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z");

pub fn timestamp(at: OffsetDateTime) -> StoreResult<String> {
    Ok(at.to_offset(UtcOffset::UTC).format(TIMESTAMP)?)
}

pub fn now_rfc3339() -> StoreResult<String> {
    timestamp(OffsetDateTime::now_utc())
}

/// Validates the column names of `row` and fills in every default the relation declares.
/// Auto-increment ids are left for the backend to assign.
pub fn prepare_insert(relation: Relation, mut row: Row) -> StoreResult<Row> {
    for name in row.keys() {
        column(relation, name)?;
    }

    for column in relation.schema().columns {
        if row.contains_key(column.name) {
            continue;
        }
        let value = match column.fill {
            Fill::Required => {
                return Err(StoreError::MissingColumn { relation, column: column.name });
            }
            Fill::AutoId => continue,
            Fill::Null => Value::Null,
            Fill::Uuid => Value::from(Uuid::now_v7().to_string()),
            Fill::Now => Value::from(now_rfc3339()?),
            Fill::Bool(b) => Value::from(b),
            Fill::Int(i) => Value::from(i),
            Fill::Text(s) => Value::from(s),
        };
        row.insert(column.name.to_owned(), value);
    }

    Ok(row)
}
