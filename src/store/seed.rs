use std::collections::BTreeMap;

use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};

use crate::model::{ADMIN_ID, ADMIN_PASSWORD, MEMBER_PASSWORD};

use super::{Relation, Row, StoreResult, row, schema};

const MEMBERS: [(&str, &str, &str); 10] = [
    ("사용자1", "토끼", "🐰"),
    ("사용자2", "곰돌이", "🐻"),
    ("사용자3", "여우", "🦊"),
    ("사용자4", "냥이", "🐱"),
    ("사용자5", "멍멍이", "🐶"),
    ("사용자6", "판다", "🐼"),
    ("사용자7", "사자", "🦁"),
    ("사용자8", "호랑이", "🐯"),
    ("사용자9", "코알라", "🐨"),
    ("사용자10", "개구리", "🐸"),
];

pub(super) fn admin_row() -> Row {
    row(json!({
        "id": ADMIN_ID,
        "name": "관리자",
        "nickname": "이끄는 이",
        "emoji": "👑",
        "is_admin": true,
        "password": ADMIN_PASSWORD,
    }))
}

fn hours_ago(hours: i64) -> StoreResult<String> {
    schema::timestamp(OffsetDateTime::now_utc() - Duration::hours(hours))
}

fn insert(tables: &mut BTreeMap<Relation, Vec<Row>>, relation: Relation, value: Value) -> StoreResult<()> {
    let prepared = schema::prepare_insert(relation, row(value))?;
    tables.entry(relation).or_default().push(prepared);
    Ok(())
}

/// The data set a fresh offline install starts from.
pub(super) fn initial_tables() -> StoreResult<BTreeMap<Relation, Vec<Row>>> {
    let mut tables: BTreeMap<Relation, Vec<Row>> =
        Relation::ALL.into_iter().map(|r| (r, Vec::new())).collect();

    insert(&mut tables, Relation::Users, Value::Object(admin_row()))?;
    for (id, (name, nickname, emoji)) in (1..).zip(MEMBERS) {
        insert(
            &mut tables,
            Relation::Users,
            json!({
                "id": id,
                "name": name,
                "nickname": nickname,
                "emoji": emoji,
                "password": MEMBER_PASSWORD,
            }),
        )?;
    }

    for (id, text) in (1..).zip(["야, 너 금지 ❌", "닉네임 뒤에 님 붙이기 ✨", "울기 없기 😤"]) {
        insert(&mut tables, Relation::Rules, json!({ "id": id, "text": text, "order_num": id }))?;
    }

    insert(
        &mut tables,
        Relation::BalanceGames,
        json!({ "id": 1, "option_a": "짜장면", "option_b": "짬뽕" }),
    )?;

    insert(
        &mut tables,
        Relation::AnonymousPosts,
        json!({
            "id": 1,
            "content": "오늘 점심 너무 맛있었다 ㅠㅠ 떡볶이 최고...",
            "author_id": 1,
            "created_at": hours_ago(3)?,
        }),
    )?;
    insert(
        &mut tables,
        Relation::AnonymousPosts,
        json!({
            "id": 2,
            "content": "요즘 넷플릭스 뭐 볼게 없음... 추천 좀 해주세요 🙏",
            "author_id": 3,
            "created_at": hours_ago(5)?,
        }),
    )?;

    insert(
        &mut tables,
        Relation::UserPosts,
        json!({
            "id": 1,
            "user_id": 1,
            "content": "오늘 카페에서 공부했는데 너무 집중 잘됐어!",
            "date": "2025-01-28",
        }),
    )?;
    insert(
        &mut tables,
        Relation::UserPosts,
        json!({
            "id": 2,
            "user_id": 2,
            "content": "주말에 등산 갔다왔는데 날씨가 너무 좋았어 ☀️",
            "date": "2025-01-27",
        }),
    )?;
    insert(&mut tables, Relation::UserPostReactions, json!({ "post_id": 2, "user_id": 1, "emoji": "👍" }))?;
    insert(&mut tables, Relation::UserPostReactions, json!({ "post_id": 2, "user_id": 3, "emoji": "❤️" }))?;

    insert(
        &mut tables,
        Relation::Announcement,
        json!({ "id": 1, "text": "이번 주 토요일 정모 있습니다! 🎉", "visible": true }),
    )?;

    Ok(tables)
}
