//! Folding flat rows into the nested view models. Pure functions, one per
//! entity, so each can be checked without a store.

use std::collections::BTreeMap;

use crate::{
    db::*,
    model::{
        Announcement, AnonymousPost, BalanceGame, BalanceGames, Choice, Emoji, MeetingRecord, Member,
        Reactions, Rule, Snapshot, TmiPost, TmiPosts,
    },
};

/// One load's worth of rows, every relation read in the same pass.
#[derive(Debug, Default, Clone)]
pub struct Tables {
    pub users: Vec<DbUser>,
    pub rules: Vec<DbRule>,
    pub games: Vec<DbBalanceGame>,
    pub votes: Vec<DbBalanceVote>,
    pub anonymous_posts: Vec<DbAnonymousPost>,
    pub anonymous_likes: Vec<DbAnonymousPostLike>,
    pub user_posts: Vec<DbUserPost>,
    pub user_reactions: Vec<DbUserPostReaction>,
    pub announcement: Vec<DbAnnouncement>,
    pub availability: Vec<DbAvailability>,
    pub meeting_records: Vec<DbMeetingRecord>,
}

pub fn members(rows: &[DbUser]) -> Vec<Member> {
    rows.iter()
        .map(|u| Member {
            id: u.id,
            name: u.name.clone(),
            nickname: u.nickname.clone(),
            emoji: u.emoji.clone(),
            is_admin: u.is_admin,
        })
        .collect()
}

pub fn rules(rows: &[DbRule]) -> Vec<Rule> {
    rows.iter()
        .map(|r| Rule {
            id: r.id,
            text: r.text.clone(),
            order: r.order_num,
            visible: r.visible,
        })
        .collect()
}

fn voters(votes: &[DbBalanceVote], game_id: i64, choice: Choice) -> Vec<i64> {
    votes
        .iter()
        .filter(|v| v.game_id == game_id && v.vote == choice.as_str())
        .map(|v| v.user_id)
        .collect()
}

fn balance_game(game: &DbBalanceGame, votes: &[DbBalanceVote]) -> BalanceGame {
    BalanceGame {
        id: game.id,
        option_a: game.option_a.clone(),
        option_b: game.option_b.clone(),
        votes_a: voters(votes, game.id, Choice::A),
        votes_b: voters(votes, game.id, Choice::B),
        created_at: game.created_at,
        ended_at: game.ended_at,
    }
}

/// The first active game becomes `active`, every other game is history.
pub fn balance_games(games: &[DbBalanceGame], votes: &[DbBalanceVote]) -> BalanceGames {
    let active = games.iter().find(|g| g.is_active);

    BalanceGames {
        active: active.map(|g| balance_game(g, votes)),
        history: games
            .iter()
            .filter(|g| Some(g.id) != active.map(|a| a.id))
            .map(|g| balance_game(g, votes))
            .collect(),
    }
}

pub fn anonymous_posts(posts: &[DbAnonymousPost], likes: &[DbAnonymousPostLike]) -> Vec<AnonymousPost> {
    posts
        .iter()
        .map(|p| {
            let liked_by: Vec<i64> = likes
                .iter()
                .filter(|l| l.post_id == p.id)
                .map(|l| l.user_id)
                .collect();
            AnonymousPost {
                id: p.id,
                content: p.content.clone(),
                timestamp: p.created_at,
                likes: liked_by.len(),
                liked_by,
                author_id: p.author_id,
            }
        })
        .collect()
}

/// Always all four emoji keys; reactions with any other symbol are dropped.
pub fn reactions(post_id: i64, rows: &[DbUserPostReaction]) -> Reactions {
    Emoji::ALL
        .into_iter()
        .map(|emoji| {
            let members = rows
                .iter()
                .filter(|r| r.post_id == post_id && r.emoji == emoji.as_str())
                .map(|r| r.user_id)
                .collect();
            (emoji, members)
        })
        .collect()
}

pub fn tmi_posts(posts: &[DbUserPost], rows: &[DbUserPostReaction]) -> Vec<TmiPost> {
    posts
        .iter()
        .map(|p| TmiPost {
            id: p.id,
            user_id: p.user_id,
            content: p.content.clone(),
            date: p.date.clone(),
            reactions: reactions(p.id, rows),
        })
        .collect()
}

pub fn availability(rows: &[DbAvailability]) -> BTreeMap<String, Vec<i64>> {
    rows.iter().fold(BTreeMap::new(), |mut by_date, row| {
        by_date
            .entry(row.date.clone())
            .or_insert_with(Vec::new)
            .push(row.user_id);
        by_date
    })
}

pub fn announcement(rows: &[DbAnnouncement]) -> Announcement {
    rows.first()
        .map(|a| Announcement {
            text: a.text.clone(),
            visible: a.visible,
        })
        .unwrap_or_default()
}

pub fn meeting_records(rows: &[DbMeetingRecord]) -> Vec<MeetingRecord> {
    rows.iter()
        .map(|r| MeetingRecord {
            id: r.id,
            meeting_number: r.meeting_number,
            user_id: r.user_id,
            content: r.content.clone(),
            created_at: r.created_at,
        })
        .collect()
}

/// The whole published snapshot. `current_user` is session state and is passed through untouched.
pub fn snapshot(tables: &Tables, current_user: Option<Member>) -> Snapshot {
    Snapshot {
        loading: false,
        users: members(&tables.users),
        current_user,
        availability: availability(&tables.availability),
        rules: rules(&tables.rules),
        balance_game: balance_games(&tables.games, &tables.votes),
        tmi_posts: TmiPosts {
            anonymous: anonymous_posts(&tables.anonymous_posts, &tables.anonymous_likes),
            by_user: tmi_posts(&tables.user_posts, &tables.user_reactions),
        },
        meeting_records: meeting_records(&tables.meeting_records),
        announcement: announcement(&tables.announcement),
    }
}
