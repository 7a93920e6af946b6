use serde_json::json;
use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use super::{SyncResult, Synchronizer, skip};
use crate::{
    model::MEETING_COUNT,
    store::{Filter, Relation, Row, StoreResult, row},
};

const DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Accepts calendar dates written exactly as `YYYY-MM-DD`.
pub fn parse_date(date: &str) -> Option<Date> {
    Date::parse(date, DATE).ok()
}

/// The current UTC date as `YYYY-MM-DD`.
pub(super) fn today() -> StoreResult<String> {
    Ok(OffsetDateTime::now_utc().date().format(DATE)?)
}

impl Synchronizer {
    /// Marks the logged-in member available on `date`, or clears the mark.
    pub async fn toggle_availability(&self, date: &str) -> SyncResult<()> {
        const ACTION: &str = "toggle_availability";

        let Some(member) = self.current_member().await else {
            return skip(ACTION, "not logged in");
        };
        if parse_date(date).is_none() {
            return skip(ACTION, "malformed date");
        }

        self.mutate(ACTION, async {
            let key = Filter::new().eq("date", date).eq("user_id", member.id);
            self.toggle(Relation::Availability, key, Row::new()).await?;
            Ok(())
        })
        .await
    }

    pub async fn add_meeting_record(&self, meeting_number: i64, content: &str) -> SyncResult<()> {
        const ACTION: &str = "add_meeting_record";

        let Some(member) = self.current_member().await else {
            return skip(ACTION, "not logged in");
        };
        if !(1..=MEETING_COUNT).contains(&meeting_number) {
            return skip(ACTION, "no such meeting");
        }
        let content = content.trim();
        if content.is_empty() {
            return skip(ACTION, "empty content");
        }

        self.mutate(ACTION, async {
            let record = row(json!({
                "meeting_number": meeting_number,
                "user_id": member.id,
                "content": content,
            }));
            self.store.insert(Relation::MeetingRecords, record).await?;
            Ok(())
        })
        .await
    }

    /// Members delete their own records, the admin any record.
    pub async fn delete_meeting_record(&self, id: i64) -> SyncResult<()> {
        const ACTION: &str = "delete_meeting_record";

        let Some(member) = self.current_member().await else {
            return skip(ACTION, "not logged in");
        };

        self.mutate(ACTION, async {
            let mut filter = Filter::new().eq("id", id);
            if !member.is_admin {
                filter = filter.eq("user_id", member.id);
            }
            self.store.delete(Relation::MeetingRecords, filter).await?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_zero_padded_dates_parse() {
        assert!(parse_date("2025-03-10").is_some());
        assert!(parse_date("2025-02-30").is_none());
        assert!(parse_date("2025-3-10").is_none());
        assert!(parse_date("10/03/2025").is_none());
    }

    #[test]
    fn today_is_a_parseable_date() {
        assert!(parse_date(&today().unwrap()).is_some());
    }
}
