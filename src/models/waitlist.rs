//! Waitlist (ordered queue of users wanting an unavailable book)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::book::BookSummary;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Waitlist {
    pub id: Uuid,
    pub book_id: Uuid,
    /// Queued users, oldest first
    pub waiting_list: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Waitlist {
    pub fn contains(&self, user_id: Uuid) -> bool {
        self.waiting_list.contains(&user_id)
    }

    /// 1-based queue position of a user
    pub fn position_of(&self, user_id: Uuid) -> Option<usize> {
        self.waiting_list
            .iter()
            .position(|id| *id == user_id)
            .map(|i| i + 1)
    }
}

/// Waitlist with its book populated
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WaitlistDetails {
    pub id: Uuid,
    pub book: BookSummary,
    pub waiting_list: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct WaitlistDetailsRow {
    id: Uuid,
    waiting_list: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    book_uuid: Uuid,
    book_number: i32,
    book_title: String,
    book_author: String,
    book_cover_img: String,
}

impl From<WaitlistDetailsRow> for WaitlistDetails {
    fn from(row: WaitlistDetailsRow) -> Self {
        WaitlistDetails {
            id: row.id,
            book: BookSummary {
                id: row.book_uuid,
                book_id: row.book_number,
                title: row.book_title,
                author: row.book_author,
                cover_img: row.book_cover_img,
            },
            waiting_list: row.waiting_list,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Outcome of removing a user from a book's waitlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WaitlistRemoval {
    /// The user was dequeued; `remaining` users are still waiting
    Removed { remaining: usize },
    /// A waitlist exists but the user was not on it
    NotQueued,
    /// The book has no waitlist
    NoWaitlist,
}

impl WaitlistRemoval {
    pub fn removed(&self) -> bool {
        matches!(self, WaitlistRemoval::Removed { .. })
    }

    pub fn remaining(&self) -> Option<usize> {
        match self {
            WaitlistRemoval::Removed { remaining } => Some(*remaining),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct WaitlistQuery {
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct WaitlistRequest {
    pub book: Uuid,
}

/// Recipients and subject of a "book is back" notice
#[derive(Debug, Clone)]
pub struct AvailabilityNotice {
    pub book_title: String,
    pub recipients: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_positions() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let waitlist = Waitlist {
            id: Uuid::new_v4(),
            book_id: Uuid::new_v4(),
            waiting_list: vec![a, b],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(waitlist.position_of(a), Some(1));
        assert_eq!(waitlist.position_of(b), Some(2));
        assert_eq!(waitlist.position_of(c), None);
        assert!(waitlist.contains(b));
    }

    #[test]
    fn test_removal_serialization() {
        let json = serde_json::to_value(WaitlistRemoval::Removed { remaining: 2 }).unwrap();
        assert_eq!(json["outcome"], "removed");
        assert_eq!(json["remaining"], 2);
        assert_eq!(
            serde_json::to_value(WaitlistRemoval::NoWaitlist).unwrap()["outcome"],
            "no_waitlist"
        );
        assert!(!WaitlistRemoval::NotQueued.removed());
    }
}
