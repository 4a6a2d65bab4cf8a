// ── Borrow record domain types ──
//
// A loan is open while `return_date` is unset. Status and due-state are
// derived at read time against a caller-supplied "now", so the same
// record can be evaluated deterministically in tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::book::Book;
use super::entity_id::EntityId;
use super::member::Member;

/// Days before the due date at which a loan counts as "due soon".
pub const DUE_SOON_DAYS: i64 = 2;

/// One borrow event, with denormalized book and member snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowRecord {
    pub id: EntityId,
    pub book_id: EntityId,
    pub member_id: EntityId,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,

    /// Book row at load time; `None` if the book no longer exists.
    pub book: Option<Book>,
    /// Member row at load time; `None` if the member no longer exists.
    pub member: Option<Member>,
}

/// Lifecycle state of a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Overdue,
    Returned,
}

/// Urgency of an open loan relative to its due date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DueState {
    /// More than [`DUE_SOON_DAYS`] whole days remain.
    OnTime { days_remaining: i64 },
    /// Due within [`DUE_SOON_DAYS`] whole days and not yet past due.
    ///
    /// A loan less than one day past due is `Overdue`, not `DueSoon`,
    /// even though its whole-day difference is still zero. Member
    /// dashboards therefore count it as overdue only.
    DueSoon { days_remaining: i64 },
    /// Past the due date.
    Overdue { days_overdue: i64 },
}

impl DueState {
    /// Human text: `"3 days remaining"`, `"1 day overdue"`.
    pub fn describe(&self) -> String {
        match *self {
            Self::OnTime { days_remaining } | Self::DueSoon { days_remaining } => {
                format!("{} remaining", plural_days(days_remaining))
            }
            Self::Overdue { days_overdue } => format!("{} overdue", plural_days(days_overdue)),
        }
    }

    pub fn is_overdue(&self) -> bool {
        matches!(self, Self::Overdue { .. })
    }
}

fn plural_days(n: i64) -> String {
    if n == 1 {
        "1 day".into()
    } else {
        format!("{n} days")
    }
}

impl BorrowRecord {
    /// `true` until the book has been returned.
    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }

    /// Whole days from `now` until the due date; negative once past due.
    /// Partial days truncate toward zero.
    pub fn days_until_due(&self, now: DateTime<Utc>) -> i64 {
        (self.due_date - now).num_days()
    }

    pub fn status_at(&self, now: DateTime<Utc>) -> LoanStatus {
        if self.return_date.is_some() {
            LoanStatus::Returned
        } else if now > self.due_date {
            LoanStatus::Overdue
        } else {
            LoanStatus::Active
        }
    }

    pub fn status(&self) -> LoanStatus {
        self.status_at(Utc::now())
    }

    /// Due-state of an open loan; `None` once returned.
    pub fn due_state_at(&self, now: DateTime<Utc>) -> Option<DueState> {
        if !self.is_open() {
            return None;
        }
        let days = self.days_until_due(now);
        Some(if now > self.due_date {
            DueState::Overdue {
                days_overdue: days.abs(),
            }
        } else if days <= DUE_SOON_DAYS {
            DueState::DueSoon {
                days_remaining: days,
            }
        } else {
            DueState::OnTime {
                days_remaining: days,
            }
        })
    }

    /// Title of the borrowed book, if the snapshot is present.
    pub fn book_title(&self) -> Option<&str> {
        self.book.as_ref().map(|b| b.title.as_str())
    }

    /// Name of the borrower, if the snapshot is present.
    pub fn member_name(&self) -> Option<&str> {
        self.member.as_ref().map(|m| m.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn record(due_in: Duration, returned: bool) -> (BorrowRecord, DateTime<Utc>) {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).single().expect("valid date");
        let rec = BorrowRecord {
            id: EntityId::from("r-1"),
            book_id: EntityId::from("b-1"),
            member_id: EntityId::from("m-1"),
            issue_date: now - Duration::days(7),
            due_date: now + due_in,
            return_date: returned.then_some(now),
            book: None,
            member: None,
        };
        (rec, now)
    }

    #[test]
    fn open_loan_before_due_is_active() {
        let (rec, now) = record(Duration::days(5), false);
        assert_eq!(rec.status_at(now), LoanStatus::Active);
        assert_eq!(
            rec.due_state_at(now),
            Some(DueState::OnTime { days_remaining: 5 })
        );
    }

    #[test]
    fn open_loan_past_due_is_overdue() {
        let (rec, now) = record(-Duration::days(3), false);
        assert_eq!(rec.status_at(now), LoanStatus::Overdue);
        let state = rec.due_state_at(now).expect("open loan");
        assert_eq!(state, DueState::Overdue { days_overdue: 3 });
        assert_eq!(state.describe(), "3 days overdue");
    }

    #[test]
    fn returned_loan_has_no_due_state() {
        let (rec, now) = record(-Duration::days(3), true);
        assert_eq!(rec.status_at(now), LoanStatus::Returned);
        assert_eq!(rec.due_state_at(now), None);
    }

    #[test]
    fn loans_due_within_two_days_are_due_soon() {
        let (rec, now) = record(Duration::days(2) + Duration::hours(3), false);
        assert_eq!(
            rec.due_state_at(now),
            Some(DueState::DueSoon { days_remaining: 2 })
        );
        let (rec, now) = record(Duration::hours(5), false);
        let state = rec.due_state_at(now).expect("open loan");
        assert_eq!(state, DueState::DueSoon { days_remaining: 0 });
        assert_eq!(state.describe(), "0 days remaining");
    }

    #[test]
    fn hours_past_due_still_count_as_overdue() {
        let (rec, now) = record(-Duration::hours(4), false);
        assert_eq!(rec.status_at(now), LoanStatus::Overdue);
        assert_eq!(
            rec.due_state_at(now),
            Some(DueState::Overdue { days_overdue: 0 })
        );
    }

    #[test]
    fn singular_day_text() {
        assert_eq!(
            DueState::OnTime { days_remaining: 1 }.describe(),
            "1 day remaining"
        );
        assert_eq!(
            DueState::Overdue { days_overdue: 1 }.describe(),
            "1 day overdue"
        );
    }

    #[test]
    fn loan_status_parses_case_insensitively() {
        assert_eq!("Overdue".parse::<LoanStatus>().ok(), Some(LoanStatus::Overdue));
        assert_eq!(LoanStatus::Returned.to_string(), "returned");
    }
}
