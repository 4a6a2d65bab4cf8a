// ── Derived read-only views ──
//
// Pure functions over store snapshots. Nothing here touches the data
// service; callers pass "now" so results are reproducible.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Book, BorrowRecord, DueState, LoanStatus, Member};

/// Headline numbers for the whole library.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryStats {
    pub total_books: usize,
    pub available_books: usize,
    pub borrowed_books: usize,
    pub total_members: usize,
    pub active_loans: usize,
    pub overdue_loans: usize,
    /// Share of the catalog out on loan, rounded to a whole percent.
    pub utilization_percent: usize,
    /// Catalog size per member; a library with no members counts as one.
    pub books_per_member: f64,
}

impl LibraryStats {
    pub fn compute(
        books: &[Arc<Book>],
        member_count: usize,
        records: &[Arc<BorrowRecord>],
        now: DateTime<Utc>,
    ) -> Self {
        let total_books = books.len();
        let available_books = books.iter().filter(|b| b.available).count();
        let borrowed_books = total_books - available_books;

        let mut active_loans = 0;
        let mut overdue_loans = 0;
        for record in records {
            match record.status_at(now) {
                LoanStatus::Active => active_loans += 1,
                LoanStatus::Overdue => {
                    active_loans += 1;
                    overdue_loans += 1;
                }
                LoanStatus::Returned => {}
            }
        }

        let utilization_percent = if total_books == 0 {
            0
        } else {
            (borrowed_books * 100 + total_books / 2) / total_books
        };

        Self {
            total_books,
            available_books,
            borrowed_books,
            total_members: member_count,
            active_loans,
            overdue_loans,
            utilization_percent,
            books_per_member: ratio(total_books, member_count.max(1)),
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    let to_f64 = |n: usize| f64::from(u32::try_from(n).unwrap_or(u32::MAX));
    to_f64(numerator) / to_f64(denominator)
}

/// One open loan with its urgency.
#[derive(Debug, Clone, Serialize)]
pub struct OpenLoan {
    pub record: Arc<BorrowRecord>,
    pub due: DueState,
}

/// A member's current borrowing picture.
#[derive(Debug, Clone, Serialize)]
pub struct MemberDashboard {
    pub member: Arc<Member>,
    /// Open loans, soonest due first.
    pub open_loans: Vec<OpenLoan>,
    pub due_soon: usize,
    pub overdue: usize,
    /// Loans already returned.
    pub history: usize,
}

impl MemberDashboard {
    pub fn build(member: Arc<Member>, records: &[Arc<BorrowRecord>], now: DateTime<Utc>) -> Self {
        let mut open_loans = Vec::new();
        let mut history = 0;
        for record in records.iter().filter(|r| r.member_id == member.id) {
            match record.due_state_at(now) {
                Some(due) => open_loans.push(OpenLoan {
                    record: Arc::clone(record),
                    due,
                }),
                None => history += 1,
            }
        }
        open_loans.sort_by_key(|l| l.record.due_date);

        let due_soon = open_loans
            .iter()
            .filter(|l| matches!(l.due, DueState::DueSoon { .. }))
            .count();
        let overdue = open_loans.iter().filter(|l| l.due.is_overdue()).count();

        Self {
            member,
            open_loans,
            due_soon,
            overdue,
            history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityId;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn book(id: &str, available: bool) -> Arc<Book> {
        Arc::new(Book {
            id: EntityId::from(id),
            title: id.into(),
            author: "Anon".into(),
            category: "Misc".into(),
            category_ref: None,
            available,
            isbn: None,
            published_year: None,
            description: None,
        })
    }

    fn loan(member: &str, due_in: Duration, returned: bool, now: DateTime<Utc>) -> Arc<BorrowRecord> {
        Arc::new(BorrowRecord {
            id: EntityId::new_v4(),
            book_id: EntityId::from("b"),
            member_id: EntityId::from(member),
            issue_date: now - Duration::days(10),
            due_date: now + due_in,
            return_date: returned.then_some(now),
            book: None,
            member: None,
        })
    }

    #[test]
    fn stats_round_utilization_half_up() {
        let now = Utc::now();
        let books = vec![book("a", false), book("b", true), book("c", true)];
        let stats = LibraryStats::compute(&books, 2, &[], now);
        assert_eq!(stats.borrowed_books, 1);
        assert_eq!(stats.utilization_percent, 33);
        assert!((stats.books_per_member - 1.5).abs() < f64::EPSILON);

        let books = vec![book("a", false), book("b", true)];
        assert_eq!(LibraryStats::compute(&books, 0, &[], now).utilization_percent, 50);
    }

    #[test]
    fn empty_library_has_zero_utilization() {
        let stats = LibraryStats::compute(&[], 0, &[], Utc::now());
        assert_eq!(stats.utilization_percent, 0);
        assert!(stats.books_per_member.abs() < f64::EPSILON);
    }

    #[test]
    fn stats_count_overdue_within_active() {
        let now = Utc::now();
        let records = vec![
            loan("m", Duration::days(3), false, now),
            loan("m", -Duration::days(3), false, now),
            loan("m", -Duration::days(3), true, now),
        ];
        let stats = LibraryStats::compute(&[], 1, &records, now);
        assert_eq!(stats.active_loans, 2);
        assert_eq!(stats.overdue_loans, 1);
    }

    #[test]
    fn dashboard_sorts_and_classifies_open_loans() {
        let now = Utc::now();
        let member = Arc::new(Member {
            id: EntityId::from("m-1"),
            name: "Ada".into(),
            email: "ada@example.org".into(),
            phone: None,
        });
        let records = vec![
            loan("m-1", Duration::days(9), false, now),
            loan("m-1", Duration::days(1), false, now),
            loan("m-1", -Duration::days(2), false, now),
            loan("m-1", -Duration::days(20), true, now),
            loan("m-2", Duration::days(1), false, now),
        ];

        let dash = MemberDashboard::build(member, &records, now);
        assert_eq!(dash.open_loans.len(), 3);
        assert_eq!(dash.due_soon, 1);
        assert_eq!(dash.overdue, 1);
        assert_eq!(dash.history, 1);
        assert!(dash.open_loans[0].due.is_overdue());
    }
}
