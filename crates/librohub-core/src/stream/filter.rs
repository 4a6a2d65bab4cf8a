// ── Filter predicates for entity snapshots ──
//
// Used by front-ends to narrow snapshots without re-querying the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::{Book, BorrowRecord, EntityId, LoanStatus};

/// Availability facet of the catalog filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    #[default]
    All,
    Available,
    Borrowed,
}

/// Catalog search: free text over title / author / category, plus an
/// exact category and an availability facet. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub availability: Availability,
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        let text_ok = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                [&book.title, &book.author, &book.category]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
        };

        let category_ok = self
            .category
            .as_deref()
            .is_none_or(|c| book.category.eq_ignore_ascii_case(c));

        let availability_ok = match self.availability {
            Availability::All => true,
            Availability::Available => book.available,
            Availability::Borrowed => !book.available,
        };

        text_ok && category_ok && availability_ok
    }
}

/// Loan listing filter, evaluated against a caller-supplied "now".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanFilter {
    pub status: Option<LoanStatus>,
    pub member: Option<EntityId>,
    pub book: Option<EntityId>,
}

impl LoanFilter {
    pub fn matches_at(&self, record: &BorrowRecord, now: DateTime<Utc>) -> bool {
        self.status.is_none_or(|s| record.status_at(now) == s)
            && self.member.as_ref().is_none_or(|m| record.member_id == *m)
            && self.book.as_ref().is_none_or(|b| record.book_id == *b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn book(title: &str, author: &str, category: &str, available: bool) -> Book {
        Book {
            id: EntityId::from(title),
            title: title.into(),
            author: author.into(),
            category: category.into(),
            category_ref: None,
            available,
            isbn: None,
            published_year: None,
            description: None,
        }
    }

    #[test]
    fn search_covers_title_author_and_category() {
        let dune = book("Dune", "Frank Herbert", "Science Fiction", true);
        let by = |term: &str| BookFilter {
            search: Some(term.into()),
            ..BookFilter::default()
        };
        assert!(by("dune").matches(&dune));
        assert!(by("HERBERT").matches(&dune));
        assert!(by("fiction").matches(&dune));
        assert!(!by("austen").matches(&dune));
        assert!(by("   ").matches(&dune));
    }

    #[test]
    fn facets_combine() {
        let dune = book("Dune", "Frank Herbert", "Science Fiction", false);
        let filter = BookFilter {
            search: None,
            category: Some("science fiction".into()),
            availability: Availability::Borrowed,
        };
        assert!(filter.matches(&dune));

        let filter = BookFilter {
            availability: Availability::Available,
            ..filter
        };
        assert!(!filter.matches(&dune));
    }

    #[test]
    fn loan_filter_uses_status_at_now() {
        let now = Utc::now();
        let record = BorrowRecord {
            id: EntityId::from("r-1"),
            book_id: EntityId::from("b-1"),
            member_id: EntityId::from("m-1"),
            issue_date: now - Duration::days(20),
            due_date: now - Duration::days(6),
            return_date: None,
            book: None,
            member: None,
        };
        let overdue = LoanFilter {
            status: Some(LoanStatus::Overdue),
            ..LoanFilter::default()
        };
        assert!(overdue.matches_at(&record, now));
        assert!(!overdue.matches_at(&record, now - Duration::days(10)));

        let other_member = LoanFilter {
            member: Some(EntityId::from("m-2")),
            ..LoanFilter::default()
        };
        assert!(!other_member.matches_at(&record, now));
    }
}
