//! Loan command handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tabled::Tabled;

use librohub_core::{BorrowRecord, LoanFilter, LoanStatus};

use crate::cli::{GlobalOpts, LoanStatusArg, LoansArgs, LoansCommand};
use crate::error::CliError;
use crate::output;

use super::{CliLibrary, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct LoanRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Book")]
    book: String,
    #[tabled(rename = "Member")]
    member: String,
    #[tabled(rename = "Issued")]
    issued: String,
    #[tabled(rename = "Due")]
    due: String,
    #[tabled(rename = "Status")]
    status: LoanStatus,
    #[tabled(rename = "Note")]
    note: String,
}

impl LoanRow {
    fn new(r: &Arc<BorrowRecord>, now: DateTime<Utc>) -> Self {
        let note = match (r.return_date, r.due_state_at(now)) {
            (Some(returned), _) => format!("returned {}", util::short_date(returned)),
            (None, Some(due)) => due.describe(),
            (None, None) => String::new(),
        };
        Self {
            id: r.id.to_string(),
            book: r.book_title().unwrap_or("-").to_owned(),
            member: r.member_name().unwrap_or("-").to_owned(),
            issued: util::short_date(r.issue_date),
            due: util::short_date(r.due_date),
            status: r.status_at(now),
            note,
        }
    }
}

impl From<LoanStatusArg> for LoanStatus {
    fn from(arg: LoanStatusArg) -> Self {
        match arg {
            LoanStatusArg::Active => Self::Active,
            LoanStatusArg::Overdue => Self::Overdue,
            LoanStatusArg::Returned => Self::Returned,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(library: &CliLibrary, args: LoansArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        LoansCommand::List {
            status,
            member,
            book,
        } => {
            let filter = LoanFilter {
                status: status.map(Into::into),
                member: member
                    .map(|m| util::resolve_member(library, &m))
                    .transpose()?
                    .map(|m| m.id.clone()),
                book: book
                    .map(|b| util::resolve_book(library, &b))
                    .transpose()?
                    .map(|b| b.id.clone()),
            };

            let mut loans = library.loans(&filter);
            loans.sort_by(|a, b| b.issue_date.cmp(&a.issue_date));

            let now = Utc::now();
            let out = output::render_list(
                &global.output,
                &loans,
                |r| LoanRow::new(r, now),
                |r| r.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
