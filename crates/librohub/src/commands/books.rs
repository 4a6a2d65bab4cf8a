//! Book command handlers.

use std::sync::Arc;

use chrono::Utc;
use tabled::Tabled;

use librohub_core::{Availability, Book, BookFilter, DueState, NewBook};

use crate::cli::{AvailabilityArg, BooksArgs, BooksCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::{CliLibrary, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct BookRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Category")]
    category: String,
    #[tabled(rename = "Status")]
    status: &'static str,
}

impl From<&Arc<Book>> for BookRow {
    fn from(b: &Arc<Book>) -> Self {
        Self {
            id: b.id.to_string(),
            title: b.title.clone(),
            author: b.author.clone(),
            category: b.category.clone(),
            status: b.availability_label(),
        }
    }
}

fn detail(library: &CliLibrary, b: &Arc<Book>) -> String {
    let mut lines = vec![
        format!("ID:          {}", b.id),
        format!("Title:       {}", b.title),
        format!("Author:      {}", b.author),
        format!("Category:    {}", b.category),
        format!("Status:      {}", b.availability_label()),
    ];
    if let Some(ref isbn) = b.isbn {
        lines.push(format!("ISBN:        {isbn}"));
    }
    if let Some(year) = b.published_year {
        lines.push(format!("Published:   {year}"));
    }
    if let Some(ref description) = b.description {
        lines.push(format!("About:       {description}"));
    }

    let now = Utc::now();
    for loan in library.store().open_loans_for_book(&b.id) {
        let borrower = loan.member_name().unwrap_or("(unknown member)");
        let due = loan
            .due_state_at(now)
            .as_ref()
            .map(DueState::describe)
            .unwrap_or_default();
        lines.push(format!(
            "On loan to:  {borrower}, due {} ({due})",
            util::short_date(loan.due_date)
        ));
    }
    lines.join("\n")
}

impl From<AvailabilityArg> for Availability {
    fn from(arg: AvailabilityArg) -> Self {
        match arg {
            AvailabilityArg::All => Self::All,
            AvailabilityArg::Available => Self::Available,
            AvailabilityArg::Borrowed => Self::Borrowed,
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    library: &CliLibrary,
    args: BooksArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        BooksCommand::List {
            search,
            category,
            availability,
        } => {
            let filter = BookFilter {
                search,
                category,
                availability: availability.into(),
            };
            let mut books = library.search_books(&filter);
            books.sort_by(|a, b| a.title.cmp(&b.title));

            let out = output::render_list(
                &global.output,
                &books,
                |b| BookRow::from(b),
                |b| b.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        BooksCommand::Show { book } => {
            let book = util::resolve_book(library, &book)?;
            let out = output::render_single(
                &global.output,
                &book,
                |b| detail(library, b),
                |b| b.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        BooksCommand::Add {
            title,
            author,
            category,
            isbn,
            year,
            description,
        } => {
            let book = NewBook {
                title,
                author,
                category,
                isbn,
                published_year: year,
                description,
            };
            util::report(library, global, library.add_book(book)).await
        }

        BooksCommand::Delete { book } => {
            let book = util::resolve_book(library, &book)?;
            if !util::confirm(
                &format!("Delete '{}' from the catalog? This cannot be undone.", book.title),
                "books delete",
                global.yes,
            )? {
                return Ok(());
            }
            util::report(library, global, library.delete_book(&book.id)).await
        }

        BooksCommand::Borrow { book, member } => {
            let book = util::resolve_book(library, &book)?;
            let member = util::resolve_member(library, &member)?;
            util::report(library, global, library.borrow(&book.id, &member.id)).await
        }

        BooksCommand::Return { book } => {
            let book = util::resolve_book(library, &book)?;
            util::report(library, global, library.return_book(&book.id)).await
        }
    }
}
