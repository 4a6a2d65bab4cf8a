//! Statistics command handler.

use librohub_core::LibraryStats;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

use super::CliLibrary;

pub fn summary_line(s: &LibraryStats) -> String {
    format!(
        "books {} ({} available) | members {} | open loans {} ({} overdue)",
        s.total_books, s.available_books, s.total_members, s.active_loans, s.overdue_loans
    )
}

fn detail(s: &LibraryStats) -> String {
    [
        format!("Books:          {}", s.total_books),
        format!("  available:    {}", s.available_books),
        format!("  on loan:      {}", s.borrowed_books),
        format!("Members:        {}", s.total_members),
        format!("Open loans:     {}", s.active_loans),
        format!("  overdue:      {}", s.overdue_loans),
        format!("Utilization:    {}%", s.utilization_percent),
        format!("Books/member:   {:.1}", s.books_per_member),
    ]
    .join("\n")
}

pub fn handle(library: &CliLibrary, global: &GlobalOpts) -> Result<(), CliError> {
    let stats = library.stats();
    let out = output::render_single(&global.output, &stats, detail, summary_line)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
