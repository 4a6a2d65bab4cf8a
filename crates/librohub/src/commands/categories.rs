//! Category command handlers.

use std::sync::Arc;

use tabled::Tabled;

use librohub_core::Category;

use crate::cli::{CategoriesArgs, CategoriesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::CliLibrary;

#[derive(Tabled)]
struct CategoryRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Books")]
    books: usize,
}

pub fn handle(
    library: &CliLibrary,
    args: CategoriesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        CategoriesCommand::List => {
            let mut categories: Vec<Arc<Category>> =
                library.categories_snapshot().iter().cloned().collect();
            categories.sort_by(|a, b| a.name.cmp(&b.name));

            let books = library.books_snapshot();
            let out = output::render_list(
                &global.output,
                &categories,
                |c| CategoryRow {
                    id: c.id.to_string(),
                    name: c.name.clone(),
                    books: books.iter().filter(|b| b.category == c.name).count(),
                },
                |c| c.name.clone(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
