//! Member command handlers.

use std::sync::Arc;

use tabled::Tabled;

use librohub_core::{DueState, Member, MemberDashboard, NewMember};

use crate::cli::{GlobalOpts, MembersArgs, MembersCommand};
use crate::error::CliError;
use crate::output;

use super::{CliLibrary, util};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct MemberRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Email")]
    email: String,
    #[tabled(rename = "Phone")]
    phone: String,
    #[tabled(rename = "Open loans")]
    open_loans: usize,
}

fn dashboard_detail(d: &MemberDashboard, color: bool) -> String {
    let m = &d.member;
    let mut lines = vec![
        format!("ID:        {}", m.id),
        format!("Name:      {}", m.name),
        format!("Email:     {}", m.email),
        format!("Phone:     {}", m.phone.as_deref().unwrap_or("-")),
        format!(
            "Loans:     {} open, {} due soon, {} overdue, {} returned",
            d.open_loans.len(),
            d.due_soon,
            d.overdue,
            d.history
        ),
    ];
    for loan in &d.open_loans {
        let title = loan.record.book_title().unwrap_or("(unknown book)");
        let note = loan.due.describe();
        let note = match loan.due {
            DueState::OnTime { .. } => output::dim(note, color),
            DueState::DueSoon { .. } | DueState::Overdue { .. } => note,
        };
        lines.push(format!(
            "  - {title}, due {} ({note})",
            util::short_date(loan.record.due_date)
        ));
    }
    lines.join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    library: &CliLibrary,
    args: MembersArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match args.command {
        MembersCommand::List { search } => {
            let term = search.map(|s| s.trim().to_lowercase());
            let mut members: Vec<Arc<Member>> = library
                .members_snapshot()
                .iter()
                .filter(|m| {
                    term.as_deref().is_none_or(|t| {
                        m.name.to_lowercase().contains(t) || m.email.to_lowercase().contains(t)
                    })
                })
                .cloned()
                .collect();
            members.sort_by(|a, b| a.name.cmp(&b.name));

            let records = library.borrow_records_snapshot();
            let open_for = |m: &Member| {
                records
                    .iter()
                    .filter(|r| r.member_id == m.id && r.is_open())
                    .count()
            };

            let out = output::render_list(
                &global.output,
                &members,
                |m| MemberRow {
                    id: m.id.to_string(),
                    name: m.name.clone(),
                    email: m.email.clone(),
                    phone: m.phone.clone().unwrap_or_default(),
                    open_loans: open_for(m),
                },
                |m| m.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        MembersCommand::Add { name, email, phone } => {
            let member = NewMember { name, email, phone };
            util::report(library, global, library.add_member(member)).await
        }

        MembersCommand::Show { member } => {
            let member = util::resolve_member(library, &member)?;
            let dashboard =
                library
                    .member_dashboard(&member.id)
                    .ok_or_else(|| CliError::NotFound {
                        resource_type: "member".into(),
                        identifier: member.id.to_string(),
                        list_command: "members list".into(),
                    })?;

            let color = output::should_color(&global.color);
            let out = output::render_single(
                &global.output,
                &dashboard,
                |d| dashboard_detail(d, color),
                |d| d.member.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
