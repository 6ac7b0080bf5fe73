//! Conflict detection and answers to suggestions.

use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use oryxa_autopilot::{accept_suggestion, reject_suggestion, ConflictDetector, ConflictStatus};

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum ConflictAction {
    /// Detect conflicts between events and prayer windows
    Detect {
        /// First date (YYYY-MM-DD, default: today UTC)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last date, inclusive (default: same as --from)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// List conflicts, newest first
    List {
        /// Filter by status (open, suggested, auto_resolved, resolved, undone)
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },
    /// Get one conflict
    Get {
        /// Conflict ID
        id: String,
    },
    /// Audit trail of one conflict
    Audit {
        /// Conflict ID
        id: String,
    },
    /// Accept a suggestion and apply its patch
    Accept {
        /// Conflict ID
        id: String,
    },
    /// Dismiss a suggestion
    Reject {
        /// Conflict ID
        id: String,
    },
}

pub fn run(action: ConflictAction, ctx: &Context) -> CliResult {
    let db = ctx.open_db()?;
    let now = Utc::now();

    match action {
        ConflictAction::Detect { from, to } => {
            let from = from.unwrap_or_else(|| now.date_naive());
            let to = to.unwrap_or(from);
            if to < from {
                return Err(format!("--to ({to}) is before --from ({from})").into());
            }
            let config = ctx.load_config()?;
            let summary =
                ConflictDetector::new(config.buffers).detect_range(&db, &ctx.owner, from, to, now)?;
            print_json(&summary)?;
        }
        ConflictAction::List { status, limit } => {
            let status = match status {
                Some(s) => Some(
                    ConflictStatus::parse(&s).ok_or_else(|| format!("unknown status: {s}"))?,
                ),
                None => None,
            };
            let conflicts = db.list_conflicts(&ctx.owner, status, limit)?;
            print_json(&conflicts)?;
        }
        ConflictAction::Get { id } => match db.get_conflict(&id)? {
            Some(conflict) if conflict.owner_id == ctx.owner => print_json(&conflict)?,
            _ => return Err(format!("conflict not found: {id}").into()),
        },
        ConflictAction::Audit { id } => {
            let actions = db.list_actions(&id)?;
            print_json(&actions)?;
        }
        ConflictAction::Accept { id } => {
            let outcome = accept_suggestion(&db, &ctx.owner, &id, now)?;
            print_json(&outcome)?;
        }
        ConflictAction::Reject { id } => {
            let conflict = reject_suggestion(&db, &ctx.owner, &id, now)?;
            print_json(&conflict)?;
        }
    }
    Ok(())
}
