use chrono::Utc;
use clap::Subcommand;
use oryxa_autopilot::{Autopilot, Ledger};

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum AutopilotAction {
    /// Process the owner's open and suggested conflicts
    Run,
    /// Revert an applied action or withdraw a suggestion
    Undo {
        /// Conflict ID
        conflict_id: String,
        /// Token from the run result or notification
        undo_token: String,
    },
    /// Notifications written for the external notifier
    Outbox {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

pub fn run(action: AutopilotAction, ctx: &Context) -> CliResult {
    let db = ctx.open_db()?;

    match action {
        AutopilotAction::Run => {
            let config = ctx.load_config()?;
            let report = Autopilot::new(&db, config).run(&ctx.owner)?;
            print_json(&report)?;
        }
        AutopilotAction::Undo {
            conflict_id,
            undo_token,
        } => {
            let outcome = Ledger::new(&db).undo(&ctx.owner, &conflict_id, &undo_token, Utc::now())?;
            print_json(&outcome)?;
        }
        AutopilotAction::Outbox { limit } => {
            let notifications = db.list_notifications(&ctx.owner, limit)?;
            print_json(&notifications)?;
        }
    }
    Ok(())
}
