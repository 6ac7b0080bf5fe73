use chrono::{Duration, Utc};
use clap::Subcommand;

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum LearningAction {
    /// Acceptance summary over a trailing window
    Stats {
        /// Window length in days
        #[arg(long, default_value = "30")]
        days: i64,
    },
}

pub fn run(action: LearningAction, ctx: &Context) -> CliResult {
    let db = ctx.open_db()?;

    match action {
        LearningAction::Stats { days } => {
            let since = Utc::now() - Duration::days(days.max(0));
            let stats = db.learning_stats(&ctx.owner, since)?;
            print_json(&stats)?;
        }
    }
    Ok(())
}
