//! Event commands for seeding and inspecting the calendar.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::Subcommand;
use oryxa_autopilot::{Event, EventStatus, Transparency};

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum EventAction {
    /// Add or replace an event
    Add {
        /// Event title
        title: String,
        /// Start time (RFC 3339, e.g. 2026-03-01T19:00:00Z)
        #[arg(long)]
        start: DateTime<Utc>,
        /// End time (RFC 3339)
        #[arg(long)]
        end: DateTime<Utc>,
        /// Reuse an existing event ID (updates the event)
        #[arg(long)]
        id: Option<String>,
        /// Mark the event as free time
        #[arg(long)]
        transparent: bool,
        /// Mark the event as tentative
        #[arg(long)]
        tentative: bool,
    },
    /// List events intersecting a date range
    List {
        /// First date (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last date, inclusive (default: same as --from)
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Get one event
    Get {
        /// Event ID
        id: String,
    },
    /// Events with writes owed to the external calendar
    Pending,
}

pub fn run(action: EventAction, ctx: &Context) -> CliResult {
    let db = ctx.open_db()?;

    match action {
        EventAction::Add {
            title,
            start,
            end,
            id,
            transparent,
            tentative,
        } => {
            let mut event = Event::new(ctx.owner.as_str(), title, start, end)?;
            if let Some(id) = id {
                event.id = id;
            }
            if transparent {
                event.transparency = Transparency::Transparent;
            }
            if tentative {
                event.status = EventStatus::Tentative;
            }
            db.upsert_event(&event)?;
            let stored = db.get_event(&event.id)?;
            print_json(&stored)?;
        }
        EventAction::List { from, to } => {
            let to = to.unwrap_or(from);
            let from_ts = from.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
            let to_ts = to.and_hms_opt(0, 0, 0).map(|t| t.and_utc() + Duration::days(1));
            let (Some(from_ts), Some(to_ts)) = (from_ts, to_ts) else {
                return Err("invalid date range".into());
            };
            let events = db.list_events(&ctx.owner, from_ts, to_ts)?;
            print_json(&events)?;
        }
        EventAction::Get { id } => match db.get_event(&id)? {
            Some(event) => print_json(&event)?,
            None => return Err(format!("event not found: {id}").into()),
        },
        EventAction::Pending => {
            let events = db.list_pending_push(&ctx.owner)?;
            print_json(&events)?;
        }
    }
    Ok(())
}
