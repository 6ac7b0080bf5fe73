use chrono::NaiveDate;
use clap::Subcommand;
use oryxa_autopilot::{PrayerName, PrayerTimes, WindowBuilder};

use super::{print_json, CliResult, Context};

#[derive(Subcommand)]
pub enum PrayerAction {
    /// Store the prayer times of one date (HH:MM, UTC)
    Set {
        /// Date (YYYY-MM-DD)
        date: NaiveDate,
        #[arg(long)]
        fajr: Option<String>,
        #[arg(long)]
        dhuhr: Option<String>,
        #[arg(long)]
        asr: Option<String>,
        #[arg(long)]
        maghrib: Option<String>,
        #[arg(long)]
        isha: Option<String>,
    },
    /// Show the stored times of one date
    Get {
        /// Date (YYYY-MM-DD)
        date: NaiveDate,
    },
    /// Show the buffered windows of one date
    Windows {
        /// Date (YYYY-MM-DD)
        date: NaiveDate,
    },
}

pub fn run(action: PrayerAction, ctx: &Context) -> CliResult {
    let db = ctx.open_db()?;

    match action {
        PrayerAction::Set {
            date,
            fajr,
            dhuhr,
            asr,
            maghrib,
            isha,
        } => {
            let mut times = PrayerTimes::new(date);
            for (prayer, value) in [
                (PrayerName::Fajr, fajr),
                (PrayerName::Dhuhr, dhuhr),
                (PrayerName::Asr, asr),
                (PrayerName::Maghrib, maghrib),
                (PrayerName::Isha, isha),
            ] {
                times.set(prayer, value);
            }
            // Reject malformed clock values up front.
            for prayer in PrayerName::ALL {
                if times.get(prayer).is_some() {
                    times.clock_time(prayer)?;
                }
            }
            db.upsert_prayer_times(&ctx.owner, &times)?;
            print_json(&times)?;
        }
        PrayerAction::Get { date } => match db.get_prayer_times(&ctx.owner, date)? {
            Some(times) => print_json(&times)?,
            None => return Err(format!("no prayer times stored for {date}").into()),
        },
        PrayerAction::Windows { date } => {
            let Some(times) = db.get_prayer_times(&ctx.owner, date)? else {
                return Err(format!("no prayer times stored for {date}").into());
            };
            let config = ctx.load_config()?;
            let windows = WindowBuilder::new(config.buffers).build(&times);
            print_json(&windows)?;
        }
    }
    Ok(())
}
