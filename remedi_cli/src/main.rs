use chrono::{Duration, Local, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use remedi_core::doselog::{load_recent_entries, DoseSink};
use remedi_core::integrity::{reconcile, seal, verify, TrialSource, RECORD_SALT};
use remedi_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "remedi")]
#[command(about = "Medication and supplement reminder engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a reminder item with a dose schedule
    Add {
        /// Item name
        name: String,

        /// Item kind (medication, supplement, diet)
        #[arg(long, default_value = "medication")]
        kind: String,

        /// Named period slot (breakfast, lunch, dinner, bedtime); repeatable
        #[arg(long = "period")]
        periods: Vec<String>,

        /// Custom clock time (HH:MM); repeatable
        #[arg(long = "at")]
        times: Vec<String>,

        /// Doses per day; defaults to the number of configured slots
        #[arg(long)]
        frequency: Option<u8>,

        /// Start date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Optional end date
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Generate this many active days from the start date
        #[arg(long)]
        days: Option<u32>,
    },

    /// Show scheduled doses for a date
    Due {
        /// Date to show (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Mark a scheduled dose as taken
    Take {
        /// Item name
        name: String,

        /// Named period of the dose
        #[arg(long, conflicts_with = "at")]
        period: Option<String>,

        /// Custom clock time of the dose (HH:MM)
        #[arg(long)]
        at: Option<String>,

        /// Day of the dose (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Show the device trial status, reconciled against the backend copy
    Trial {
        /// Start a new trial for this device
        #[arg(long)]
        start: bool,
    },

    /// Compute a cancellation quote
    Cancel {
        /// Days since the subscription started
        #[arg(long)]
        days_since_start: i64,

        /// Whether a refund was ever issued to this account
        #[arg(long)]
        refunded_before: bool,
    },

    /// Export the dose log to CSV
    Export {
        /// Clean up processed log files after export
        #[arg(long)]
        cleanup: bool,
    },
}

/// Conventional file layout under the data directory
struct Paths {
    items: PathBuf,
    dose_log: PathBuf,
    log_dir: PathBuf,
    csv: PathBuf,
    trial: PathBuf,
    backend_trial: PathBuf,
    device_id: PathBuf,
}

impl Paths {
    fn new(data_dir: &PathBuf) -> Self {
        Self {
            items: data_dir.join("items.json"),
            dose_log: data_dir.join("log").join("doses.log"),
            log_dir: data_dir.join("log"),
            csv: data_dir.join("doses.csv"),
            trial: data_dir.join("trial.json"),
            backend_trial: data_dir.join("backend").join("trial.json"),
            device_id: data_dir.join("device_id"),
        }
    }
}

fn main() -> Result<()> {
    remedi_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    let paths = Paths::new(&data_dir);

    match cli.command {
        Commands::Add {
            name,
            kind,
            periods,
            times,
            frequency,
            start,
            end,
            days,
        } => cmd_add(
            &paths, &config, name, kind, periods, times, frequency, start, end, days,
        ),
        Commands::Due { date } => cmd_due(&paths, &config, date),
        Commands::Take {
            name,
            period,
            at,
            date,
        } => cmd_take(&paths, &config, name, period, at, date),
        Commands::Trial { start } => cmd_trial(&paths, &config, start),
        Commands::Cancel {
            days_since_start,
            refunded_before,
        } => cmd_cancel(&config, days_since_start, refunded_before),
        Commands::Export { cleanup } => cmd_export(&paths, cleanup),
    }
}

fn parse_kind(s: &str) -> Result<ItemKind> {
    match s.to_lowercase().as_str() {
        "medication" => Ok(ItemKind::Medication),
        "supplement" => Ok(ItemKind::Supplement),
        "diet" => Ok(ItemKind::Diet),
        other => Err(Error::Other(format!("unknown item kind: {}", other))),
    }
}

fn parse_period(s: &str) -> Result<TimePeriod> {
    match s.to_lowercase().as_str() {
        "breakfast" => Ok(TimePeriod::Breakfast),
        "lunch" => Ok(TimePeriod::Lunch),
        "dinner" => Ok(TimePeriod::Dinner),
        "bedtime" => Ok(TimePeriod::Bedtime),
        other => Err(Error::Other(format!("unknown time period: {}", other))),
    }
}

fn parse_clock(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|e| Error::Other(format!("invalid time {:?} (expected HH:MM): {}", s, e)))
}

#[allow(clippy::too_many_arguments)]
fn cmd_add(
    paths: &Paths,
    config: &Config,
    name: String,
    kind: String,
    periods: Vec<String>,
    times: Vec<String>,
    frequency: Option<u8>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    days: Option<u32>,
) -> Result<()> {
    let kind = parse_kind(&kind)?;

    let time_periods: Vec<TimePeriod> = periods
        .iter()
        .map(|p| parse_period(p))
        .collect::<Result<_>>()?;
    let custom_times: Vec<NaiveTime> =
        times.iter().map(|t| parse_clock(t)).collect::<Result<_>>()?;

    let today = Local::now().date_naive();
    let start_date = start.unwrap_or(today);
    let frequency_count =
        frequency.unwrap_or((time_periods.len() + custom_times.len()) as u8);
    let days_ahead = days.unwrap_or(config.schedule.schedule_days_ahead);

    let spec = ScheduleSpec {
        frequency_count,
        time_periods,
        custom_times,
        start_date,
        end_date: end,
        active_days: generate_default_active_days(start_date, days_ahead),
    };

    if let Err(e) = validate(&spec, today, &config.schedule, &config.periods) {
        eprintln!("✗ Invalid schedule: {}", e);
        return Err(e.into());
    }

    let item = ReminderItem {
        id: uuid::Uuid::new_v4(),
        name: name.clone(),
        kind,
        spec,
    };

    ItemStore::update(&paths.items, |store| {
        if store.find_by_name(&name).is_some() {
            return Err(Error::Other(format!("item {:?} already exists", name)));
        }
        store.items.push(item.clone());
        Ok(())
    })?;

    println!(
        "✓ Added {} ({:?}): {} dose(s)/day starting {}",
        name, item.kind, item.spec.frequency_count, item.spec.start_date
    );
    Ok(())
}

fn cmd_due(paths: &Paths, config: &Config, date: Option<NaiveDate>) -> Result<()> {
    let now = Local::now().naive_local();
    let date = date.unwrap_or_else(|| now.date());

    let store = ItemStore::load(&paths.items)?;
    if store.items.is_empty() {
        println!("No reminder items yet. Add one with `remedi add`.");
        return Ok(());
    }

    let entries = load_recent_entries(&paths.dose_log, 30)?;

    println!("Doses for {}:", date);
    for item in &store.items {
        let doses = doses_for_date(&item.spec, date, &config.periods);
        if doses.is_empty() {
            continue;
        }

        println!("\n  {} ({:?})", item.name, item.kind);
        for dose in &doses {
            let taken = was_taken(&entries, item.id, date, dose.slot);
            let marker = if taken { "[x]" } else { "[ ]" };
            println!("    {} {} {}", marker, dose.time.format("%H:%M"), dose.slot);
        }
    }

    // Earliest upcoming untaken dose across all items
    let next = store
        .items
        .iter()
        .filter_map(|item| {
            next_dose_time(&item.spec, now, &config.periods, |day, slot| {
                was_taken(&entries, item.id, day, slot)
            })
            .map(|time| (time, item.name.clone()))
        })
        .min();

    match next {
        Some((time, name)) => println!("\nNext dose: {} at {}", name, time.format("%Y-%m-%d %H:%M")),
        None => println!("\nNo upcoming doses in the next 7 days."),
    }

    Ok(())
}

fn cmd_take(
    paths: &Paths,
    config: &Config,
    name: String,
    period: Option<String>,
    at: Option<String>,
    date: Option<NaiveDate>,
) -> Result<()> {
    let date = date.unwrap_or_else(|| Local::now().date_naive());

    let store = ItemStore::load(&paths.items)?;
    let item = store
        .find_by_name(&name)
        .ok_or_else(|| Error::Other(format!("no item named {:?}", name)))?;

    let slot = match (period, at) {
        (Some(p), None) => DoseSlot::Period(parse_period(&p)?),
        (None, Some(t)) => DoseSlot::Custom(parse_clock(&t)?),
        _ => {
            return Err(Error::Other(
                "specify exactly one of --period or --at".into(),
            ))
        }
    };

    let doses = doses_for_date(&item.spec, date, &config.periods);
    let dose = doses
        .iter()
        .find(|d| d.slot == slot)
        .ok_or_else(|| Error::Other(format!("{} has no {} dose on {}", name, slot, date)))?;

    let entries = load_recent_entries(&paths.dose_log, 30)?;
    if was_taken(&entries, item.id, date, slot) {
        println!("Dose already recorded for {} at {} on {}.", name, slot, date);
        return Ok(());
    }

    let entry = DoseTaken {
        id: uuid::Uuid::new_v4(),
        item_id: item.id,
        slot,
        scheduled_for: dose.time,
        taken_at: Utc::now(),
    };

    let mut sink = JsonlSink::new(&paths.dose_log);
    sink.append(&entry)?;

    println!("✓ Dose logged: {} at {} on {}", name, slot, date);
    Ok(())
}

fn cmd_trial(paths: &Paths, config: &Config, start: bool) -> Result<()> {
    let now = Utc::now();
    let device_id = load_or_create_device_id(&paths.device_id)?;

    let local = SealedTrialRecord::load(&paths.trial)?.map(|record| verify(record, RECORD_SALT));
    let backend = load_backend_record(&paths.backend_trial)?;
    let resolved = reconcile(&device_id, local, backend.as_ref());

    // A successful backend fetch overwrites the local record
    if let Some(ref resolved) = resolved {
        if resolved.source == TrialSource::Backend {
            seal(resolved.state.clone(), RECORD_SALT).save(&paths.trial)?;
        }
    }

    if start {
        let state = start_new_trial(
            &device_id,
            resolved.as_ref().map(|r| &r.state),
            now,
            &config.trial,
        )?;
        seal(state.clone(), RECORD_SALT).save(&paths.trial)?;
        println!(
            "✓ Trial started for device {}. Expires {}.",
            device_id,
            state.expires_at.format("%Y-%m-%d")
        );
        return Ok(());
    }

    match resolved {
        None => {
            println!("No trial on this device. Start one with `remedi trial --start`.");
        }
        Some(resolved) => {
            let state = &resolved.state;
            println!("Trial status for device {}:", device_id);
            println!("  Source:         {:?}", resolved.source);
            if resolved.tamper_flagged {
                println!("  ⚠ Local record failed verification; backend unavailable.");
            }
            println!("  Days used:      {}", days_used(state, now));
            println!("  Days remaining: {}", days_remaining(state, now));
            println!("  Valid:          {}", is_valid(state, now));
            println!(
                "  Payment prompt: {}",
                trial::should_show_payment_modal(state, now, &config.trial)
            );
            println!("  Dismissable:    {}", is_dismissable(state, now));
        }
    }

    Ok(())
}

fn cmd_cancel(config: &Config, days_since_start: i64, refunded_before: bool) -> Result<()> {
    let now = Utc::now();
    let subscribed_at = now - Duration::days(days_since_start);
    let history = BillingHistory {
        refund_ever_issued: refunded_before,
    };

    let result = cancel_subscription(subscribed_at, now, &history, &config.trial);

    println!("Cancellation at day {}:", days_since_start);
    println!("  Tier:         {:?}", result.tier);
    println!("  Refund:       {:.2}", result.refund_amount);
    println!(
        "  Access until: {}",
        result.access_until.format("%Y-%m-%d")
    );

    Ok(())
}

fn cmd_export(paths: &Paths, cleanup: bool) -> Result<()> {
    if !paths.dose_log.exists() {
        println!("No dose log found - nothing to export.");
        return Ok(());
    }

    let count = remedi_core::export::log_to_csv_and_archive(&paths.dose_log, &paths.csv)?;

    println!("✓ Exported {} dose(s) to CSV", count);
    println!("  CSV: {}", paths.csv.display());

    if cleanup {
        let cleaned = remedi_core::export::cleanup_processed_logs(&paths.log_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed log files", cleaned);
        }
    }

    Ok(())
}
