use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, Utc};
use clap::{Parser, Subcommand};
use gluvia_core::questionnaire::MealEvaluation;
use gluvia_core::wal::{dose_log_path, log_evaluations, DoseStatus};
use gluvia_core::zone::{format_clock_time, parse_clock_time, resolve_zone, scheduled_time};
use gluvia_core::*;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gluvia")]
#[command(about = "Insulin dose timing and overdose advisor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current meal zone, prescription and today's doses (default)
    Status {
        /// Evaluate as if the local time were HH:MM
        #[arg(long, value_parser = parse_at)]
        at: Option<NaiveTime>,
    },

    /// Print the questionnaire template for the current time
    Template {
        #[arg(long, value_parser = parse_at)]
        at: Option<NaiveTime>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Evaluate a filled-in questionnaire
    Questionnaire {
        /// JSON file with meal responses
        #[arg(long)]
        responses: PathBuf,

        #[arg(long, value_parser = parse_at)]
        at: Option<NaiveTime>,

        /// Show advice without writing to the dose log
        #[arg(long)]
        dry_run: bool,

        #[arg(long)]
        json: bool,
    },

    /// Show logged doses
    History {
        /// Window in days (1-30)
        #[arg(long)]
        days: Option<i64>,

        #[arg(long)]
        json: bool,
    },

    /// Manage the active prescription
    Prescription {
        #[command(subcommand)]
        action: PrescriptionAction,
    },
}

#[derive(Subcommand)]
enum PrescriptionAction {
    /// Validate and store a prescription JSON file
    Set { file: PathBuf },
    /// Print the active prescription
    Show,
}

fn parse_at(s: &str) -> std::result::Result<NaiveTime, String> {
    parse_clock_time(s).ok_or_else(|| format!("invalid time '{}', expected HH:MM", s))
}

/// Local wall clock, optionally pinned to a time of day
fn current_time(at: Option<NaiveTime>) -> NaiveDateTime {
    let now = Local::now().naive_local();
    match at {
        Some(time) => now.date().and_time(time),
        None => now,
    }
}

/// UTC instant for a local wall-clock time, falling back to the system clock
/// when the local time is ambiguous or skipped by a DST change
fn to_utc(local: NaiveDateTime) -> DateTime<Utc> {
    local
        .and_local_timezone(Local)
        .single()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(Utc::now)
}

fn main() -> Result<()> {
    gluvia_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Some(Commands::Status { at }) => cmd_status(&data_dir, &config, current_time(at)),
        Some(Commands::Template { at, json }) => {
            cmd_template(&data_dir, &config, current_time(at), json)
        }
        Some(Commands::Questionnaire {
            responses,
            at,
            dry_run,
            json,
        }) => cmd_questionnaire(
            &data_dir,
            &config,
            &responses,
            current_time(at),
            dry_run,
            json,
        ),
        Some(Commands::History { days, json }) => {
            cmd_history(&data_dir, days.unwrap_or(config.history.default_days), json)
        }
        Some(Commands::Prescription { action }) => match action {
            PrescriptionAction::Set { file } => cmd_prescription_set(&data_dir, &file),
            PrescriptionAction::Show => cmd_prescription_show(&data_dir),
        },
        None => cmd_status(&data_dir, &config, current_time(None)),
    }
}

fn print_header(title: &str) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  {}", title);
    println!("╰─────────────────────────────────────────╯");
}

fn cmd_status(data_dir: &Path, config: &Config, now: NaiveDateTime) -> Result<()> {
    let store = PrescriptionStore::in_dir(data_dir);
    let zone = resolve_zone(now.time());

    print_header("GLUVIA STATUS");
    println!("  Time: {}    Zone: {}", format_clock_time(now.time()), zone.label());
    println!();

    match store.load()? {
        Some(prescription) => {
            println!("  Active prescription:");
            for entry in prescription.entries(config.schedule.slot_set)? {
                println!(
                    "    {:<12} {:<12} {:>6} units  {:<12} onset {} min",
                    entry.meal.title(),
                    entry.insulin_name,
                    format_units(entry.prescribed_dose),
                    entry.insulin_type,
                    entry.onset_minutes
                );
            }
        }
        None => println!("  No active prescription. Use `gluvia prescription set FILE`."),
    }

    let history = load_recent_doses(&dose_log_path(data_dir), 1, Utc::now())?;
    let today = latest_per_meal(&history.doses, Local::now().date_naive(), &Local);

    println!();
    if today.is_empty() {
        println!("  No doses logged today.");
    } else {
        println!("  Today's doses:");
        for (meal, record) in today {
            let time = record.recorded_at.with_timezone(&Local).time();
            match record.status {
                DoseStatus::Taken => println!(
                    "    {:<12} taken {} units at {}",
                    meal.title(),
                    format_units(record.actual_dose.unwrap_or(record.prescribed_dose)),
                    format_clock_time(time)
                ),
                DoseStatus::Missed => println!(
                    "    {:<12} missed ({})",
                    meal.title(),
                    record.advice
                ),
            }
        }
    }

    println!();
    println!("  Meals:");
    for &meal in config.schedule.slot_set.slots() {
        println!(
            "    {} {:<12} {}",
            if meal == zone { "→" } else { " " },
            meal.title(),
            format_clock_time(scheduled_time(meal))
        );
    }
    println!();

    Ok(())
}

fn cmd_template(data_dir: &Path, config: &Config, now: NaiveDateTime, json: bool) -> Result<()> {
    let stored = PrescriptionStore::in_dir(data_dir).load()?;
    let prescription = stored.as_ref().unwrap_or_else(|| default_prescription());

    let report = build_template(prescription, config.schedule.slot_set, now)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_header(&format!(
        "TEMPLATE  {}  ({})",
        report.current_time, report.current_zone
    ));
    if stored.is_none() {
        println!("  (no prescription stored, showing the sample prescription)");
    }
    println!();
    for row in &report.template {
        println!(
            "  {} {:<12} {}  {:<12} {:>6} units  {:<12} onset {} min",
            if row.is_past_or_current { "●" } else { "○" },
            row.meal,
            row.scheduled_time,
            row.insulin,
            format_units(row.prescribed_dose),
            row.insulin_type,
            row.onset
        );
    }

    println!();
    println!("  taken:       {}", report.instructions.taken);
    println!("  actual_dose: {}", report.instructions.actual_dose);
    println!("  meal_time:   {}", report.instructions.meal_time);
    println!("  meal_taken:  {}", report.instructions.meal_taken);
    println!();
    for warning in &report.warnings {
        println!("  ⚠ {}", warning);
    }
    println!();

    Ok(())
}

fn cmd_questionnaire(
    data_dir: &Path,
    config: &Config,
    responses_path: &Path,
    now: NaiveDateTime,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let prescription = PrescriptionStore::in_dir(data_dir).require()?;
    let contents = std::fs::read_to_string(responses_path)?;
    let responses = parse_responses(&contents)?;

    let report = process_questionnaire(
        &prescription,
        &responses,
        now,
        config.evaluation_options(),
    )?;

    if !dry_run {
        let mut sink = JsonlSink::new(dose_log_path(data_dir));
        let written = log_evaluations(&mut sink, &report.evaluations, to_utc(now))?;
        tracing::info!("Logged {} dose records", written);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    display_report(&report);
    if dry_run {
        println!("  (dry run - nothing logged)");
        println!();
    }

    Ok(())
}

fn display_report(report: &QuestionnaireReport) {
    print_header(&format!(
        "DOSE ADVICE  {}  ({})",
        report.current_time, report.current_zone
    ));
    println!();

    for MealEvaluation { entry, result } in &report.evaluations {
        println!(
            "  {:<12} {:<12} {}",
            entry.meal.title(),
            entry.insulin_name,
            result.status.label()
        );
        if let Some(dose) = result.recommended_dose {
            println!("    → take {} units", format_units(dose));
        }
        println!("    {}", result.advice);
    }

    if !report.warnings.is_empty() {
        println!();
        for warning in &report.warnings {
            println!("  ⚠ {}", warning);
        }
    }

    if !report.critical_warnings.is_empty() {
        println!();
        println!("  ───────────────── CRITICAL ─────────────────");
        for warning in &report.critical_warnings {
            println!("  !! {}", warning);
        }
    }

    let summary = &report.summary;
    println!();
    println!(
        "  Meals processed: {}   Overdoses: {}   Excess: {} units",
        summary.total_meals_processed,
        summary.overdoses_detected,
        format_units(summary.total_excess_units)
    );
    if summary.requires_medical_attention {
        println!("  Contact your doctor.");
    }
    println!();
}

fn cmd_history(data_dir: &Path, days: i64, json: bool) -> Result<()> {
    let history = load_recent_doses(&dose_log_path(data_dir), days, Utc::now())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }

    print_header(&format!("DOSE HISTORY  last {} days", history.period_days));
    println!();
    if history.doses.is_empty() {
        println!("  No doses logged.");
    }
    for record in &history.doses {
        let when = record.recorded_at.with_timezone(&Local);
        let detail = match record.status {
            DoseStatus::Taken => format!(
                "taken {} units",
                format_units(record.actual_dose.unwrap_or(record.prescribed_dose))
            ),
            DoseStatus::Missed => format!(
                "missed, advised {} units",
                format_units(record.recommended_dose.unwrap_or(0.0))
            ),
        };
        println!(
            "  {}  {:<12} {:<12} {}",
            when.format("%Y-%m-%d %H:%M"),
            record.meal.title(),
            record.insulin_name,
            detail
        );
    }
    println!();
    println!("  {} entries", history.total_entries);
    println!();

    Ok(())
}

fn cmd_prescription_set(data_dir: &Path, file: &Path) -> Result<()> {
    let contents = std::fs::read_to_string(file)?;
    let mut prescription = Prescription::from_json(&contents)?;
    if prescription.created_at.is_none() {
        prescription.created_at = Some(Utc::now());
    }

    let store = PrescriptionStore::in_dir(data_dir);
    store.save(&prescription)?;

    let meals = prescription.entries(SlotSet::Full)?.len();
    println!("✓ Stored prescription with {} meal entries", meals);
    println!("  File: {}", store.path().display());
    Ok(())
}

fn cmd_prescription_show(data_dir: &Path) -> Result<()> {
    let prescription = PrescriptionStore::in_dir(data_dir).require()?;
    println!("{}", serde_json::to_string_pretty(&prescription)?);
    Ok(())
}
