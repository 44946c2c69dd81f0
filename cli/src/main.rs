mod analyzer;
mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::analyzer::OpenRouterClient;
use crate::commands::{
    HabitAction, OnboardArgs, cmd_calendar, cmd_custom_add, cmd_custom_remove, cmd_custom_toggle,
    cmd_day, cmd_entries, cmd_finish, cmd_habit, cmd_habit_list, cmd_history, cmd_log,
    cmd_onboard, cmd_profile_set, cmd_profile_show, cmd_remove, cmd_reset, cmd_status, parse_date,
};
use crate::config::{AiSettings, Config};
use psmf_core::models::{Gender, ProfileUpdate};
use psmf_core::service::PsmfService;

#[derive(Parser)]
#[command(
    name = "psmf",
    version,
    about = "A PSMF diet and habit tracker",
    long_about = "Track a protein-sparing modified fast: log food with AI macro estimates, \
tick off daily habits, score each day and follow the protocol on a calendar."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new protocol (replaces any existing profile and history)
    Onboard {
        /// Protocol target date (YYYY-MM-DD)
        #[arg(long)]
        target_date: String,
        /// Protocol start date (YYYY-MM-DD, default: today)
        #[arg(long)]
        start_date: Option<String>,
        /// Height in cm
        #[arg(long)]
        height: f64,
        /// Starting weight in kg
        #[arg(long)]
        weight: f64,
        /// Target weight in kg
        #[arg(long)]
        target_weight: f64,
        /// Age in years (16-99)
        #[arg(long)]
        age: u32,
        /// Gender: male or female
        #[arg(long)]
        gender: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or edit the profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Log food by describing it and/or attaching a photo
    Log {
        /// What you ate (e.g. "200g chicken breast, salad"); caption when --photo is given
        text: Option<String>,
        /// Path to a photo of the meal
        #[arg(short, long, value_name = "PATH")]
        photo: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List today's food entries
    Entries {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a food entry by ID (or unique ID prefix)
    Remove {
        /// Entry ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update today's habits
    Habit {
        #[command(subcommand)]
        command: HabitCommands,
    },
    /// Show today's macros, habits, advice and score
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Archive today and reset the daily counters
    Finish {
        /// Date to archive under (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the protocol calendar
    Calendar {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show an archived day
    Day {
        /// Date (YYYY-MM-DD or today/yesterday)
        date: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List finished days
    History {
        /// Only show the last N days
        #[arg(short, long)]
        days: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
    /// Delete all data (profile, today and history)
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show the profile and weight progress
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change profile fields (e.g. today's weight)
    Set {
        /// Current weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// Target weight in kg
        #[arg(long)]
        target_weight: Option<f64>,
        /// Starting weight in kg
        #[arg(long)]
        start_weight: Option<f64>,
        /// Height in cm
        #[arg(long)]
        height: Option<f64>,
        /// Age in years
        #[arg(long)]
        age: Option<u32>,
        /// Gender: male or female
        #[arg(long)]
        gender: Option<String>,
        /// Protocol start date (YYYY-MM-DD)
        #[arg(long)]
        start_date: Option<String>,
        /// Protocol target date (YYYY-MM-DD)
        #[arg(long)]
        target_date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum HabitCommands {
    /// Show today's habits
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a glass of water (250 ml), or set the total with --ml
    Water {
        /// Set the total for today in ml
        #[arg(long)]
        ml: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set omega-3 capsules taken today (0-4)
    Omega3 {
        count: u8,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark the multivitamin as taken
    Multivitamin {
        /// Mark as not taken instead
        #[arg(long)]
        undo: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set today's step count
    Steps {
        steps: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a gym workout as done
    Gym {
        /// Mark as not done instead
        #[arg(long)]
        undo: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Record last night's sleep (24h HH:MM)
    Sleep {
        /// Bedtime, e.g. 23:00
        #[arg(required_unless_present = "clear")]
        start: Option<String>,
        /// Wake time, e.g. 07:00
        #[arg(required_unless_present = "clear")]
        end: Option<String>,
        /// Clear the recorded sleep
        #[arg(long, conflicts_with_all = ["start", "end"])]
        clear: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a custom habit (not part of the score)
    Add {
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Toggle a custom habit by ID (or unique ID prefix)
    Toggle {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a custom habit by ID (or unique ID prefix)
    Delete {
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PSMF_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn profile_update(
    weight: Option<f64>,
    target_weight: Option<f64>,
    start_weight: Option<f64>,
    height: Option<f64>,
    age: Option<u32>,
    gender: Option<&str>,
    start_date: Option<String>,
    target_date: Option<String>,
) -> Result<ProfileUpdate> {
    Ok(ProfileUpdate {
        start_date: start_date.map(|d| parse_date(Some(d))).transpose()?,
        target_date: target_date.map(|d| parse_date(Some(d))).transpose()?,
        height_cm: height,
        start_weight,
        current_weight: weight,
        target_weight,
        age,
        gender: gender.map(str::parse::<Gender>).transpose()?,
    })
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut svc = PsmfService::new(&config.db_path)?;

    match cli.command {
        Commands::Onboard {
            target_date,
            start_date,
            height,
            weight,
            target_weight,
            age,
            gender,
            json,
        } => cmd_onboard(
            &mut svc,
            OnboardArgs {
                start_date,
                target_date,
                height,
                start_weight: weight,
                target_weight,
                age,
                gender,
            },
            json,
        ),
        Commands::Profile { command } => match command {
            ProfileCommands::Show { json } => cmd_profile_show(&svc, json),
            ProfileCommands::Set {
                weight,
                target_weight,
                start_weight,
                height,
                age,
                gender,
                start_date,
                target_date,
                json,
            } => {
                let update = profile_update(
                    weight,
                    target_weight,
                    start_weight,
                    height,
                    age,
                    gender.as_deref(),
                    start_date,
                    target_date,
                )?;
                cmd_profile_set(&mut svc, &update, json)
            }
        },
        Commands::Log { text, photo, json } => {
            let analyzer = OpenRouterClient::new(AiSettings::from_env()?)?;
            cmd_log(&mut svc, &analyzer, text, photo.as_deref(), json).await
        }
        Commands::Entries { json } => cmd_entries(&svc, json),
        Commands::Remove { id, json } => cmd_remove(&mut svc, &id, json),
        Commands::Habit { command } => match command {
            HabitCommands::List { json } => cmd_habit_list(&svc, json),
            HabitCommands::Water { ml, json } => cmd_habit(&mut svc, HabitAction::Water(ml), json),
            HabitCommands::Omega3 { count, json } => {
                cmd_habit(&mut svc, HabitAction::Omega3(count), json)
            }
            HabitCommands::Multivitamin { undo, json } => {
                cmd_habit(&mut svc, HabitAction::Multivitamin(!undo), json)
            }
            HabitCommands::Steps { steps, json } => {
                cmd_habit(&mut svc, HabitAction::Steps(steps), json)
            }
            HabitCommands::Gym { undo, json } => cmd_habit(&mut svc, HabitAction::Gym(!undo), json),
            HabitCommands::Sleep {
                start,
                end,
                clear,
                json,
            } => {
                let action = match (start, end) {
                    (Some(start), Some(end)) if !clear => HabitAction::Sleep { start, end },
                    _ => HabitAction::ClearSleep,
                };
                cmd_habit(&mut svc, action, json)
            }
            HabitCommands::Add { name, json } => cmd_custom_add(&mut svc, &name, json),
            HabitCommands::Toggle { id, json } => cmd_custom_toggle(&mut svc, &id, json),
            HabitCommands::Delete { id, json } => cmd_custom_remove(&mut svc, &id, json),
        },
        Commands::Status { json } => cmd_status(&svc, json),
        Commands::Finish { date, json } => cmd_finish(&mut svc, parse_date(date)?, json),
        Commands::Calendar { json } => cmd_calendar(&svc, json),
        Commands::Day { date, json } => cmd_day(&svc, parse_date(Some(date))?, json),
        Commands::History { days, json } => cmd_history(&svc, days, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let (api_key, new_api_key) = if no_auth {
                (None, false)
            } else {
                let (key, new) = config.load_or_create_api_key()?;
                (Some(key), new)
            };
            let analyzer = match AiSettings::from_env() {
                Ok(settings) => Some(OpenRouterClient::new(settings)?),
                Err(e) => {
                    tracing::warn!("food analysis disabled: {e}");
                    None
                }
            };
            server::start_server(svc, analyzer, port, &bind, api_key, new_api_key).await
        }
        Commands::Reset { yes, json } => cmd_reset(&mut svc, yes, json),
    }
}
