use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{ArgGroup, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod error;
mod models;
mod query;
mod recorders;
mod report;
mod scoring;
mod store;
mod tracker;

use config::Config;
use models::ActivityRecord;
use store::Store;
use tracker::PerformanceTracker;

#[derive(Parser)]
#[command(name = "agency-tracker")]
#[command(about = "Model activity and performance tracker for agency operations", long_about = None)]
struct Cli {
    /// JSON snapshot file to load from and save to
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,
    /// Postgres connection string, used when no snapshot file is given
    #[arg(long, global = true)]
    database_url: Option<String>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Record demo activity for a few models
    Seed,
    /// Record a single activity
    Record {
        #[command(subcommand)]
        event: RecordEvent,
    },
    /// Import activities from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Rank models by overall score
    Leaderboard {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// List activities, newest first
    Activities {
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        unread: bool,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Mark one activity, or all of a model's activities, as read
    #[command(group(
        ArgGroup::new("target")
            .args(["id", "model"])
            .required(true)
            .multiple(false)
    ))]
    MarkRead {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        model: Option<String>,
    },
    /// Show one model's score breakdown and activity counts
    Model {
        #[arg(long)]
        id: String,
    },
    /// Print agency-wide statistics
    Stats,
    /// Generate a markdown report
    Report {
        #[arg(long, default_value_t = 30)]
        since_days: i64,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write the full tracker state to a JSON file
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Replace the tracker state with a JSON snapshot
    ImportSnapshot {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum RecordEvent {
    Login {
        #[arg(long)]
        model: String,
    },
    Quiz {
        #[arg(long)]
        model: String,
        #[arg(long)]
        score: f64,
        #[arg(long)]
        chapter: String,
    },
    Payment {
        #[arg(long)]
        model: String,
        #[arg(long)]
        amount: f64,
    },
    Booking {
        #[arg(long)]
        model: String,
        #[arg(long)]
        details: String,
    },
    Casting {
        #[arg(long)]
        model: String,
        #[arg(long)]
        event: String,
    },
    Forum {
        #[arg(long)]
        model: String,
        #[arg(long)]
        thread: String,
    },
    Profile {
        #[arg(long)]
        model: String,
    },
}

fn init_tracing(filter: &str, json: bool) {
    let env_filter = EnvFilter::try_new(filter)
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn record(tracker: &PerformanceTracker, event: RecordEvent) -> anyhow::Result<ActivityRecord> {
    let record = match event {
        RecordEvent::Login { model } => tracker.record_login(&model)?,
        RecordEvent::Quiz {
            model,
            score,
            chapter,
        } => tracker.record_quiz_completion(&model, score, &chapter)?,
        RecordEvent::Payment { model, amount } => {
            tracker.record_payment_submission(&model, amount)?
        }
        RecordEvent::Booking { model, details } => {
            tracker.record_booking_request(&model, &details)?
        }
        RecordEvent::Casting { model, event } => {
            tracker.record_casting_application(&model, &event)?
        }
        RecordEvent::Forum { model, thread } => tracker.record_forum_post(&model, &thread)?,
        RecordEvent::Profile { model } => tracker.record_profile_update(&model)?,
    };
    Ok(record)
}

async fn load_tracker(store: &Store) -> anyhow::Result<PerformanceTracker> {
    let snapshot = store.load().await.context("failed to load tracker state")?;
    Ok(PerformanceTracker::from_snapshot(snapshot))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?.with_overrides(cli.snapshot.clone(), cli.database_url.clone());
    init_tracing(&config.log_filter, cli.log_json);

    let store = Store::connect(&config).await?;

    match cli.command {
        Commands::InitDb => {
            let Some(pool) = store.pool() else {
                bail!("init-db needs a Postgres store; drop --snapshot and set DATABASE_URL");
            };
            db::init_db(pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let tracker = load_tracker(&store).await?;
            let recorded = db::seed(&tracker)?;
            store.save(&tracker.export_data()).await?;
            println!("Recorded {recorded} seed activities.");
        }
        Commands::Record { event } => {
            let tracker = load_tracker(&store).await?;
            let activity = record(&tracker, event)?;
            store.save(&tracker.export_data()).await?;
            let score = tracker
                .model_performance(&activity.model_id)
                .map(|performance| performance.overall_score)
                .unwrap_or_default();
            println!(
                "Recorded {} for {} ({}); overall score now {:.0}.",
                activity.activity_type(),
                activity.model_id,
                activity.id,
                score
            );
        }
        Commands::Import { csv } => {
            let tracker = load_tracker(&store).await?;
            let summary = db::import_csv(&tracker, &csv)?;
            store.save(&tracker.export_data()).await?;
            println!(
                "Imported {} activities from {} ({} skipped).",
                summary.inserted,
                csv.display(),
                summary.skipped
            );
        }
        Commands::Leaderboard { limit } => {
            let tracker = load_tracker(&store).await?;
            let performances = tracker.all_performances();
            if performances.is_empty() {
                println!("No models have recorded activity yet.");
                return Ok(());
            }

            println!("Top models by overall score:");
            for performance in performances.iter().take(limit) {
                println!(
                    "- {} score {:.0} (quiz avg {:.0} over {} attempts, {} logins, {} bookings, {} castings, {} posts)",
                    performance.model_id,
                    performance.overall_score,
                    performance.average_quiz_score,
                    performance.total_quiz_attempts,
                    performance.total_login_days,
                    performance.total_bookings,
                    performance.total_castings,
                    performance.forum_posts
                );
            }
        }
        Commands::Activities {
            model,
            unread,
            limit,
        } => {
            let tracker = load_tracker(&store).await?;
            let activities = match (model.as_deref(), unread) {
                (model, true) => tracker.unread_activities(model),
                (Some(model), false) => tracker.model_activities(model),
                (None, false) => tracker.all_activities(),
            };
            if activities.is_empty() {
                println!("No activities found.");
                return Ok(());
            }

            for activity in activities.iter().take(limit) {
                println!(
                    "{} {} [{}] {} {}: {}",
                    if activity.is_read { " " } else { "*" },
                    activity.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    activity.id,
                    activity.model_id,
                    activity.title,
                    activity.description
                );
            }
        }
        Commands::MarkRead { id, model } => {
            let tracker = load_tracker(&store).await?;
            let changed = match (id, model) {
                (Some(id), _) => usize::from(tracker.mark_activity_as_read(&id)),
                (None, Some(model)) => tracker.mark_all_read(&model),
                (None, None) => 0,
            };
            store.save(&tracker.export_data()).await?;
            println!("Marked {changed} activities as read.");
        }
        Commands::Model { id } => {
            let tracker = load_tracker(&store).await?;
            let (Some(performance), Some(parts)) =
                (tracker.model_performance(&id), tracker.score_breakdown(&id))
            else {
                println!("No activity recorded for {id}.");
                return Ok(());
            };
            print!(
                "{}",
                report::build_model_summary(&performance, &parts, tracker.model_tracking(&id).as_ref())
            );
        }
        Commands::Stats => {
            let tracker = load_tracker(&store).await?;
            let stats = tracker.global_stats();
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Report { since_days, out } => {
            let tracker = load_tracker(&store).await?;
            let since = report::cutoff(since_days)?;
            let leaders: Vec<_> = tracker
                .all_performances()
                .into_iter()
                .filter_map(|performance| {
                    let parts = tracker.score_breakdown(&performance.model_id)?;
                    Some((performance, parts))
                })
                .collect();
            let output = report::build_report(
                since_days,
                since,
                &tracker.global_stats(),
                &tracker.activity_mix(since),
                &leaders,
                &tracker.all_activities(),
            );
            std::fs::write(&out, output)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { out } => {
            let tracker = load_tracker(&store).await?;
            std::fs::write(&out, tracker.export_json()?)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Snapshot written to {}.", out.display());
        }
        Commands::ImportSnapshot { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let tracker = PerformanceTracker::new();
            tracker.import_json(&raw)?;
            store.save(&tracker.export_data()).await?;
            info!(file = %file.display(), "replaced tracker state");
            println!("Tracker state replaced from {}.", file.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn record_subcommand_parses_quiz() {
        let cli = Cli::try_parse_from([
            "agency-tracker",
            "--snapshot",
            "state.json",
            "record",
            "quiz",
            "--model",
            "m1",
            "--score",
            "88",
            "--chapter",
            "Runway",
        ])
        .unwrap();
        assert_eq!(cli.snapshot, Some(PathBuf::from("state.json")));

        let Commands::Record { event } = cli.command else {
            panic!("expected record command");
        };
        let tracker = PerformanceTracker::new();
        let activity = record(&tracker, event).unwrap();
        assert_eq!(activity.model_id, "m1");
        assert_eq!(tracker.model_performance("m1").unwrap().average_quiz_score, 88.0);
    }

    #[test]
    fn model_subcommand_parses_id() {
        let cli = Cli::try_parse_from(["agency-tracker", "model", "--id", "ava"]).unwrap();
        assert!(matches!(cli.command, Commands::Model { id } if id == "ava"));
        assert!(Cli::try_parse_from(["agency-tracker", "model"]).is_err());
    }

    #[test]
    fn mark_read_needs_a_target() {
        assert!(Cli::try_parse_from(["agency-tracker", "mark-read"]).is_err());
        assert!(Cli::try_parse_from(["agency-tracker", "mark-read", "--id", "a", "--model", "m"]).is_err());
    }
}
