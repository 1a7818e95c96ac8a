use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use groupscholar_attendance_summary::models::{AttendanceRecord, Course};
use groupscholar_attendance_summary::{attendance, input, report};

mod config;
mod db;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "attendance-summary")]
#[command(about = "Per-course attendance summaries for Group Scholar students", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("source")
        .args(["email", "records"])
        .required(true)
        .multiple(false)
))]
struct SourceArgs {
    /// Student email to load from the database
    #[arg(long)]
    email: Option<String>,
    /// JSON array of attendance records
    #[arg(long, requires = "courses")]
    records: Option<PathBuf>,
    /// JSON array of enrolled courses
    #[arg(long, requires = "records")]
    courses: Option<PathBuf>,
    /// Reference date for the two-week trend (defaults to today, UTC)
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import attendance records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Print a student's attendance summary
    Summary {
        #[command(flatten)]
        source: SourceArgs,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        source: SourceArgs,
        #[arg(long, default_value = "attendance-report.md")]
        out: PathBuf,
    },
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let database_url = config.require_database_url()?;
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn load_inputs(
    config: &AppConfig,
    source: &SourceArgs,
) -> anyhow::Result<(String, Vec<AttendanceRecord>, Vec<Course>)> {
    if let Some(email) = source.email.as_deref() {
        let pool = connect(config).await?;
        let (student_id, full_name) = db::find_student(&pool, email).await?;
        let (records, courses) = tokio::try_join!(
            db::fetch_attendance(&pool, student_id),
            db::fetch_courses(&pool, student_id),
        )?;
        return Ok((format!("{full_name} ({email})"), records, courses));
    }

    let records_path = source.records.as_ref().context("--records is required")?;
    let courses_path = source.courses.as_ref().context("--courses is required")?;
    let records = input::load_records(records_path)?;
    let courses = input::load_courses(courses_path)?;
    Ok((records_path.display().to_string(), records, courses))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(&config).await?;
            let inserted = db::seed(&pool).await?;
            println!("Seed data inserted ({inserted} new records).");
        }
        Commands::Import { csv } => {
            let pool = connect(&config).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} records from {}.", csv.display());
        }
        Commands::Summary { source, json } => {
            let as_of = source.as_of.unwrap_or_else(|| Utc::now().date_naive());
            let (label, records, courses) = load_inputs(&config, &source).await?;
            let summary = attendance::aggregate(&records, &courses, as_of);

            let dropped = (records.len() as u32).saturating_sub(summary.overall.total_classes);
            if dropped > 0 {
                warn!(dropped, "records reference courses outside the enrollment list");
            }
            info!(
                student = %label,
                courses = summary.courses.len(),
                total_classes = summary.overall.total_classes,
                percentage = summary.overall.percentage,
                "attendance summarized"
            );

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{}", report::render_table(&summary));
            }
        }
        Commands::Report { source, out } => {
            let as_of = source.as_of.unwrap_or_else(|| Utc::now().date_naive());
            let (label, records, courses) = load_inputs(&config, &source).await?;
            let summary = attendance::aggregate(&records, &courses, as_of);
            let markdown = report::build_report(&label, as_of, &summary);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
