use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

mod attendance;
mod config;
mod db;
mod error;
mod models;
mod report;
mod risk;
mod roster;
mod server;
mod store;

use config::RiskConfig;
use store::RosterFilter;

#[derive(Parser)]
#[command(name = "attendance-early-warning")]
#[command(about = "At-risk student detection from school attendance records", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Scope {
    #[arg(long)]
    student_id: Option<Uuid>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    course: Option<String>,
    #[arg(long)]
    academic_year: Option<Uuid>,
}

impl Scope {
    fn filter(&self) -> RosterFilter {
        RosterFilter {
            student_id: self.student_id,
            username: self.username.clone(),
            course: self.course.clone(),
            academic_year: self.academic_year,
        }
    }

    fn label(&self) -> Option<String> {
        if let Some(course) = &self.course {
            Some(format!("course {course}"))
        } else if let Some(username) = &self.username {
            Some(format!("student {username}"))
        } else {
            self.student_id.map(|id| format!("student {id}"))
        }
    }
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
    /// List at-risk students
    Score {
        #[command(flatten)]
        scope: Scope,
        #[command(flatten)]
        risk: RiskConfig,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report of at-risk students
    Report {
        #[command(flatten)]
        scope: Scope,
        #[command(flatten)]
        risk: RiskConfig,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Serve the at-risk and attendance endpoints over HTTP
    Serve {
        #[command(flatten)]
        risk: RiskConfig,
        #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} attendance records from {}.", csv.display());
        }
        Commands::Score { scope, risk, limit } => {
            let store = db::PgStore::new(pool);
            let roster = roster::at_risk_roster(&store, &scope.filter(), &risk).await?;

            if roster.is_empty() {
                println!("No students currently flagged as at risk.");
                return Ok(());
            }

            println!("At-risk students:");
            for student in roster.iter().take(limit) {
                let reasons: Vec<&str> =
                    student.risk_reasons.iter().map(models::RiskReason::code).collect();
                println!(
                    "- {} ({}, {}) attendance {}%, {} consecutive absences: {}",
                    student.name,
                    student.username,
                    student.course,
                    student.attendance_percentage,
                    student.max_consecutive_absences,
                    reasons.join(", ")
                );
            }
        }
        Commands::Report { scope, risk, out } => {
            let store = db::PgStore::new(pool);
            let roster = roster::at_risk_roster(&store, &scope.filter(), &risk).await?;
            let report = report::build_report(
                scope.label().as_deref(),
                chrono::Utc::now().date_naive(),
                &roster,
                &risk,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve { risk, bind } => {
            let state = server::AppState {
                store: Arc::new(db::PgStore::new(pool)),
                config: risk,
            };
            server::serve(state, bind).await?;
        }
    }

    Ok(())
}
