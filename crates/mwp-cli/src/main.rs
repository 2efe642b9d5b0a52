//! Ministry work planner administration
//!
//! Runs against the PostgreSQL database named by `DATABASE_URL`; a `.env`
//! file in the working directory is read first. Results are printed as JSON
//! on stdout, logs go to stderr.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mwp_core::config::AppConfig;
use mwp_core::traits::Id;
use mwp_db::{Database, Repositories};
use mwp_models::{Month, NewMinistry, NewUser, Week};
use mwp_services::Services;

#[derive(Parser)]
#[command(name = "mwp")]
#[command(about = "Ministry work planner administration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending schema migrations
    Migrate,
    /// Create a ministry
    CreateMinistry {
        #[arg(short, long)]
        name: String,
    },
    /// Register a user
    CreateUser {
        #[arg(short, long)]
        employee_id: String,
        #[arg(short, long, env = "MWP_NEW_USER_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        ministry_id: Option<Id>,
        #[arg(long)]
        department_id: Option<Id>,
        #[arg(long)]
        unit_id: Option<Id>,
        /// Head of unit; may approve plans of others
        #[arg(long)]
        head_of_unit: bool,
        #[arg(long)]
        head_of_department: bool,
    },
    /// Delete sessions idle longer than the configured timeout
    PurgeSessions,
    /// Task progress of a user's plans
    PlanSummary {
        #[arg(short, long)]
        employee_id: String,
        /// e.g. JANUARY
        #[arg(short, long, requires = "week")]
        month: Option<Month>,
        /// e.g. WEEK_1
        #[arg(short, long, requires = "month")]
        week: Option<Week>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;

    let db = Database::connect(&config.database)
        .await
        .context("failed to connect to the database")?;

    if let Command::Migrate = cli.command {
        db.migrate().await.context("migration failed")?;
        info!("Migrations applied");
        return Ok(());
    }

    let services = Services::new(Repositories::postgres(db.pool().clone(), config.deletion), &config);
    let output = run(cli.command, &services).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    db.close().await;
    Ok(())
}

async fn run(command: Command, services: &Services) -> anyhow::Result<serde_json::Value> {
    let output = match command {
        Command::Migrate => json!({ "migrated": true }),
        Command::CreateMinistry { name } => {
            let ministry = services.organization.create_ministry(NewMinistry::new(name)).await?;
            serde_json::to_value(ministry)?
        }
        Command::CreateUser {
            employee_id,
            password,
            role,
            ministry_id,
            department_id,
            unit_id,
            head_of_unit,
            head_of_department,
        } => {
            let mut dto = NewUser::new(employee_id, password);
            dto.role = role;
            dto.ministry_id = ministry_id;
            dto.department_id = department_id;
            dto.unit_id = unit_id;
            dto.head_of_unit = head_of_unit;
            dto.head_of_department = head_of_department;
            dto.staff = !(head_of_unit || head_of_department);

            let user = services.users.register(dto).await?;
            serde_json::to_value(user)?
        }
        Command::PurgeSessions => {
            let purged = services.sessions.purge_expired().await?;
            json!({ "purged": purged })
        }
        Command::PlanSummary {
            employee_id,
            month,
            week,
        } => {
            let user = services.users.find_by_employee_id(&employee_id).await?;
            let plans = match (month, week) {
                (Some(month), Some(week)) => services.plans.find_by_period(user.id, month, week).await?,
                _ => services.plans.all_for_user(user.id).await?,
            };

            let mut summary = Vec::with_capacity(plans.len());
            for plan in plans {
                let progress = services.plans.progress(plan.id).await?;
                summary.push(json!({
                    "period": plan.period(),
                    "approved": plan.approved,
                    "progress": progress,
                }));
            }
            json!({ "employee_id": user.employee_id, "plans": summary })
        }
    };
    Ok(output)
}

/// Initialize tracing/logging on stderr
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mwp_cli=debug,sqlx=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();
}
