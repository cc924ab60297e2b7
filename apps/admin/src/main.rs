//! # stockroom-admin
//!
//! Operator tasks against a Stockroom database.
//!
//! ## Usage
//! ```bash
//! # Apply migrations and show their status
//! stockroom-admin migrate
//!
//! # Dashboard totals as JSON
//! stockroom-admin --json summary
//!
//! # Backup and restore
//! stockroom-admin backup --out backup.json
//! stockroom-admin restore --file backup.json
//!
//! # Remove items trashed more than 30 days ago
//! stockroom-admin purge-trash --days 30
//!
//! # Sample data for development
//! stockroom-admin --db ./dev.db seed --count 200
//! ```
//!
//! Configuration comes from `stockroom.toml` (see `--config`) and
//! `STOCKROOM_*` environment variables. Logging follows `RUST_LOG`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use stockroom_core::{Money, UserRole};
use stockroom_db::{migrations, seed};
use stockroom_services::{AppConfig, AppServices};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "info,stockroom=debug,sqlx=warn";

#[derive(Parser)]
#[command(name = "stockroom-admin", about = "Maintenance tasks for a Stockroom database", version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite file, overriding the configured path
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations
    Migrate,
    /// Print dashboard totals
    Summary,
    /// Export items, orders and (optionally) one user's settings
    Backup {
        /// Output file; stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
        /// Include this user's settings
        #[arg(long)]
        user: Option<String>,
    },
    /// Load a backup file
    Restore {
        #[arg(long)]
        file: PathBuf,
    },
    /// Permanently delete items trashed longer than the retention window
    PurgeTrash {
        /// Retention in days (defaults to preferences.trash_retention_days)
        #[arg(long)]
        days: Option<i64>,
    },
    /// Fill an empty database with sample warehouses, items, customers and orders
    Seed {
        #[arg(long, default_value_t = 50)]
        count: usize,
    },
    /// Add an organization
    CreateOrg {
        #[arg(long)]
        name: String,
    },
    /// Add a user
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_enum, default_value_t = RoleArg::Staff)]
        role: RoleArg,
        /// Organization id
        #[arg(long)]
        org: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
    Admin,
    Manager,
    Staff,
}

impl From<RoleArg> for UserRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => UserRole::Admin,
            RoleArg::Manager => UserRole::Manager,
            RoleArg::Staff => UserRole::Staff,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.clone()).context("failed to load configuration")?;
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    debug!(path = %config.database_path().display(), "Using database");

    let services = AppServices::connect(config)
        .await
        .context("failed to open database")?;

    let result = run(&services, cli.command, cli.json).await;
    services.db.close().await;
    result
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(services: &AppServices, command: Commands, json: bool) -> Result<()> {
    let inventory = &services.inventory;

    match command {
        Commands::Migrate => {
            let (total, applied) = migrations::migration_status(services.db.pool()).await?;
            if json {
                print_json(&serde_json::json!({ "total": total, "applied": applied }))?;
            } else {
                println!("Migrations applied: {applied}/{total}");
            }
        }

        Commands::Summary => {
            let summary = inventory.dashboard().await;
            if json {
                print_json(&summary)?;
            } else {
                let currency = services.config.currency()?;
                let locale = services.config.locale()?;
                let money = |cents: i64| Money::from_cents(cents).format(currency, locale);
                println!(
                    "Items:        {} ({} trashed)",
                    summary.total_items, summary.trashed_count
                );
                println!("Quantity:     {}", summary.total_quantity);
                println!("Stock value:  {}", money(summary.stock_value_cents));
                println!("Low stock:    {}", summary.low_stock_count);
                println!("Warehouses:   {}", summary.total_warehouses);
                println!("Customers:    {}", summary.total_customers);
                println!(
                    "Orders:       {} ({} pending)",
                    summary.total_orders, summary.pending_orders
                );
                println!("Revenue:      {}", money(summary.revenue_cents));
            }
        }

        Commands::Backup { out, user } => {
            let document = inventory
                .export_backup_json(user.as_deref())
                .await
                .context("backup failed")?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, document)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    info!(path = %path.display(), "Backup written");
                }
                None => println!("{document}"),
            }
        }

        Commands::Restore { file } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let report = inventory
                .restore_backup(&contents, None)
                .await
                .context("restore failed")?;
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "Restored {} items, {} orders ({} lines, {} skipped)",
                    report.items, report.orders, report.order_lines, report.skipped_lines
                );
            }
        }

        Commands::PurgeTrash { days } => {
            let days = days.unwrap_or(services.config.preferences.trash_retention_days);
            let purged = inventory
                .purge_expired_trash(days, None)
                .await
                .context("purge failed")?;
            if json {
                print_json(&purged)?;
            } else {
                println!("Purged {} item(s) trashed more than {days} day(s) ago", purged.len());
            }
        }

        Commands::Seed { count } => {
            let report = seed::seed(&services.db, count).await.context("seed failed")?;
            if json {
                print_json(&report)?;
            } else if report == seed::SeedReport::default() {
                println!("Database already has items, nothing seeded");
            } else {
                println!(
                    "Seeded {} warehouses, {} items, {} customers, {} orders",
                    report.warehouses, report.items, report.customers, report.orders
                );
            }
        }

        Commands::CreateOrg { name } => {
            let org = inventory
                .create_organization(&name)
                .await
                .context("failed to create organization")?;
            if json {
                print_json(&org)?;
            } else {
                println!("Created organization {} ({})", org.name, org.id);
            }
        }

        Commands::CreateUser {
            email,
            password,
            name,
            role,
            org,
        } => {
            let user = services
                .auth
                .register(&email, &password, name.as_deref(), role.into(), org.as_deref())
                .await
                .context("failed to create user")?;
            if json {
                print_json(&user)?;
            } else {
                println!("Created {:?} user {} ({})", user.role, user.email, user.id);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
