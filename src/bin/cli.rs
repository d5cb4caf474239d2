use sqlx::Row;
use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use servicehub::audit::{self, AuditAction, NewAuditRecord, RequestContext};
use servicehub::authz::Role;
use servicehub::db;
use servicehub::entity::EntityKind;
use servicehub::routes::users::{insert_user, user_with_roles};
use servicehub::utils::normalize_email;

#[derive(Parser, Debug)]
#[command(author, version, about = "servicehub administration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Create a user directly in the database, e.g. a first OWNER
    CreateUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Role to grant; repeat for several (OWNER, AUDITOR, ...)
        #[arg(long = "role", value_parser = parse_role)]
        roles: Vec<Role>,
    },
    /// Recompute the audit hash chain and report the first broken record
    VerifyAudit,
}

fn parse_role(value: &str) -> Result<Role, String> {
    value.to_uppercase().parse()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::CreateUser {
            name,
            email,
            password,
            roles,
        } => {
            let pool = get_pool().await?;
            create_user(&pool, &name, &email, &password, &roles).await?;
        }
        Commands::VerifyAudit => {
            let pool = get_pool().await?;
            let report = audit::verify_chain(&pool).await?;
            println!("checked {} records", report.checked);
            match report.first_broken_seq {
                None => println!("audit chain intact"),
                Some(seq) => anyhow::bail!("audit chain broken at seq {seq}"),
            }
        }
    }

    Ok(())
}

async fn create_user(pool: &SqlitePool, name: &str, email: &str, password: &str, roles: &[Role]) -> anyhow::Result<()> {
    let email = normalize_email("email", email)?;

    let mut tx = db::begin_write(pool).await?;
    let user_id = insert_user(&mut *tx, name.trim(), &email, password, roles).await?;
    let user = user_with_roles(&mut *tx, user_id).await?;

    audit::record(
        &mut *tx,
        NewAuditRecord {
            actor_id: None,
            action: AuditAction::Create,
            entity_type: EntityKind::User,
            entity_id: user_id,
            prior_state: None,
            new_state: Some(serde_json::to_value(&user)?),
            context: RequestContext {
                ip: None,
                user_agent: Some("servicehub-cli".to_string()),
            },
        },
    )
    .await?;
    tx.commit().await?;

    println!("Created user {} ({}) with roles [{}]", user_id, email, user.roles.join(", "));
    Ok(())
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    let has_table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;

    let applied_versions: HashSet<i64> = if has_table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} Name", "Status", "Version");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        let desc = migration.description.trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, else the crate's own folder.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {display}"))
}
