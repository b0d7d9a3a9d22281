use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use shift_planner::db::PluginRoleRepository;
use shift_planner::identity;
use shift_planner::models::plugin_role::ELIGIBLE_CAPABILITY;
use shift_planner::validation::sanitize::sanitize_key;

#[derive(Parser, Debug)]
#[command(author, version, about = "shift-planner admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the last applied migration
    MigrateRollback,
    /// Give a user the site administrator flag
    PromoteAdmin {
        #[arg(long)]
        email: String,
    },
    /// Take the site administrator flag away
    DemoteAdmin {
        #[arg(long)]
        email: String,
    },
    /// Grant a site-wide capability such as `schema_user`
    GrantCapability {
        #[arg(long)]
        email: String,
        #[arg(long)]
        capability: String,
    },
    /// Revoke a site-wide capability
    RevokeCapability {
        #[arg(long)]
        email: String,
        #[arg(long)]
        capability: String,
    },
    /// Grant a plugin role in one organization (user must hold `schema_user`)
    GrantPluginRole {
        #[arg(long)]
        email: String,
        #[arg(long)]
        org_id: i64,
        #[arg(long)]
        role: String,
    },
    /// Revoke a plugin role in one organization
    RevokePluginRole {
        #[arg(long)]
        email: String,
        #[arg(long)]
        org_id: i64,
        #[arg(long)]
        role: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // CWD may not hold the .env (containers); fall back to the crate dir.
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
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
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator
                .undo(&pool, 1)
                .await
                .context("no migrations were rolled back")?;
            println!("Rolled back last migration");
        }
        Commands::PromoteAdmin { email } => {
            let pool = get_pool().await?;
            let user_id = user_id_for(&pool, &email).await?;
            identity::set_site_admin(&pool, user_id, true).await?;
            println!("{} is now a site administrator", email);
        }
        Commands::DemoteAdmin { email } => {
            let pool = get_pool().await?;
            let user_id = user_id_for(&pool, &email).await?;
            identity::set_site_admin(&pool, user_id, false).await?;
            println!("{} is no longer a site administrator", email);
        }
        Commands::GrantCapability { email, capability } => {
            let pool = get_pool().await?;
            let user_id = user_id_for(&pool, &email).await?;
            identity::grant_capability(&pool, user_id, &capability).await?;
            println!("Granted {} to {}", capability, email);
        }
        Commands::RevokeCapability { email, capability } => {
            let pool = get_pool().await?;
            let user_id = user_id_for(&pool, &email).await?;
            identity::revoke_capability(&pool, user_id, &capability).await?;
            println!("Revoked {} from {}", capability, email);
        }
        Commands::GrantPluginRole { email, org_id, role } => {
            let pool = get_pool().await?;
            let user_id = user_id_for(&pool, &email).await?;
            let caps = identity::capabilities(&pool, user_id).await?;
            if !caps.iter().any(|cap| cap == ELIGIBLE_CAPABILITY) {
                anyhow::bail!("{} lacks the {} capability", email, ELIGIBLE_CAPABILITY);
            }
            let role = plugin_role_key(&role)?;
            PluginRoleRepository::new(pool).grant(org_id, user_id, &role).await?;
            println!("Granted plugin role {} in organization {} to {}", role, org_id, email);
        }
        Commands::RevokePluginRole { email, org_id, role } => {
            let pool = get_pool().await?;
            let user_id = user_id_for(&pool, &email).await?;
            let role = plugin_role_key(&role)?;
            PluginRoleRepository::new(pool).revoke(org_id, user_id, &role).await?;
            println!("Revoked plugin role {} in organization {} from {}", role, org_id, email);
        }
    }

    Ok(())
}

async fn user_id_for(pool: &SqlitePool, email: &str) -> anyhow::Result<i64> {
    let user = identity::find_user_by_email(pool, email)
        .await?
        .with_context(|| format!("no user with email {}", email))?;
    Ok(user.user_id)
}

fn plugin_role_key(raw: &str) -> anyhow::Result<String> {
    let key = sanitize_key(raw);
    if key.is_empty() {
        anyhow::bail!("plugin role must contain letters, digits, '_' or '-'");
    }
    Ok(key)
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y_%m_%d_%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
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
    // nothing is applied until sqlx has created its bookkeeping table
    let tracked = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;
    let applied_versions: HashSet<i64> = if tracked.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let version = migration.version;
        let status = if applied_versions.contains(&version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // ./migrations when run from the repo root, else the crate's own folder
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", display))
}
