//! Admin CLI for the feedback server.
//!
//! - `seed-admin`: create the admin user in the configured database. Running
//!   it again is harmless and reports that the user already exists.
//! - `hash-password`: print a stored-form password hash, for provisioning
//!   users by hand.

use clap::{Parser, Subcommand};
use feedback_server::auth::{self, AuthError, SeedOutcome};
use feedback_server::persistence::SqliteUserRepository;
use feedback_server::storage::{SqliteConnector, StorageError, StorageManager, StorageOptions};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "feedbackctl", about = "Administration tool for the feedback server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the admin user unless it already exists.
    SeedAdmin {
        #[arg(long, default_value = "admin")]
        username: String,
        /// Password for the new admin.
        #[arg(long, env = "FEEDBACK_ADMIN_PASSWORD", hide_env_values = true)]
        password: String,
        /// Database to seed, e.g. `sqlite://data/feedback.db`.
        #[arg(long, env = "FEEDBACK_DATABASE_URL")]
        database_url: String,
    },
    /// Hash a password into the stored `argon2id$salt$hash` form.
    HashPassword { password: String },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("could not open database: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .init();

    let cli = Cli::parse();
    let output = run(cli.command).await?;
    println!("{}", output);
    Ok(())
}

/// `RUST_LOG` when set and valid; otherwise warnings from dependencies and
/// this tool's own progress messages.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new("warn,feedbackctl=info"))
}

async fn run(command: Commands) -> Result<String, CliError> {
    match command {
        Commands::SeedAdmin {
            username,
            password,
            database_url,
        } => seed(&database_url, &username, &password).await,
        Commands::HashPassword { password } => Ok(auth::hash_password(&password)?),
    }
}

async fn seed(database_url: &str, username: &str, password: &str) -> Result<String, CliError> {
    let storage = StorageManager::new(SqliteConnector::new(StorageOptions::new(database_url)));
    storage.acquire().await?;

    let users = SqliteUserRepository::new(storage.clone());
    let outcome = auth::seed_admin(&users, username, password).await;
    storage.close().await;

    match outcome? {
        SeedOutcome::Created(user) => {
            tracing::info!(id = %user.id, "Admin user created");
            Ok(format!("Admin user '{}' created", user.username))
        }
        SeedOutcome::AlreadyExists => {
            Ok(format!("Admin user '{}' already exists", username.trim()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedback_server::auth::verify_password;

    #[test]
    fn test_parse_seed_admin() {
        let cli = Cli::try_parse_from([
            "feedbackctl",
            "seed-admin",
            "--password",
            "pw",
            "--database-url",
            "sqlite::memory:",
        ])
        .unwrap();
        match cli.command {
            Commands::SeedAdmin { username, .. } => assert_eq!(username, "admin"),
            Commands::HashPassword { .. } => panic!("wrong subcommand"),
        }
    }

    #[test]
    fn test_log_filter_shows_progress_by_default() {
        use tracing::level_filters::LevelFilter;

        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(
            log_filter(Some("feedbackctl=loudest")).max_level_hint(),
            Some(LevelFilter::INFO)
        );
        assert_eq!(log_filter(Some("error")).max_level_hint(), Some(LevelFilter::ERROR));
    }

    #[tokio::test]
    async fn test_hash_password_output_verifies() {
        let output = run(Commands::HashPassword {
            password: "hunter22".to_string(),
        })
        .await
        .unwrap();
        assert!(output.starts_with("argon2id$"));
        assert!(verify_password("hunter22", &output));
    }

    #[tokio::test]
    async fn test_seed_admin_twice() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("feedback.db").display());

        let first = seed(&url, "admin", "pw-one").await.unwrap();
        assert_eq!(first, "Admin user 'admin' created");

        let second = seed(&url, "admin", "pw-two").await.unwrap();
        assert_eq!(second, "Admin user 'admin' already exists");
    }

    #[tokio::test]
    async fn test_seed_admin_bad_url() {
        let err = seed("postgres://localhost/feedback", "admin", "pw")
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Storage(StorageError::InvalidOptions(_))));
    }
}
