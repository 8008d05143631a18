//! Gatehouse - command-line host for the admin console session manager.
//!
//! Each subcommand maps onto one session operation, the way the console's
//! login, profile and settings pages call into it. State persists between
//! runs in the configured backend (data directory or OS keychain).

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatehouse_core::{
    auth::hash_password, AuthError, Config, CredentialRecord, ProfileUpdate, SessionManager,
};
use serde_json::{Map, Value};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(about = "Session management for the admin console")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to ~/.config/gatehouse/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Read secrets from stdin, one per line, instead of prompting
    #[arg(long, global = true)]
    password_stdin: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and start a new session
    Login {
        /// Account email (defaults to the last one used)
        #[arg(short, long)]
        email: Option<String>,
    },

    /// End the current session
    Logout,

    /// Show who is signed in and when the session expires
    Status,

    /// Print the signed-in user as JSON
    Whoami,

    /// Print the current bearer token
    Token,

    /// Push the session expiry out by a full session lifetime
    Extend,

    /// Merge profile fields into the signed-in user, e.g. `name=Ada phone=555`
    UpdateProfile {
        /// key=value pairs; values parse as JSON when possible
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Change the signed-in user's password
    ChangePassword,

    /// Replace the credential collection with the records in a JSON file
    Seed {
        /// JSON array of {id, email, password, ...profile}
        file: PathBuf,
    },

    /// Print an Argon2 hash of a password for use in seed files
    HashPassword,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "gatehouse.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            None
        }
    }
}

/// Reads secrets either from the terminal or from stdin lines.
struct SecretReader {
    from_stdin: bool,
}

impl SecretReader {
    fn read(&self, prompt: &str) -> Result<String> {
        if self.from_stdin {
            let mut line = String::new();
            io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read secret from stdin")?;
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        } else {
            rpassword::prompt_password(prompt).context("Failed to read password")
        }
    }
}

fn prompt_line(prompt: &str, default: Option<&str>) -> Result<String> {
    match default {
        Some(d) => eprint!("{} [{}]: ", prompt, d),
        None => eprint!("{}: ", prompt),
    }
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim();
    match (value.is_empty(), default) {
        (true, Some(d)) => Ok(d.to_string()),
        (true, None) => anyhow::bail!("{} is required", prompt),
        (false, _) => Ok(value.to_string()),
    }
}

/// Parse `key=value` arguments into a profile update. Values that are valid
/// JSON (numbers, booleans, objects, quoted strings) keep their type; anything
/// else is taken as a plain string.
fn parse_profile_fields(fields: &[String]) -> Result<ProfileUpdate> {
    let mut map = Map::new();
    for field in fields {
        let (key, raw) = field
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Expected key=value, got '{}'", field))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Empty field name in '{}'", field);
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        map.insert(key.to_string(), value);
    }
    Ok(ProfileUpdate::from(map))
}

fn load_seed_file(path: &Path) -> Result<Vec<CredentialRecord>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read seed file {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse seed file {}", path.display()))
}

async fn run(cli: Cli, config: Config, config_path: PathBuf) -> Result<()> {
    let manager: SessionManager = config.session_manager()?;
    let secrets = SecretReader {
        from_stdin: cli.password_stdin,
    };

    match cli.command {
        Commands::Login { email } => {
            let email = match email {
                Some(e) => e,
                None => prompt_line("Email", config.last_email.as_deref())?,
            };
            let password = secrets.read("Password: ")?;
            let session = manager.authenticate(&email, &password).await?;

            // Persist only the file's own settings, not environment overrides
            let mut stored = Config::load_from(&config_path).unwrap_or_default();
            stored.last_email = Some(session.user.email.clone());
            if let Err(e) = stored.save_to(&config_path) {
                debug!(error = %e, "Failed to remember last email");
            }
            println!(
                "Signed in as {} (session expires in {})",
                session.user.display_name(),
                session.remaining_display()
            );
        }
        Commands::Logout => {
            manager.end_session()?;
            println!("Signed out");
        }
        Commands::Status => match manager.current_session()? {
            Some(session) => {
                let expires = session
                    .expires_at_utc()
                    .map(|dt| dt.with_timezone(&chrono::Local).format("%b %d, %Y %H:%M").to_string())
                    .unwrap_or_else(|| session.expires_at.to_string());
                println!("Signed in as {} <{}>", session.user.display_name(), session.user.email);
                println!("Expires {} ({} left)", expires, session.remaining_display());
            }
            None => println!("Not signed in"),
        },
        Commands::Whoami => {
            let user = manager
                .current_identity()?
                .ok_or_else(|| anyhow::anyhow!("Not signed in"))?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Commands::Token => {
            let token = manager
                .current_token()?
                .ok_or_else(|| anyhow::anyhow!("Not signed in"))?;
            println!("{}", token);
        }
        Commands::Extend => {
            if !manager.extend()? {
                anyhow::bail!("Not signed in");
            }
            if let Some(session) = manager.current_session()? {
                println!("Session extended ({} left)", session.remaining_display());
            }
        }
        Commands::UpdateProfile { fields } => {
            let update = parse_profile_fields(&fields)?;
            if update.is_empty() {
                anyhow::bail!("Nothing to update: 'id' and 'password' cannot be changed here");
            }
            let user = manager.update_profile(update).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Commands::ChangePassword => {
            let current = secrets.read("Current password: ")?;
            let new = secrets.read("New password: ")?;
            if !cli.password_stdin {
                let confirm = secrets.read("Confirm new password: ")?;
                if confirm != new {
                    anyhow::bail!("Passwords do not match");
                }
            }
            manager.change_password(&current, &new).await?;
            println!("Password changed");
        }
        Commands::Seed { file } => {
            let records = load_seed_file(&file)?;
            let count = records.len();
            let converted = manager.seed_credentials(records)?;
            println!("Seeded {} credential records ({} passwords hashed)", count, converted);
        }
        Commands::HashPassword => {
            let password = secrets.read("Password: ")?;
            println!("{}", hash_password(&password)?);
        }
    }
    Ok(())
}

/// Exit status for a failed command: 1 when the user can retry with
/// different input (bad password, not signed in), 2 for everything else.
fn exit_code_for(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<AuthError>() {
        Some(e) if e.is_user_error() => 1,
        _ => 2,
    }
}

async fn start(cli: Cli) -> Result<()> {
    let (config, config_path) = match cli.config.clone() {
        Some(path) => {
            let config = Config::load_from(&path)?.with_overrides(|name| std::env::var(name).ok())?;
            (config, path)
        }
        None => (Config::load()?, Config::config_path()?),
    };
    info!(backend = ?config.backend, namespace = %config.namespace, "Gatehouse starting");

    run(cli, config, config_path).await
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_dir.as_ref());

    match start(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_profile_fields_keeps_json_types() {
        let update = parse_profile_fields(&[
            "name=Ada Lovelace".to_string(),
            "age=36".to_string(),
            "admin=true".to_string(),
            "tags=[\"ops\"]".to_string(),
        ])
        .unwrap();
        assert_eq!(update.0.get("name"), Some(&json!("Ada Lovelace")));
        assert_eq!(update.0.get("age"), Some(&json!(36)));
        assert_eq!(update.0.get("admin"), Some(&json!(true)));
        assert_eq!(update.0.get("tags"), Some(&json!(["ops"])));
    }

    #[test]
    fn test_parse_profile_fields_value_may_contain_equals() {
        let update = parse_profile_fields(&["bio=a=b".to_string()]).unwrap();
        assert_eq!(update.0.get("bio"), Some(&json!("a=b")));
    }

    #[test]
    fn test_parse_profile_fields_rejects_bad_pairs() {
        assert!(parse_profile_fields(&["name".to_string()]).is_err());
        assert!(parse_profile_fields(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses_login() {
        let cli = Cli::try_parse_from(["gatehouse", "login", "--email", "a@b.com"]).unwrap();
        assert!(matches!(cli.command, Commands::Login { email: Some(ref e) } if e == "a@b.com"));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gatehouse",
            "login",
            "--config",
            "/tmp/gatehouse.json",
            "--log-dir",
            "/tmp/logs",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/gatehouse.json")));
        assert_eq!(cli.log_dir, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn test_exit_code_separates_user_errors() {
        let user: anyhow::Error = AuthError::InvalidCredentials.into();
        assert_eq!(exit_code_for(&user), 1);

        let other = anyhow::anyhow!("disk on fire");
        assert_eq!(exit_code_for(&other), 2);
    }

    #[test]
    fn test_seed_file_parses_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, r#"[{"id":1,"email":"a@b.com","password":"pw1","name":"A"}]"#).unwrap();

        let records = load_seed_file(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].profile.get("name"), Some(&json!("A")));
        assert!(load_seed_file(&dir.path().join("missing.json")).is_err());
    }
}
