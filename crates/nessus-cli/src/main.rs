//! nessus - command-line access to a Nessus scanner.
//!
//! Authenticates once per token lifetime (the token is kept in
//! `.nessus_token` by default) and runs a single operation per invocation.

mod credentials;

use std::io;

use anyhow::{bail, Context, Result};
use nessus_core::{ApiError, Config, FileTokenCache, HttpTransport, LaunchScan, Session};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use credentials::CredentialStore;

const ENV_PASSWORD: &str = "NESSUS_PASSWORD";

const USAGE: &str = "\
Usage: nessus <command>

Commands:
  check                               Authenticate and report where the token came from
  policies                            List scan policies
  reports                             List reports
  scans                               List scans
  plugins                             List plugin families
  report <uuid>                       Download a report to stdout
  launch <name> <policy_id> <target>... Start a scan
  logout                              End the server session
  forget                              Delete the saved token and keychain password

Configuration: ~/.config/pynessus/config.json or NESSUS_SERVER, NESSUS_PORT,
NESSUS_USERNAME, NESSUS_TOKEN_FILE, NESSUS_PASSWORD (a .env file is honoured).";

type CliSession = Session<HttpTransport, FileTokenCache>;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first().map(String::as_str) else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };
    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;

    if command == "forget" {
        return forget(&config);
    }

    let mut session = connect(&config).await?;
    let result = run(&mut session, command, &args[1..]).await;

    if let Err(ref e) = result {
        if matches!(e.downcast_ref::<ApiError>(), Some(ApiError::AuthorizationExpired)) {
            eprintln!(
                "The server no longer accepts the session token; \
                 run the command again to log in."
            );
        }
    }
    result
}

async fn connect(config: &Config) -> Result<CliSession> {
    let password = password(config)?;
    let credentials = config.credentials(password)?;
    let server = credentials.host().to_string();
    let username = credentials.username().to_string();

    let session = Session::connect(credentials, config.transport()?, config.token_cache())
        .await
        .with_context(|| format!("Could not authenticate to {}", server))?;

    if let Some(warning) = session.persistence_warning() {
        eprintln!("Warning: {}", warning);
    }
    info!(server = %server, username = %username, source = ?session.last_source(), "Session ready");
    Ok(session)
}

/// Password from the environment, the keychain, or an interactive prompt
fn password(config: &Config) -> Result<String> {
    if let Ok(password) = std::env::var(ENV_PASSWORD) {
        return Ok(password);
    }

    let (server, username) = match (config.server.as_deref(), config.username.as_deref()) {
        (Some(s), Some(u)) => (s, u),
        _ => bail!("Scanner and username must be configured first\n\n{}", USAGE),
    };

    if let Ok(password) = CredentialStore::get_password(server, username) {
        return Ok(password);
    }

    let password = rpassword::prompt_password(format!("Password for {}@{}: ", username, server))
        .context("Failed to read password")?;
    if let Err(e) = CredentialStore::store(server, username, &password) {
        warn!(error = %e, "Failed to store credentials");
    }
    Ok(password)
}

async fn run(session: &mut CliSession, command: &str, args: &[String]) -> Result<()> {
    match command {
        "check" => {
            print_json(&json!({
                "server": session.client().base_url(),
                "authenticated": session.is_authenticated(),
                "state": format!("{:?}", session.state()),
                "source": session.last_source().map(|s| format!("{:?}", s)),
            }))?;
        }
        "policies" => print_json(&session.client().policies().await?)?,
        "reports" => print_json(&session.client().reports().await?)?,
        "scans" => {
            let scans: Vec<_> = session
                .client()
                .scans()
                .await?
                .into_iter()
                .map(|scan| {
                    let progress = scan.progress_percent();
                    json!({ "scan": scan, "progress_percent": progress })
                })
                .collect();
            print_json(&scans)?;
        }
        "plugins" => print_json(&session.client().plugin_families().await?)?,
        "report" => {
            let [uuid] = args else {
                bail!("Usage: nessus report <uuid>");
            };
            print!("{}", session.client().get_report(uuid).await?);
        }
        "launch" => {
            let [name, policy_id, targets @ ..] = args else {
                bail!("Usage: nessus launch <name> <policy_id> <target>...");
            };
            let scan = targets
                .iter()
                .fold(LaunchScan::new(name.as_str(), policy_id.as_str()), |scan, t| {
                    scan.target(t.as_str())
                });
            let uuid = session.client().launch_scan(&scan).await?;
            println!("{}", uuid);
        }
        "logout" => session.logout().await?,
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
    Ok(())
}

fn forget(config: &Config) -> Result<()> {
    config.token_cache().clear()?;
    if let (Some(server), Some(username)) = (config.server.as_deref(), config.username.as_deref()) {
        if let Err(e) = CredentialStore::delete(server, username) {
            warn!(error = %e, "No keychain entry removed");
        }
    }
    println!("Saved token removed");
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
