use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use memberkit::config::ConfigDiscovery;
use memberkit::{ClientConfig, Durability, MemberClient, RequestOptions, SessionError, env};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "memberkit", version, about = "Membership session client")]
struct Cli {
    /// Configuration file (overrides discovery)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in and persist the session
    Login {
        /// Document number (CPF)
        #[arg(long)]
        document: String,
        /// Password; read from MEMBERKIT_PASSWORD when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Drop the current session
    Logout,
    /// Show the logged-in identity
    Whoami {
        /// Print the full identity as JSON
        #[arg(long)]
        json: bool,
    },
    /// Call an endpoint through the dispatcher
    Request {
        endpoint: String,
        /// JSON object with the call parameters
        #[arg(long, default_value = "{}")]
        data: String,
        /// Attach the session credential
        #[arg(long)]
        auth: bool,
        /// Use GET with params in the query string
        #[arg(long)]
        get: bool,
        /// Send the body form-encoded instead of JSON
        #[arg(long)]
        form: bool,
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Show the resolved configuration
    Config,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "memberkit=debug"
    } else {
        "memberkit=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(session_error) = e.downcast_ref::<SessionError>() {
                error!("{}", session_error);
                eprintln!("{}", session_error.user_message());
                if session_error.requires_login() {
                    return ExitCode::from(2);
                }
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Config => show_config(&config)?,
        Command::Login { document, password } => {
            let client = MemberClient::new(config)?;
            let password = match password {
                Some(password) => password,
                None => std::env::var(env::vars::PASSWORD).map_err(|_| {
                    anyhow!("--password not given and {} is not set", env::vars::PASSWORD)
                })?,
            };
            let identity = client.login(&document, &password).await?;
            info!("Logged in as identity {}", identity.id);
            println!("Logged in as {} ({})", identity.name, identity.document);
        }
        Command::Logout => match MemberClient::new(config)?.logout().await {
            Durability::Persisted => println!("Logged out"),
            Durability::MemoryOnly { reason } => {
                return Err(anyhow!("session could not be removed from disk: {}", reason));
            }
        },
        Command::Whoami { json } => match MemberClient::new(config)?.current_identity().await {
            Some(identity) if json => {
                let value = serde_json::to_value(identity.without_credential())?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Some(identity) => println!(
                "{} ({}) - {} - valid until {}",
                identity.name,
                identity.document,
                identity.role.as_wire(),
                identity.valid_until
            ),
            None => return Err(SessionError::SessionInvalid.into()),
        },
        Command::Request {
            endpoint,
            data,
            auth,
            get,
            form,
            timeout_ms,
        } => {
            let params: Value =
                serde_json::from_str(&data).context("--data must be a JSON object")?;
            let mut options = RequestOptions::new(auth);
            if get {
                options = options.get();
            }
            if form {
                options = options.form();
            }
            if let Some(ms) = timeout_ms {
                options = options.with_timeout(Duration::from_millis(ms));
            }

            let client = MemberClient::new(config)?;
            let body = client.request_with(&endpoint, &params, options).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}

fn show_config(config: &ClientConfig) -> Result<()> {
    println!("Configuration Discovery Hierarchy:");
    for (i, candidate) in ConfigDiscovery::config_candidates().iter().enumerate() {
        let status = if candidate.is_file() {
            "✓ EXISTS"
        } else {
            "✗ NOT FOUND"
        };
        println!("  {}. {:?} - {}", i + 1, candidate, status);
    }
    println!();
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
