use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use tokengate::config::{DEFAULT_CONFIG_FILE, LogoutPolicy, TokengateConfig};

mod cmd;

#[derive(Parser)]
#[command(name = "tokengate")]
#[command(version, about = "Token-review webhook and session client")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the token-review webhook server
    Serve {
        /// Port to serve on (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides server.bind)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Manage the credential database
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Manage users and their tokens
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Review a token against the credential database and print the response
    Review { token: String },
    /// Drive a client session against the primary backend
    Session {
        /// What a failed logout does to the stored credential (overrides client.logout_policy)
        #[arg(long, global = true)]
        logout_policy: Option<LogoutPolicy>,

        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Subcommand, Clone)]
pub enum DbCommands {
    /// Create the credential database
    Init,
}

#[derive(Subcommand, Clone)]
pub enum UserCommands {
    /// Add a user, or replace the token of an existing one
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        authority: String,
        /// Token to assign (generated when omitted)
        #[arg(long)]
        token: Option<String>,
    },
    /// Revoke a user's token
    Revoke {
        #[arg(long)]
        email: String,
    },
}

#[derive(Subcommand, Clone)]
pub enum SessionCommands {
    /// Log in and store the issued credential
    Login {
        #[arg(long)]
        email: Option<String>,
        #[arg(long, env = "TOKENGATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Resume the stored session and show its state
    Status,
    /// Log out of the stored session
    Logout,
    /// Request a password reset email
    ResetLink {
        #[arg(long)]
        email: String,
    },
    /// Set a new password using a reset token
    ResetPassword {
        #[arg(long)]
        email: String,
        #[arg(long)]
        token: String,
        #[arg(long, env = "TOKENGATE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

/// Install the global subscriber. The returned guard flushes the file
/// appender and must live until exit.
fn init_tracing(level: &str, json: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level '{}'", level))?;

    let stderr_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tokengate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = TokengateConfig::load_or_default(&cli.config)?;
    let _guard = init_tracing(&cli.log_level, cli.log_json, config.server.log_dir.as_deref())?;

    match &cli.command {
        Commands::Serve { port, bind } => {
            cmd::cmd_serve(&config, *port, bind.clone()).await?;
        }
        Commands::Db { command } => cmd::cmd_db(&config, command.clone())?,
        Commands::User { command } => cmd::cmd_user(&config, command.clone()).await?,
        Commands::Review { token } => cmd::cmd_review(&config, token).await?,
        Commands::Session {
            logout_policy,
            command,
        } => {
            let mut client = config.client.clone();
            if let Some(policy) = logout_policy {
                client.logout_policy = *policy;
            }
            cmd::cmd_session(&client, command.clone()).await?;
        }
    }

    Ok(())
}
