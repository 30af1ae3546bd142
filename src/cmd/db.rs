//! Credential database commands: `tokengate db`.

use anyhow::{Context, Result};

use super::super::DbCommands;
use tokengate::config::TokengateConfig;
use tokengate::store::SqliteCredentialStore;

pub fn cmd_db(config: &TokengateConfig, command: DbCommands) -> Result<()> {
    match command {
        DbCommands::Init => {
            let path = &config.server.db_path;
            SqliteCredentialStore::open(path)
                .with_context(|| format!("Failed to initialize {}", path.display()))?;
            println!("Credential database initialized at {}", path.display());
        }
    }
    Ok(())
}
