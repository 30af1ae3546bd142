//! User management commands: `tokengate user`.

use anyhow::{Context, Result};

use super::super::UserCommands;
use tokengate::config::TokengateConfig;
use tokengate::store::{SqliteCredentialStore, StoredUser};

pub async fn cmd_user(config: &TokengateConfig, command: UserCommands) -> Result<()> {
    let store = SqliteCredentialStore::open(&config.server.db_path)
        .context("Failed to open credential database")?;

    match command {
        UserCommands::Add {
            name,
            email,
            authority,
            token,
        } => {
            let token = match token {
                Some(t) if !t.trim().is_empty() => t.trim().to_string(),
                Some(_) => anyhow::bail!("--token must not be empty"),
                None => uuid::Uuid::new_v4().simple().to_string(),
            };
            store
                .upsert_user(
                    StoredUser {
                        name,
                        email: email.clone(),
                        authority,
                    },
                    token.clone(),
                )
                .await?;
            tracing::info!(%email, "user token issued");
            println!("{}", token);
        }
        UserCommands::Revoke { email } => {
            store.revoke(email.clone()).await?;
            println!("Revoked token for {}", email);
        }
    }
    Ok(())
}
