//! Session client commands: `tokengate session`.

use std::sync::Arc;

use anyhow::{Context, Result};

use super::super::SessionCommands;
use tokengate::config::ClientSection;
use tokengate::session::{
    FileStorage, HttpIdentityDirectory, HttpPrimaryBackend, PasswordReset, SessionController,
    SessionState,
};

fn build_controller(config: &ClientSection) -> Result<SessionController> {
    let primary = HttpPrimaryBackend::from_config(config)?;
    let directory = HttpIdentityDirectory::from_config(config)?;
    let storage = FileStorage::new(&config.storage_path());
    Ok(
        SessionController::new(Arc::new(primary), Arc::new(directory), Arc::new(storage))
            .with_logout_policy(config.logout_policy),
    )
}

fn prompt_password(confirm: bool) -> Result<String> {
    let mut prompt = dialoguer::Password::new().with_prompt("Password");
    if confirm {
        prompt = prompt.with_confirmation("Confirm password", "Passwords do not match");
    }
    prompt.interact().context("Failed to read password")
}

fn print_state(controller: &SessionController) {
    match controller.state() {
        SessionState::Authenticated { local, .. } => {
            println!("Authenticated as {} <{}> ({})", local.name, local.email, local.authority);
        }
        SessionState::LocalOnly { local } => {
            println!(
                "Logged in as {} <{}>, but the identity directory has not confirmed the user",
                local.name, local.email
            );
        }
        other => println!("Not authenticated ({})", other.kind()),
    }
    if !controller.message().is_empty() {
        println!("{}", controller.message());
    }
}

pub async fn cmd_session(config: &ClientSection, command: SessionCommands) -> Result<()> {
    let mut controller = build_controller(config)?;

    match command {
        SessionCommands::Login { email, password } => {
            let email = match email {
                Some(email) => email,
                None => dialoguer::Input::<String>::new()
                    .with_prompt("Email")
                    .interact_text()
                    .context("Failed to read email")?,
            };
            let password = match password {
                Some(password) => password,
                None => prompt_password(false)?,
            };
            controller.login(&email, &password).await;
            print_state(&controller);
            if controller.local_identity().is_none() {
                anyhow::bail!("Login failed");
            }
        }
        SessionCommands::Status => {
            controller.start().await;
            print_state(&controller);
        }
        SessionCommands::Logout => {
            controller.start().await;
            controller.logout().await;
            if controller.message().is_empty() {
                println!("Logged out");
            } else {
                println!("Logout failed: {}", controller.message());
            }
        }
        SessionCommands::ResetLink { email } => {
            let sent = controller.send_reset_link(&email).await;
            println!("{}", controller.message());
            if !sent {
                anyhow::bail!("Reset link request failed");
            }
        }
        SessionCommands::ResetPassword {
            email,
            token,
            password,
        } => {
            let (password, password_confirmation) = match password {
                Some(password) => (password.clone(), password),
                None => {
                    let password = prompt_password(true)?;
                    (password.clone(), password)
                }
            };
            let reset = PasswordReset {
                email,
                token,
                password,
                password_confirmation,
            };
            let updated = controller.reset_password(&reset).await;
            println!("{}", controller.message());
            if !updated {
                anyhow::bail!("Password reset failed");
            }
        }
    }
    Ok(())
}
