use deepflect_core::auth::validate_sign_up;

use crate::cli::AuthCommands;
use crate::commands::common::{format_expiry, ProfileContext};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let profile = ProfileContext::load(global_profile)?;
    let session = profile.session()?;

    match command {
        AuthCommands::Register {
            email,
            password,
            confirm_password,
        } => {
            validate_sign_up(&email, &password, &confirm_password)?;
            session.register(&email, &password).await?;
            println!(
                "Registered {}. Run `deepflect auth login --email {}` to sign in.",
                email.trim(),
                email.trim()
            );
        }
        AuthCommands::Login { email, password } => {
            let stored = session.login(&email, &password).await?;
            println!(
                "Signed in profile '{}' as {} (access token expires {})",
                profile.name,
                email.trim(),
                format_expiry(stored.access_expires_at)
            );
        }
        AuthCommands::Status => {
            let stored = session.snapshot()?;
            if !stored.is_signed_in() {
                println!("Profile '{}' is not signed in.", profile.name);
                return Ok(());
            }
            match session.get_user().await {
                Ok(user) => println!(
                    "Profile '{}' is signed in as {} (access token expires {})",
                    profile.name,
                    user.email,
                    format_expiry(session.snapshot()?.access_expires_at)
                ),
                Err(error) if error.requires_login() => {
                    println!(
                        "Profile '{}' session has expired: {}",
                        profile.name,
                        error.user_message()
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }
        AuthCommands::Logout => {
            let result = session.logout().await;
            println!("Signed out profile '{}'", profile.name);
            if let Err(error) = result {
                tracing::warn!("Server did not confirm logout: {}", error);
            }
        }
        AuthCommands::ResetPassword { email } => {
            session.send_password_reset(&email).await?;
            println!("Password reset email sent to {}", email.trim());
        }
        AuthCommands::DeleteAccount { yes } => {
            if !yes {
                return Err(CliError::ConfirmationRequired);
            }
            session.delete_account().await?;
            println!("Account for profile '{}' deleted", profile.name);
        }
    }

    Ok(())
}
