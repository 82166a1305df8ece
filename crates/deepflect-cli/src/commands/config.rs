use std::env;

use deepflect_core::config::{normalize_base_url, API_BASE_URL_ENV};

use crate::cli::ConfigCommands;
use crate::config_profiles::{normalize_text_option, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            api_base_url,
            no_activate,
        } => run_config_init(profile.as_deref().or(global_profile), api_base_url, no_activate),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    api_base_url: Option<String>,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).and_then(|profile| profile.api_base_url());

    let merged_api_base_url = merge_api_base_url(
        api_base_url,
        normalize_text_option(env::var(API_BASE_URL_ENV).ok()),
        existing,
    )?;

    let profile = config.profile_mut_or_default(&profile_name);
    if let Some(value) = merged_api_base_url {
        profile.api_base_url = Some(value);
    }

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    if config
        .profile(&profile_name)
        .and_then(|profile| profile.api_base_url())
        .is_some()
    {
        println!(
            "Profile '{profile_name}' is ready. Run `deepflect auth login --email <email> --password <password>`."
        );
    } else {
        println!("Profile '{profile_name}' is missing: api_base_url");
    }

    Ok(())
}

/// Explicit flag, then environment, then the value already stored. The
/// chosen URL is validated and normalized.
pub fn merge_api_base_url(
    explicit: Option<String>,
    from_env: Option<String>,
    existing: Option<String>,
) -> Result<Option<String>, CliError> {
    normalize_text_option(explicit)
        .or(from_env)
        .or(existing)
        .map(|url| normalize_base_url(&url).map_err(|error| CliError::Config(error.user_message())))
        .transpose()
}
