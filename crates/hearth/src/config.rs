//! CLI configuration: thin wrapper around `hearth_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--url, --token, --insecure, --timeout).

use std::time::Duration;

use secrecy::SecretString;

use hearth_core::{Credential, SessionConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use hearth_config::{Config, Profile, config_path, load_config, save_config, storage_dir};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build the `SessionConfig` for this invocation.
///
/// A configured profile is the base; flags override it. Without a profile
/// `--url` is required. An explicitly named profile must exist.
pub fn resolve_session_config(global: &GlobalOpts) -> Result<(String, SessionConfig), CliError> {
    let cfg = load_config()?;
    let profile_name = active_profile_name(global, &cfg);

    let mut profile = if global.profile.is_some() {
        cfg.profile(&profile_name)?.clone()
    } else if let Some(profile) = cfg.profiles.get(&profile_name) {
        profile.clone()
    } else {
        Profile {
            url: global.url.clone().ok_or_else(|| CliError::NoConfig {
                path: config_path().display().to_string(),
            })?,
            ..Profile::default()
        }
    };

    if let Some(ref url) = global.url {
        profile.url.clone_from(url);
    }
    if let Some(ref token) = global.token {
        profile.token = Some(token.clone());
        profile.client_id = None;
    }

    let mut session =
        hearth_config::profile_to_session_config(&profile, &profile_name, &cfg.defaults)?;

    // A flag token wins over env and keyring lookups.
    if let Some(ref token) = global.token {
        session.credential = Credential::Token(SecretString::from(token.clone()));
    }

    if global.insecure {
        session.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        session.request_timeout = Duration::from_secs(secs);
    }

    Ok((profile_name, session))
}
