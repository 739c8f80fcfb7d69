//! Config subcommand handlers.

use std::io::IsTerminal;

use dialoguer::Password;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Format config for display, masking secrets.
fn format_config_redacted(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "gap = {}", cfg.defaults.gap);
    let _ = write!(out, "overlay_ttl = {}", cfg.defaults.overlay_ttl);

    for (name, p) in &cfg.profiles {
        let _ = writeln!(out);
        let _ = writeln!(out, "\n[profiles.{name}]");
        let _ = write!(out, "url = \"{}\"", p.url);
        if p.token.is_some() {
            let _ = write!(out, "\ntoken = \"****\"");
        }
        if let Some(ref env) = p.token_env {
            let _ = write!(out, "\ntoken_env = \"{env}\"");
        }
        if p.refresh_token.is_some() {
            let _ = write!(out, "\nrefresh_token = \"****\"");
        }
        if let Some(ref env) = p.refresh_token_env {
            let _ = write!(out, "\nrefresh_token_env = \"{env}\"");
        }
        if let Some(ref id) = p.client_id {
            let _ = write!(out, "\nclient_id = \"{id}\"");
        }
        if let Some(ref ca) = p.ca_cert {
            let _ = write!(out, "\nca_cert = \"{}\"", ca.display());
        }
        if let Some(insecure) = p.insecure {
            let _ = write!(out, "\ninsecure = {insecure}");
        }
        if let Some(timeout) = p.timeout {
            let _ = write!(out, "\ntimeout = {timeout}");
        }
        if let Some(gap) = p.gap {
            let _ = write!(out, "\ngap = {gap}");
        }
        if let Some(ref prefix) = p.label_prefix {
            let _ = write!(out, "\nlabel_prefix = \"{prefix}\"");
        }
    }

    out
}

/// Copy of the config with secrets masked, for structured output.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for p in cfg.profiles.values_mut() {
        if p.token.is_some() {
            p.token = Some("****".into());
        }
        if p.refresh_token.is_some() {
            p.refresh_token = Some("****".into());
        }
    }
    cfg
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config()?);
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |c| {
                c.profiles.keys().cloned().collect::<Vec<_>>().join("\n")
            });
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            if cfg.profiles.is_empty() {
                output::status("No profiles configured. Run: hearth config add <name> --url <url>", global.quiet);
                return Ok(());
            }
            let default = config::active_profile_name(global, &cfg);
            let lines: Vec<String> = cfg
                .profiles
                .keys()
                .map(|name| if *name == default { format!("{name} *") } else { name.clone() })
                .collect();
            output::print_output(&lines.join("\n"), global.quiet);
            Ok(())
        }

        ConfigCommand::Add {
            name,
            url,
            token_env,
            client_id,
            default,
        } => {
            hearth_config::endpoint_url(&url)?;
            let mut cfg = config::load_config()?;
            let replaced = cfg.profiles.contains_key(&name);
            cfg.profiles.insert(
                name.clone(),
                Profile {
                    url,
                    token_env,
                    client_id,
                    ..Profile::default()
                },
            );
            if default || cfg.default_profile.is_none() {
                cfg.default_profile = Some(name.clone());
            }
            config::save_config(&cfg)?;
            let verb = if replaced { "Replaced" } else { "Added" };
            output::status(
                &format!("✓ {verb} profile '{name}'; store a token with: hearth -p {name} config set-token"),
                global.quiet,
            );
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config()?;
            cfg.profile(&name)?;
            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            output::status(&format!("✓ Default profile set to '{name}'"), global.quiet);
            Ok(())
        }

        ConfigCommand::SetToken { refresh } => {
            let cfg = config::load_config()?;
            let profile_name = config::active_profile_name(global, &cfg);
            let kind = if refresh { "refresh-token" } else { "token" };

            let secret = match global.token.clone() {
                Some(token) => token,
                None if std::io::stdin().is_terminal() => Password::new()
                    .with_prompt(format!("{kind} for profile '{profile_name}'"))
                    .interact()
                    .map_err(|e| CliError::Io(std::io::Error::other(e)))?,
                None => {
                    return Err(CliError::Validation {
                        field: "token".into(),
                        reason: "pass --token when not running interactively".into(),
                    });
                }
            };
            if secret.is_empty() {
                return Err(CliError::Validation {
                    field: "token".into(),
                    reason: "token cannot be empty".into(),
                });
            }

            hearth_config::store_secret(&profile_name, kind, &secret)?;
            output::status(
                &format!("✓ {kind} for profile '{profile_name}' stored in system keyring"),
                global.quiet,
            );
            Ok(())
        }
    }
}
