//! Label mirroring control.

use std::fmt::Write as _;

use owo_colors::OwoColorize;
use serde::Serialize;

use hearth_core::{Session, SyncReport};

use crate::cli::{GlobalOpts, SyncArgs, SyncCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct SyncStatus {
    enabled: bool,
    connection: String,
    label_prefix: String,
    owned_labels: usize,
    scopes: Vec<String>,
    hidden: usize,
    /// Local values whose label mirror has not landed yet.
    pending: usize,
}

fn status_detail(status: &SyncStatus, color: bool) -> String {
    let mut out = String::new();
    let enabled = if status.enabled { "enabled" } else { "disabled" };
    let enabled = match (color, status.enabled) {
        (true, true) => enabled.green().to_string(),
        (true, false) => enabled.yellow().to_string(),
        (false, _) => enabled.to_owned(),
    };
    let _ = writeln!(out, "Sync:         {enabled}");
    let _ = writeln!(out, "Connection:   {}", status.connection);
    let _ = writeln!(out, "Label prefix: {}", status.label_prefix);
    let _ = writeln!(out, "Owned labels: {}", status.owned_labels);
    let _ = writeln!(out, "Hidden:       {}", status.hidden);
    let _ = writeln!(out, "Pending:      {}", status.pending);
    let _ = write!(out, "Scopes:       {}", status.scopes.len());
    for scope in &status.scopes {
        let _ = write!(out, "\n  {scope}");
    }
    out
}

fn report(outcome: SyncReport, action: &str, quiet: bool) {
    output::status(
        &format!("{action}: {} label write(s), {} failed", outcome.mirrored, outcome.failed),
        quiet,
    );
}

pub async fn handle(session: &Session, args: SyncArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let sync = session.sync();
    match args.command {
        SyncCommand::Status => {
            let codec = sync.codec();
            let connection = util::describe_state(&session.connection_state().borrow());
            let status = SyncStatus {
                enabled: sync.sync_enabled(),
                connection,
                label_prefix: codec.prefix().to_owned(),
                owned_labels: session
                    .store()
                    .labels_snapshot()
                    .iter()
                    .filter(|l| codec.is_owned(&l.name))
                    .count(),
                scopes: sync
                    .scopes()
                    .await?
                    .iter()
                    .map(hearth_core::Scope::storage_key)
                    .collect(),
                hidden: hearth_core::OrderSyncService::hidden(sync).await?.len(),
                pending: sync.pending_mirrors().await?,
            };
            let color = output::should_color(&global.color);
            let out = output::render_single(
                &global.output,
                &status,
                |s| status_detail(s, color),
                |s| if s.enabled { "enabled".into() } else { "disabled".into() },
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        SyncCommand::Enable => {
            let pushed = sync.set_sync_enabled(true).await?;
            report(pushed, "Sync enabled", global.quiet);
            Ok(())
        }

        SyncCommand::Disable => {
            if !util::confirm(
                "Disable sync and remove this client's labels from the hub? Local data is kept.",
                "sync disable",
                global.yes,
            )? {
                return Ok(());
            }
            let removed = sync.set_sync_enabled(false).await?;
            report(removed, "Sync disabled", global.quiet);
            Ok(())
        }

        SyncCommand::Pull => {
            if !sync.sync_enabled() {
                return Err(CliError::Validation {
                    field: "sync".into(),
                    reason: "sync is disabled; run `hearth sync enable` first".into(),
                });
            }
            let scopes = sync.pull_remote().await?;
            util::refresh_layout(session).await;
            output::status(&format!("Pulled {scopes} scope(s) from hub labels"), global.quiet);
            Ok(())
        }
    }
}
