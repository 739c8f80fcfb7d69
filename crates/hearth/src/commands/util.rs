//! Shared helpers for command handlers.

use std::io::IsTerminal;
use std::sync::Arc;

use hearth_core::{Area, ConnectionState, Entity, RemoteWrite, Scope, Session};

use crate::cli::ScopeOpts;
use crate::error::CliError;
use crate::output;

/// The ordered collection selected by `--room`/`--domain`.
pub fn scope_of(opts: &ScopeOpts) -> Scope {
    match (&opts.room, &opts.domain) {
        (Some(room), Some(domain)) => Scope::room_domain(room, domain),
        _ => Scope::Rooms,
    }
}

pub fn require_area(session: &Session, area_id: &str) -> Result<Arc<Area>, CliError> {
    session
        .store()
        .area(area_id)
        .ok_or_else(|| CliError::not_found("room", area_id, "rooms"))
}

pub fn require_entity(session: &Session, entity_id: &str) -> Result<Arc<Entity>, CliError> {
    session
        .store()
        .entity(entity_id)
        .ok_or_else(|| CliError::not_found("entity", entity_id, "entities <area>"))
}

/// Check that `id` names something the scope can order.
pub fn require_item(session: &Session, scope: &Scope, id: &str) -> Result<(), CliError> {
    match scope {
        Scope::Rooms => require_area(session, id).map(|_| ()),
        Scope::RoomDomain { area_id, .. } => {
            require_area(session, area_id)?;
            require_entity(session, id).map(|_| ())
        }
        Scope::Favorites { .. } => Ok(()),
    }
}

/// Item ids of a scope in current display order.
pub async fn display_order(session: &Session, scope: &Scope) -> Result<Vec<String>, CliError> {
    let ids = match scope {
        Scope::Rooms => session
            .rooms()
            .await?
            .iter()
            .map(|a| a.area_id.clone())
            .collect(),
        Scope::RoomDomain { area_id, domain } => {
            require_area(session, area_id)?;
            session
                .room_entities(area_id, domain)
                .await?
                .iter()
                .map(|e| e.entity_id.clone())
                .collect()
        }
        Scope::Favorites { section } => session.sync().favorites(*section).await?,
    };
    Ok(ids)
}

/// Human-readable name of an area or entity id, falling back to the id.
pub fn display_name(session: &Session, id: &str) -> String {
    if let Some(area) = session.store().area(id) {
        return area.name.clone();
    }
    session
        .store()
        .entity(id)
        .map_or_else(|| id.to_owned(), |e| e.display_name().to_owned())
}

/// Report where a local-first write ended up.
pub fn report_remote(remote: &RemoteWrite, what: &str, quiet: bool) {
    match remote {
        RemoteWrite::Skipped => output::status(&format!("{what} saved"), quiet),
        RemoteWrite::Mirrored => output::status(&format!("{what} saved and mirrored to hub"), quiet),
        RemoteWrite::Failed(reason) => {
            // Always shown: the hub now disagrees with local data.
            eprintln!("{what} saved locally; hub mirror failed: {reason}");
        }
    }
}

/// Recapture the cached layout after a write, logging failures.
pub async fn refresh_layout(session: &Session) {
    if let Err(e) = session.refresh_layout().await {
        tracing::warn!(error = %e, "layout cache refresh failed");
    }
}

pub fn describe_state(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Idle => "idle".into(),
        ConnectionState::Connecting => "connecting".into(),
        ConnectionState::Authenticating => "authenticating".into(),
        ConnectionState::Authenticated => "connected".into(),
        ConnectionState::Disconnected { attempt } => format!("reconnecting (attempt {attempt})"),
        ConnectionState::AuthFailed { message } => format!("authentication failed: {message}"),
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}
