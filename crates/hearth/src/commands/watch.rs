//! Live state stream.

use chrono::Local;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use hearth_core::{Session, StateChange};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ChangeLine<'a> {
    at: String,
    entity_id: &'a str,
    old: Option<&'a str>,
    new: Option<&'a str>,
}

fn wanted(args: &WatchArgs, change: &StateChange) -> bool {
    if !args.entity.is_empty() && !args.entity.contains(&change.entity_id) {
        return false;
    }
    match args.domain.as_deref() {
        Some(domain) => change
            .entity_id
            .split_once('.')
            .is_some_and(|(d, _)| d == domain),
        None => true,
    }
}

fn render(change: &StateChange, format: &OutputFormat, color: bool) -> String {
    let now = Local::now();
    match format {
        OutputFormat::Table => format!(
            "{}  {}  {} → {}",
            now.format("%H:%M:%S"),
            change.entity_id,
            output::paint_state(change.old.as_deref().unwrap_or("-"), color),
            output::paint_state(change.new.as_deref().unwrap_or("removed"), color),
        ),
        OutputFormat::Plain => format!(
            "{} {}",
            change.entity_id,
            change.new.as_deref().unwrap_or("removed")
        ),
        // One object per line so the stream stays parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(
            &ChangeLine {
                at: now.to_rfc3339(),
                entity_id: &change.entity_id,
                old: change.old.as_deref(),
                new: change.new.as_deref(),
            },
            true,
        ),
    }
}

pub async fn handle(session: &Session, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut changes = session.store().subscribe_state_changes();
    let color = output::should_color(&global.color);
    output::status("Watching state changes (Ctrl-C to stop)", global.quiet);

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            received = changes.recv() => match received {
                Ok(change) => {
                    if wanted(&args, &change) {
                        output::print_output(&render(&change, &global.output, color), global.quiet);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "watch fell behind, some changes were dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(entity_id: &str) -> StateChange {
        StateChange {
            entity_id: entity_id.into(),
            old: Some("off".into()),
            new: Some("on".into()),
        }
    }

    fn args(entity: &[&str], domain: Option<&str>) -> WatchArgs {
        WatchArgs {
            entity: entity.iter().map(|s| (*s).to_owned()).collect(),
            domain: domain.map(str::to_owned),
        }
    }

    #[test]
    fn filters_by_entity_and_domain() {
        assert!(wanted(&args(&[], None), &change("light.desk")));
        assert!(wanted(&args(&["light.desk"], None), &change("light.desk")));
        assert!(!wanted(&args(&["light.shelf"], None), &change("light.desk")));
        assert!(wanted(&args(&[], Some("light")), &change("light.desk")));
        assert!(!wanted(&args(&[], Some("switch")), &change("light.desk")));
    }

    #[test]
    fn plain_line_is_id_and_state() {
        assert_eq!(
            render(&change("light.desk"), &OutputFormat::Plain, false),
            "light.desk on"
        );
    }
}
