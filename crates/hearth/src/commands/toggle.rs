//! Optimistic toggle with confirmation.

use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use hearth_core::Session;

use crate::cli::{GlobalOpts, OutputFormat, ToggleArgs};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ToggleResult {
    entity_id: String,
    predicted: String,
    /// State reported by the hub; `None` if nothing arrived in time.
    confirmed: Option<String>,
}

pub async fn handle(session: &Session, args: ToggleArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Subscribe first so the confirming frame cannot slip past.
    let mut changes = session.store().subscribe_state_changes();
    let predicted = session.toggle(&args.entity_id)?;

    let color = output::should_color(&global.color);
    if matches!(global.output, OutputFormat::Table) {
        output::status(
            &format!("{} → {} (pending)", args.entity_id, output::paint_state(&predicted, color)),
            global.quiet,
        );
    }

    let wait = async {
        loop {
            match changes.recv().await {
                Ok(change) if change.entity_id == args.entity_id => return change.new,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "state stream lagged while waiting for confirmation");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    };
    let confirmed = tokio::time::timeout(session.config().overlay_ttl, wait)
        .await
        .ok()
        .flatten();

    let result = ToggleResult {
        entity_id: args.entity_id,
        predicted,
        confirmed,
    };
    let out = output::render_single(
        &global.output,
        &result,
        |r| match r.confirmed.as_deref() {
            Some(state) if state == r.predicted => {
                format!("{} is {}", r.entity_id, output::paint_state(state, color))
            }
            Some(state) => format!(
                "{} stayed {} (hub overruled the toggle)",
                r.entity_id,
                output::paint_state(state, color)
            ),
            None => format!("{}: no confirmation from hub yet", r.entity_id),
        },
        |r| r.confirmed.clone().unwrap_or_else(|| r.predicted.clone()),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
