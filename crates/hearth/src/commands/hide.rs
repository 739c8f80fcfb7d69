//! Visibility overrides.

use hearth_core::Session;

use crate::cli::{GlobalOpts, HideArgs};
use crate::error::CliError;

use super::util;

pub async fn handle(session: &Session, args: HideArgs, global: &GlobalOpts) -> Result<(), CliError> {
    util::require_entity(session, &args.entity_id)?;
    let hidden = !args.undo;
    let outcome = session.sync().set_hidden(&args.entity_id, hidden).await?;
    let what = if hidden {
        format!("{} hidden", args.entity_id)
    } else {
        format!("{} shown", args.entity_id)
    };
    util::report_remote(&outcome.remote, &what, global.quiet);
    util::refresh_layout(session).await;
    Ok(())
}
