//! Command dispatch: bridges CLI args -> session calls -> output formatting.

pub mod config_cmd;
pub mod entities;
pub mod favorites;
pub mod hide;
pub mod layout;
pub mod order;
pub mod rooms;
pub mod sync_cmd;
pub mod toggle;
pub mod util;
pub mod watch;

use hearth_core::Session;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a hub-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Rooms => rooms::handle(session, global).await,
        Command::Entities(args) => entities::handle(session, args, global).await,
        Command::Order(args) => order::handle(session, args, global).await,
        Command::Favorites(args) => favorites::handle(session, args, global).await,
        Command::Hide(args) => hide::handle(session, args, global).await,
        Command::Sync(args) => sync_cmd::handle(session, args, global).await,
        Command::Toggle(args) => toggle::handle(session, args, global).await,
        Command::Watch(args) => watch::handle(session, args, global).await,
        Command::Layout | Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "offline command routed to the hub dispatcher".into(),
        )),
    }
}
