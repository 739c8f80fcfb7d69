//! Favorites sections.

use serde::Serialize;
use tabled::Tabled;

use hearth_core::{Section, Session};

use crate::cli::{FavoritesArgs, FavoritesCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct FavoriteView {
    position: usize,
    id: String,
    name: String,
}

#[derive(Tabled)]
struct FavoriteRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
}

fn require_member(session: &Session, section: Section, id: &str) -> Result<(), CliError> {
    match section {
        Section::Rooms => util::require_area(session, id).map(|_| ()),
        Section::Scenes | Section::Entities => util::require_entity(session, id).map(|_| ()),
    }
}

pub async fn handle(session: &Session, args: FavoritesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        FavoritesCommand::List { section } => {
            let views: Vec<FavoriteView> = session
                .sync()
                .favorites(section)
                .await?
                .into_iter()
                .enumerate()
                .map(|(i, id)| FavoriteView {
                    position: i + 1,
                    name: util::display_name(session, &id),
                    id,
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &views,
                |v| FavoriteRow {
                    position: v.position,
                    id: v.id.clone(),
                    name: v.name.clone(),
                },
                |v| v.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        FavoritesCommand::Add { section, id } => {
            require_member(session, section, &id)?;
            let outcome = session.sync().add_favorite(section, &id).await?;
            util::report_remote(&outcome.remote, &format!("Favorite {id}"), global.quiet);
            Ok(())
        }

        FavoritesCommand::Remove { section, id } => {
            let outcome = session.sync().remove_favorite(section, &id).await?;
            util::report_remote(&outcome.remote, &format!("Favorite {id} removal"), global.quiet);
            Ok(())
        }
    }
}
