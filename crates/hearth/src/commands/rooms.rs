//! Room listing.

use serde::Serialize;
use tabled::Tabled;

use hearth_core::{Scope, Session};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct RoomView {
    position: usize,
    area_id: String,
    name: String,
    floor: Option<String>,
    rank: Option<i64>,
}

#[derive(Tabled)]
struct RoomRow {
    #[tabled(rename = "#")]
    position: usize,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Floor")]
    floor: String,
    #[tabled(rename = "Rank")]
    rank: String,
}

pub async fn handle(session: &Session, global: &GlobalOpts) -> Result<(), CliError> {
    let ranks = session.sync().order_map(&Scope::Rooms).await?;
    let rooms: Vec<RoomView> = session
        .rooms()
        .await?
        .iter()
        .enumerate()
        .map(|(i, area)| RoomView {
            position: i + 1,
            area_id: area.area_id.clone(),
            name: area.name.clone(),
            floor: area
                .floor_id
                .as_deref()
                .and_then(|id| session.store().floor(id))
                .map(|f| f.name.clone()),
            rank: ranks.get(&area.area_id).copied(),
        })
        .collect();

    let out = output::render_list(
        &global.output,
        &rooms,
        |r| RoomRow {
            position: r.position,
            id: r.area_id.clone(),
            name: r.name.clone(),
            floor: r.floor.clone().unwrap_or_default(),
            rank: r.rank.map(|n| n.to_string()).unwrap_or_default(),
        },
        |r| r.area_id.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
