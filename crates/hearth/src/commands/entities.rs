//! Per-room device listing.

use std::collections::BTreeSet;

use serde::Serialize;
use tabled::Tabled;

use hearth_core::{Scope, Session};

use crate::cli::{EntitiesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct EntityView {
    entity_id: String,
    name: String,
    domain: String,
    state: Option<String>,
    rank: Option<i64>,
}

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Rank")]
    rank: String,
}

pub async fn handle(session: &Session, args: EntitiesArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let area = util::require_area(session, &args.area)?;

    let domains: BTreeSet<String> = match args.domain {
        Some(domain) => BTreeSet::from([domain]),
        None => session
            .store()
            .entities_snapshot()
            .iter()
            .filter(|e| e.area_id.as_deref() == Some(area.area_id.as_str()))
            .map(|e| e.domain().to_owned())
            .collect(),
    };

    let mut views = Vec::new();
    for domain in domains {
        let ranks = session
            .sync()
            .order_map(&Scope::room_domain(&area.area_id, &domain))
            .await?;
        for entity in session.room_entities(&area.area_id, &domain).await? {
            views.push(EntityView {
                entity_id: entity.entity_id.clone(),
                name: entity.display_name().to_owned(),
                domain: domain.clone(),
                state: session.effective_state(&entity.entity_id),
                rank: ranks.get(&entity.entity_id).copied(),
            });
        }
    }

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &views,
        |v| EntityRow {
            id: v.entity_id.clone(),
            name: v.name.clone(),
            state: v
                .state
                .as_deref()
                .map(|s| output::paint_state(s, color))
                .unwrap_or_default(),
            rank: v.rank.map(|n| n.to_string()).unwrap_or_default(),
        },
        |v| v.entity_id.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
