//! Cached layout, read without connecting.

use std::fmt::Write as _;

use hearth_core::{FileStore, LayoutSnapshot};

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

fn layout_detail(layout: &LayoutSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Captured {}", layout.captured_at.format("%Y-%m-%d %H:%M:%S UTC"));
    for room in &layout.rooms {
        let floor = room
            .area
            .floor_id
            .as_deref()
            .and_then(|id| layout.floors.iter().find(|f| f.floor_id == id))
            .map(|f| format!(" ({})", f.name))
            .unwrap_or_default();
        let _ = write!(out, "\n{}{floor}", room.area.name);
        for (domain, ids) in &room.domains {
            let _ = write!(out, "\n  {domain}: {}", ids.join(", "));
        }
    }
    out
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config()?;
    let profile_name = config::active_profile_name(global, &cfg);
    let storage = FileStore::new(config::storage_dir(&profile_name));

    let Some(layout) = LayoutSnapshot::load(&storage).await? else {
        output::status(
            &format!("No cached layout for profile '{profile_name}'; run `hearth rooms` once connected"),
            global.quiet,
        );
        return Ok(());
    };

    let out = output::render_single(&global.output, &layout, layout_detail, |l| {
        l.rooms
            .iter()
            .map(|r| r.area.area_id.clone())
            .collect::<Vec<_>>()
            .join("\n")
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
