//! Rank inspection and editing.

use serde::Serialize;
use tabled::Tabled;

use hearth_core::Session;

use crate::cli::{GlobalOpts, OrderArgs, OrderCommand};
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Serialize)]
struct RankView {
    id: String,
    name: String,
    rank: Option<i64>,
}

#[derive(Tabled)]
struct RankRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Rank")]
    rank: String,
}

/// Where a moved block lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anchor {
    Before(String),
    After(String),
    First,
    Last,
}

/// Remove `moved` from `current` and reinsert it as one block at `anchor`.
///
/// The block keeps the order given in `moved`.
pub fn place_block(current: &[String], moved: &[String], anchor: &Anchor) -> Result<Vec<String>, CliError> {
    for id in moved {
        if !current.contains(id) {
            return Err(CliError::not_found("item", id, "order show"));
        }
    }
    let mut rest: Vec<String> = current.iter().filter(|id| !moved.contains(id)).cloned().collect();

    let index = match anchor {
        Anchor::First => 0,
        Anchor::Last => rest.len(),
        Anchor::Before(target) | Anchor::After(target) => {
            if moved.contains(target) {
                return Err(CliError::Validation {
                    field: "anchor".into(),
                    reason: format!("'{target}' is part of the moved block"),
                });
            }
            let pos = rest
                .iter()
                .position(|id| id == target)
                .ok_or_else(|| CliError::not_found("item", target, "order show"))?;
            if matches!(anchor, Anchor::After(_)) { pos + 1 } else { pos }
        }
    };

    let tail = rest.split_off(index);
    rest.extend(moved.iter().cloned());
    rest.extend(tail);
    Ok(rest)
}

pub async fn handle(session: &Session, args: OrderArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        OrderCommand::Show { scope } => {
            let scope = util::scope_of(&scope);
            let ranks = session.sync().order_map(&scope).await?;
            let views: Vec<RankView> = util::display_order(session, &scope)
                .await?
                .into_iter()
                .map(|id| RankView {
                    name: util::display_name(session, &id),
                    rank: ranks.get(&id).copied(),
                    id,
                })
                .collect();
            let out = output::render_list(
                &global.output,
                &views,
                |v| RankRow {
                    id: v.id.clone(),
                    name: v.name.clone(),
                    rank: v.rank.map(|n| n.to_string()).unwrap_or_default(),
                },
                |v| v.id.clone(),
            );
            output::print_output(&out, global.quiet);
            Ok(())
        }

        OrderCommand::Set { id, rank, scope } => {
            let scope = util::scope_of(&scope);
            util::require_item(session, &scope, &id)?;
            let outcome = session.sync().set_order(&scope, &id, rank).await?;
            util::report_remote(&outcome.remote, &format!("Rank {rank} for {id}"), global.quiet);
            util::refresh_layout(session).await;
            Ok(())
        }

        OrderCommand::Move {
            ids,
            before,
            after,
            first,
            last: _,
            scope,
        } => {
            let scope = util::scope_of(&scope);
            let anchor = match (before, after) {
                (Some(target), _) => Anchor::Before(target),
                (_, Some(target)) => Anchor::After(target),
                _ if first => Anchor::First,
                _ => Anchor::Last,
            };
            let current = util::display_order(session, &scope).await?;
            let new_order = place_block(&current, &ids, &anchor)?;
            if new_order == current {
                output::status("Order unchanged", global.quiet);
                return Ok(());
            }

            let outcome = session.sync().apply_reorder(&scope, &new_order, Some(ids.as_slice())).await?;
            if outcome.plan.renumbered {
                output::status("Ranks were too dense; list renumbered", global.quiet);
            }
            util::report_remote(
                &outcome.remote,
                &format!("{} rank change(s)", outcome.plan.writes.len()),
                global.quiet,
            );
            util::refresh_layout(session).await;
            Ok(())
        }

        OrderCommand::Clear { id, scope } => {
            let scope = util::scope_of(&scope);
            let outcome = session.sync().clear_order(&scope, &id).await?;
            util::report_remote(&outcome.remote, &format!("Rank cleared for {id}"), global.quiet);
            util::refresh_layout(session).await;
            Ok(())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn block_moves_before_anchor_in_given_order() {
        let current = ids(&["a", "b", "c", "d", "e"]);
        let out = place_block(&current, &ids(&["e", "b"]), &Anchor::Before("a".into())).unwrap();
        assert_eq!(out, ids(&["e", "b", "a", "c", "d"]));
    }

    #[test]
    fn block_moves_after_anchor() {
        let current = ids(&["a", "b", "c"]);
        let out = place_block(&current, &ids(&["a"]), &Anchor::After("c".into())).unwrap();
        assert_eq!(out, ids(&["b", "c", "a"]));
    }

    #[test]
    fn first_and_last() {
        let current = ids(&["a", "b", "c"]);
        assert_eq!(
            place_block(&current, &ids(&["c"]), &Anchor::First).unwrap(),
            ids(&["c", "a", "b"])
        );
        assert_eq!(
            place_block(&current, &ids(&["a"]), &Anchor::Last).unwrap(),
            ids(&["b", "c", "a"])
        );
    }

    #[test]
    fn unknown_item_is_not_found() {
        let current = ids(&["a", "b"]);
        assert!(matches!(
            place_block(&current, &ids(&["z"]), &Anchor::First),
            Err(CliError::NotFound { .. })
        ));
    }

    #[test]
    fn anchor_inside_block_is_rejected() {
        let current = ids(&["a", "b", "c"]);
        assert!(matches!(
            place_block(&current, &ids(&["a", "b"]), &Anchor::Before("b".into())),
            Err(CliError::Validation { .. })
        ));
    }
}
