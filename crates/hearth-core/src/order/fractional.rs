// ── Fractional rank assignment ──
//
// New ranks are bisected between unmoved neighbours so a move costs one
// write. When neighbours are too dense to bisect, the whole visible list
// is renumbered with a fixed stride.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Tuning for rank assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfig {
    /// Stride used for renumbering and appends.
    pub gap: i64,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self { gap: 10 }
    }
}

/// An item in its new position, with the rank it currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedItem {
    pub id: String,
    pub rank: Option<i64>,
}

impl RankedItem {
    pub fn new(id: impl Into<String>, rank: Option<i64>) -> Self {
        Self {
            id: id.into(),
            rank,
        }
    }
}

/// Rank writes needed to realise a new order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankPlan {
    /// `(id, new rank)` for every item whose rank changes.
    pub writes: Vec<(String, i64)>,
    /// The list was too dense and has been renumbered.
    pub renumbered: bool,
}

/// Assigns integer ranks by bisection with a renumber fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderEngine {
    config: OrderConfig,
}

impl OrderEngine {
    pub fn new(config: OrderConfig) -> Self {
        Self { config }
    }

    pub fn gap(&self) -> i64 {
        self.config.gap.max(1)
    }

    /// Rank for one item dropped between `prev` and `next`.
    ///
    /// The list start counts as `0` and the list end as `prev + 2·gap`.
    /// Returns `None` when no integer fits strictly between the two.
    pub fn rank_between(&self, prev: Option<i64>, next: Option<i64>) -> Option<i64> {
        self.spread(prev, next, 1).map(|ranks| ranks[0])
    }

    /// Rank for appending after the current maximum.
    pub fn append_rank(&self, max: Option<i64>) -> i64 {
        max.unwrap_or(0) + self.gap()
    }

    /// Fixed-stride ranks `gap, 2·gap, …` for `len` items.
    pub fn renumber(&self, len: usize) -> Vec<i64> {
        let gap = self.gap();
        (1..=len)
            .map(|i| i64::try_from(i).unwrap_or(i64::MAX).saturating_mul(gap))
            .collect()
    }

    /// Plan rank writes for `items` (already in their new order).
    ///
    /// Items in `moved` receive new ranks; everything else keeps its rank.
    /// With `moved == None`, the items that break the increasing sequence
    /// (complement of a longest increasing subsequence) count as moved.
    /// Unranked items always count as moved.
    pub fn plan(&self, items: &[RankedItem], moved: Option<&HashSet<String>>) -> RankPlan {
        let anchors = match moved {
            Some(moved) => {
                let anchors: Vec<bool> = items
                    .iter()
                    .map(|item| item.rank.is_some() && !moved.contains(&item.id))
                    .collect();
                if anchors_increasing(items, &anchors) {
                    anchors
                } else {
                    tracing::debug!("Unmoved ranks out of order, renumbering");
                    return self.full_renumber(items);
                }
            }
            None => longest_increasing(items),
        };

        match self.fill_segments(items, &anchors) {
            Some(writes) => RankPlan {
                writes,
                renumbered: false,
            },
            None => self.full_renumber(items),
        }
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// `k` evenly spaced ranks strictly between the bounds.
    fn spread(&self, prev: Option<i64>, next: Option<i64>, k: usize) -> Option<Vec<i64>> {
        let k = i64::try_from(k).ok()?;
        let lower = prev.unwrap_or(0);
        let upper = match next {
            Some(next) => next,
            None => lower.checked_add(self.gap().checked_mul(k + 1)?)?,
        };
        let span = upper.checked_sub(lower)?;
        if span <= k {
            return None;
        }
        Some(
            (1..=k)
                .map(|i| lower + span.saturating_mul(i) / (k + 1))
                .collect(),
        )
    }

    fn fill_segments(&self, items: &[RankedItem], anchors: &[bool]) -> Option<Vec<(String, i64)>> {
        let mut writes = Vec::new();
        let mut prev: Option<i64> = None;
        let mut run: Vec<&RankedItem> = Vec::new();

        for (item, &anchor) in items.iter().zip(anchors) {
            if anchor {
                let next = item.rank;
                self.place_run(&run, prev, next, &mut writes)?;
                run.clear();
                prev = next;
            } else {
                run.push(item);
            }
        }
        self.place_run(&run, prev, None, &mut writes)?;
        Some(writes)
    }

    fn place_run(
        &self,
        run: &[&RankedItem],
        prev: Option<i64>,
        next: Option<i64>,
        writes: &mut Vec<(String, i64)>,
    ) -> Option<()> {
        if run.is_empty() {
            return Some(());
        }
        let ranks = self.spread(prev, next, run.len())?;
        for (item, rank) in run.iter().zip(ranks) {
            if item.rank != Some(rank) {
                writes.push((item.id.clone(), rank));
            }
        }
        Some(())
    }

    fn full_renumber(&self, items: &[RankedItem]) -> RankPlan {
        let writes = items
            .iter()
            .zip(self.renumber(items.len()))
            .filter(|(item, rank)| item.rank != Some(*rank))
            .map(|(item, rank)| (item.id.clone(), rank))
            .collect();
        RankPlan {
            writes,
            renumbered: true,
        }
    }
}

fn anchors_increasing(items: &[RankedItem], anchors: &[bool]) -> bool {
    let mut last: Option<i64> = None;
    for (item, &anchor) in items.iter().zip(anchors) {
        if !anchor {
            continue;
        }
        let Some(rank) = item.rank else {
            return false;
        };
        if rank <= 0 || last.is_some_and(|l| rank <= l) {
            return false;
        }
        last = Some(rank);
    }
    true
}

/// Mark the members of a longest strictly increasing subsequence of
/// positive ranks. Unranked items are never members.
fn longest_increasing(items: &[RankedItem]) -> Vec<bool> {
    // tails[len-1] = index of the smallest tail of an increasing run of `len`
    let mut tails: Vec<usize> = Vec::new();
    let mut parent: Vec<Option<usize>> = vec![None; items.len()];

    for (i, item) in items.iter().enumerate() {
        let Some(rank) = item.rank.filter(|r| *r > 0) else {
            continue;
        };
        let pos = tails.partition_point(|&t| items[t].rank.is_some_and(|r| r < rank));
        parent[i] = pos.checked_sub(1).map(|p| tails[p]);
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }

    let mut members = vec![false; items.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        members[i] = true;
        cursor = parent[i];
    }
    members
}
