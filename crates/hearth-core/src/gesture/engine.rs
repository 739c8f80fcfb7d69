// ── Reorder gesture engine ──
//
// Turns a pointer stream into list reorders. One drag session lives from
// pointer-down to pointer-up; it owns a working copy of the list, the
// dragged block and the accumulated shift that keeps the dragged block
// under the pointer while slots change beneath it. Every event is handled
// synchronously.

use std::collections::HashSet;
use std::hash::Hash;

use super::layout::SlotLayout;
use super::pointer::{Point, PointerEvent, PointerPhase};

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Maximum travel, in layout units, for a gesture to count as a tap.
    pub tap_threshold: f32,
    /// Whether a tap toggles the tapped item's selection.
    pub tap_toggles_selection: bool,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tap_threshold: 8.0,
            tap_toggles_selection: true,
        }
    }
}

/// What one pointer event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureOutcome<K> {
    /// Not ours: no session, another pointer, or nothing under the pointer.
    Ignored,
    /// Session alive, nothing new to show.
    Tracking,
    /// Intermediate order for display; not committed.
    Preview(Vec<K>),
    /// Final order handed to `on_reorder`.
    Committed { items: Vec<K>, moved: Vec<K> },
    Tap(K),
    Cancelled,
    /// A drag that ended where it started.
    Settled,
}

type ReorderCallback<K> = Box<dyn FnMut(&[K]) + Send>;
type TapCallback<K> = Box<dyn FnMut(&K) + Send>;

/// Mutable state of one drag.
#[derive(Debug)]
struct DragSession<K> {
    pointer_id: u64,
    start: Point,
    current: Point,
    /// Pressed item.
    primary: K,
    /// Dragged keys, relative order preserved.
    block: Vec<K>,
    /// Index of the primary within `block`.
    primary_offset: usize,
    /// Working-copy index of the block's first item.
    block_start: usize,
    shift: Point,
    working: Vec<K>,
    /// Order before the gesture, for cancel and settle detection.
    original: Vec<K>,
    /// Travel exceeded the tap threshold at some point.
    dragging: bool,
}

impl<K> DragSession<K> {
    fn primary_index(&self) -> usize {
        self.block_start + self.primary_offset
    }

    fn offset(&self) -> Point {
        self.current - self.start + self.shift
    }
}

/// Pointer-driven single and multi-item reordering over a slot layout.
pub struct ReorderEngine<K, L> {
    items: Vec<K>,
    selection: HashSet<K>,
    layout: L,
    config: GestureConfig,
    session: Option<DragSession<K>>,
    on_reorder: Option<ReorderCallback<K>>,
    on_item_tap: Option<TapCallback<K>>,
}

impl<K, L> ReorderEngine<K, L>
where
    K: Clone + Eq + Hash,
    L: SlotLayout,
{
    pub fn new(items: Vec<K>, layout: L, config: GestureConfig) -> Self {
        Self {
            items,
            selection: HashSet::new(),
            layout,
            config,
            session: None,
            on_reorder: None,
            on_item_tap: None,
        }
    }

    #[must_use]
    pub fn on_reorder(mut self, callback: impl FnMut(&[K]) + Send + 'static) -> Self {
        self.on_reorder = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_item_tap(mut self, callback: impl FnMut(&K) + Send + 'static) -> Self {
        self.on_item_tap = Some(Box::new(callback));
        self
    }

    // ── Consumer view ────────────────────────────────────────────────

    /// Order to render: the working copy while dragging.
    pub fn ordered_items(&self) -> &[K] {
        self.session
            .as_ref()
            .map_or(&self.items, |s| &s.working)
    }

    /// Working-copy indices of the dragged block.
    pub fn dragged_indices(&self) -> Vec<usize> {
        self.session.as_ref().map_or_else(Vec::new, |s| {
            (s.block_start..s.block_start + s.block.len()).collect()
        })
    }

    /// Translation of the dragged block relative to its current slots.
    pub fn drag_offset(&self) -> Option<Point> {
        self.session.as_ref().map(DragSession::offset)
    }

    pub fn is_dragging(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.dragging)
    }

    /// Replace the committed list, e.g. after a registry update. An active
    /// drag keeps its working copy.
    pub fn set_items(&mut self, items: Vec<K>) {
        self.selection.retain(|k| items.contains(k));
        self.items = items;
    }

    // ── Selection ────────────────────────────────────────────────────

    pub fn toggle_selection(&mut self, key: &K) {
        if !self.selection.remove(key) {
            self.selection.insert(key.clone());
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn is_selected(&self, key: &K) -> bool {
        self.selection.contains(key)
    }

    /// Selected keys in list order.
    pub fn selected(&self) -> Vec<K> {
        self.items
            .iter()
            .filter(|k| self.selection.contains(*k))
            .cloned()
            .collect()
    }

    // ── Event handling ───────────────────────────────────────────────

    pub fn handle(&mut self, event: PointerEvent) -> GestureOutcome<K> {
        match event.phase {
            PointerPhase::Down => self.pointer_down(event),
            PointerPhase::Move => self.pointer_move(event),
            PointerPhase::Up => self.pointer_up(event),
            PointerPhase::Cancel => self.pointer_cancel(event),
        }
    }

    fn owns(&self, event: &PointerEvent) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.pointer_id == event.pointer_id)
    }

    fn pointer_down(&mut self, event: PointerEvent) -> GestureOutcome<K> {
        if self.session.is_some() {
            return GestureOutcome::Ignored;
        }
        let len = self.items.len();
        let Some(pressed) = self.layout.hit_test(event.position, len) else {
            return GestureOutcome::Ignored;
        };
        let primary = self.items[pressed].clone();

        // A selected item drags the whole selection; anything else drags alone.
        let block: Vec<K> = if self.selection.contains(&primary) && self.selection.len() > 1 {
            self.selected()
        } else {
            vec![primary.clone()]
        };
        let primary_offset = block.iter().position(|k| *k == primary).unwrap_or(0);

        // Gather the block contiguously around the pressed slot.
        let mut working: Vec<K> = self
            .items
            .iter()
            .filter(|k| !block.contains(k))
            .cloned()
            .collect();
        let block_start = pressed
            .saturating_sub(primary_offset)
            .min(len - block.len());
        for (i, key) in block.iter().enumerate() {
            working.insert(block_start + i, key.clone());
        }

        let shift = self.layout.slot_origin(pressed)
            - self.layout.slot_origin(block_start + primary_offset);

        self.session = Some(DragSession {
            pointer_id: event.pointer_id,
            start: event.position,
            current: event.position,
            primary,
            block,
            primary_offset,
            block_start,
            shift,
            working,
            original: self.items.clone(),
            dragging: false,
        });
        GestureOutcome::Tracking
    }

    fn pointer_move(&mut self, event: PointerEvent) -> GestureOutcome<K> {
        if !self.owns(&event) {
            return GestureOutcome::Ignored;
        }
        let threshold = self.config.tap_threshold;
        let layout = &self.layout;
        let Some(session) = self.session.as_mut() else {
            return GestureOutcome::Ignored;
        };

        session.current = event.position;
        if !session.dragging {
            if (session.current - session.start).length() <= threshold {
                return GestureOutcome::Tracking;
            }
            session.dragging = true;
        }

        let len = session.working.len();
        let block_len = session.block.len();
        let old_index = session.primary_index();

        // Centre of the primary item as currently drawn.
        let size = layout.slot_size();
        let half = Point::new(size.x / 2.0, size.y / 2.0);
        let centre = layout.slot_origin(old_index) + session.offset() + half;
        let target = layout.slot_at(centre, len);

        let new_start = target
            .saturating_sub(session.primary_offset)
            .min(len - block_len);
        if new_start == session.block_start {
            return GestureOutcome::Tracking;
        }

        let block: Vec<K> = session
            .working
            .drain(session.block_start..session.block_start + block_len)
            .collect();
        for (i, key) in block.into_iter().enumerate() {
            session.working.insert(new_start + i, key);
        }
        session.block_start = new_start;
        session.shift += layout.slot_origin(old_index) - layout.slot_origin(session.primary_index());

        GestureOutcome::Preview(session.working.clone())
    }

    fn pointer_up(&mut self, event: PointerEvent) -> GestureOutcome<K> {
        if !self.owns(&event) {
            return GestureOutcome::Ignored;
        }
        let Some(mut session) = self.session.take() else {
            return GestureOutcome::Ignored;
        };
        session.current = event.position;

        if !session.dragging
            && (session.current - session.start).length() <= self.config.tap_threshold
        {
            let key = session.primary;
            if self.config.tap_toggles_selection {
                self.toggle_selection(&key);
            }
            if let Some(callback) = self.on_item_tap.as_mut() {
                callback(&key);
            }
            return GestureOutcome::Tap(key);
        }

        if session.working == session.original {
            return GestureOutcome::Settled;
        }

        self.items = session.working;
        tracing::debug!(
            moved = session.block.len(),
            len = self.items.len(),
            "Reorder committed"
        );
        if let Some(callback) = self.on_reorder.as_mut() {
            callback(&self.items);
        }
        GestureOutcome::Committed {
            items: self.items.clone(),
            moved: session.block,
        }
    }

    fn pointer_cancel(&mut self, event: PointerEvent) -> GestureOutcome<K> {
        if !self.owns(&event) {
            return GestureOutcome::Ignored;
        }
        // The committed list was never touched; dropping the session
        // restores the pre-gesture order.
        self.session = None;
        GestureOutcome::Cancelled
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{Arc, Mutex};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::gesture::layout::{GridLayout, ListLayout};

    const EXTENT: f32 = 50.0;

    fn engine(items: &[&'static str]) -> ReorderEngine<&'static str, ListLayout> {
        ReorderEngine::new(
            items.to_vec(),
            ListLayout::vertical(EXTENT, 0.0),
            GestureConfig::default(),
        )
    }

    /// Vertical centre of slot `i`.
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn slot(i: usize) -> f32 {
        i as f32 * EXTENT + EXTENT / 2.0
    }

    #[test]
    fn single_item_drag_previews_then_commits() {
        let committed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&committed);
        let mut engine =
            engine(&["a", "b", "c", "d"]).on_reorder(move |items| *sink.lock().unwrap() = items.to_vec());

        assert_eq!(engine.handle(PointerEvent::down(1, 10.0, slot(0))), GestureOutcome::Tracking);
        assert_eq!(
            engine.handle(PointerEvent::moved(1, 10.0, slot(0) + 55.0)),
            GestureOutcome::Preview(vec!["b", "a", "c", "d"])
        );
        assert_eq!(engine.dragged_indices(), vec![1]);
        // 55 of travel minus one slot of shift keeps the item under the pointer.
        assert_eq!(engine.drag_offset(), Some(Point::new(0.0, 5.0)));

        let outcome = engine.handle(PointerEvent::up(1, 10.0, slot(0) + 55.0));
        assert_eq!(
            outcome,
            GestureOutcome::Committed {
                items: vec!["b", "a", "c", "d"],
                moved: vec!["a"],
            }
        );
        assert_eq!(*committed.lock().unwrap(), vec!["b", "a", "c", "d"]);
        assert_eq!(engine.ordered_items(), ["b", "a", "c", "d"]);
    }

    #[test]
    fn shift_tracks_several_reorders_in_one_drag() {
        let mut engine = engine(&["a", "b", "c", "d", "e"]);
        engine.handle(PointerEvent::down(1, 10.0, slot(0)));
        engine.handle(PointerEvent::moved(1, 10.0, slot(0) + 60.0));
        engine.handle(PointerEvent::moved(1, 10.0, slot(0) + 160.0));

        assert_eq!(engine.ordered_items(), ["b", "c", "d", "a", "e"]);
        assert_eq!(engine.drag_offset(), Some(Point::new(0.0, 10.0)));
    }

    #[test]
    fn small_travel_is_a_tap_that_toggles_selection() {
        let taps = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&taps);
        let mut engine = engine(&["a", "b", "c"]).on_item_tap(move |k| sink.lock().unwrap().push(*k));

        engine.handle(PointerEvent::down(1, 10.0, slot(1)));
        engine.handle(PointerEvent::moved(1, 13.0, slot(1) + 3.0));
        let outcome = engine.handle(PointerEvent::up(1, 13.0, slot(1) + 3.0));

        assert_eq!(outcome, GestureOutcome::Tap("b"));
        assert!(engine.is_selected(&"b"));
        assert_eq!(*taps.lock().unwrap(), vec!["b"]);
        assert_eq!(engine.ordered_items(), ["a", "b", "c"]);
    }

    #[test]
    fn multi_drag_keeps_block_order() {
        let mut engine = engine(&["a", "b", "c", "d", "e"]);
        engine.toggle_selection(&"b");
        engine.toggle_selection(&"d");

        engine.handle(PointerEvent::down(1, 10.0, slot(3)));
        // Gathered around the pressed slot before any movement.
        assert_eq!(engine.ordered_items(), ["a", "c", "b", "d", "e"]);
        assert_eq!(engine.dragged_indices(), vec![2, 3]);

        engine.handle(PointerEvent::moved(1, 10.0, slot(3) - 400.0));
        assert_eq!(engine.ordered_items(), ["b", "d", "a", "c", "e"]);

        let outcome = engine.handle(PointerEvent::up(1, 10.0, slot(3) - 400.0));
        assert_eq!(
            outcome,
            GestureOutcome::Committed {
                items: vec!["b", "d", "a", "c", "e"],
                moved: vec!["b", "d"],
            }
        );
    }

    #[test]
    fn block_start_is_clamped_at_list_end() {
        let mut engine = engine(&["a", "b", "c", "d"]);
        engine.toggle_selection(&"a");
        engine.toggle_selection(&"b");

        engine.handle(PointerEvent::down(1, 10.0, slot(0)));
        engine.handle(PointerEvent::moved(1, 10.0, slot(0) + 1000.0));

        assert_eq!(engine.ordered_items(), ["c", "d", "a", "b"]);
        assert_eq!(engine.dragged_indices(), vec![2, 3]);
    }

    #[test]
    fn second_pointer_cannot_hijack_drag() {
        let mut engine = engine(&["a", "b", "c"]);
        engine.handle(PointerEvent::down(1, 10.0, slot(0)));

        assert_eq!(engine.handle(PointerEvent::down(2, 10.0, slot(2))), GestureOutcome::Ignored);
        assert_eq!(
            engine.handle(PointerEvent::moved(2, 10.0, slot(0) + 200.0)),
            GestureOutcome::Ignored
        );
        assert_eq!(engine.handle(PointerEvent::up(2, 10.0, slot(2))), GestureOutcome::Ignored);
        assert_eq!(engine.ordered_items(), ["a", "b", "c"]);
        assert!(engine.drag_offset().is_some());
    }

    #[test]
    fn cancel_restores_original_order() {
        let mut engine = engine(&["a", "b", "c"]);
        engine.handle(PointerEvent::down(1, 10.0, slot(0)));
        engine.handle(PointerEvent::moved(1, 10.0, slot(2)));
        assert_eq!(engine.ordered_items(), ["b", "c", "a"]);

        assert_eq!(engine.handle(PointerEvent::cancel(1)), GestureOutcome::Cancelled);
        assert_eq!(engine.ordered_items(), ["a", "b", "c"]);
        assert!(engine.drag_offset().is_none());
    }

    #[test]
    fn drag_back_to_origin_settles() {
        let mut engine = engine(&["a", "b", "c"]);
        engine.handle(PointerEvent::down(1, 10.0, slot(0)));
        engine.handle(PointerEvent::moved(1, 10.0, slot(1)));
        engine.handle(PointerEvent::moved(1, 10.0, slot(0)));

        assert_eq!(engine.handle(PointerEvent::up(1, 10.0, slot(0))), GestureOutcome::Settled);
        assert_eq!(engine.ordered_items(), ["a", "b", "c"]);
    }

    #[test]
    fn press_outside_any_slot_is_ignored() {
        let mut engine = engine(&["a", "b"]);
        assert_eq!(engine.handle(PointerEvent::down(1, 10.0, -20.0)), GestureOutcome::Ignored);
        assert_eq!(engine.handle(PointerEvent::moved(1, 10.0, 40.0)), GestureOutcome::Ignored);
    }

    #[test]
    fn grid_drag_moves_across_rows() {
        let grid = GridLayout {
            columns: 2,
            cell_width: 100.0,
            cell_height: 100.0,
            gap: 0.0,
        };
        let mut engine = ReorderEngine::new(vec![1, 2, 3, 4], grid, GestureConfig::default());
        engine.handle(PointerEvent::down(7, 50.0, 50.0));
        let outcome = engine.handle(PointerEvent::moved(7, 150.0, 150.0));

        assert_eq!(outcome, GestureOutcome::Preview(vec![2, 3, 4, 1]));
    }
}
