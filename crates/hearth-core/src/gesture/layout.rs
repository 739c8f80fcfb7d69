// ── Slot geometry ──
//
// Maps list indices to positions and back. The engine only needs to know
// where slot `i` starts and which slot a point falls into.

use super::pointer::Point;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Axis {
    #[default]
    Vertical,
    Horizontal,
}

/// Geometry of equally sized item slots.
pub trait SlotLayout {
    /// Top-left corner of slot `index`.
    fn slot_origin(&self, index: usize) -> Point;

    /// Nearest slot to `point`, clamped to `[0, len - 1]`.
    fn slot_at(&self, point: Point, len: usize) -> usize;

    /// Width and height of one slot.
    fn slot_size(&self) -> Point;

    /// Slot under `point`, if the point lies inside one.
    fn hit_test(&self, point: Point, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let index = self.slot_at(point, len);
        let origin = self.slot_origin(index);
        let size = self.slot_size();
        let inside = point.x >= origin.x
            && point.y >= origin.y
            && point.x < origin.x + size.x
            && point.y < origin.y + size.y;
        inside.then_some(index)
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
fn cell_index(position: f32, stride: f32) -> usize {
    if stride <= 0.0 || position <= 0.0 {
        return 0;
    }
    (position / stride).floor() as usize
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn scaled(index: usize, stride: f32) -> f32 {
    index as f32 * stride
}

// ── ListLayout ───────────────────────────────────────────────────────

/// A single row or column of items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ListLayout {
    pub item_extent: f32,
    pub spacing: f32,
    pub axis: Axis,
    /// Cross-axis size, used for hit testing.
    pub cross_extent: f32,
}

impl ListLayout {
    pub fn vertical(item_extent: f32, spacing: f32) -> Self {
        Self {
            item_extent,
            spacing,
            axis: Axis::Vertical,
            cross_extent: f32::MAX,
        }
    }

    pub fn horizontal(item_extent: f32, spacing: f32) -> Self {
        Self {
            axis: Axis::Horizontal,
            ..Self::vertical(item_extent, spacing)
        }
    }

    fn stride(&self) -> f32 {
        self.item_extent + self.spacing
    }
}

impl SlotLayout for ListLayout {
    fn slot_origin(&self, index: usize) -> Point {
        let along = scaled(index, self.stride());
        match self.axis {
            Axis::Vertical => Point::new(0.0, along),
            Axis::Horizontal => Point::new(along, 0.0),
        }
    }

    fn slot_at(&self, point: Point, len: usize) -> usize {
        let along = match self.axis {
            Axis::Vertical => point.y,
            Axis::Horizontal => point.x,
        };
        cell_index(along, self.stride()).min(len.saturating_sub(1))
    }

    fn slot_size(&self) -> Point {
        match self.axis {
            Axis::Vertical => Point::new(self.cross_extent, self.item_extent),
            Axis::Horizontal => Point::new(self.item_extent, self.cross_extent),
        }
    }
}

// ── GridLayout ───────────────────────────────────────────────────────

/// Row-major grid of fixed-size cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub columns: usize,
    pub cell_width: f32,
    pub cell_height: f32,
    pub gap: f32,
}

impl GridLayout {
    fn columns(&self) -> usize {
        self.columns.max(1)
    }
}

impl SlotLayout for GridLayout {
    fn slot_origin(&self, index: usize) -> Point {
        let columns = self.columns();
        Point::new(
            scaled(index % columns, self.cell_width + self.gap),
            scaled(index / columns, self.cell_height + self.gap),
        )
    }

    fn slot_at(&self, point: Point, len: usize) -> usize {
        let columns = self.columns();
        let col = cell_index(point.x, self.cell_width + self.gap).min(columns - 1);
        let row = cell_index(point.y, self.cell_height + self.gap);
        row.saturating_mul(columns)
            .saturating_add(col)
            .min(len.saturating_sub(1))
    }

    fn slot_size(&self) -> Point {
        Point::new(self.cell_width, self.cell_height)
    }
}
