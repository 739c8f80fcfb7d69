// ── Pointer input ──

use std::ops::{Add, AddAssign, Sub};

/// A position in layout coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean length.
    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Point {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// One event from the unified pointer stream (touch, mouse or pen).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: u64,
    pub phase: PointerPhase,
    pub position: Point,
}

impl PointerEvent {
    pub fn down(pointer_id: u64, x: f32, y: f32) -> Self {
        Self::at(pointer_id, PointerPhase::Down, x, y)
    }

    pub fn moved(pointer_id: u64, x: f32, y: f32) -> Self {
        Self::at(pointer_id, PointerPhase::Move, x, y)
    }

    pub fn up(pointer_id: u64, x: f32, y: f32) -> Self {
        Self::at(pointer_id, PointerPhase::Up, x, y)
    }

    pub fn cancel(pointer_id: u64) -> Self {
        Self::at(pointer_id, PointerPhase::Cancel, 0.0, 0.0)
    }

    fn at(pointer_id: u64, phase: PointerPhase, x: f32, y: f32) -> Self {
        Self {
            pointer_id,
            phase,
            position: Point::new(x, y),
        }
    }
}
