//! Primitive 2D helpers for the priority matrix
//!
//! Positions live in a bounded square: urgency on x, importance on y, both in
//! `[MATRIX_MIN, MATRIX_MAX]`.

use std::ops::{Add, AddAssign, Mul, Sub};

/// Lower bound of both matrix axes
pub const MATRIX_MIN: f64 = 0.0;

/// Upper bound of both matrix axes
pub const MATRIX_MAX: f64 = 100.0;

/// Canonical origin of the matrix; layouts are re-centered here
pub const MATRIX_CENTER: Vec2 = Vec2 { x: 50.0, y: 50.0 };

/// Point or displacement in matrix space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (other - self).length()
    }

    /// Clamp both coordinates into the matrix bounds.
    ///
    /// NaN collapses to the matrix center so a corrupted coordinate cannot
    /// poison the centroid of the whole batch.
    pub fn clamp_to_matrix(self) -> Self {
        Self {
            x: clamp_axis(self.x),
            y: clamp_axis(self.y),
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

/// Clamp a single axis value into `[MATRIX_MIN, MATRIX_MAX]`
pub fn clamp_axis(value: f64) -> f64 {
    if value.is_nan() {
        return MATRIX_CENTER.x;
    }
    value.clamp(MATRIX_MIN, MATRIX_MAX)
}

/// Arithmetic mean of a set of positions, `None` when empty
pub fn centroid(positions: &[Vec2]) -> Option<Vec2> {
    if positions.is_empty() {
        return None;
    }
    let mut sum = Vec2::ZERO;
    for p in positions {
        sum += *p;
    }
    Some(sum * (1.0 / positions.len() as f64))
}

/// Translate every position by `offset`, then clamp back into the matrix
pub fn translate_clamped(positions: &mut [Vec2], offset: Vec2) {
    for p in positions.iter_mut() {
        *p = (*p + offset).clamp_to_matrix();
    }
}
