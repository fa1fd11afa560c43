use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length_sq(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f32 {
        self.length_sq().sqrt()
    }

    /// Unit vector in the same direction. A zero-length vector is divided by
    /// one instead, so it stays zero.
    pub fn normalize(self) -> Vec2 {
        let len = self.length();
        let len = if len > 0.0 { len } else { 1.0 };
        Vec2::new(self.x / len, self.y / len)
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Component-wise product, used to move between normalized and pixel space.
    pub fn scale_by(self, sx: f32, sy: f32) -> Vec2 {
        Vec2::new(self.x * sx, self.y * sy)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
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

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;

    fn mul(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self * rhs.x, self * rhs.y)
    }
}

/// Stable slot index of a body. Host surfaces key their elements by it.
pub type BodyId = usize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTag {
    Gold,
    Purple,
    Neutral1,
    Neutral2,
}

impl ColorTag {
    pub const ALL: [ColorTag; 4] = [
        ColorTag::Gold,
        ColorTag::Purple,
        ColorTag::Neutral1,
        ColorTag::Neutral2,
    ];
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Cluster,
    Scatter,
}

impl Mode {
    pub fn from_scatter(scatter: bool) -> Self {
        if scatter { Mode::Scatter } else { Mode::Cluster }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Cluster => "cluster",
            Mode::Scatter => "scatter",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Body {
    pub id: BodyId,
    /// Base radius in surface pixels, before depth scaling.
    pub radius: f32,
    /// Normalized surface position, nominally 0..1 on each axis.
    pub pos: Vec2,
    /// -1 is farthest, 1 is nearest.
    pub depth: f32,
    /// Normalized units per nominal frame.
    pub vel: Vec2,
    pub depth_vel: f32,
    pub base_opacity: f32,
    pub color: ColorTag,
    pub active: bool,
}

/// Outcome of one engine step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub active: usize,
    /// The surface had no usable size, so no position-dependent work ran.
    pub skipped: bool,
}

impl StepReport {
    /// Scatter mode with nothing left on screen; no further ticks are useful.
    pub fn is_idle(&self, mode: Mode) -> bool {
        mode == Mode::Scatter && self.active == 0
    }
}
