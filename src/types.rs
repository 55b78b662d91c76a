use image::{ImageBuffer, Rgb};
use std::sync::Arc;

/// A camera frame as delivered by the capture loop.
pub type Frame = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Frames are shared by both landmark sources and the renderer without copying.
pub type SharedFrame = Arc<Frame>;

// Face mesh anchors (468-point topology)
pub const FACE_LEFT_EAR: usize = 132;
pub const FACE_RIGHT_EAR: usize = 361;
pub const FACE_CHIN: usize = 152;
pub const FACE_MESH_POINTS: usize = 468;

// Hand topology (21 points)
pub const HAND_INDEX_MCP: usize = 5;
pub const HAND_INDEX_PIP: usize = 6;
pub const HAND_INDEX_TIP: usize = 8;
pub const HAND_PINKY_PIP: usize = 18;
pub const HAND_PINKY_TIP: usize = 20;
pub const HAND_POINTS: usize = 21;

/// Represents a single 3D point, normalized to [0,1] of the frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    #[allow(dead_code)]
    pub z: f32,
}

impl Point3D {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Scale a normalized point to surface pixels.
    pub fn to_pixels(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// One detected subject (a face or a hand).
#[derive(Debug, Clone, Default)]
pub struct Landmarks {
    pub points: Vec<Point3D>,
}

impl Landmarks {
    pub fn new(points: Vec<Point3D>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<Point3D> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Which landmark model produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Face,
    Hand,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::Hand => "hand",
        }
    }
}

/// Destination rectangle in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }
}
