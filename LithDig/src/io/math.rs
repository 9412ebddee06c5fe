//! Small geometric value types not covered by `glam`

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::Serialize;

/// Axis-aligned bounding box.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }
}

/// Plane as a normal and distance from the origin.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

/// Packed RGBA color, red in the lowest byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rgba32(pub u32);

impl Rgba32 {
    #[must_use]
    pub fn r(self) -> u8 {
        self.0 as u8
    }

    #[must_use]
    pub fn g(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[must_use]
    pub fn b(self) -> u8 {
        (self.0 >> 16) as u8
    }

    #[must_use]
    pub fn a(self) -> u8 {
        (self.0 >> 24) as u8
    }
}
