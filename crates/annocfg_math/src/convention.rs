//! Mapping between game space and editor space
//!
//! Game documents are Y-up. The editor side is Z-up. The game → editor
//! mapping is:
//!
//! - location `(x, y, z)` → `(x, -z, y)`
//! - rotation `(w, x, y, z)` → `(w, x, z, y)`
//! - scale `(x, y, z)` → `(x, z, y)`
//! - yaw about game Y → yaw about editor Z
//!
//! With `mirror_x` the editor X axis is flipped: location x is negated and
//! the rotation's editor Z component changes sign. Each `to_game` function is
//! the exact inverse of its `to_editor` counterpart.

use serde::{Serialize, Deserialize};
use crate::{Quat, Vec3};

/// Axis convention used when moving values between documents and the scene
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinateConvention {
    /// Flip the X axis (mirrored model import)
    pub mirror_x: bool,
}

impl CoordinateConvention {
    /// Convention without mirroring
    pub const fn standard() -> Self {
        Self { mirror_x: false }
    }

    /// Convention with the X axis mirrored
    pub const fn mirrored() -> Self {
        Self { mirror_x: true }
    }

    pub fn location_to_editor(&self, v: Vec3) -> Vec3 {
        if self.mirror_x {
            Vec3::new(-v.x, -v.z, v.y)
        } else {
            Vec3::new(v.x, -v.z, v.y)
        }
    }

    pub fn location_to_game(&self, v: Vec3) -> Vec3 {
        if self.mirror_x {
            Vec3::new(-v.x, v.z, -v.y)
        } else {
            Vec3::new(v.x, v.z, -v.y)
        }
    }

    pub fn rotation_to_editor(&self, q: Quat) -> Quat {
        if self.mirror_x {
            Quat::new(q.w, q.x, q.z, -q.y)
        } else {
            Quat::new(q.w, q.x, q.z, q.y)
        }
    }

    pub fn rotation_to_game(&self, q: Quat) -> Quat {
        if self.mirror_x {
            Quat::new(q.w, q.x, -q.z, q.y)
        } else {
            Quat::new(q.w, q.x, q.z, q.y)
        }
    }

    /// Scale and extents swap Y and Z in both directions
    pub fn scale_to_editor(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.x, v.z, v.y)
    }

    pub fn scale_to_game(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.x, v.z, v.y)
    }

    /// A ground-plane vertex `(xf, zf)` as an editor-space point with zero height
    pub fn plane_vertex_to_editor(&self, xf: f32, zf: f32) -> Vec3 {
        self.location_to_editor(Vec3::new(xf, 0.0, zf))
    }

    /// The `(xf, zf)` pair of an editor-space point; height is dropped
    pub fn plane_vertex_to_game(&self, v: Vec3) -> (f32, f32) {
        let g = self.location_to_game(v);
        (g.x, g.z)
    }
}
