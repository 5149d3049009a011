//! Unit quaternion for 3D rotations
//!
//! Components are stored in `(w, x, y, z)` order, the same order the editor
//! side uses. Game documents store them as separate `x/y/z/w` fields; the
//! [`CoordinateConvention`](crate::CoordinateConvention) handles the mapping.

use serde::{Serialize, Deserialize};
use crate::Vec3;

/// Rotation quaternion
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quat {
    pub const IDENTITY: Self = Self { w: 1.0, x: 0.0, y: 0.0, z: 0.0 };

    /// Create a quaternion from raw components
    #[inline]
    pub const fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation of `angle` radians around `axis`
    pub fn from_axis_angle(axis: Vec3, angle: f32) -> Self {
        let axis = axis.normalized();
        let (s, c) = (angle * 0.5).sin_cos();
        Self::new(c, axis.x * s, axis.y * s, axis.z * s)
    }

    /// Rotation of `angle` radians around the Z (up) axis
    pub fn from_yaw(angle: f32) -> Self {
        Self::from_axis_angle(Vec3::Z, angle)
    }

    /// Angle around the Z axis
    ///
    /// Exact for pure yaw rotations; for general rotations this is the yaw
    /// of the rotated X axis projected onto the XY plane.
    pub fn yaw(&self) -> f32 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }

    /// Squared norm
    #[inline]
    pub fn norm_squared(&self) -> f32 {
        self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Normalize to unit length (identity for a zero quaternion)
    pub fn normalize(&self) -> Self {
        let n = self.norm_squared().sqrt();
        if n < 1e-10 {
            return Self::IDENTITY;
        }
        Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
    }

    /// Inverse rotation of a unit quaternion
    #[inline]
    pub fn conjugate(&self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Hamilton product: applies `other` first, then `self`
    pub fn compose(&self, other: &Self) -> Self {
        Self::new(
            self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
            self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
        )
    }

    /// Rotate a vector
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v) * 2.0;
        v + t * self.w + u.cross(t)
    }

    /// Component-wise comparison within `epsilon`
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        (self.w - other.w).abs() <= epsilon
            && (self.x - other.x).abs() <= epsilon
            && (self.y - other.y).abs() <= epsilon
            && (self.z - other.z).abs() <= epsilon
    }

    /// True if this is the identity rotation (either sign)
    pub fn is_identity(&self, epsilon: f32) -> bool {
        self.approx_eq(&Self::IDENTITY, epsilon)
            || self.approx_eq(&Self::new(-1.0, 0.0, 0.0, 0.0), epsilon)
    }
}
