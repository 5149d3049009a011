//! Math for annocfg
//!
//! This crate provides the small amount of 3D math the scene graph needs.
//!
//! ## Core Types
//!
//! - [`Vec3`] - 3D vector with x, y, z components
//! - [`Quat`] - rotation quaternion in `(w, x, y, z)` order
//! - [`CoordinateConvention`] - mapping between Y-up game space and Z-up editor space

mod vec3;
mod quat;
pub mod convention;

pub use vec3::Vec3;
pub use quat::Quat;
pub use convention::CoordinateConvention;
