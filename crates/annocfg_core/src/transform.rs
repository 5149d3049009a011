//! Local transform of a scene node (position, rotation, scale)
//!
//! Values are held in editor space. [`read_transform`] and [`write_transform`]
//! move them in and out of a document element through a
//! [`TransformBinding`] and the [`CoordinateConvention`].

use std::f32::consts::PI;

use annocfg_math::{CoordinateConvention, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::document::{format_float, DocumentNode, Indent};
use crate::registry::{RotationBinding, ScaleBinding, TransformBinding};

const SCALE_EPSILON: f32 = 1e-5;

/// A transform with position, rotation, and non-uniform scale
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    /// Create an identity transform
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Create a transform with just a position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Builder: replace the rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Builder: replace the scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn has_identity_scale(&self) -> bool {
        self.scale.approx_eq(Vec3::ONE, SCALE_EPSILON)
    }

    pub fn has_uniform_scale(&self) -> bool {
        self.scale.is_uniform(SCALE_EPSILON)
    }

    /// Transform a point from local space to parent space
    ///
    /// Applies scale, then rotation, then translation.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation.rotate(p.component_mul(self.scale)) + self.position
    }

    /// Inverse of [`transform_point`](Self::transform_point) for unscaled transforms
    pub fn inverse_transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation.conjugate().rotate(p - self.position)
    }
}

/// Reason a transform field could not be read
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub text: String,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "field '{}' is not a number: '{}'", self.field, self.text)
    }
}

fn read_number(node: &DocumentNode, path: &str, default: f32) -> Result<f32, FieldError> {
    match node.field(path) {
        None => Ok(default),
        Some(text) if text.trim().is_empty() => Ok(default),
        Some(text) => text.trim().parse::<f32>().map_err(|_| FieldError {
            field: path.to_string(),
            text,
        }),
    }
}

/// Read a node's transform through `binding`, converting to editor space
///
/// Missing fields take their defaults (0, identity rotation, scale 1).
///
/// # Errors
/// Returns the first field whose text is present but not numeric.
pub fn read_transform(
    node: &DocumentNode,
    binding: &TransformBinding,
    convention: &CoordinateConvention,
) -> Result<Transform, FieldError> {
    let [px, py, pz] = binding.position;
    let position = Vec3::new(
        read_number(node, px, 0.0)?,
        read_number(node, py, 0.0)?,
        read_number(node, pz, 0.0)?,
    );

    let rotation = match binding.rotation {
        RotationBinding::None => Quat::IDENTITY,
        RotationBinding::Quaternion([x, y, z, w]) => {
            let q = Quat::new(
                read_number(node, w, 1.0)?,
                read_number(node, x, 0.0)?,
                read_number(node, y, 0.0)?,
                read_number(node, z, 0.0)?,
            );
            convention.rotation_to_editor(q)
        }
        RotationBinding::Yaw(path) => {
            let angle = read_number(node, path, 0.0)?;
            convention.rotation_to_editor(game_yaw(angle))
        }
    };

    let scale = match binding.scale {
        ScaleBinding::None => Vec3::ONE,
        ScaleBinding::Uniform(path) => Vec3::splat(read_number(node, path, 1.0)?),
        ScaleBinding::PerAxis([x, y, z]) => convention.scale_to_editor(Vec3::new(
            read_number(node, x, 1.0)?,
            read_number(node, y, 1.0)?,
            read_number(node, z, 1.0)?,
        )),
    };

    Ok(Transform {
        position: convention.location_to_editor(position),
        rotation,
        scale,
    })
}

/// Write `transform` into a node through `binding`
///
/// Fields are created where missing; every value is written with six
/// decimals.
pub fn write_transform(
    node: &mut DocumentNode,
    binding: &TransformBinding,
    transform: &Transform,
    convention: &CoordinateConvention,
    indent: &Indent,
) {
    let position = convention.location_to_game(transform.position);
    let [px, py, pz] = binding.position;
    node.set_field(px, &format_float(position.x), indent);
    node.set_field(py, &format_float(position.y), indent);
    node.set_field(pz, &format_float(position.z), indent);

    match binding.rotation {
        RotationBinding::None => {}
        RotationBinding::Quaternion([x, y, z, w]) => {
            let q = convention.rotation_to_game(transform.rotation.normalize());
            node.set_field(x, &format_float(q.x), indent);
            node.set_field(y, &format_float(q.y), indent);
            node.set_field(z, &format_float(q.z), indent);
            node.set_field(w, &format_float(q.w), indent);
        }
        RotationBinding::Yaw(path) => {
            let editor = Quat::from_yaw(transform.rotation.yaw());
            let q = convention.rotation_to_game(editor);
            node.set_field(path, &format_float(wrap_angle(2.0 * q.y.atan2(q.w))), indent);
        }
    }

    match binding.scale {
        ScaleBinding::None => {}
        ScaleBinding::Uniform(path) => {
            node.set_field(path, &format_float(transform.scale.x), indent);
        }
        ScaleBinding::PerAxis([x, y, z]) => {
            let s = convention.scale_to_game(transform.scale);
            node.set_field(x, &format_float(s.x), indent);
            node.set_field(y, &format_float(s.y), indent);
            node.set_field(z, &format_float(s.z), indent);
        }
    }
}

/// Rotation of `angle` radians about the game's up axis, in game space
fn game_yaw(angle: f32) -> Quat {
    Quat::from_axis_angle(Vec3::Y, angle)
}

fn wrap_angle(mut angle: f32) -> f32 {
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle <= -PI {
        angle += 2.0 * PI;
    }
    angle
}
