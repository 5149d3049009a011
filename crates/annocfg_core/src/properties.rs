//! Typed, kind-specific fields of a scene node
//!
//! Each [`Properties`] variant reads the fields it models out of a node's
//! element and writes them back on export. Everything else stays in the
//! residual element untouched.

use std::path::Path;
use std::sync::Arc;

use annocfg_math::{CoordinateConvention, Vec3};

use crate::asset_cache::Asset;
use crate::document::{format_float, Document, DocumentNode, Indent};
use crate::error::{AssetError, StructuralError};
use crate::registry::Kind;
use crate::scene::SceneKey;

/// Texture slots a material may carry, with the flag that enables each
pub const TEXTURE_SLOTS: &[(&str, &str)] = &[
    ("cModelDiffTex", "DIFFUSE_ENABLED"),
    ("cModelNormalTex", "NORMAL_ENABLED"),
    ("cModelMetallicTex", "METALLIC_TEX_ENABLED"),
    ("cSeparateAOTex", "SEPARATE_AO_TEXTURE"),
    ("cHeightMap", "HEIGHT_MAP_ENABLED"),
    ("cNightGlowMap", "NIGHT_GLOW_ENABLED"),
    ("cDyeMask", "DYE_MASK_ENABLED"),
    ("cClothDiffuseTex", "DIFFUSE_ENABLED"),
    ("cClothNormalTex", "NORMAL_ENABLED"),
    ("cClothMetallicTex", "METALLIC_TEX_ENABLED"),
];

/// Color fields stored as `<name>.r/.g/.b`
pub const COLOR_FIELDS: &[&str] = &["cDiffuseColor", "cEmissiveColor"];

fn text(node: &DocumentNode, path: &str) -> String {
    node.field(path).unwrap_or_default()
}

fn number(node: &DocumentNode, path: &str, default: f32) -> f32 {
    node.field(path)
        .and_then(|t| t.trim().parse::<f32>().ok())
        .unwrap_or(default)
}

fn integer(node: &DocumentNode, path: &str) -> Option<i64> {
    node.field(path).and_then(|t| t.trim().parse::<i64>().ok())
}

fn required(node: &DocumentNode, path: &str, owner: &str) -> Result<String, StructuralError> {
    node.field(path).ok_or_else(|| StructuralError::MissingField {
        node: owner.to_string(),
        field: path.to_string(),
    })
}

fn read_vec3(node: &DocumentNode) -> Vec3 {
    Vec3::new(number(node, "x", 0.0), number(node, "y", 0.0), number(node, "z", 0.0))
}

// The write helpers leave a field alone when it already reads back as the
// value being written. An absent field reads as its read default.

fn write_text(node: &mut DocumentNode, path: &str, value: &str, indent: &Indent) {
    if node.field(path).unwrap_or_default() != value {
        node.set_field(path, value, indent);
    }
}

fn write_number(node: &mut DocumentNode, path: &str, value: f32, default: f32, indent: &Indent) {
    if number(node, path, default) != value {
        node.set_field(path, &format_float(value), indent);
    }
}

fn write_integer(node: &mut DocumentNode, path: &str, value: i64, default: Option<i64>, indent: &Indent) {
    if integer(node, path).or(default) != Some(value) {
        node.set_field(path, &value.to_string(), indent);
    }
}

fn write_vec3(node: &mut DocumentNode, v: Vec3, indent: &Indent) {
    write_number(node, "x", v.x, 0.0, indent);
    write_number(node, "y", v.y, 0.0, indent);
    write_number(node, "z", v.z, 0.0, indent);
}

/// One entry of a `Materials` list
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    /// `None` when the element has no `Name`
    pub name: Option<String>,
    /// `(slot, canonical path)` in document order
    pub textures: Vec<(String, String)>,
    pub colors: Vec<(String, [f32; 3])>,
}

impl Material {
    pub fn read(node: &DocumentNode) -> Self {
        let textures = TEXTURE_SLOTS
            .iter()
            .filter_map(|(slot, _)| node.field(slot).map(|path| (slot.to_string(), path)))
            .collect();
        let colors = COLOR_FIELDS
            .iter()
            .filter(|name| node.find(&format!("{}.r", name)).is_some())
            .map(|name| {
                let channel = |c: &str| number(node, &format!("{}.{}", name, c), 1.0);
                (name.to_string(), [channel("r"), channel("g"), channel("b")])
            })
            .collect();
        Self {
            name: node.field("Name"),
            textures,
            colors,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("Unnamed Material")
    }

    pub fn texture(&self, slot: &str) -> Option<&str> {
        self.textures
            .iter()
            .find(|(s, _)| s == slot)
            .map(|(_, path)| path.as_str())
    }

    pub fn set_texture(&mut self, slot: &str, path: impl Into<String>) {
        let path = path.into();
        match self.textures.iter_mut().find(|(s, _)| s == slot) {
            Some(entry) => entry.1 = path,
            None => self.textures.push((slot.to_string(), path)),
        }
    }

    /// Write the fields that changed; a texture's enable flag is only
    /// touched when its texture changed and the element already has one
    pub fn write(&self, node: &mut DocumentNode, indent: &Indent) {
        if let Some(name) = &self.name {
            write_text(node, "Name", name, indent);
        }
        for (slot, path) in &self.textures {
            if node.field(slot).as_deref() == Some(path.as_str()) {
                continue;
            }
            node.set_field(slot, path, indent);
            let flag = TEXTURE_SLOTS
                .iter()
                .find(|(s, _)| s == slot)
                .map(|(_, flag)| *flag);
            if let Some(flag) = flag {
                if node.find(flag).is_some() {
                    write_text(node, flag, if path.is_empty() { "0" } else { "1" }, indent);
                }
            }
        }
        for (name, rgb) in &self.colors {
            for (channel, value) in ["r", "g", "b"].iter().zip(rgb) {
                write_number(node, &format!("{}.{}", name, channel), *value, 1.0, indent);
            }
        }
    }
}

/// What a `.prp` file says about a prop
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropData {
    pub mesh_file: Option<String>,
    pub diffuse: Option<String>,
    pub normal: Option<String>,
    pub metallic: Option<String>,
}

impl PropData {
    /// Read the mesh and textures; `cModel*` slots win over `cProp*`
    pub fn from_document(doc: &Document) -> Self {
        let Some(root) = doc.root() else {
            return Self::default();
        };
        let non_empty = |path: &str| root.field(path).filter(|t| !t.trim().is_empty());
        let texture = |model: &str, prop: &str| {
            non_empty(model).or_else(|| non_empty(prop))
        };
        Self {
            mesh_file: non_empty("MeshFileName"),
            diffuse: texture("cModelDiffTex", "cPropDiffuseTex"),
            normal: texture("cModelNormalTex", "cPropNormalTex"),
            metallic: texture("cModelMetallicTex", "cPropMetallicTex"),
        }
    }
}

impl Asset for PropData {
    fn load_from_file(path: &Path) -> Result<Self, AssetError> {
        let doc = Document::load_from_file(path)?;
        Ok(Self::from_document(&doc))
    }
}

/// Asset reference plus materials (models, cloth, decals, particles, subfiles)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssetProperties {
    /// Canonical path as written in the document
    pub file_name: String,
    pub materials: Vec<Material>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropProperties {
    pub file_name: String,
    pub flags: i64,
    /// Contents of the referenced `.prp`, when it could be read
    pub data: Option<Arc<PropData>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnimationProperties {
    pub file_name: String,
    pub model_file_name: String,
}

/// What a track element points at
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackTarget {
    Model,
    Particle,
}

impl TrackTarget {
    pub fn field(self) -> &'static str {
        match self {
            TrackTarget::Model => "ModelID",
            TrackTarget::Particle => "ParticleID",
        }
    }
}

/// Reference from a track element to a model or particle of the same file
#[derive(Clone, Debug, PartialEq)]
pub struct TrackReference {
    /// Index of the `Track` element below the sequence
    pub track: usize,
    /// Index of the `TrackElement` inside that track
    pub element: usize,
    pub target: TrackTarget,
    /// Id as read from the document
    pub original: i64,
    /// Node the id resolved to on import
    pub node: Option<SceneKey>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceProperties {
    pub sequence_id: i64,
    pub tracks: Vec<TrackReference>,
}

impl SequenceProperties {
    fn read(node: &DocumentNode) -> Self {
        let mut tracks = Vec::new();
        for (t, track) in node.elements().filter(|e| e.name() == "Track").enumerate() {
            for (i, element) in track
                .elements()
                .filter(|e| e.name() == "TrackElement")
                .enumerate()
            {
                for target in [TrackTarget::Model, TrackTarget::Particle] {
                    if let Some(id) = integer(element, target.field()).filter(|id| *id >= 0) {
                        tracks.push(TrackReference {
                            track: t,
                            element: i,
                            target,
                            original: id,
                            node: None,
                        });
                    }
                }
            }
        }
        Self {
            sequence_id: integer(node, "SequenceID").unwrap_or(-1),
            tracks,
        }
    }

    /// Write resolved ids; `ids[n]` belongs to `tracks[n]`
    pub fn write_track_ids(&self, node: &mut DocumentNode, ids: &[i64], indent: &Indent) {
        for (reference, id) in self.tracks.iter().zip(ids) {
            let element = node
                .elements_mut()
                .filter(|e| e.name() == "Track")
                .nth(reference.track)
                .and_then(|track| {
                    track
                        .elements_mut()
                        .filter(|e| e.name() == "TrackElement")
                        .nth(reference.element)
                });
            if let Some(element) = element {
                if element.field(reference.target.field()) != Some(id.to_string()) {
                    element.set_field(reference.target.field(), &id.to_string(), &indent.deeper(2));
                }
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SplineProperties {
    pub name: String,
    /// Control points in editor space
    pub control_points: Vec<Vec3>,
}

/// One entry of a feedback config's `SequenceElements`
///
/// Numeric values are kept as written so they pass through unchanged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SequenceElement {
    Walk {
        sequence: String,
        speed_factor: String,
        target_dummy: String,
    },
    IdleAnimation {
        sequence: String,
        min_play_count: String,
        max_play_count: String,
    },
    TimedIdleAnimation {
        sequence: String,
        min_play_time: String,
        max_play_time: String,
    },
    Wait {
        min_time: String,
        max_time: String,
    },
    /// Turn by an angle in radians
    TurnAngle {
        angle: String,
        sequence: String,
    },
    TurnToDummy {
        dummy: String,
        sequence: String,
    },
    /// Element type this tool does not model
    Other { tag: String },
}

impl SequenceElement {
    /// # Errors
    /// Returns [`StructuralError::MissingField`] when a required field is absent.
    pub fn read(node: &DocumentNode) -> Result<Self, StructuralError> {
        let tag = node.name();
        let get = |field: &str| required(node, field, tag);
        Ok(match tag {
            "Walk" => SequenceElement::Walk {
                sequence: get("WalkSequence")?,
                speed_factor: get("SpeedFactorF")?,
                target_dummy: get("TargetDummy")?,
            },
            "IdleAnimation" => SequenceElement::IdleAnimation {
                sequence: get("m_IdleSequenceID")?,
                min_play_count: get("MinPlayCount")?,
                max_play_count: get("MaxPlayCount")?,
            },
            "TimedIdleAnimation" => SequenceElement::TimedIdleAnimation {
                sequence: get("m_IdleSequenceID")?,
                min_play_time: get("MinPlayTime")?,
                max_play_time: get("MaxPlayTime")?,
            },
            "Wait" => SequenceElement::Wait {
                min_time: get("MinTime")?,
                max_time: get("MaxTime")?,
            },
            "TurnAngle" => SequenceElement::TurnAngle {
                angle: get("TurnAngleF")?,
                sequence: get("TurnSequence")?,
            },
            "TurnToDummy" => SequenceElement::TurnToDummy {
                dummy: get("TurnToDummy")?,
                sequence: get("TurnSequence")?,
            },
            other => SequenceElement::Other {
                tag: other.to_string(),
            },
        })
    }

    pub fn tag(&self) -> &str {
        match self {
            SequenceElement::Walk { .. } => "Walk",
            SequenceElement::IdleAnimation { .. } => "IdleAnimation",
            SequenceElement::TimedIdleAnimation { .. } => "TimedIdleAnimation",
            SequenceElement::Wait { .. } => "Wait",
            SequenceElement::TurnAngle { .. } => "TurnAngle",
            SequenceElement::TurnToDummy { .. } => "TurnToDummy",
            SequenceElement::Other { tag } => tag,
        }
    }

    /// Element type number used by the native encoding
    pub fn element_type(&self) -> Option<u32> {
        match self {
            SequenceElement::Walk { .. } => Some(0),
            SequenceElement::IdleAnimation { .. } | SequenceElement::TimedIdleAnimation { .. } => {
                Some(1)
            }
            SequenceElement::Wait { .. } => Some(2),
            SequenceElement::TurnAngle { .. } | SequenceElement::TurnToDummy { .. } => Some(10),
            SequenceElement::Other { .. } => None,
        }
    }

    fn fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            SequenceElement::Walk {
                sequence,
                speed_factor,
                target_dummy,
            } => vec![
                ("WalkSequence", sequence.as_str()),
                ("SpeedFactorF", speed_factor.as_str()),
                ("TargetDummy", target_dummy.as_str()),
            ],
            SequenceElement::IdleAnimation {
                sequence,
                min_play_count,
                max_play_count,
            } => vec![
                ("m_IdleSequenceID", sequence.as_str()),
                ("MinPlayCount", min_play_count.as_str()),
                ("MaxPlayCount", max_play_count.as_str()),
            ],
            SequenceElement::TimedIdleAnimation {
                sequence,
                min_play_time,
                max_play_time,
            } => vec![
                ("m_IdleSequenceID", sequence.as_str()),
                ("MinPlayTime", min_play_time.as_str()),
                ("MaxPlayTime", max_play_time.as_str()),
            ],
            SequenceElement::Wait { min_time, max_time } => {
                vec![("MinTime", min_time.as_str()), ("MaxTime", max_time.as_str())]
            }
            SequenceElement::TurnAngle { angle, sequence } => {
                vec![("TurnAngleF", angle.as_str()), ("TurnSequence", sequence.as_str())]
            }
            SequenceElement::TurnToDummy { dummy, sequence } => {
                vec![("TurnToDummy", dummy.as_str()), ("TurnSequence", sequence.as_str())]
            }
            SequenceElement::Other { .. } => Vec::new(),
        }
    }

    /// Rename the element to this variant's tag and write its fields
    pub fn write(&self, node: &mut DocumentNode, indent: &Indent) {
        if node.name() != self.tag() {
            node.set_name(self.tag());
        }
        for (field, value) in self.fields() {
            write_text(node, field, value, indent);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedbackConfigProperties {
    /// Numeric GUIDs or names from the `GUIDNames` table
    pub guid_variations: Vec<String>,
    pub default_state_dummy: String,
    pub start_dummy_group: String,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl FeedbackConfigProperties {
    fn read(node: &DocumentNode) -> Self {
        Self {
            guid_variations: node
                .find_all("GUIDVariationList/GUID")
                .into_iter()
                .map(|g| g.text().trim().to_string())
                .collect(),
            default_state_dummy: text(node, "DefaultStateDummy"),
            start_dummy_group: text(node, "StartDummyGroup"),
            min_scale: number(node, "Scale/m_MinScaleFactor", 0.5),
            max_scale: number(node, "Scale/m_MaxScaleFactor", 0.5),
        }
    }

    fn write(&self, node: &mut DocumentNode, indent: &Indent) {
        let list = node.find_or_create("GUIDVariationList", indent);
        let current: Vec<String> = list
            .elements()
            .filter(|e| e.name() == "GUID")
            .map(|e| e.text().trim().to_string())
            .collect();
        if current != self.guid_variations {
            list.remove_all_named("GUID");
            let list_indent = indent.nested();
            for guid in &self.guid_variations {
                list.append_element(DocumentNode::with_text("GUID", guid), &list_indent);
            }
        }
        write_text(node, "DefaultStateDummy", &self.default_state_dummy, indent);
        write_text(node, "StartDummyGroup", &self.start_dummy_group, indent);
        write_number(node, "Scale/m_MinScaleFactor", self.min_scale, 0.5, indent);
        write_number(node, "Scale/m_MaxScaleFactor", self.max_scale, 0.5, indent);
    }
}

/// Kind-specific fields of a scene node
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Properties {
    #[default]
    None,
    Asset(AssetProperties),
    Prop(PropProperties),
    Light { color: [f32; 3] },
    Animation(AnimationProperties),
    Sequence(SequenceProperties),
    /// Ground polygon in editor space, relative to the node
    Plane { vertices: Vec<Vec3> },
    /// `Id` of an `.ifo` sequence blocker
    Empty { sequence_id: Option<i64> },
    Dummy { name: String, height_adaptation_mode: Option<i64> },
    DummyGroup { name: String },
    Spline(SplineProperties),
    FeedbackConfig(FeedbackConfigProperties),
    SequenceElement(SequenceElement),
}

impl Properties {
    /// Read the fields `kind` models from `node`
    ///
    /// # Errors
    /// Fails only for feedback sequence elements missing a required field.
    pub fn read(
        kind: Kind,
        node: &DocumentNode,
        convention: &CoordinateConvention,
    ) -> Result<Self, StructuralError> {
        Ok(match kind {
            Kind::Model | Kind::Cloth | Kind::Decal | Kind::Particle | Kind::Subfile => {
                Properties::Asset(AssetProperties {
                    file_name: text(node, "FileName"),
                    materials: node
                        .find_all("Materials/Config")
                        .into_iter()
                        .map(Material::read)
                        .collect(),
                })
            }
            Kind::Prop => Properties::Prop(PropProperties {
                file_name: text(node, "FileName"),
                flags: integer(node, "Flags").unwrap_or(1),
                data: None,
            }),
            Kind::Light => Properties::Light {
                color: [
                    number(node, "Diffuse.r", 1.0),
                    number(node, "Diffuse.g", 1.0),
                    number(node, "Diffuse.b", 1.0),
                ],
            },
            Kind::Animation => Properties::Animation(AnimationProperties {
                file_name: text(node, "FileName"),
                model_file_name: text(node, "ModelFileName"),
            }),
            Kind::AnimationSequence => Properties::Sequence(SequenceProperties::read(node)),
            Kind::BlockerPlane => Properties::Plane {
                vertices: node
                    .elements()
                    .filter(|e| e.name() == "Position")
                    .map(|p| {
                        convention.plane_vertex_to_editor(number(p, "xf", 0.0), number(p, "zf", 0.0))
                    })
                    .collect(),
            },
            Kind::BlockerEmpty => Properties::Empty {
                sequence_id: integer(node, "Id"),
            },
            Kind::Dummy => Properties::Dummy {
                name: text(node, "Name"),
                height_adaptation_mode: integer(node, "HeightAdaptationMode"),
            },
            Kind::DummyGroup => Properties::DummyGroup {
                name: text(node, "Name"),
            },
            Kind::Spline => Properties::Spline(SplineProperties {
                name: text(node, "Name"),
                control_points: node
                    .find("ControlPoints")
                    .map(|cp| {
                        cp.elements()
                            .map(|p| convention.location_to_editor(read_vec3(p)))
                            .collect()
                    })
                    .unwrap_or_default(),
            }),
            Kind::FeedbackConfig => Properties::FeedbackConfig(FeedbackConfigProperties::read(node)),
            Kind::FeedbackSequenceElement => Properties::SequenceElement(SequenceElement::read(node)?),
            Kind::File | Kind::PropContainer | Kind::BlockerCube | Kind::Unknown => Properties::None,
        })
    }

    /// Write modelled fields back into `node`
    ///
    /// Plane vertices and track ids depend on the rest of the scene and are
    /// written by the exporter.
    pub fn write(&self, node: &mut DocumentNode, convention: &CoordinateConvention, indent: &Indent) {
        match self {
            Properties::None | Properties::Plane { .. } => {}
            Properties::Asset(asset) => {
                write_text(node, "FileName", &asset.file_name, indent);
                if !asset.materials.is_empty() {
                    let materials = node.find_or_create("Materials", indent);
                    let material_indent = indent.nested();
                    let existing = materials.elements().filter(|e| e.name() == "Config").count();
                    for (i, material) in asset.materials.iter().enumerate() {
                        if i >= existing {
                            materials.append_element(DocumentNode::new("Config"), &material_indent);
                        }
                        if let Some(element) =
                            materials.elements_mut().filter(|e| e.name() == "Config").nth(i)
                        {
                            material.write(element, &material_indent.nested());
                        }
                    }
                }
            }
            Properties::Prop(prop) => {
                write_text(node, "FileName", &prop.file_name, indent);
                write_integer(node, "Flags", prop.flags, Some(1), indent);
            }
            Properties::Light { color } => {
                for (channel, value) in ["r", "g", "b"].iter().zip(color) {
                    write_number(node, &format!("Diffuse.{}", channel), *value, 1.0, indent);
                }
            }
            Properties::Animation(animation) => {
                write_text(node, "FileName", &animation.file_name, indent);
                write_text(node, "ModelFileName", &animation.model_file_name, indent);
            }
            Properties::Sequence(sequence) => {
                write_integer(node, "SequenceID", sequence.sequence_id, Some(-1), indent);
            }
            Properties::Empty { sequence_id } => {
                if let Some(id) = sequence_id {
                    write_integer(node, "Id", *id, None, indent);
                }
            }
            Properties::Dummy {
                name,
                height_adaptation_mode,
            } => {
                write_text(node, "Name", name, indent);
                if let Some(mode) = height_adaptation_mode {
                    write_integer(node, "HeightAdaptationMode", *mode, None, indent);
                }
            }
            Properties::DummyGroup { name } => write_text(node, "Name", name, indent),
            Properties::Spline(spline) => {
                write_text(node, "Name", &spline.name, indent);
                if spline.control_points.is_empty() && node.find("ControlPoints").is_none() {
                    return;
                }
                let points = node.find_or_create("ControlPoints", indent);
                let point_indent = indent.nested();
                let existing = points.element_count();
                for (i, p) in spline.control_points.iter().enumerate() {
                    let game = convention.location_to_game(*p);
                    if i < existing {
                        if let Some(element) = points.elements_mut().nth(i) {
                            write_vec3(element, game, &point_indent.nested());
                        }
                    } else {
                        let element = DocumentNode::new("i")
                            .with_field("x", &format_float(game.x))
                            .with_field("y", &format_float(game.y))
                            .with_field("z", &format_float(game.z));
                        points.append_element(element, &point_indent);
                    }
                }
                points.truncate_elements(spline.control_points.len());
            }
            Properties::FeedbackConfig(config) => config.write(node, indent),
            Properties::SequenceElement(element) => element.write(node, indent),
        }
    }

    /// Referenced asset path, if the kind has one
    pub fn file_name(&self) -> Option<&str> {
        match self {
            Properties::Asset(a) => Some(&a.file_name),
            Properties::Prop(p) => Some(&p.file_name),
            Properties::Animation(a) => Some(&a.file_name),
            _ => None,
        }
    }

    pub fn set_file_name(&mut self, path: impl Into<String>) {
        let path = path.into();
        match self {
            Properties::Asset(a) => a.file_name = path,
            Properties::Prop(p) => p.file_name = path,
            Properties::Animation(a) => a.file_name = path,
            _ => {}
        }
    }

    /// Name field for kinds identified by name
    pub fn name(&self) -> Option<&str> {
        match self {
            Properties::Dummy { name, .. } | Properties::DummyGroup { name } => Some(name),
            Properties::Spline(spline) => Some(&spline.name),
            _ => None,
        }
    }

    pub fn vertices(&self) -> Option<&[Vec3]> {
        match self {
            Properties::Plane { vertices } => Some(vertices),
            _ => None,
        }
    }
}

/// Replace a plane's `Position` children by `points` (`(xf, zf)` pairs)
pub fn write_plane_vertices(node: &mut DocumentNode, points: &[(f32, f32)], indent: &Indent) {
    node.remove_all_named("Position");
    for (xf, zf) in points {
        let position = DocumentNode::new("Position")
            .with_field("xf", &format_float(*xf))
            .with_field("zf", &format_float(*zf));
        node.append_element(position, indent);
    }
}
