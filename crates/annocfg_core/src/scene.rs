//! Editable scene graph
//!
//! A [`Scene`] owns every [`SceneNode`] in a slot map and hands out
//! generational [`SceneKey`]s. Nodes keep the residual document element they
//! were imported from, so export can rebuild the original text around the
//! fields that were actually edited. Edits go through the scene, which
//! validates them against the node's placement rule and records what
//! changed in the node's [`DirtyFlags`].

use std::path::{Path, PathBuf};

use annocfg_math::{CoordinateConvention, Vec3};
use bitflags::bitflags;
use slotmap::{new_key_type, SlotMap};

use crate::document::DocumentNode;
use crate::error::{StructuralError, ValidationWarning};
use crate::properties::Properties;
use crate::registry::{DocumentFormat, Kind, Registry, ScaleRule};
use crate::transform::Transform;

new_key_type! {
    /// Generational key to a node in a [`Scene`]
    pub struct SceneKey;
}

bitflags! {
    /// Which aspects of a node the host edited since import
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        const NONE = 0;
        /// Position, rotation or scale
        const TRANSFORM = 1 << 0;
        /// Fields of the property bag
        const PROPERTIES = 1 << 1;
        /// Mesh or plane vertices
        const GEOMETRY = 1 << 2;
        /// Children added, removed or reordered
        const CHILDREN = 1 << 3;
        const ALL = Self::TRANSFORM.bits()
            | Self::PROPERTIES.bits()
            | Self::GEOMETRY.bits()
            | Self::CHILDREN.bits();
    }
}

/// Document a File node stands for
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    /// Absolute path the document was read from, if any
    pub path: Option<PathBuf>,
    pub format: DocumentFormat,
    pub bom: bool,
}

/// One node of the scene graph
#[derive(Clone, Debug)]
pub struct SceneNode {
    name: String,
    kind: Kind,
    /// Format of the document this node's element lives in
    format: DocumentFormat,
    transform: Transform,
    properties: Properties,
    residual: DocumentNode,
    container: Option<String>,
    parent: Option<SceneKey>,
    children: Vec<SceneKey>,
    dirty: DirtyFlags,
    placeholder: bool,
    file: Option<FileInfo>,
    /// Editor-side asset produced by a conversion
    materialized: Option<PathBuf>,
    /// Interchange mesh supplied by the host after a geometry edit
    edited_mesh: Option<PathBuf>,
}

impl SceneNode {
    /// Create a node around an element
    ///
    /// Nodes built this way are clean; [`Scene::create`] marks new nodes dirty.
    pub fn new(kind: Kind, format: DocumentFormat, residual: DocumentNode) -> Self {
        Self {
            name: residual.name().to_string(),
            kind,
            format,
            transform: Transform::identity(),
            properties: Properties::None,
            residual,
            container: None,
            parent: None,
            children: Vec::new(),
            dirty: DirtyFlags::NONE,
            placeholder: false,
            file: None,
            materialized: None,
            edited_mesh: None,
        }
    }

    /// Builder: set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Builder: set the container the element sits in
    pub fn with_container(mut self, container: Option<&str>) -> Self {
        self.container = container.map(str::to_string);
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_file(mut self, file: FileInfo) -> Self {
        self.file = Some(file);
        self
    }

    /// Builder: mark the node as standing in for a missing asset
    pub fn as_placeholder(mut self) -> Self {
        self.placeholder = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Element minus the promoted children
    pub fn residual(&self) -> &DocumentNode {
        &self.residual
    }

    pub(crate) fn residual_mut(&mut self) -> &mut DocumentNode {
        &mut self.residual
    }

    pub fn container(&self) -> Option<&str> {
        self.container.as_deref()
    }

    pub fn parent(&self) -> Option<SceneKey> {
        self.parent
    }

    pub fn children(&self) -> &[SceneKey] {
        &self.children
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn file(&self) -> Option<&FileInfo> {
        self.file.as_ref()
    }

    pub fn materialized(&self) -> Option<&Path> {
        self.materialized.as_deref()
    }

    pub fn edited_mesh(&self) -> Option<&Path> {
        self.edited_mesh.as_deref()
    }

    pub(crate) fn set_materialized(&mut self, path: PathBuf) {
        self.materialized = Some(path);
        self.placeholder = false;
    }

    pub(crate) fn set_placeholder(&mut self, placeholder: bool) {
        self.placeholder = placeholder;
    }

    pub(crate) fn properties_mut_unchecked(&mut self) -> &mut Properties {
        &mut self.properties
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.dirty = DirtyFlags::NONE;
        self.edited_mesh = None;
    }
}

/// The scene graph
pub struct Scene {
    nodes: SlotMap<SceneKey, SceneNode>,
    roots: Vec<SceneKey>,
    convention: CoordinateConvention,
    warnings: Vec<ValidationWarning>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(CoordinateConvention::standard())
    }
}

impl Scene {
    pub fn new(convention: CoordinateConvention) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            roots: Vec::new(),
            convention,
            warnings: Vec::new(),
        }
    }

    pub fn convention(&self) -> &CoordinateConvention {
        &self.convention
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[SceneKey] {
        &self.roots
    }

    pub fn get(&self, key: SceneKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: SceneKey) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key)
    }

    pub fn contains(&self, key: SceneKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SceneKey, &SceneNode)> {
        self.nodes.iter()
    }

    pub fn children(&self, key: SceneKey) -> &[SceneKey] {
        self.nodes
            .get(key)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent(&self, key: SceneKey) -> Option<SceneKey> {
        self.nodes.get(key).and_then(|n| n.parent)
    }

    /// First node with the given display name
    pub fn find_by_name(&self, name: &str) -> Option<SceneKey> {
        self.descendants_of_roots()
            .into_iter()
            .find(|k| self.nodes[*k].name == name)
    }

    /// Nodes below `key` in depth-first order, `key` first
    pub fn descendants(&self, key: SceneKey) -> Vec<SceneKey> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            if let Some(node) = self.nodes.get(k) {
                out.push(k);
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn descendants_of_roots(&self) -> Vec<SceneKey> {
        self.roots
            .iter()
            .flat_map(|r| self.descendants(*r))
            .collect()
    }

    /// Nearest File node at or above `key`
    pub fn file_of(&self, key: SceneKey) -> Option<SceneKey> {
        let mut current = Some(key);
        while let Some(k) = current {
            let node = self.nodes.get(k)?;
            if node.kind == Kind::File {
                return Some(k);
            }
            current = node.parent;
        }
        None
    }

    // --- structure ---

    /// Add a top-level node
    pub fn add_root(&mut self, node: SceneNode) -> SceneKey {
        let key = self.nodes.insert(node);
        self.roots.push(key);
        key
    }

    /// Append `node` as the last child of `parent`
    ///
    /// Returns `None` if `parent` does not exist.
    pub fn add_child(&mut self, parent: SceneKey, mut node: SceneNode) -> Option<SceneKey> {
        if !self.nodes.contains_key(parent) {
            return None;
        }
        node.parent = Some(parent);
        let key = self.nodes.insert(node);
        self.nodes[parent].children.push(key);
        Some(key)
    }

    /// Create a new node of `kind` below `parent` from the registry template
    ///
    /// The node lands in the container the registry names for this kind and
    /// is fully dirty so every field is written on export.
    ///
    /// # Errors
    /// Returns [`StructuralError::InvalidNode`] if `kind` cannot be a child of
    /// `parent` or has no template.
    pub fn create(&mut self, parent: SceneKey, kind: Kind) -> Result<SceneKey, StructuralError> {
        let parent_node = self.nodes.get(parent).ok_or_else(|| StructuralError::InvalidNode {
            node: format!("{:?}", parent),
            message: "parent does not exist".to_string(),
        })?;
        let format = parent_node.format;
        let allowed = Registry::child_rules(parent_node.kind, format)
            .iter()
            .any(|rule| rule.kind == kind);
        let template = Registry::template(kind, format).filter(|_| allowed);
        let element = template.ok_or_else(|| StructuralError::InvalidNode {
            node: parent_node.name.clone(),
            message: format!("cannot hold a new {} node", kind),
        })?;
        let container = Registry::container_for(parent_node.kind, format, kind);
        let properties = Properties::read(kind, &element, &self.convention)?;
        let mut node = SceneNode::new(kind, format, element)
            .with_name(format!("{}_NEW", kind.label()))
            .with_container(container)
            .with_properties(properties);
        node.dirty = DirtyFlags::ALL;
        let key = self.add_child(parent, node).ok_or_else(|| StructuralError::InvalidNode {
            node: format!("{:?}", parent),
            message: "parent does not exist".to_string(),
        })?;
        self.mark(parent, DirtyFlags::CHILDREN);
        log::debug!("Created {} below {:?}", kind, parent);
        Ok(key)
    }

    /// Remove a node and its whole subtree; returns how many nodes went
    pub fn remove(&mut self, key: SceneKey) -> usize {
        if !self.nodes.contains_key(key) {
            return 0;
        }
        match self.nodes[key].parent {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(parent) {
                    p.children.retain(|c| *c != key);
                    p.dirty |= DirtyFlags::CHILDREN;
                }
            }
            None => self.roots.retain(|r| *r != key),
        }
        let doomed = self.descendants(key);
        for k in &doomed {
            self.nodes.remove(*k);
        }
        doomed.len()
    }

    /// Move a child of `parent` from one position to another
    ///
    /// Returns `false` when either index is out of range.
    pub fn move_child(&mut self, parent: SceneKey, from: usize, to: usize) -> bool {
        let Some(node) = self.nodes.get_mut(parent) else {
            return false;
        };
        if from >= node.children.len() || to >= node.children.len() {
            return false;
        }
        let child = node.children.remove(from);
        node.children.insert(to, child);
        node.dirty |= DirtyFlags::CHILDREN;
        true
    }

    // --- edits ---

    pub fn set_name(&mut self, key: SceneKey, name: impl Into<String>) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.name = name.into();
        }
    }

    /// Replace a node's transform after checking its scale rule
    ///
    /// # Errors
    /// - [`StructuralError::PlaneScaled`] for a non-identity scale on a plane
    /// - [`StructuralError::NonUniformScale`] where only uniform scale is allowed
    /// - [`StructuralError::InvalidNode`] for kinds without placement
    pub fn set_transform(&mut self, key: SceneKey, transform: Transform) -> Result<(), StructuralError> {
        let node = self.nodes.get_mut(key).ok_or_else(|| StructuralError::InvalidNode {
            node: format!("{:?}", key),
            message: "node does not exist".to_string(),
        })?;
        check_scale(node.kind, &node.name, &transform)?;
        node.transform = transform;
        node.dirty |= DirtyFlags::TRANSFORM;
        Ok(())
    }

    /// Unchecked access to a node's transform; marks it dirty
    ///
    /// Invalid values set here are caught on export.
    pub fn transform_mut(&mut self, key: SceneKey) -> Option<&mut Transform> {
        let node = self.nodes.get_mut(key)?;
        node.dirty |= DirtyFlags::TRANSFORM;
        Some(&mut node.transform)
    }

    /// Mutable property bag; marks the node dirty
    pub fn properties_mut(&mut self, key: SceneKey) -> Option<&mut Properties> {
        let node = self.nodes.get_mut(key)?;
        node.dirty |= DirtyFlags::PROPERTIES;
        Some(&mut node.properties)
    }

    /// Replace a plane's vertices (editor space, relative to the node)
    ///
    /// # Errors
    /// Returns [`StructuralError::InvalidNode`] if the node is not a plane.
    pub fn set_vertices(&mut self, key: SceneKey, vertices: Vec<Vec3>) -> Result<(), StructuralError> {
        let node = self.nodes.get_mut(key).ok_or_else(|| StructuralError::InvalidNode {
            node: format!("{:?}", key),
            message: "node does not exist".to_string(),
        })?;
        match &mut node.properties {
            Properties::Plane { vertices: current } => {
                *current = vertices;
                node.dirty |= DirtyFlags::GEOMETRY;
                Ok(())
            }
            _ => Err(StructuralError::InvalidNode {
                node: node.name.clone(),
                message: "only blocker planes have vertices".to_string(),
            }),
        }
    }

    /// Record an edited mesh for a model; export regenerates its binary
    ///
    /// # Errors
    /// Returns [`StructuralError::InvalidNode`] if the node is not a model.
    pub fn set_edited_mesh(&mut self, key: SceneKey, interchange: impl Into<PathBuf>) -> Result<(), StructuralError> {
        let node = self.nodes.get_mut(key).ok_or_else(|| StructuralError::InvalidNode {
            node: format!("{:?}", key),
            message: "node does not exist".to_string(),
        })?;
        if node.kind != Kind::Model {
            return Err(StructuralError::InvalidNode {
                node: node.name.clone(),
                message: "only models carry mesh geometry".to_string(),
            });
        }
        node.edited_mesh = Some(interchange.into());
        node.dirty |= DirtyFlags::GEOMETRY;
        Ok(())
    }

    pub(crate) fn mark(&mut self, key: SceneKey, flags: DirtyFlags) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.dirty |= flags;
        }
    }

    /// Forget all edits (after a successful export)
    pub fn clear_dirty(&mut self) {
        for node in self.nodes.values_mut() {
            node.clear_dirty();
        }
    }

    // --- warnings ---

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    pub(crate) fn push_warning(&mut self, warning: ValidationWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    pub fn take_warnings(&mut self) -> Vec<ValidationWarning> {
        std::mem::take(&mut self.warnings)
    }
}

/// Check a transform against the scale rule of `kind`
pub(crate) fn check_scale(kind: Kind, name: &str, transform: &Transform) -> Result<(), StructuralError> {
    let placement = Registry::placement(kind);
    match placement.scale {
        ScaleRule::Forbidden if !transform.has_identity_scale() => Err(StructuralError::PlaneScaled {
            node: name.to_string(),
        }),
        ScaleRule::Uniform if !transform.has_uniform_scale() => Err(StructuralError::NonUniformScale {
            node: name.to_string(),
        }),
        ScaleRule::None if placement.transform.is_none() => Err(StructuralError::InvalidNode {
            node: name.to_string(),
            message: format!("{} nodes have no placement", kind),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;

    fn element(text: &str) -> DocumentNode {
        Document::parse(text).unwrap().root().unwrap().clone()
    }

    fn file_scene(format: DocumentFormat, root: &str) -> (Scene, SceneKey) {
        let mut scene = Scene::default();
        let node = SceneNode::new(Kind::File, format, element(root)).with_file(FileInfo {
            path: None,
            format,
            bom: false,
        });
        let key = scene.add_root(node);
        (scene, key)
    }

    // --- structure tests ---

    #[test]
    fn test_add_and_remove_subtree() {
        let (mut scene, file) = file_scene(DocumentFormat::Cfg, "<Config/>");
        let pc = scene
            .add_child(file, SceneNode::new(Kind::PropContainer, DocumentFormat::Cfg, element("<Config/>")))
            .unwrap();
        scene.add_child(pc, SceneNode::new(Kind::Prop, DocumentFormat::Cfg, element("<Config/>")));
        scene.add_child(pc, SceneNode::new(Kind::Prop, DocumentFormat::Cfg, element("<Config/>")));
        assert_eq!(scene.len(), 4);

        assert_eq!(scene.remove(pc), 3);
        assert_eq!(scene.len(), 1);
        assert!(scene.children(file).is_empty());
        assert!(scene.get(file).unwrap().dirty().contains(DirtyFlags::CHILDREN));
    }

    #[test]
    fn test_stale_key_after_remove() {
        let (mut scene, file) = file_scene(DocumentFormat::Cfg, "<Config/>");
        let child = scene
            .add_child(file, SceneNode::new(Kind::Model, DocumentFormat::Cfg, element("<Config/>")))
            .unwrap();
        scene.remove(child);
        assert!(scene.get(child).is_none());
        assert!(scene.transform_mut(child).is_none());
    }

    #[test]
    fn test_move_child() {
        let (mut scene, file) = file_scene(DocumentFormat::Cfg, "<Config/>");
        let a = scene
            .add_child(file, SceneNode::new(Kind::Model, DocumentFormat::Cfg, element("<Config/>")))
            .unwrap();
        let b = scene
            .add_child(file, SceneNode::new(Kind::Model, DocumentFormat::Cfg, element("<Config/>")))
            .unwrap();
        assert!(scene.move_child(file, 1, 0));
        assert_eq!(scene.children(file), &[b, a]);
        assert!(!scene.move_child(file, 0, 5));
    }

    #[test]
    fn test_create_uses_template_and_container() {
        let (mut scene, file) = file_scene(DocumentFormat::Feedback, "<SimpleAnnoFeedbackEncoding/>");
        let group = scene.create(file, Kind::DummyGroup).unwrap();
        let dummy = scene.create(group, Kind::Dummy).unwrap();
        let node = scene.get(dummy).unwrap();
        assert_eq!(node.residual().name(), "Dummy");
        assert_eq!(node.container(), None);
        assert_eq!(node.dirty(), DirtyFlags::ALL);
        assert_eq!(scene.get(group).unwrap().container(), Some("DummyGroups"));
    }

    #[test]
    fn test_create_rejects_wrong_parent() {
        let (mut scene, file) = file_scene(DocumentFormat::Ifo, "<Info/>");
        assert!(scene.create(file, Kind::Model).is_err());
    }

    #[test]
    fn test_file_of() {
        let (mut scene, file) = file_scene(DocumentFormat::Cfg, "<Config/>");
        let pc = scene
            .add_child(file, SceneNode::new(Kind::PropContainer, DocumentFormat::Cfg, element("<Config/>")))
            .unwrap();
        let prop = scene
            .add_child(pc, SceneNode::new(Kind::Prop, DocumentFormat::Cfg, element("<Config/>")))
            .unwrap();
        assert_eq!(scene.file_of(prop), Some(file));
        assert_eq!(scene.descendants(file), vec![file, pc, prop]);
    }

    // --- edit tests ---

    #[test]
    fn test_set_transform_rejects_scaled_plane() {
        let (mut scene, file) = file_scene(DocumentFormat::Ifo, "<Info/>");
        let plane = scene
            .add_child(file, SceneNode::new(Kind::BlockerPlane, DocumentFormat::Ifo, element("<BuildBlocker/>")))
            .unwrap();
        let scaled = Transform::identity().with_scale(Vec3::new(2.0, 1.0, 1.0));
        let err = scene.set_transform(plane, scaled).unwrap_err();
        assert!(matches!(err, StructuralError::PlaneScaled { .. }));
        assert!(!scene.get(plane).unwrap().is_dirty());

        let moved = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
        assert!(scene.set_transform(plane, moved).is_ok());
    }

    #[test]
    fn test_set_transform_uniform_rule() {
        let (mut scene, file) = file_scene(DocumentFormat::Cfg, "<Config/>");
        let model = scene
            .add_child(file, SceneNode::new(Kind::Model, DocumentFormat::Cfg, element("<Config/>")))
            .unwrap();
        let err = scene
            .set_transform(model, Transform::identity().with_scale(Vec3::new(1.0, 2.0, 1.0)))
            .unwrap_err();
        assert!(matches!(err, StructuralError::NonUniformScale { .. }));
        assert!(scene
            .set_transform(model, Transform::identity().with_scale(Vec3::splat(3.0)))
            .is_ok());
    }

    #[test]
    fn test_transform_mut_bypasses_check() {
        let (mut scene, file) = file_scene(DocumentFormat::Ifo, "<Info/>");
        let plane = scene
            .add_child(file, SceneNode::new(Kind::BlockerPlane, DocumentFormat::Ifo, element("<BuildBlocker/>")))
            .unwrap();
        scene.transform_mut(plane).unwrap().scale = Vec3::new(2.0, 2.0, 2.0);
        let node = scene.get(plane).unwrap();
        assert!(node.dirty().contains(DirtyFlags::TRANSFORM));
        assert!(check_scale(node.kind(), node.name(), node.transform()).is_err());
    }

    #[test]
    fn test_set_vertices_only_on_planes() {
        let (mut scene, file) = file_scene(DocumentFormat::Ifo, "<Info/>");
        let cube = scene
            .add_child(file, SceneNode::new(Kind::BlockerCube, DocumentFormat::Ifo, element("<BoundingBox/>")))
            .unwrap();
        assert!(scene.set_vertices(cube, vec![Vec3::ZERO]).is_err());
    }

    #[test]
    fn test_clear_dirty() {
        let (mut scene, file) = file_scene(DocumentFormat::Cfg, "<Config/>");
        let model = scene.create(file, Kind::Model).unwrap();
        scene.clear_dirty();
        assert!(!scene.get(model).unwrap().is_dirty());
        assert!(!scene.get(file).unwrap().is_dirty());
    }
}
