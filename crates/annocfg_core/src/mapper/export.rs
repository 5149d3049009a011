//! Scene → documents

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::converter::ConversionKind;
use crate::document::{content_mut, detect_indent_unit, Document, DocumentNode, Indent, XmlNode};
use crate::error::{ConversionError, ExportError, ExportProblem, PathError, StructuralError, TranscodeError, ValidationWarning};
use crate::feedback::transcode_with_names;
use crate::path_resolver::normalize;
use crate::properties::{write_plane_vertices, Properties, TrackTarget};
use crate::registry::{DocumentFormat, Kind, Registry};
use crate::scene::{DirtyFlags, Scene, SceneKey, SceneNode};
use crate::transform::write_transform;
use crate::validator::SceneValidator;

use super::import::container_children;
use super::{FeedbackFormat, Mapper};

/// One serialized document of a family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    /// Where the document belongs; `None` for documents imported from memory
    pub path: Option<PathBuf>,
    pub format: DocumentFormat,
    pub text: String,
}

/// Result of a successful export
#[derive(Debug, Default)]
pub struct ExportReport {
    pub documents: Vec<ExportedDocument>,
    pub warnings: Vec<ValidationWarning>,
    /// Nodes whose asset conversion failed; their documents still reference
    /// the previous file
    pub failed_nodes: Vec<(String, ConversionError)>,
}

impl ExportReport {
    /// Document written to `path`, if any
    pub fn document(&self, path: &Path) -> Option<&ExportedDocument> {
        self.documents.iter().find(|d| d.path.as_deref() == Some(path))
    }

    pub fn is_partial(&self) -> bool {
        !self.failed_nodes.is_empty()
    }
}

#[derive(Default)]
struct ExportState {
    problems: Vec<ExportProblem>,
    warnings: Vec<ValidationWarning>,
    failed: Vec<(String, ConversionError)>,
    /// FileName values rewritten during export, applied to the scene on success
    renamed: Vec<(SceneKey, String)>,
    /// Edited meshes waiting for conversion
    pending: Vec<PendingMesh>,
    /// Canonical paths of meshes already converted
    regenerated: HashMap<SceneKey, String>,
}

impl ExportState {
    fn new(scene: &Scene, file: SceneKey, regenerated: HashMap<SceneKey, String>) -> Self {
        let validation = SceneValidator::validate(scene, file);
        let mut state = ExportState {
            problems: validation.problems.into_iter().map(ExportProblem::from).collect(),
            warnings: validation.warnings,
            regenerated,
            ..ExportState::default()
        };
        state.warnings.extend(scene.warnings().iter().cloned());
        state
    }
}

struct PendingMesh {
    key: SceneKey,
    node: String,
    mesh: PathBuf,
    canonical: String,
}

/// Per-document lookup data
struct FileContext {
    unit: String,
    models: Vec<SceneKey>,
    particles: Vec<SceneKey>,
}

impl FileContext {
    fn indent_for(&self, element: &DocumentNode, depth: usize) -> Indent {
        if element.children().iter().any(XmlNode::is_blank) {
            Indent::new(self.unit.as_str(), depth)
        } else {
            Indent::compact()
        }
    }
}

impl Mapper {
    /// Rebuild every document below `file` from the scene
    ///
    /// Covers the File node itself, its companion File children and any
    /// subfile whose subtree was edited. Nodes nobody touched come out
    /// byte-identical.
    ///
    /// Edited meshes are converted only once the tree is known to export
    /// cleanly; the documents are then rebuilt with the new file names.
    /// On success, `FileName` values rewritten here (canonicalized paths,
    /// regenerated meshes) are stored back in the scene without marking it
    /// dirty.
    ///
    /// # Errors
    /// Returns [`ExportError`] listing every structural and path problem of
    /// the whole tree, together with the warnings collected so far.
    pub fn export(&self, scene: &mut Scene, file: SceneKey) -> Result<ExportReport, ExportError> {
        let mut state = ExportState::new(scene, file, HashMap::new());
        let mut documents = self.build_documents(scene, file, &mut state);

        if !state.problems.is_empty() {
            log::warn!("Export refused: {} problem(s)", state.problems.len());
            return Err(ExportError {
                problems: state.problems,
                warnings: state.warnings,
            });
        }

        if let (Some(gateway), false) = (&self.gateway, state.pending.is_empty()) {
            let mut regenerated = HashMap::new();
            let mut failed = Vec::new();
            for pending in std::mem::take(&mut state.pending) {
                match gateway.convert(ConversionKind::MeshFromInterchange, &pending.mesh) {
                    Ok(_) => {
                        regenerated.insert(pending.key, pending.canonical);
                    }
                    Err(err) => {
                        log::warn!("Mesh regeneration failed for {}: {}", pending.node, err);
                        failed.push((pending.node, err));
                    }
                }
            }
            if !regenerated.is_empty() {
                state = ExportState::new(scene, file, regenerated);
                documents = self.build_documents(scene, file, &mut state);
            }
            state.failed.extend(failed);
        }

        for (key, file_name) in state.renamed {
            if let Some(node) = scene.get_mut(key) {
                node.properties_mut_unchecked().set_file_name(file_name);
            }
        }
        log::info!(
            "Exported {} document(s), {} warning(s), {} failed node(s)",
            documents.len(),
            state.warnings.len(),
            state.failed.len()
        );
        Ok(ExportReport {
            documents,
            warnings: state.warnings,
            failed_nodes: state.failed,
        })
    }

    fn build_documents(&self, scene: &Scene, file: SceneKey, state: &mut ExportState) -> Vec<ExportedDocument> {
        let mut documents = Vec::new();
        for key in document_nodes(scene, file) {
            let Some(node) = scene.get(key) else {
                continue;
            };
            let Some(info) = node.file().cloned() else {
                continue;
            };
            if info.format == DocumentFormat::Ifo && !self.export_options.export_ifo {
                continue;
            }

            let (top, fragment) = self.export_file_node(scene, key, state);
            let mut doc = Document::from_parts(top, info.bom, fragment);
            if self.export_options.delete_material_lod_infos {
                let removed = doc.top_mut().remove_all_named("MaterialLODInfos");
                if removed > 0 {
                    log::debug!("Removed {} MaterialLODInfos from {}", removed, node.name());
                }
            }

            if info.format == DocumentFormat::Feedback && self.export_options.feedback_format == FeedbackFormat::Cf7 {
                match transcode_with_names(&doc, self.export_options.feedback_loop_mode, &self.guid_names) {
                    Ok(transcoded) => {
                        state.warnings.extend(transcoded.warnings.iter().cloned());
                        documents.push(ExportedDocument {
                            path: info.path.map(|p| p.with_extension("cf7")),
                            format: DocumentFormat::Cf7,
                            text: transcoded.to_text(),
                        });
                    }
                    Err(TranscodeError::Structural(problem)) => state.problems.push(problem.into()),
                    Err(TranscodeError::WrongRoot { found }) => state.problems.push(
                        StructuralError::InvalidNode {
                            node: node.name().to_string(),
                            message: format!("feedback document has root <{}>", found),
                        }
                        .into(),
                    ),
                }
                continue;
            }

            documents.push(ExportedDocument {
                path: info.path,
                format: info.format,
                text: doc.to_xml_string(),
            });
        }
        documents
    }

    fn export_file_node(&self, scene: &Scene, key: SceneKey, state: &mut ExportState) -> (DocumentNode, bool) {
        let Some(node) = scene.get(key) else {
            return (DocumentNode::default(), false);
        };
        let format = node.format();
        let fragment = format.is_fragment();
        let mut top = node.residual().clone();
        let ctx = FileContext {
            unit: detect_indent_unit(&top),
            models: container_children(scene, key, "Models"),
            particles: container_children(scene, key, "Particles"),
        };
        // Children of a root element sit one level in; fragment elements do not
        let depth = if fragment { 0 } else { 1 };

        if let Some(content) = content_mut(&mut top, fragment) {
            self.fill_children(scene, key, content, depth, &ctx, state);
            if format == DocumentFormat::Cf7 {
                if let Some(splines) = content.find_mut("SplineData") {
                    sync_spline_keys(splines);
                }
            }
        }
        (top, fragment)
    }

    /// Put the exported children of `parent` into `element`
    ///
    /// `depth` is the nesting depth of `element`'s own children.
    fn fill_children(
        &self,
        scene: &Scene,
        parent: SceneKey,
        element: &mut DocumentNode,
        depth: usize,
        ctx: &FileContext,
        state: &mut ExportState,
    ) {
        let Some(node) = scene.get(parent) else {
            return;
        };
        let children: Vec<(SceneKey, &SceneNode)> = scene
            .children(parent)
            .iter()
            .filter_map(|c| scene.get(*c).map(|n| (*c, n)))
            .filter(|(_, n)| n.kind() != Kind::File)
            .collect();

        let mut containers: Vec<Option<&str>> = Registry::containers(node.kind(), node.format())
            .into_iter()
            .map(|c| c.map(|s| s as &str))
            .collect();
        for (_, child) in &children {
            if !containers.contains(&child.container()) {
                containers.push(child.container());
            }
        }

        for container in containers {
            let levels = container.map(|c| c.split('/').count()).unwrap_or(0);
            let exported: Vec<DocumentNode> = children
                .iter()
                .filter(|(_, child)| child.container() == container)
                .filter_map(|(key, _)| self.export_element(scene, *key, depth + levels + 1, ctx, state))
                .collect();

            let parent_indent = ctx.indent_for(element, depth);
            let target = match container {
                None => Some(&mut *element),
                Some(path) if exported.is_empty() => element.find_mut(path),
                Some(path) => Some(element.find_or_create(path, &parent_indent)),
            };
            let Some(target) = target else {
                continue;
            };
            let indent = if target.children().is_empty() {
                Indent::new(ctx.unit.as_str(), depth + levels)
            } else {
                ctx.indent_for(target, depth + levels)
            };
            target.fill_slots(exported, &indent);
        }
    }

    fn export_element(
        &self,
        scene: &Scene,
        key: SceneKey,
        depth: usize,
        ctx: &FileContext,
        state: &mut ExportState,
    ) -> Option<DocumentNode> {
        let node = scene.get(key)?;
        let mut element = node.residual().clone();
        if node.kind() == Kind::Unknown {
            return Some(element);
        }

        let indent = ctx.indent_for(&element, depth);
        let dirty = node.dirty();
        let convention = scene.convention();
        let placement = Registry::placement(node.kind());

        if dirty.contains(DirtyFlags::TRANSFORM) {
            if let Some(binding) = placement.transform {
                write_transform(&mut element, &binding, node.transform(), convention, &indent);
            }
        }
        if dirty.contains(DirtyFlags::PROPERTIES) {
            node.properties().write(&mut element, convention, &indent);
        }

        if placement.vertices && dirty.intersects(DirtyFlags::GEOMETRY | DirtyFlags::TRANSFORM) {
            let snap = self.export_options.snap_build_blockers && element.name() == "BuildBlocker";
            let points: Vec<(f32, f32)> = node
                .properties()
                .vertices()
                .unwrap_or_default()
                .iter()
                .map(|v| {
                    let (xf, zf) = convention.plane_vertex_to_game(node.transform().transform_point(*v));
                    if snap {
                        (snap_half(xf), snap_half(zf))
                    } else {
                        (xf, zf)
                    }
                })
                .collect();
            write_plane_vertices(&mut element, &points, &indent);
        }

        if let Properties::Sequence(sequence) = node.properties() {
            let ids: Vec<i64> = sequence
                .tracks
                .iter()
                .map(|track| {
                    let Some(target) = track.node else {
                        return track.original;
                    };
                    let list = match track.target {
                        TrackTarget::Model => &ctx.models,
                        TrackTarget::Particle => &ctx.particles,
                    };
                    match list.iter().position(|k| *k == target) {
                        Some(index) => index as i64,
                        None => {
                            state.warnings.push(ValidationWarning::new(
                                node.name(),
                                format!(
                                    "track {} refers to a deleted node; {} set to 0",
                                    track.track,
                                    track.target.field()
                                ),
                            ));
                            0
                        }
                    }
                })
                .collect();
            sequence.write_track_ids(&mut element, &ids, &indent);
        }

        self.export_asset_path(key, node, &mut element, &indent, state);
        self.fill_children(scene, key, &mut element, depth, ctx, state);
        Some(element)
    }

    /// Canonicalize `FileName` and regenerate edited meshes
    fn export_asset_path(
        &self,
        key: SceneKey,
        node: &SceneNode,
        element: &mut DocumentNode,
        indent: &Indent,
        state: &mut ExportState,
    ) {
        if !node.kind().references_asset() || node.is_placeholder() {
            return;
        }
        let Some(file_name) = node.properties().file_name() else {
            return;
        };
        let path = Path::new(file_name);
        if path.is_absolute() {
            match self.resolver.to_canonical(path) {
                Ok(canonical) => {
                    element.set_field("FileName", &canonical, indent);
                    state.renamed.push((key, canonical));
                }
                Err(error) => {
                    state.problems.push(ExportProblem::Path {
                        node: node.name().to_string(),
                        error,
                    });
                    return;
                }
            }
        } else if normalize(Path::new(&file_name.replace('\\', "/"))).starts_with("..") {
            state.problems.push(ExportProblem::Path {
                node: node.name().to_string(),
                error: PathError::OutsideRoots {
                    path: path.to_path_buf(),
                },
            });
            return;
        }

        if node.kind() == Kind::Model && node.dirty().contains(DirtyFlags::GEOMETRY) {
            if let Some(mesh) = node.edited_mesh() {
                self.regenerate_mesh(key, node, mesh, element, indent, state);
            }
        }
    }

    /// Point `FileName` at a converted mesh, or queue the conversion
    fn regenerate_mesh(
        &self,
        key: SceneKey,
        node: &SceneNode,
        mesh: &Path,
        element: &mut DocumentNode,
        indent: &Indent,
        state: &mut ExportState,
    ) {
        let kind = ConversionKind::MeshFromInterchange;
        if self.gateway.is_none() {
            state
                .failed
                .push((node.name().to_string(), ConversionError::NotConfigured { kind }));
            return;
        }
        let canonical = match self.resolver.to_canonical(&kind.output_path(mesh)) {
            Ok(canonical) => canonical,
            Err(error) => {
                state.problems.push(ExportProblem::Path {
                    node: node.name().to_string(),
                    error,
                });
                return;
            }
        };
        match state.regenerated.get(&key) {
            Some(done) => {
                element.set_field("FileName", done, indent);
                state.renamed.push((key, done.clone()));
            }
            None => state.pending.push(PendingMesh {
                key,
                node: node.name().to_string(),
                mesh: mesh.to_path_buf(),
                canonical,
            }),
        }
    }
}

/// File nodes that produce a document: `file`, its companions and edited subfiles
fn document_nodes(scene: &Scene, file: SceneKey) -> Vec<SceneKey> {
    let mut out = vec![file];
    for key in scene.descendants(file).into_iter().skip(1) {
        if scene.get(key).map(|n| n.kind()) != Some(Kind::File) {
            continue;
        }
        let parent_kind = scene.parent(key).and_then(|p| scene.get(p)).map(|p| p.kind());
        match parent_kind {
            Some(Kind::File) => out.push(key),
            Some(Kind::Subfile) if subtree_dirty(scene, key) => out.push(key),
            _ => {}
        }
    }
    out
}

fn subtree_dirty(scene: &Scene, key: SceneKey) -> bool {
    scene
        .descendants(key)
        .into_iter()
        .any(|k| scene.get(k).map(SceneNode::is_dirty).unwrap_or(false))
}

fn snap_half(value: f32) -> f32 {
    (value * 2.0).round() / 2.0
}

/// Make every `<v>` spline of `SplineData` followed by its `<k>` name key
fn sync_spline_keys(splines: &mut DocumentNode) {
    let mut actual: Vec<(&str, String)> = Vec::new();
    let mut expected: Vec<(&str, String)> = Vec::new();
    for e in splines.elements() {
        match e.name() {
            "v" => {
                let name = e.field("Name").unwrap_or_default();
                actual.push(("v", name.clone()));
                expected.push(("v", name.clone()));
                expected.push(("k", name));
            }
            "k" => actual.push(("k", e.text())),
            _ => {}
        }
    }
    if actual == expected {
        return;
    }

    let old = std::mem::take(splines.children_mut());
    let mut rebuilt = Vec::with_capacity(old.len());
    let mut lead: Option<XmlNode> = None;
    for child in old {
        if child.is_blank() {
            if let Some(previous) = lead.replace(child) {
                rebuilt.push(previous);
            }
            continue;
        }
        match child {
            // Old keys go together with their indentation
            XmlNode::Element(e) if e.name() == "k" => lead = None,
            XmlNode::Element(e) if e.name() == "v" => {
                let key = DocumentNode::with_text("k", &e.field("Name").unwrap_or_default());
                if let Some(lead) = &lead {
                    rebuilt.push(lead.clone());
                }
                rebuilt.push(XmlNode::Element(e));
                if let Some(lead) = lead.take() {
                    rebuilt.push(lead);
                }
                rebuilt.push(XmlNode::Element(key));
            }
            other => {
                if let Some(lead) = lead.take() {
                    rebuilt.push(lead);
                }
                rebuilt.push(other);
            }
        }
    }
    if let Some(lead) = lead {
        rebuilt.push(lead);
    }
    *splines.children_mut() = rebuilt;
}
