//! Document → scene

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::asset_cache::Asset;
use crate::converter::{ConversionKind, ConversionQueue};
use crate::document::{content_mut, Document, DocumentNode};
use crate::error::{ImportError, StructuralError, ValidationWarning};
use crate::path_resolver::{normalize, PathResolver};
use crate::properties::{PropData, Properties, TrackTarget};
use crate::registry::{DocumentFormat, Kind, Registry};
use crate::scene::{FileInfo, Scene, SceneKey, SceneNode};
use crate::transform::{read_transform, Transform};

use super::Mapper;

/// An element taken out of its parent, waiting to become a node
struct Promoted {
    kind: Kind,
    container: Option<&'static str>,
    element: DocumentNode,
    /// Position among the elements promoted from the same container
    ordinal: usize,
}

/// State carried through one import call
#[derive(Default)]
struct ImportContext {
    /// Files being imported, outermost first
    chain: Vec<PathBuf>,
    /// Conversions to run once the tree is built
    requests: Vec<(SceneKey, ConversionKind, PathBuf)>,
}

impl ImportContext {
    fn for_path(path: Option<&Path>) -> Self {
        Self {
            chain: path.map(normalize).into_iter().collect(),
            requests: Vec::new(),
        }
    }
}

fn missing_parent(parent: SceneKey) -> ImportError {
    StructuralError::InvalidNode {
        node: format!("{:?}", parent),
        message: "parent does not exist".to_string(),
    }
    .into()
}

impl Mapper {
    /// Read `path` and import it as a new root File node
    ///
    /// # Errors
    /// - [`ImportError::UnknownFormat`] for an unsupported extension
    /// - [`ImportError::Asset`] if the file cannot be read or parsed
    /// - [`ImportError::Structural`] for cyclic subfile references
    pub fn import_file(&mut self, scene: &mut Scene, path: &Path) -> Result<SceneKey, ImportError> {
        let format = DocumentFormat::from_path(path).ok_or_else(|| ImportError::UnknownFormat {
            path: path.to_path_buf(),
        })?;
        let doc = Document::load_from_file(path)?;
        self.import_document(scene, doc, format, Some(path))
    }

    /// Import a parsed document as a new root File node
    ///
    /// `path` is where the document lives; it names the node and anchors
    /// cycle detection for subfiles.
    ///
    /// # Errors
    /// Returns [`StructuralError::CyclicSubfile`] if a subfile refers back to
    /// a file on the current import chain. Nothing is added to the scene then.
    pub fn import_document(
        &mut self,
        scene: &mut Scene,
        doc: Document,
        format: DocumentFormat,
        path: Option<&Path>,
    ) -> Result<SceneKey, ImportError> {
        let mut ctx = ImportContext::for_path(path);
        let key = self.import_file_node(scene, None, doc, format, path, &mut ctx)?;
        self.materialize(scene, std::mem::take(&mut ctx.requests));
        log::info!(
            "Imported {} ({} nodes)",
            scene.get(key).map(|n| n.name()).unwrap_or_default(),
            scene.descendants(key).len()
        );
        Ok(key)
    }

    /// Import `doc` as a File node below `parent` (or as a root)
    pub(super) fn attach_document(
        &mut self,
        scene: &mut Scene,
        parent: SceneKey,
        doc: Document,
        format: DocumentFormat,
        path: &Path,
    ) -> Result<SceneKey, ImportError> {
        let mut ctx = ImportContext::for_path(Some(path));
        let key = self.import_file_node(scene, Some(parent), doc, format, Some(path), &mut ctx)?;
        self.materialize(scene, std::mem::take(&mut ctx.requests));
        Ok(key)
    }

    fn import_file_node(
        &mut self,
        scene: &mut Scene,
        parent: Option<SceneKey>,
        doc: Document,
        format: DocumentFormat,
        path: Option<&Path>,
        ctx: &mut ImportContext,
    ) -> Result<SceneKey, ImportError> {
        let (mut top, bom, _) = doc.into_parts();
        let promoted = self.promote_children(Kind::File, format, &mut top);
        let name = path
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.{}", Kind::File.label(), format.extension()));
        let node = SceneNode::new(Kind::File, format, top)
            .with_name(name)
            .with_file(FileInfo {
                path: path.map(Path::to_path_buf),
                format,
                bom,
            });
        let key = match parent {
            Some(parent) => scene.add_child(parent, node).ok_or_else(|| missing_parent(parent))?,
            None => scene.add_root(node),
        };

        if let Err(err) = self.import_children(scene, key, format, promoted, ctx) {
            scene.remove(key);
            return Err(err);
        }
        if format == DocumentFormat::Cfg {
            resolve_tracks(scene, key);
        }
        Ok(key)
    }

    fn import_children(
        &mut self,
        scene: &mut Scene,
        parent: SceneKey,
        format: DocumentFormat,
        promoted: Vec<Promoted>,
        ctx: &mut ImportContext,
    ) -> Result<(), ImportError> {
        for child in promoted {
            self.import_element(scene, parent, format, child, ctx)?;
        }
        Ok(())
    }

    fn import_element(
        &mut self,
        scene: &mut Scene,
        parent: SceneKey,
        format: DocumentFormat,
        promoted: Promoted,
        ctx: &mut ImportContext,
    ) -> Result<SceneKey, ImportError> {
        let Promoted {
            kind,
            container,
            mut element,
            ordinal,
        } = promoted;
        let name = Registry::display_name(kind, &element, ordinal);

        let (kind, transform, properties) = match read_fields(kind, &element, scene) {
            Ok((transform, properties)) => (kind, transform, properties),
            Err(reason) => {
                scene.push_warning(ValidationWarning::new(
                    &name,
                    format!("{}; kept as unknown element", reason),
                ));
                (Kind::Unknown, Transform::identity(), Properties::None)
            }
        };

        let children = if kind == Kind::Unknown {
            Vec::new()
        } else {
            self.promote_children(kind, format, &mut element)
        };
        let node = SceneNode::new(kind, format, element)
            .with_name(name)
            .with_container(container)
            .with_transform(transform)
            .with_properties(properties);
        let key = scene.add_child(parent, node).ok_or_else(|| missing_parent(parent))?;

        self.import_children(scene, key, format, children, ctx)?;
        self.resolve_assets(scene, key, ctx)?;
        Ok(key)
    }

    /// Take every element the registry turns into a node out of `element`,
    /// leaving slots behind
    fn promote_children(&self, kind: Kind, format: DocumentFormat, element: &mut DocumentNode) -> Vec<Promoted> {
        let mut out = Vec::new();
        let content = if kind == Kind::File {
            match content_mut(element, format.is_fragment()) {
                Some(content) => content,
                None => return out,
            }
        } else {
            element
        };

        for container in Registry::containers(kind, format) {
            if container == Some("SplineData") && !self.import_options.import_splines {
                continue;
            }
            let target = match container {
                Some(path) => content.find_mut(path),
                None => Some(&mut *content),
            };
            let Some(target) = target else {
                continue;
            };
            let mut ordinal = 0;
            for index in 0..target.children().len() {
                let child_kind = match target.children()[index].as_element() {
                    Some(e) => Registry::classify(kind, format, container, e.name()),
                    None => None,
                };
                let Some(child_kind) = child_kind else {
                    continue;
                };
                if let Some(child) = target.promote(index) {
                    out.push(Promoted {
                        kind: child_kind,
                        container,
                        element: child,
                        ordinal,
                    });
                    ordinal += 1;
                }
            }
        }
        out
    }

    /// Resolve referenced files, queue conversions and import subfiles
    fn resolve_assets(&mut self, scene: &mut Scene, key: SceneKey, ctx: &mut ImportContext) -> Result<(), ImportError> {
        if !self.has_roots() {
            return Ok(());
        }
        let Some(node) = scene.get(key) else {
            return Ok(());
        };
        let kind = node.kind();
        let name = node.name().to_string();
        let file_name = node.properties().file_name().unwrap_or_default().to_string();
        let textures: Vec<String> = match node.properties() {
            Properties::Asset(asset) => asset
                .materials
                .iter()
                .flat_map(|m| m.textures.iter().map(|(_, path)| path.clone()))
                .filter(|path| !path.is_empty())
                .collect(),
            _ => Vec::new(),
        };
        let materialize = self.import_options.materialize_assets && self.gateway.is_some();

        match kind {
            Kind::Model | Kind::Cloth | Kind::Particle if !file_name.is_empty() => {
                match self.resolver.to_absolute(&file_name) {
                    Ok(path) if materialize && kind != Kind::Particle => {
                        ctx.requests.push((key, ConversionKind::MeshToInterchange, path));
                    }
                    Ok(_) => {}
                    Err(err) => degrade(scene, key, &name, err.to_string()),
                }
            }
            Kind::Prop if !file_name.is_empty() => self.resolve_prop(scene, key, &name, &file_name, materialize, ctx),
            Kind::Subfile if !file_name.is_empty() => self.import_subfile(scene, key, &name, &file_name, ctx)?,
            _ => {}
        }

        if materialize {
            for texture in textures {
                let variant = PathResolver::texture_variant(&texture, self.import_options.texture_quality);
                match self.resolver.to_absolute(&variant) {
                    Ok(path) => ctx.requests.push((key, ConversionKind::TextureToImage, path)),
                    Err(err) => scene.push_warning(ValidationWarning::new(&name, err.to_string())),
                }
            }
        }
        Ok(())
    }

    fn resolve_prop(
        &mut self,
        scene: &mut Scene,
        key: SceneKey,
        name: &str,
        file_name: &str,
        materialize: bool,
        ctx: &mut ImportContext,
    ) {
        let data = match self.resolver.to_absolute(file_name) {
            Ok(path) => match self.cache.fetch::<PropData>(&path) {
                Ok(data) => data,
                Err(err) => return degrade(scene, key, name, err.to_string()),
            },
            Err(err) => return degrade(scene, key, name, err.to_string()),
        };
        if let Some(node) = scene.get_mut(key) {
            if let Properties::Prop(prop) = node.properties_mut_unchecked() {
                prop.data = Some(Arc::clone(&data));
            }
        }
        let Some(mesh) = data.mesh_file.as_deref().filter(|m| !m.is_empty()) else {
            return;
        };
        match self.resolver.to_absolute(mesh) {
            Ok(path) if materialize => ctx.requests.push((key, ConversionKind::MeshToInterchange, path)),
            Ok(_) => {}
            Err(err) => degrade(scene, key, name, err.to_string()),
        }
    }

    fn import_subfile(
        &mut self,
        scene: &mut Scene,
        key: SceneKey,
        name: &str,
        file_name: &str,
        ctx: &mut ImportContext,
    ) -> Result<(), ImportError> {
        let path = match self.resolver.to_absolute(file_name) {
            Ok(path) => normalize(&path),
            Err(err) => {
                degrade(scene, key, name, err.to_string());
                return Ok(());
            }
        };
        if ctx.chain.contains(&path) {
            let mut chain: Vec<String> = ctx.chain.iter().map(|p| p.display().to_string()).collect();
            chain.push(path.display().to_string());
            return Err(StructuralError::CyclicSubfile { chain }.into());
        }
        let doc = match self.cache.fetch::<Document>(&path) {
            Ok(doc) => (*doc).clone(),
            Err(err) => {
                degrade(scene, key, name, err.to_string());
                return Ok(());
            }
        };
        let format = DocumentFormat::from_path(&path).unwrap_or(DocumentFormat::Cfg);
        ctx.chain.push(path.clone());
        let result = self.import_file_node(scene, Some(key), doc, format, Some(&path), ctx);
        ctx.chain.pop();
        result.map(|_| ())
    }

    /// Run queued conversions on the worker pool and apply the results here
    fn materialize(&self, scene: &mut Scene, requests: Vec<(SceneKey, ConversionKind, PathBuf)>) {
        let Some(gateway) = &self.gateway else {
            return;
        };
        if requests.is_empty() {
            return;
        }
        let queue = ConversionQueue::new(Arc::clone(gateway), self.import_options.worker_threads.max(1));
        let mut owners: HashMap<u64, SceneKey> = HashMap::new();
        for (key, kind, input) in requests {
            owners.insert(queue.submit(kind, input), key);
        }
        log::info!("Materializing {} asset(s)", owners.len());

        for outcome in queue.drain() {
            let Some(&key) = owners.get(&outcome.id) else {
                continue;
            };
            let name = scene.get(key).map(|n| n.name().to_string()).unwrap_or_default();
            match (outcome.kind, outcome.result) {
                (ConversionKind::MeshToInterchange, Ok(output)) => {
                    if let Some(node) = scene.get_mut(key) {
                        node.set_materialized(output);
                    }
                }
                (_, Ok(_)) => {}
                (ConversionKind::MeshToInterchange, Err(err)) => degrade(scene, key, &name, err.to_string()),
                (_, Err(err)) => scene.push_warning(ValidationWarning::new(&name, err.to_string())),
            }
        }
    }
}

/// Read transform and properties; any failure reason makes the node Unknown
fn read_fields(kind: Kind, element: &DocumentNode, scene: &Scene) -> Result<(Transform, Properties), String> {
    let transform = match Registry::placement(kind).transform {
        Some(binding) => read_transform(element, &binding, scene.convention()).map_err(|e| e.to_string())?,
        None => Transform::identity(),
    };
    let properties = Properties::read(kind, element, scene.convention()).map_err(|e| e.to_string())?;
    Ok((transform, properties))
}

/// Mark a node as a placeholder for an asset that could not be used
fn degrade(scene: &mut Scene, key: SceneKey, name: &str, reason: String) {
    if let Some(node) = scene.get_mut(key) {
        node.set_placeholder(true);
    }
    scene.push_warning(ValidationWarning::new(name, format!("placeholder: {}", reason)));
}

/// Children of `file` that came from `container`, in order
pub(super) fn container_children(scene: &Scene, file: SceneKey, container: &str) -> Vec<SceneKey> {
    scene
        .children(file)
        .iter()
        .copied()
        .filter(|c| scene.get(*c).and_then(|n| n.container()) == Some(container))
        .collect()
}

/// Point every sequence track at the model or particle its id indexes
fn resolve_tracks(scene: &mut Scene, file: SceneKey) {
    let models = container_children(scene, file, "Models");
    let particles = container_children(scene, file, "Particles");
    let sequences: Vec<SceneKey> = scene
        .children(file)
        .iter()
        .copied()
        .filter(|c| scene.get(*c).map(|n| n.kind()) == Some(Kind::AnimationSequence))
        .collect();

    for sequence in sequences {
        let mut warnings = Vec::new();
        if let Some(node) = scene.get_mut(sequence) {
            let name = node.name().to_string();
            if let Properties::Sequence(props) = node.properties_mut_unchecked() {
                for track in &mut props.tracks {
                    let targets = match track.target {
                        TrackTarget::Model => &models,
                        TrackTarget::Particle => &particles,
                    };
                    track.node = usize::try_from(track.original)
                        .ok()
                        .and_then(|i| targets.get(i))
                        .copied();
                    if track.node.is_none() {
                        warnings.push(ValidationWarning::new(
                            &name,
                            format!(
                                "track {} refers to missing {} {}",
                                track.track,
                                track.target.field(),
                                track.original
                            ),
                        ));
                    }
                }
            }
        }
        for warning in warnings {
            scene.push_warning(warning);
        }
    }
}
