//! Mapping between config documents and the scene graph
//!
//! The [`Mapper`] owns everything import and export need besides the scene
//! itself: the path resolver, the optional converter gateway and a cache of
//! parsed prop files and subfile documents.
//!
//! - [`Mapper::import_file`] / [`Mapper::import_document`] build File nodes
//! - [`Mapper::import_family`] adds the `.ifo` and `.cf7` (or feedback) companions
//! - [`Mapper::export`] rebuilds every document of a family from the scene
//! - [`Mapper::write_report`] puts exported documents on disk

mod export;
mod family;
mod import;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::asset_cache::AssetCache;
use crate::converter::ConverterGateway;
use crate::feedback::GuidNames;
use crate::path_resolver::PathResolver;

pub use export::{ExportReport, ExportedDocument};
pub use family::{companion_paths, CompanionPaths};

/// How feedback companions are read and written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackFormat {
    /// Native `.cf7` dummy/feedback fragment
    #[default]
    Cf7,
    /// Human-editable `.xml` encoding, transcoded on export when requested
    Compact,
}

/// Settings for [`Mapper::import_file`] and friends
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Convert meshes and textures to editor formats through the gateway
    pub materialize_assets: bool,
    /// Turn `.cf7` splines into scene nodes
    pub import_splines: bool,
    /// Texture quality suffix (`_0` is the highest)
    pub texture_quality: u8,
    /// Worker threads of the conversion queue
    pub worker_threads: usize,
    pub feedback_format: FeedbackFormat,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            materialize_assets: false,
            import_splines: true,
            texture_quality: 0,
            worker_threads: 4,
            feedback_format: FeedbackFormat::Cf7,
        }
    }
}

/// Settings for [`Mapper::export`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Drop every `MaterialLODInfos` element
    pub delete_material_lod_infos: bool,
    /// Write the `.ifo` companion
    pub export_ifo: bool,
    /// Output form of a compact feedback companion
    pub feedback_format: FeedbackFormat,
    /// `FeedbackLoops` key of transcoded configs
    pub feedback_loop_mode: i64,
    /// Convert written `.cf7` files to `.fc`
    pub convert_feedback_to_fc: bool,
    /// Round BuildBlocker vertices to multiples of 0.5
    pub snap_build_blockers: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delete_material_lod_infos: false,
            export_ifo: true,
            feedback_format: FeedbackFormat::Cf7,
            feedback_loop_mode: crate::feedback::DEFAULT_LOOP_MODE,
            convert_feedback_to_fc: false,
            snap_build_blockers: true,
        }
    }
}

/// Imports documents into a [`Scene`](crate::scene::Scene) and exports them back
pub struct Mapper {
    resolver: PathResolver,
    gateway: Option<Arc<ConverterGateway>>,
    /// Unit names for feedback GUID lists
    guid_names: GuidNames,
    cache: AssetCache,
    import_options: ImportOptions,
    export_options: ExportOptions,
}

impl Mapper {
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver,
            gateway: None,
            guid_names: GuidNames::default(),
            cache: AssetCache::new(),
            import_options: ImportOptions::default(),
            export_options: ExportOptions::default(),
        }
    }

    /// Builder: convert assets through `gateway`
    pub fn with_gateway(mut self, gateway: Arc<ConverterGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_guid_names(mut self, names: GuidNames) -> Self {
        self.guid_names = names;
        self
    }

    pub fn guid_names(&self) -> &GuidNames {
        &self.guid_names
    }

    pub fn with_import_options(mut self, options: ImportOptions) -> Self {
        self.import_options = options;
        self
    }

    pub fn with_export_options(mut self, options: ExportOptions) -> Self {
        self.export_options = options;
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn gateway(&self) -> Option<&Arc<ConverterGateway>> {
        self.gateway.as_ref()
    }

    pub fn import_options(&self) -> &ImportOptions {
        &self.import_options
    }

    pub fn export_options(&self) -> &ExportOptions {
        &self.export_options
    }

    /// Cached prop files and subfile documents
    pub fn cache_mut(&mut self) -> &mut AssetCache {
        &mut self.cache
    }

    fn has_roots(&self) -> bool {
        self.resolver.roots().next().is_some()
    }
}
