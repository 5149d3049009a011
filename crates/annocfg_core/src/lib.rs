//! Core types for annocfg
//!
//! This crate maps Anno 1800 object configuration files onto an editable
//! scene graph and back:
//!
//! - [`Document`] - lossless XML document (`.cfg`, `.ifo`, `.cf7`, feedback `.xml`)
//! - [`Registry`] - which elements become scene nodes and how they are placed
//! - [`Scene`] - arena of [`SceneNode`]s keyed by [`SceneKey`]
//! - [`Mapper`] - import documents into a scene, export the scene back
//! - [`PathResolver`] - canonical game paths ↔ files under the configured roots
//! - [`ConverterGateway`] - cached calls to the external asset converters
//! - [`transcode`] - compact feedback encoding → native `.cf7`
//! - [`SceneValidator`] - pre-export checks

pub mod asset_cache;
pub mod converter;
pub mod document;
pub mod error;
pub mod feedback;
pub mod mapper;
pub mod path_resolver;
pub mod properties;
pub mod registry;
pub mod scene;
pub mod transform;
pub mod validator;

pub use asset_cache::{Asset, AssetCache, AssetHandle};
pub use converter::{ConversionKind, ConversionQueue, ConverterGateway, ConverterTools};
pub use document::{Document, DocumentNode, Indent, XmlNode};
pub use error::{
    AssetError, CfgError, ConversionError, ExportError, ExportProblem, FormatError, ImportError,
    PathError, StructuralError, TranscodeError, ValidationWarning,
};
pub use feedback::{transcode, transcode_with_names, GuidNames, Transcoded};
pub use mapper::{
    companion_paths, CompanionPaths, ExportOptions, ExportReport, ExportedDocument, FeedbackFormat,
    ImportOptions, Mapper,
};
pub use path_resolver::PathResolver;
pub use properties::{Properties, PropData};
pub use registry::{DocumentFormat, Kind, Registry};
pub use scene::{DirtyFlags, FileInfo, Scene, SceneKey, SceneNode};
pub use transform::Transform;
pub use validator::{SceneValidator, Validation};

// Re-export math types for convenience
pub use annocfg_math::{CoordinateConvention, Quat, Vec3};
