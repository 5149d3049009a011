//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`ANNOCFG_SECTION__KEY`)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use annocfg_core::{
    Asset, ConverterGateway, ConverterTools, CoordinateConvention, ExportOptions, FeedbackFormat,
    GuidNames, ImportOptions, Mapper, PathResolver, Scene,
};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the conversion manifest inside `paths.cache_dir`
pub const MANIFEST_FILE: &str = "conversions.ron";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Game and mod folders
    #[serde(default)]
    pub paths: PathsConfig,
    /// External converter executables
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. `config/default.toml`
    /// 2. `config/user.toml`
    /// 3. Environment variables (`ANNOCFG_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }
        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // ANNOCFG_PATHS__MOD_ROOT=/mods/x -> paths.mod_root = "/mods/x"
        figment = figment.merge(Env::prefixed("ANNOCFG_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }

    /// Empty scene using the configured axis convention
    pub fn scene(&self) -> Scene {
        Scene::new(self.import.convention())
    }

    /// Mapper wired with the configured roots, tools and options
    ///
    /// A converter gateway is attached only if at least one tool is set.
    pub fn mapper(&self) -> Mapper {
        let mut mapper = Mapper::new(self.paths.resolver())
            .with_guid_names(self.guid_names())
            .with_import_options(self.import.to_options())
            .with_export_options(self.export.to_options());
        if let Some(gateway) = self.gateway() {
            mapper = mapper.with_gateway(Arc::new(gateway));
        }
        mapper
    }

    /// Unit name table from `paths.guid_names`; empty when unset or unreadable
    pub fn guid_names(&self) -> GuidNames {
        let Some(path) = &self.paths.guid_names else {
            return GuidNames::default();
        };
        match GuidNames::load_from_file(path) {
            Ok(names) => {
                log::debug!("Loaded {} GUID names from {}", names.len(), path.display());
                names
            }
            Err(e) => {
                log::warn!("Ignoring GUID name table: {}", e);
                GuidNames::default()
            }
        }
    }

    /// Converter gateway, persisting its manifest in `paths.cache_dir`
    pub fn gateway(&self) -> Option<ConverterGateway> {
        let tools = self.tools.to_converter_tools();
        if tools == ConverterTools::default() {
            return None;
        }
        let gateway = ConverterGateway::new(tools);
        Some(match &self.paths.cache_dir {
            Some(dir) => gateway.with_manifest(dir.join(MANIFEST_FILE)),
            None => gateway,
        })
    }
}

/// Game and mod folders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Extracted base game files
    pub rda_root: Option<PathBuf>,
    /// Mod folder; its files shadow the base game
    pub mod_root: Option<PathBuf>,
    /// Where the conversion manifest is kept
    pub cache_dir: Option<PathBuf>,
    /// RON map of feedback unit names to GUIDs
    pub guid_names: Option<PathBuf>,
}

impl PathsConfig {
    pub fn resolver(&self) -> PathResolver {
        PathResolver::new(self.rda_root.clone(), self.mod_root.clone())
    }
}

/// Paths of the converter executables
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// `rdm4-bin` mesh converter
    pub rdm4: Option<PathBuf>,
    /// `texconv` texture converter
    pub texconv: Option<PathBuf>,
    /// `AnnoFCConverter` animation converter
    pub fc_converter: Option<PathBuf>,
}

impl ToolsConfig {
    pub fn to_converter_tools(&self) -> ConverterTools {
        ConverterTools {
            rdm4: self.rdm4.clone(),
            texconv: self.texconv.clone(),
            fc_converter: self.fc_converter.clone(),
        }
    }
}

/// Import configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Texture quality suffix (0 = highest)
    pub texture_quality: u8,
    /// Flip the editor X axis
    pub mirror_x: bool,
    pub import_splines: bool,
    /// Convert meshes and textures while importing
    pub materialize_assets: bool,
    /// Worker threads for asset conversion
    pub worker_threads: usize,
    /// Read feedback from the `.cf7` or the compact `.xml`
    pub feedback_format: FeedbackFormat,
}

impl Default for ImportConfig {
    fn default() -> Self {
        let options = ImportOptions::default();
        Self {
            texture_quality: options.texture_quality,
            mirror_x: false,
            import_splines: options.import_splines,
            materialize_assets: options.materialize_assets,
            worker_threads: options.worker_threads,
            feedback_format: options.feedback_format,
        }
    }
}

impl ImportConfig {
    pub fn to_options(&self) -> ImportOptions {
        ImportOptions {
            materialize_assets: self.materialize_assets,
            import_splines: self.import_splines,
            texture_quality: self.texture_quality,
            worker_threads: self.worker_threads.max(1),
            feedback_format: self.feedback_format,
        }
    }

    pub fn convention(&self) -> CoordinateConvention {
        CoordinateConvention {
            mirror_x: self.mirror_x,
        }
    }
}

/// Export configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub delete_material_lod_infos: bool,
    /// Write the `.ifo` next to the `.cfg`
    pub export_ifo: bool,
    /// Write feedback as `.cf7` or keep the compact `.xml`
    pub feedback_format: FeedbackFormat,
    /// `FeedbackLoops` value for transcoded feedback configs
    pub feedback_loop_mode: i64,
    /// Run `AnnoFCConverter` on written `.cf7` files
    pub convert_feedback_to_fc: bool,
    /// Round BuildBlocker corners to half units
    pub snap_build_blockers: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let options = ExportOptions::default();
        Self {
            delete_material_lod_infos: options.delete_material_lod_infos,
            export_ifo: options.export_ifo,
            feedback_format: options.feedback_format,
            feedback_loop_mode: options.feedback_loop_mode,
            convert_feedback_to_fc: options.convert_feedback_to_fc,
            snap_build_blockers: options.snap_build_blockers,
        }
    }
}

impl ExportConfig {
    pub fn to_options(&self) -> ExportOptions {
        ExportOptions {
            delete_material_lod_infos: self.delete_material_lod_infos,
            export_ifo: self.export_ifo,
            feedback_format: self.feedback_format,
            feedback_loop_mode: self.feedback_loop_mode,
            convert_feedback_to_fc: self.convert_feedback_to_fc,
            snap_build_blockers: self.snap_build_blockers,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace); `RUST_LOG` wins
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration error
#[derive(Debug, Error)]
#[error("Configuration error: {message}")]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.import.texture_quality, 0);
        assert!(config.export.export_ifo);
        assert_eq!(config.logging.level, "info");
        assert!(config.paths.rda_root.is_none());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("feedback_format = \"cf7\""));
        assert!(toml.contains("snap_build_blockers"));
    }

    #[test]
    fn test_sections_map_to_options() {
        let mut config = AppConfig::default();
        config.import.worker_threads = 0;
        config.import.mirror_x = true;
        config.export.feedback_format = FeedbackFormat::Compact;

        assert_eq!(config.import.to_options().worker_threads, 1);
        assert!(config.import.convention().mirror_x);
        assert!(config.scene().convention().mirror_x);
        assert_eq!(config.export.to_options().feedback_format, FeedbackFormat::Compact);
    }

    #[test]
    fn test_gateway_only_with_tools() {
        let mut config = AppConfig::default();
        assert!(config.gateway().is_none());
        assert!(config.mapper().gateway().is_none());

        config.tools.rdm4 = Some(PathBuf::from("rdm4-bin"));
        let gateway = config.gateway().unwrap();
        assert_eq!(gateway.tools().rdm4.as_deref(), Some(Path::new("rdm4-bin")));
        assert!(config.mapper().gateway().is_some());
    }

    #[test]
    fn test_guid_names_from_paths() {
        let dir = std::env::temp_dir().join("annocfg_config_guid_names");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("guid_names.ron");
        std::fs::write(&file, "{ \"worker\": \"1010278\" }").unwrap();

        let mut config = AppConfig::default();
        assert!(config.guid_names().is_empty());
        config.paths.guid_names = Some(file);
        assert_eq!(config.mapper().guid_names().get("worker"), Some("1010278"));

        config.paths.guid_names = Some(dir.join("missing.ron"));
        assert!(config.guid_names().is_empty());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = Figment::new()
            .merge(Toml::string("[export]\nexport_ifo = false\n[import]\nfeedback_format = \"compact\"\n"))
            .extract()
            .unwrap();
        assert!(!config.export.export_ifo);
        assert!(config.export.snap_build_blockers);
        assert_eq!(config.import.feedback_format, FeedbackFormat::Compact);
        assert_eq!(config.import.worker_threads, 4);
    }
}
