//! Document families: a `.cfg` with its same-stem companions

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::asset_cache::Asset;
use crate::converter::ConversionKind;
use crate::document::Document;
use crate::error::{CfgError, ImportError, ValidationWarning};
use crate::registry::DocumentFormat;
use crate::scene::{Scene, SceneKey};

use super::{ExportReport, FeedbackFormat, Mapper};

/// Companion files of a `.cfg`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanionPaths {
    pub ifo: PathBuf,
    pub cf7: PathBuf,
    /// Binary feedback, converted to `.cf7` when no `.cf7` exists
    pub fc: PathBuf,
    /// Compact feedback encoding
    pub feedback: PathBuf,
}

/// Paths sharing the stem of `cfg`, whether they exist or not
pub fn companion_paths(cfg: &Path) -> CompanionPaths {
    CompanionPaths {
        ifo: cfg.with_extension("ifo"),
        cf7: cfg.with_extension("cf7"),
        fc: cfg.with_extension("fc"),
        feedback: cfg.with_extension("xml"),
    }
}

impl Mapper {
    /// Import a `.cfg` together with its `.ifo` and feedback companions
    ///
    /// Companions become File children of the returned node. A companion
    /// that fails to load is reported as a scene warning; only the `.cfg`
    /// itself can fail the import.
    ///
    /// # Errors
    /// Same as [`Mapper::import_file`] for the `.cfg`.
    pub fn import_family(&mut self, scene: &mut Scene, cfg: &Path) -> Result<SceneKey, ImportError> {
        let root = self.import_file(scene, cfg)?;
        let companions = companion_paths(cfg);

        if companions.ifo.is_file() {
            self.attach_companion(scene, root, &companions.ifo, DocumentFormat::Ifo);
        }

        let compact = self.import_options.feedback_format == FeedbackFormat::Compact;
        if compact && companions.feedback.is_file() {
            self.attach_companion(scene, root, &companions.feedback, DocumentFormat::Feedback);
        } else if companions.cf7.is_file() {
            self.attach_companion(scene, root, &companions.cf7, DocumentFormat::Cf7);
        } else if companions.fc.is_file() {
            match self.convert_fc(&companions.fc) {
                Ok(cf7) => self.attach_companion(scene, root, &cf7, DocumentFormat::Cf7),
                Err(reason) => scene.push_warning(ValidationWarning::new(
                    companions.fc.display().to_string(),
                    reason,
                )),
            }
        }
        Ok(root)
    }

    fn attach_companion(&mut self, scene: &mut Scene, root: SceneKey, path: &Path, format: DocumentFormat) {
        let result = Document::load_from_file(path)
            .map_err(ImportError::from)
            .and_then(|doc| self.attach_document(scene, root, doc, format, path));
        match result {
            Ok(_) => log::debug!("Attached companion {}", path.display()),
            Err(err) => scene.push_warning(ValidationWarning::new(
                path.display().to_string(),
                format!("companion not imported: {}", err),
            )),
        }
    }

    fn convert_fc(&self, fc: &Path) -> Result<PathBuf, String> {
        let gateway = self
            .gateway
            .as_ref()
            .ok_or_else(|| "no converter configured for .fc files".to_string())?;
        gateway
            .convert(ConversionKind::AnimationToXml, fc)
            .map_err(|e| e.to_string())
    }

    /// Write every document of `report` to its path
    ///
    /// Documents without a path are skipped. With
    /// `ExportOptions::convert_feedback_to_fc`, written `.cf7` files are
    /// converted to `.fc`; a failed conversion is returned as a warning.
    ///
    /// # Errors
    /// Returns [`CfgError::Io`] if a file cannot be written.
    pub fn write_report(&self, report: &ExportReport) -> Result<Vec<ValidationWarning>, CfgError> {
        let mut warnings = Vec::new();
        for document in &report.documents {
            let Some(path) = &document.path else {
                continue;
            };
            fs::write(path, &document.text).map_err(|e| {
                CfgError::Io(io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
            })?;
            log::info!("Wrote {}", path.display());

            if document.format == DocumentFormat::Cf7 && self.export_options.convert_feedback_to_fc {
                let converted = match &self.gateway {
                    Some(gateway) => gateway
                        .convert(ConversionKind::AnimationFromXml, path)
                        .map_err(|e| e.to_string()),
                    None => Err("no converter configured for .fc files".to_string()),
                };
                if let Err(reason) = converted {
                    warnings.push(ValidationWarning::new(path.display().to_string(), reason));
                }
            }
        }
        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::converter::testing::{all_tools, FakeRunner};
    use crate::converter::ConverterGateway;
    use crate::mapper::{ExportOptions, ImportOptions};
    use crate::path_resolver::PathResolver;
    use crate::registry::Kind;

    fn family_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("annocfg_family_{}", name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const CFG: &str = "<Config>\n\t<Models />\n</Config>\n";
    const IFO: &str = "<Info>\n\t<BoundingBox />\n</Info>\n";
    const CF7: &str = "<DummyRoot>\n <Groups />\n</DummyRoot>\n<IdCounter>1</IdCounter>\n";
    const FEEDBACK: &str = "<SimpleAnnoFeedbackEncoding>\n\t<DummyGroups />\n</SimpleAnnoFeedbackEncoding>\n";

    fn file_formats(scene: &Scene, root: SceneKey) -> Vec<DocumentFormat> {
        scene
            .children(root)
            .iter()
            .filter_map(|c| scene.get(*c))
            .filter(|n| n.kind() == Kind::File)
            .map(|n| n.format())
            .collect()
    }

    #[test]
    fn test_companion_paths() {
        let paths = companion_paths(Path::new("data/ship/ship.cfg"));
        assert_eq!(paths.ifo, PathBuf::from("data/ship/ship.ifo"));
        assert_eq!(paths.cf7, PathBuf::from("data/ship/ship.cf7"));
        assert_eq!(paths.fc, PathBuf::from("data/ship/ship.fc"));
        assert_eq!(paths.feedback, PathBuf::from("data/ship/ship.xml"));
    }

    #[test]
    fn test_import_family_attaches_companions() {
        let dir = family_dir("attach");
        let cfg = dir.join("ship.cfg");
        fs::write(&cfg, CFG).unwrap();
        fs::write(dir.join("ship.ifo"), IFO).unwrap();
        fs::write(dir.join("ship.cf7"), CF7).unwrap();
        fs::write(dir.join("ship.xml"), FEEDBACK).unwrap();

        let mut scene = Scene::default();
        let mut mapper = Mapper::new(PathResolver::new(None, None));
        let root = mapper.import_family(&mut scene, &cfg).unwrap();
        assert_eq!(file_formats(&scene, root), vec![DocumentFormat::Ifo, DocumentFormat::Cf7]);
        assert!(scene.warnings().is_empty());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_import_family_prefers_compact_feedback() {
        let dir = family_dir("compact");
        let cfg = dir.join("ship.cfg");
        fs::write(&cfg, CFG).unwrap();
        fs::write(dir.join("ship.cf7"), CF7).unwrap();
        fs::write(dir.join("ship.xml"), FEEDBACK).unwrap();

        let mut scene = Scene::default();
        let mut mapper = Mapper::new(PathResolver::new(None, None)).with_import_options(ImportOptions {
            feedback_format: FeedbackFormat::Compact,
            ..ImportOptions::default()
        });
        let root = mapper.import_family(&mut scene, &cfg).unwrap();
        assert_eq!(file_formats(&scene, root), vec![DocumentFormat::Feedback]);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_fc_without_gateway_warns() {
        let dir = family_dir("fc");
        let cfg = dir.join("ship.cfg");
        fs::write(&cfg, CFG).unwrap();
        fs::write(dir.join("ship.fc"), b"\x00binary").unwrap();

        let mut scene = Scene::default();
        let mut mapper = Mapper::new(PathResolver::new(None, None));
        let root = mapper.import_family(&mut scene, &cfg).unwrap();
        assert!(file_formats(&scene, root).is_empty());
        assert_eq!(scene.warnings().len(), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_broken_companion_is_a_warning() {
        let dir = family_dir("broken");
        let cfg = dir.join("ship.cfg");
        fs::write(&cfg, CFG).unwrap();
        fs::write(dir.join("ship.ifo"), "<Info><BoundingBox></Info>").unwrap();

        let mut scene = Scene::default();
        let mut mapper = Mapper::new(PathResolver::new(None, None));
        let root = mapper.import_family(&mut scene, &cfg).unwrap();
        assert!(file_formats(&scene, root).is_empty());
        assert!(scene.warnings()[0].message.starts_with("companion not imported"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_family_roundtrip_writes_all_documents() {
        let dir = family_dir("roundtrip");
        let cfg = dir.join("ship.cfg");
        fs::write(&cfg, CFG).unwrap();
        fs::write(dir.join("ship.ifo"), IFO).unwrap();
        fs::write(dir.join("ship.cf7"), CF7).unwrap();

        let mut scene = Scene::default();
        let mut mapper = Mapper::new(PathResolver::new(None, None));
        let root = mapper.import_family(&mut scene, &cfg).unwrap();
        let report = mapper.export(&mut scene, root).unwrap();
        assert_eq!(report.documents.len(), 3);
        assert_eq!(report.document(&dir.join("ship.cf7")).unwrap().text, CF7);

        fs::remove_file(&cfg).unwrap();
        let warnings = mapper.write_report(&report).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(fs::read_to_string(&cfg).unwrap(), CFG);
        assert_eq!(fs::read_to_string(dir.join("ship.ifo")).unwrap(), IFO);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_ifo_export_can_be_disabled() {
        let dir = family_dir("no_ifo");
        let cfg = dir.join("ship.cfg");
        fs::write(&cfg, CFG).unwrap();
        fs::write(dir.join("ship.ifo"), IFO).unwrap();

        let mut scene = Scene::default();
        let mut mapper = Mapper::new(PathResolver::new(None, None));
        let root = mapper.import_family(&mut scene, &cfg).unwrap();
        let mapper = mapper.with_export_options(ExportOptions {
            export_ifo: false,
            ..ExportOptions::default()
        });
        let report = mapper.export(&mut scene, root).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].format, DocumentFormat::Cfg);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_written_cf7_converted_to_fc() {
        let dir = family_dir("to_fc");
        let cf7 = dir.join("ship.cf7");
        let runner = Arc::new(FakeRunner::default());
        let gateway = Arc::new(ConverterGateway::with_runner(all_tools(), runner.clone()));
        let mapper = Mapper::new(PathResolver::new(None, None))
            .with_gateway(gateway)
            .with_export_options(ExportOptions {
                convert_feedback_to_fc: true,
                ..ExportOptions::default()
            });
        let report = ExportReport {
            documents: vec![super::super::ExportedDocument {
                path: Some(cf7.clone()),
                format: DocumentFormat::Cf7,
                text: CF7.to_string(),
            }],
            ..ExportReport::default()
        };
        let warnings = mapper.write_report(&report).unwrap();
        assert!(warnings.is_empty());
        assert!(dir.join("ship.fc").is_file());
        assert_eq!(runner.count(), 1);
        let _ = fs::remove_dir_all(&dir);
    }
}
