//! Command implementations behind the `annocfg` binary
//!
//! Each command takes the loaded [`AppConfig`] and returns what the binary
//! prints, so the commands can be exercised without spawning a process.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use annocfg_core::{
    transcode_with_names, Asset, ConversionKind, Document, ExportReport, GuidNames, Properties,
    Scene, SceneKey, SceneValidator, ValidationWarning,
};

use crate::config::AppConfig;

/// Outcome of [`roundtrip`]
#[derive(Debug, Default)]
pub struct RoundtripSummary {
    /// Documents produced by the export
    pub documents: usize,
    /// Paths whose exported text differs from the file on disk
    pub changed: Vec<PathBuf>,
    /// Files written into the output folder
    pub written: Vec<PathBuf>,
    pub warnings: Vec<ValidationWarning>,
}

/// Import a `.cfg` family and export it again without edits
///
/// Without `out` the exported text is compared with the files on disk.
/// With `out` every document is written into that folder under its own
/// file name.
pub fn roundtrip(config: &AppConfig, cfg: &Path, out: Option<&Path>) -> Result<RoundtripSummary> {
    let mut scene = config.scene();
    let mut mapper = config.mapper();
    let root = mapper
        .import_family(&mut scene, cfg)
        .with_context(|| format!("Failed to import {}", cfg.display()))?;
    let mut report = mapper
        .export(&mut scene, root)
        .with_context(|| format!("Failed to export {}", cfg.display()))?;

    let mut summary = RoundtripSummary {
        documents: report.documents.len(),
        warnings: scene.take_warnings(),
        ..RoundtripSummary::default()
    };
    summary.warnings.append(&mut report.warnings);

    for document in &report.documents {
        let Some(path) = &document.path else {
            continue;
        };
        let on_disk = fs::read(path).unwrap_or_default();
        if on_disk != document.text.as_bytes() {
            summary.changed.push(path.clone());
        }
    }

    if let Some(out) = out {
        fs::create_dir_all(out).with_context(|| format!("Failed to create {}", out.display()))?;
        let redirected = redirect(report, out);
        summary.written = redirected.documents.iter().filter_map(|d| d.path.clone()).collect();
        let mut warnings = mapper
            .write_report(&redirected)
            .context("Failed to write exported documents")?;
        summary.warnings.append(&mut warnings);
    }

    Ok(summary)
}

/// Same documents, placed in `dir` under their file names
fn redirect(mut report: ExportReport, dir: &Path) -> ExportReport {
    for document in &mut report.documents {
        if let Some(name) = document.path.as_ref().and_then(|p| p.file_name()) {
            document.path = Some(dir.join(name));
        }
    }
    report
}

/// Scene tree of a `.cfg` family, one node per line, followed by warnings
pub fn inspect(config: &AppConfig, cfg: &Path) -> Result<String> {
    let mut scene = config.scene();
    let mut mapper = config.mapper();
    let root = mapper
        .import_family(&mut scene, cfg)
        .with_context(|| format!("Failed to import {}", cfg.display()))?;

    let mut out = String::new();
    write_tree(&scene, root, 0, &mut out);

    let warnings: Vec<ValidationWarning> = scene
        .warnings()
        .iter()
        .cloned()
        .chain(SceneValidator::lint(&scene, root))
        .collect();
    if !warnings.is_empty() {
        let _ = writeln!(out, "\n{} warning(s):", warnings.len());
        for warning in warnings {
            let _ = writeln!(out, "  {}", warning);
        }
    }
    Ok(out)
}

fn write_tree(scene: &Scene, key: SceneKey, depth: usize, out: &mut String) {
    let Some(node) = scene.get(key) else {
        return;
    };
    let _ = write!(out, "{}{} [{}]", "  ".repeat(depth), node.name(), node.kind());
    if let Some(path) = node.file().and_then(|f| f.path.as_ref()) {
        let _ = write!(out, " {}", path.display());
    }
    if node.is_placeholder() {
        out.push_str(" (placeholder)");
    }
    out.push('\n');
    if let Properties::Asset(asset) = node.properties() {
        for material in &asset.materials {
            let _ = writeln!(out, "{}  - {}", "  ".repeat(depth), material.display_name());
        }
    }
    for child in scene.children(key) {
        write_tree(scene, *child, depth + 1, out);
    }
}

/// Transcode a compact feedback `.xml` into a `.cf7`, returning the written path
pub fn transcode_file(
    input: &Path,
    out: Option<&Path>,
    loop_mode: i64,
    names: &GuidNames,
) -> Result<(PathBuf, Vec<ValidationWarning>)> {
    let doc = Document::load_from_file(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let transcoded = transcode_with_names(&doc, loop_mode, names)
        .with_context(|| format!("Failed to transcode {}", input.display()))?;

    let target = match out {
        Some(path) => path.to_path_buf(),
        None => input.with_extension("cf7"),
    };
    if target == input {
        bail!("Refusing to overwrite the input {}", input.display());
    }
    fs::write(&target, transcoded.to_text())
        .with_context(|| format!("Failed to write {}", target.display()))?;
    log::info!("Wrote {} (IdCounter {})", target.display(), transcoded.id_counter);
    Ok((target, transcoded.warnings))
}

/// Run one converter on `input`
pub fn convert(config: &AppConfig, kind: ConversionKind, input: &Path) -> Result<PathBuf> {
    let Some(gateway) = config.gateway() else {
        bail!("No converter tools configured; set [tools] in config/user.toml");
    };
    gateway
        .convert(kind, input)
        .with_context(|| format!("Conversion of {} failed", input.display()))
}

/// Absolute paths become canonical; canonical paths resolve to a file under the roots
pub fn resolve(config: &AppConfig, path: &str) -> Result<String> {
    let resolver = config.paths.resolver();
    if Path::new(path).is_absolute() {
        Ok(resolver.to_canonical(Path::new(path))?)
    } else {
        let absolute = resolver.to_absolute(path)?;
        Ok(absolute.display().to_string())
    }
}
