//! External asset conversion
//!
//! Binary game formats are turned into editor formats (and back) by command
//! line tools. [`ConverterGateway::convert`] picks the tool for a
//! [`ConversionKind`], skips the work when an up-to-date output exists, and
//! serializes concurrent writes to the same output file.
//!
//! - [`ProcessRunner`] abstracts process invocation
//! - [`ConversionManifest`] persists input hashes of finished conversions
//! - [`ConversionQueue`] runs independent conversions on worker threads

mod manifest;
mod queue;
mod runner;

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

pub use manifest::{sha256_file, ConversionManifest, ManifestEntry};
pub use queue::{ConversionOutcome, ConversionQueue};
pub use runner::{ProcessOutput, ProcessRunner, SystemRunner};

/// A supported conversion direction
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversionKind {
    /// `.rdm` → `.glb`
    MeshToInterchange,
    /// `.glb` → `.rdm`
    MeshFromInterchange,
    /// `.dds` → `.png`
    TextureToImage,
    /// `.png` → `.dds`
    TextureFromImage,
    /// `.fc` → `.cf7`
    AnimationToXml,
    /// `.cf7` → `.fc`
    AnimationFromXml,
}

/// External executable used by a conversion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    Rdm4,
    Texconv,
    FcConverter,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tool::Rdm4 => "rdm4",
            Tool::Texconv => "texconv",
            Tool::FcConverter => "AnnoFCConverter",
        })
    }
}

impl ConversionKind {
    pub const ALL: [ConversionKind; 6] = [
        ConversionKind::MeshToInterchange,
        ConversionKind::MeshFromInterchange,
        ConversionKind::TextureToImage,
        ConversionKind::TextureFromImage,
        ConversionKind::AnimationToXml,
        ConversionKind::AnimationFromXml,
    ];

    pub fn tool(self) -> Tool {
        match self {
            ConversionKind::MeshToInterchange | ConversionKind::MeshFromInterchange => Tool::Rdm4,
            ConversionKind::TextureToImage | ConversionKind::TextureFromImage => Tool::Texconv,
            ConversionKind::AnimationToXml | ConversionKind::AnimationFromXml => Tool::FcConverter,
        }
    }

    pub fn input_extension(self) -> &'static str {
        match self {
            ConversionKind::MeshToInterchange => "rdm",
            ConversionKind::MeshFromInterchange => "glb",
            ConversionKind::TextureToImage => "dds",
            ConversionKind::TextureFromImage => "png",
            ConversionKind::AnimationToXml => "fc",
            ConversionKind::AnimationFromXml => "cf7",
        }
    }

    pub fn output_extension(self) -> &'static str {
        match self {
            ConversionKind::MeshToInterchange => "glb",
            ConversionKind::MeshFromInterchange => "rdm",
            ConversionKind::TextureToImage => "png",
            ConversionKind::TextureFromImage => "dds",
            ConversionKind::AnimationToXml => "cf7",
            ConversionKind::AnimationFromXml => "fc",
        }
    }

    /// True if `input` has the extension this kind reads
    pub fn accepts(self, input: &Path) -> bool {
        input
            .extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case(self.input_extension()))
            .unwrap_or(false)
    }

    /// File the tool produces for `input` (same folder, new extension)
    pub fn output_path(self, input: &Path) -> PathBuf {
        input.with_extension(self.output_extension())
    }

    /// Command line for converting `input` into `output`
    pub fn arguments(self, input: &Path, output: &Path) -> Vec<OsString> {
        let out_dir = output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut args: Vec<OsString> = Vec::new();
        match self {
            ConversionKind::MeshToInterchange => {
                args.push("--input".into());
                args.push(input.into());
                args.push("-n".into());
                args.push("--outdst".into());
                args.push(out_dir.into());
            }
            ConversionKind::MeshFromInterchange => {
                args.push("--gltf=P4h_N4b_G4b_B4b_T2h".into());
                args.push("--input".into());
                args.push(input.into());
                args.push("-n".into());
                args.push("--outdst".into());
                args.push(out_dir.into());
            }
            ConversionKind::TextureToImage => {
                for a in ["-ft", "PNG", "-sepalpha", "-y", "-o"] {
                    args.push(a.into());
                }
                args.push(out_dir.into());
                args.push(input.into());
            }
            ConversionKind::TextureFromImage => {
                for a in ["-ft", "DDS", "-y", "-o"] {
                    args.push(a.into());
                }
                args.push(out_dir.into());
                args.push(input.into());
            }
            ConversionKind::AnimationToXml => {
                args.push("-r".into());
                args.push(input.into());
                args.push("-o".into());
                args.push(output.into());
            }
            ConversionKind::AnimationFromXml => {
                args.push("-w".into());
                args.push(input.into());
                args.push("-y".into());
                args.push("-o".into());
                args.push(output.into());
            }
        }
        args
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.input_extension(), self.output_extension())
    }
}

impl FromStr for ConversionKind {
    type Err = String;

    /// Accepts `rdm-glb` style names as well as the variant names
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_ascii_lowercase();
        for kind in ConversionKind::ALL {
            let short = format!("{}-{}", kind.input_extension(), kind.output_extension());
            let long = format!("{:?}", kind).to_ascii_lowercase();
            if lowered == short || lowered == long {
                return Ok(kind);
            }
        }
        Err(format!("unknown conversion '{}'", s))
    }
}

/// Paths of the external tools; `None` means not installed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConverterTools {
    pub rdm4: Option<PathBuf>,
    pub texconv: Option<PathBuf>,
    pub fc_converter: Option<PathBuf>,
}

impl ConverterTools {
    pub fn path_for(&self, tool: Tool) -> Option<&Path> {
        match tool {
            Tool::Rdm4 => self.rdm4.as_deref(),
            Tool::Texconv => self.texconv.as_deref(),
            Tool::FcConverter => self.fc_converter.as_deref(),
        }
    }
}

/// Runs conversions, caching their results on disk
pub struct ConverterGateway {
    tools: ConverterTools,
    runner: Arc<dyn ProcessRunner>,
    manifest: Mutex<ConversionManifest>,
    manifest_path: Option<PathBuf>,
    /// One lock per output file
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ConverterGateway {
    /// Gateway running real processes
    pub fn new(tools: ConverterTools) -> Self {
        Self::with_runner(tools, Arc::new(SystemRunner))
    }

    pub fn with_runner(tools: ConverterTools, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            tools,
            runner,
            manifest: Mutex::new(ConversionManifest::default()),
            manifest_path: None,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Persist the manifest at `path`, loading what is already there
    pub fn with_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.manifest = Mutex::new(ConversionManifest::load(&path));
        self.manifest_path = Some(path);
        self
    }

    pub fn tools(&self) -> &ConverterTools {
        &self.tools
    }

    /// True if the tool behind `kind` is configured
    pub fn supports(&self, kind: ConversionKind) -> bool {
        self.tools.path_for(kind.tool()).is_some()
    }

    /// Convert `input`, returning the produced file
    ///
    /// Nothing runs when the output exists and is not older than the input,
    /// or when the manifest recorded the same input hash for it.
    ///
    /// # Errors
    /// - [`ConversionError::Unsupported`] if `input` has the wrong extension
    /// - [`ConversionError::NotConfigured`] if the tool path is not set
    /// - [`ConversionError::ProcessFailed`] on a non-zero exit or missing output
    /// - [`ConversionError::Io`] if the input cannot be read or the tool not started
    pub fn convert(&self, kind: ConversionKind, input: &Path) -> Result<PathBuf, ConversionError> {
        if !kind.accepts(input) {
            return Err(ConversionError::Unsupported {
                kind,
                input: input.to_path_buf(),
            });
        }
        let program = self
            .tools
            .path_for(kind.tool())
            .ok_or(ConversionError::NotConfigured { kind })?;

        let output = kind.output_path(input);
        let lock = self.lock_for(&output);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let io_error = |source| ConversionError::Io {
            input: input.to_path_buf(),
            source,
        };
        let input_time = modified(input).map_err(io_error)?;
        if let Ok(output_time) = modified(&output) {
            if output_time >= input_time {
                log::debug!("Up to date: {}", output.display());
                return Ok(output);
            }
        }
        let hash = sha256_file(input).map_err(io_error)?;
        if output.exists() && self.manifest().matches(&output, &hash) {
            log::debug!("Unchanged input for {}", output.display());
            return Ok(output);
        }

        log::info!("Converting {} ({})", input.display(), kind);
        let args = kind.arguments(input, &output);
        let result = self.runner.run(program, &args).map_err(io_error)?;
        if !result.success {
            let reason = match result.code {
                Some(code) if result.stderr.is_empty() => format!("exit status {}", code),
                Some(code) => format!("exit status {}: {}", code, result.stderr),
                None => "terminated by signal".to_string(),
            };
            return Err(ConversionError::ProcessFailed {
                tool: kind.tool().to_string(),
                input: input.to_path_buf(),
                reason,
            });
        }
        if !output.exists() {
            return Err(ConversionError::ProcessFailed {
                tool: kind.tool().to_string(),
                input: input.to_path_buf(),
                reason: format!("expected output {} was not produced", output.display()),
            });
        }

        self.record(&output, input, hash);
        Ok(output)
    }

    fn record(&self, output: &Path, input: &Path, hash: String) {
        let mut manifest = self.manifest();
        manifest.record(output, input, hash);
        if let Some(path) = &self.manifest_path {
            if let Err(e) = manifest.save(path) {
                log::warn!("Failed to save conversion manifest {}: {}", path.display(), e);
            }
        }
    }

    fn manifest(&self) -> MutexGuard<'_, ConversionManifest> {
        self.manifest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_for(&self, output: &Path) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(output.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

fn modified(path: &Path) -> std::io::Result<SystemTime> {
    std::fs::metadata(path)?.modified()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Runner that writes the expected output file instead of running a tool
    #[derive(Default)]
    pub(crate) struct FakeRunner {
        pub calls: AtomicUsize,
        pub fail: bool,
    }

    impl FakeRunner {
        pub fn count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ProcessRunner for FakeRunner {
        fn run(&self, _program: &Path, args: &[OsString]) -> io::Result<ProcessOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Ok(ProcessOutput {
                    success: false,
                    code: Some(1),
                    stderr: "boom".into(),
                });
            }
            let input = args
                .iter()
                .map(PathBuf::from)
                .find(|p| p.extension().is_some() && p.exists())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no input argument"))?;
            let kind = ConversionKind::ALL
                .into_iter()
                .find(|k| k.accepts(&input))
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "unknown input"))?;
            std::fs::write(kind.output_path(&input), b"converted")?;
            Ok(ProcessOutput {
                success: true,
                code: Some(0),
                stderr: String::new(),
            })
        }
    }

    pub(crate) fn all_tools() -> ConverterTools {
        ConverterTools {
            rdm4: Some(PathBuf::from("rdm4-bin")),
            texconv: Some(PathBuf::from("texconv")),
            fc_converter: Some(PathBuf::from("AnnoFCConverter")),
        }
    }
}
