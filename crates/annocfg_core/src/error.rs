//! Error types
//!
//! Every failure the core can report, grouped the way callers handle them:
//!
//! - [`FormatError`] aborts parsing of a single document
//! - [`StructuralError`] and [`PathError`] are collected over a whole export
//! - [`ConversionError`] is attributed to a single node and never aborts a batch
//! - [`ValidationWarning`] is informational and travels alongside results

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::converter::ConversionKind;

/// Malformed document text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed document at line {line}, column {column}: {message}")]
pub struct FormatError {
    /// 1-based line of the offending position
    pub line: usize,
    /// 1-based column (in characters) of the offending position
    pub column: usize,
    pub message: String,
}

impl FormatError {
    /// Build an error from a byte offset into `text`
    pub fn at_offset(text: &str, offset: usize, message: impl Into<String>) -> Self {
        let mut offset = offset.min(text.len());
        while !text.is_char_boundary(offset) {
            offset -= 1;
        }
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = before[line_start..].chars().count() + 1;
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// A scene or document violates a structural invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    #[error("cyclic subfile reference: {}", chain.join(" -> "))]
    CyclicSubfile { chain: Vec<String> },
    #[error("{node}: blocker planes cannot be scaled, edit the vertices instead")]
    PlaneScaled { node: String },
    #[error("{node}: this node only supports uniform scale")]
    NonUniformScale { node: String },
    #[error("dummy group '{group}': duplicate dummy name '{name}'")]
    DuplicateDummy { group: String, name: String },
    #[error("dummy group '{group}': {message}")]
    DummyGroupGap { group: String, message: String },
    #[error("{node}: missing required field '{field}'")]
    MissingField { node: String, field: String },
    #[error("{node}: {message}")]
    InvalidNode { node: String, message: String },
}

/// Path resolution failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("{} is not inside any configured root", path.display())]
    OutsideRoots { path: PathBuf },
    #[error("asset '{path}' not found (searched {})", display_paths(searched))]
    NotFound { path: String, searched: Vec<PathBuf> },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// External converter failure
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("{tool} failed on {}: {reason}", input.display())]
    ProcessFailed {
        tool: String,
        input: PathBuf,
        reason: String,
    },
    #[error("no tool configured for {kind}")]
    NotConfigured { kind: ConversionKind },
    #[error("{kind} cannot convert {}", input.display())]
    Unsupported { kind: ConversionKind, input: PathBuf },
    #[error("i/o error while converting {}: {source}", input.display())]
    Io {
        input: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Non-fatal finding attached to a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Display name of the node (or document) the warning is about
    pub node: String,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.node, self.message)
    }
}

/// Failure loading a file-backed asset (documents, prop files)
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
}

/// Failure importing a document into a scene
#[derive(Error, Debug)]
pub enum ImportError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("unsupported document type: {}", path.display())]
    UnknownFormat { path: PathBuf },
}

/// One blocking problem found during export
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExportProblem {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error("{node}: {error}")]
    Path { node: String, error: PathError },
}

/// Export refused: every blocking problem plus the warnings collected alongside
#[derive(Error, Debug)]
#[error("export failed with {} problem(s): {}", problems.len(), summarize(problems))]
pub struct ExportError {
    pub problems: Vec<ExportProblem>,
    pub warnings: Vec<ValidationWarning>,
}

fn summarize(problems: &[ExportProblem]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure transcoding a compact feedback document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranscodeError {
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error("not a feedback document: root element is <{found}>")]
    WrongRoot { found: String },
}

/// Umbrella error for callers that do not care which stage failed
#[derive(Error, Debug)]
pub enum CfgError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Structural(#[from] StructuralError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error(transparent)]
    Transcode(#[from] TranscodeError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
