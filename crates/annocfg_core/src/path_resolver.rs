//! Canonical asset paths
//!
//! Documents reference assets by a `/`-separated path relative to the game
//! data root (`data/graphics/.../model.rdm`). On disk the same path can live
//! under a mod folder or under the unpacked base game; the mod folder wins.

use std::path::{Component, Path, PathBuf};

use crate::error::PathError;

/// Converts between absolute filesystem paths and canonical document paths
///
/// Roots are kept in priority order: the mod root (if any) first, then the
/// base game root. The resolver caches nothing, so files appearing or
/// disappearing on disk are seen by the next call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathResolver {
    mod_root: Option<PathBuf>,
    base_root: Option<PathBuf>,
}

impl PathResolver {
    pub fn new(base_root: Option<PathBuf>, mod_root: Option<PathBuf>) -> Self {
        Self {
            mod_root: mod_root.map(|p| normalize(&p)),
            base_root: base_root.map(|p| normalize(&p)),
        }
    }

    /// Roots in the order they are searched
    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.mod_root
            .iter()
            .chain(self.base_root.iter())
            .map(PathBuf::as_path)
    }

    pub fn mod_root(&self) -> Option<&Path> {
        self.mod_root.as_deref()
    }

    pub fn base_root(&self) -> Option<&Path> {
        self.base_root.as_deref()
    }

    /// Canonical form of an absolute path
    ///
    /// # Errors
    /// Returns [`PathError::OutsideRoots`] if the path is not below any root.
    pub fn to_canonical(&self, absolute: &Path) -> Result<String, PathError> {
        let normalized = normalize(absolute);
        for root in self.roots() {
            if let Ok(relative) = normalized.strip_prefix(root) {
                return Ok(join_slash(relative));
            }
        }
        Err(PathError::OutsideRoots {
            path: absolute.to_path_buf(),
        })
    }

    /// Existing file for a canonical path
    ///
    /// # Errors
    /// Returns [`PathError::NotFound`] listing every candidate that was tried.
    pub fn to_absolute(&self, canonical: &str) -> Result<PathBuf, PathError> {
        let candidates = self.candidates(canonical);
        match candidates.iter().find(|c| c.exists()) {
            Some(found) => Ok(found.clone()),
            None => Err(PathError::NotFound {
                path: canonical.to_string(),
                searched: candidates,
            }),
        }
    }

    /// Where a file for `canonical` should go, whether or not it exists yet
    ///
    /// The mod candidate is chosen if it exists or its folder exists;
    /// otherwise the base candidate. Without roots the path is returned as is.
    pub fn to_absolute_or_preferred(&self, canonical: &str) -> PathBuf {
        let relative = relative_path(canonical);
        if let Some(mod_root) = &self.mod_root {
            let candidate = normalize(&mod_root.join(&relative));
            let parent_exists = candidate.parent().map(Path::is_dir).unwrap_or(false);
            if candidate.exists() || parent_exists || self.base_root.is_none() {
                return candidate;
            }
        }
        match &self.base_root {
            Some(base) => normalize(&base.join(&relative)),
            None => relative,
        }
    }

    /// Canonical path of the converted texture for a given quality level
    ///
    /// `data/tex/diffuse.psd` with quality 0 gives `data/tex/diffuse_0.dds`.
    pub fn texture_variant(canonical: &str, quality: u8) -> String {
        let stem_end = match canonical.rfind('.') {
            Some(dot) if !canonical[dot..].contains('/') => dot,
            _ => canonical.len(),
        };
        format!("{}_{}.dds", &canonical[..stem_end], quality)
    }

    fn candidates(&self, canonical: &str) -> Vec<PathBuf> {
        let relative = relative_path(canonical);
        self.roots().map(|root| normalize(&root.join(&relative))).collect()
    }
}

/// Lexical normalization: drops `.` and resolves `..` without touching the disk
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn relative_path(canonical: &str) -> PathBuf {
    canonical
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect()
}

fn join_slash(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
