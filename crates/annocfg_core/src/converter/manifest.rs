//! Persistent record of finished conversions
//!
//! Stored as RON next to the conversion cache. Each entry maps an output
//! file to the SHA-256 of the input it was produced from, so a batch that
//! was interrupted can resume without re-running tools whose inputs did not
//! change, even when file timestamps were reset by a copy.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One finished conversion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub input: String,
    pub sha256: String,
}

/// Output path → entry
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionManifest {
    entries: BTreeMap<String, ManifestEntry>,
}

impl ConversionManifest {
    /// Load a manifest; a missing or unreadable file yields an empty one
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(_) => return Self::default(),
        };
        match ron::from_str(&contents) {
            Ok(manifest) => manifest,
            Err(e) => {
                log::warn!("Ignoring corrupt conversion manifest {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Save as pretty RON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let pretty = ron::ser::PrettyConfig::new()
            .struct_names(true)
            .enumerate_arrays(false);
        let contents = ron::ser::to_string_pretty(self, pretty)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)
    }

    pub fn record(&mut self, output: &Path, input: &Path, sha256: String) {
        self.entries.insert(
            key(output),
            ManifestEntry {
                input: key(input),
                sha256,
            },
        );
    }

    /// True if `output` was produced from an input with this hash
    pub fn matches(&self, output: &Path, sha256: &str) -> bool {
        self.entries
            .get(&key(output))
            .map(|e| e.sha256 == sha256)
            .unwrap_or(false)
    }

    pub fn get(&self, output: &Path) -> Option<&ManifestEntry> {
        self.entries.get(&key(output))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("annocfg_manifest_{}", name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_sha256_known_value() {
        let dir = temp_dir("sha");
        let file = dir.join("abc.txt");
        fs::write(&file, b"abc").unwrap();
        assert_eq!(
            sha256_file(&file).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_save_and_load() {
        let dir = temp_dir("save_load");
        let path = dir.join("cache/manifest.ron");
        let mut manifest = ConversionManifest::default();
        manifest.record(Path::new("/o/a.glb"), Path::new("/i/a.rdm"), "00ff".into());
        manifest.save(&path).unwrap();

        let loaded = ConversionManifest::load(&path);
        assert_eq!(loaded, manifest);
        assert!(loaded.matches(Path::new("/o/a.glb"), "00ff"));
        assert!(!loaded.matches(Path::new("/o/a.glb"), "ff00"));
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_load_missing_or_corrupt() {
        let dir = temp_dir("corrupt");
        assert!(ConversionManifest::load(dir.join("none.ron")).is_empty());
        fs::write(dir.join("bad.ron"), "not ron at all (").unwrap();
        assert!(ConversionManifest::load(dir.join("bad.ron")).is_empty());
        let _ = fs::remove_dir_all(dir);
    }
}
