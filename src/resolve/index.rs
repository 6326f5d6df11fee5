//! Identity & candidate index: discovery of proxy-able modules on disk.
//!
//! A scan walks a root directory once, opens every module file it finds, and
//! records identity → location. Candidates are immutable after discovery;
//! the scan keeps only the identity and header facts it needs and drops each
//! image before moving on, so a directory full of large modules costs one
//! open image at a time.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use crate::{
    diagnostics::Diagnostics,
    metadata::{identity::ModuleIdentity, store::ModuleStore},
    Result,
};

/// File extension of candidate module files.
pub const MODULE_EXTENSION: &str = "dll";

/// File-stem suffix marking generated proxy output.
///
/// Files carrying it are skipped during scanning so a prior run's output is
/// never treated as input.
pub const PROXY_SUFFIX: &str = "-proxy";

/// A module discovered during the scan, with the facts resolution needs.
///
/// Never mutated after discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateModule {
    /// The candidate's own identity.
    pub identity: ModuleIdentity,
    /// Where the candidate lives on disk.
    pub path: PathBuf,
    /// Whether the candidate contains only managed code.
    pub il_only: bool,
    /// Whether the candidate is strong-name signed.
    pub signed: bool,
}

/// Index from literal identity strings to discovered candidates.
#[derive(Debug, Default)]
pub struct CandidateIndex {
    entries: HashMap<String, CandidateModule>,
}

impl CandidateIndex {
    /// Build an index by recursively scanning `root` for module files.
    ///
    /// Files are visited in sorted order for deterministic results. Files
    /// whose stem ends in [`PROXY_SUFFIX`] are skipped, as is anything the
    /// store cannot parse. A malformed or foreign binary in the tree must
    /// never abort the scan, so parse failures are only reported as verbose
    /// traces.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the directory tree itself
    /// cannot be read.
    pub fn scan(root: &Path, store: &dyn ModuleStore, diagnostics: &Diagnostics) -> Result<Self> {
        let mut files = Vec::new();
        collect_module_files(root, &mut files)?;
        files.sort();

        let mut entries = HashMap::new();

        for file in files {
            if is_proxy_artifact(&file) {
                continue;
            }

            match store.open(&file) {
                Ok(module) => {
                    let candidate = CandidateModule {
                        il_only: module.is_il_only(),
                        signed: module.is_signed(),
                        identity: module.identity,
                        path: file.clone(),
                    };
                    diagnostics.trace(format!(
                        "Found candidate: '{}' => {}",
                        candidate.identity.display_name(),
                        file.display()
                    ));
                    entries.insert(candidate.identity.display_name(), candidate);
                }
                Err(e) => {
                    diagnostics.trace(format!(
                        "Unable to parse module: '{}' => {}",
                        file.display(),
                        e
                    ));
                }
            }
        }

        diagnostics.trace(format!("Found {} possible candidate modules", entries.len()));

        Ok(Self { entries })
    }

    /// Exact lookup by literal identity string.
    #[must_use]
    pub fn get(&self, display_name: &str) -> Option<&CandidateModule> {
        self.entries.get(display_name)
    }

    /// Exact lookup for a declared reference identity.
    #[must_use]
    pub fn find_reference(&self, reference: &ModuleIdentity) -> Option<&CandidateModule> {
        self.get(&reference.display_name())
    }

    /// Number of discovered candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the scan found nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Returns true if the path's stem marks it as generated proxy output.
fn is_proxy_artifact(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(PROXY_SUFFIX))
}

fn collect_module_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_module_files(&path, files)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(MODULE_EXTENSION))
        {
            files.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        identity::ModuleVersion,
        module::ModuleImage,
        store::{ImageStore, IMAGE_FORMAT_VERSION, IMAGE_MAGIC},
    };

    fn write_module(dir: &Path, file: &str, name: &str) -> ModuleIdentity {
        let identity = ModuleIdentity::new(name, ModuleVersion::new(1, 0, 0, 0), None, None);
        let module = ModuleImage::new(identity.clone());
        ImageStore::new().write(&module, &dir.join(file)).unwrap();
        identity
    }

    #[test]
    fn scan_indexes_by_identity_string() {
        let dir = tempfile::tempdir().unwrap();
        let identity = write_module(dir.path(), "MyLib.dll", "MyLib");

        let index =
            CandidateIndex::scan(dir.path(), &ImageStore::new(), &Diagnostics::default()).unwrap();

        assert_eq!(index.len(), 1);
        let found = index.find_reference(&identity).unwrap();
        assert_eq!(found.identity, identity);
        assert!(found.il_only);
    }

    #[test]
    fn scan_recurses_into_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("libs")).unwrap();
        let identity = write_module(&dir.path().join("libs"), "Nested.dll", "Nested");

        let index =
            CandidateIndex::scan(dir.path(), &ImageStore::new(), &Diagnostics::default()).unwrap();

        let found = index.find_reference(&identity).unwrap();
        assert_eq!(found.path, dir.path().join("libs").join("Nested.dll"));
    }

    #[test]
    fn scan_skips_prior_proxy_output() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "MyLib-proxy.dll", "MyLib");

        let index =
            CandidateIndex::scan(dir.path(), &ImageStore::new(), &Diagnostics::default()).unwrap();

        assert!(index.is_empty());
    }

    #[test]
    fn scan_tolerates_foreign_binaries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Native.dll"), b"MZ\x90\x00garbage").unwrap();
        std::fs::write(dir.path().join("Empty.dll"), b"").unwrap();
        let identity = write_module(dir.path(), "Good.dll", "Good");

        let index =
            CandidateIndex::scan(dir.path(), &ImageStore::new(), &Diagnostics::default()).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.find_reference(&identity).is_some());
    }

    #[test]
    fn scan_survives_hostile_container_counts() {
        // A file with a valid magic but an absurd declared element count
        // must be skipped like any other unparseable file, not abort the
        // scan or starve it of memory.
        let dir = tempfile::tempdir().unwrap();

        let mut hostile = IMAGE_MAGIC.to_vec();
        hostile.extend_from_slice(&IMAGE_FORMAT_VERSION.to_le_bytes());
        hostile.extend_from_slice(&4u32.to_le_bytes());
        hostile.extend_from_slice(b"Evil");
        for component in [1u16, 0, 0, 0] {
            hostile.extend_from_slice(&component.to_le_bytes());
        }
        hostile.push(0); // culture: none
        hostile.push(0); // key: none
        hostile.extend_from_slice(&1u32.to_le_bytes()); // attributes
        hostile.extend_from_slice(&u32::MAX.to_le_bytes()); // declared references
        std::fs::write(dir.path().join("Evil.dll"), &hostile).unwrap();

        let identity = write_module(dir.path(), "Good.dll", "Good");

        let index =
            CandidateIndex::scan(dir.path(), &ImageStore::new(), &Diagnostics::default()).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.find_reference(&identity).is_some());
    }

    #[test]
    fn scan_ignores_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"hello").unwrap();

        let index =
            CandidateIndex::scan(dir.path(), &ImageStore::new(), &Diagnostics::default()).unwrap();

        assert!(index.is_empty());
    }
}
