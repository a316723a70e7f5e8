use crate::error::{Result, StencilError};
use crate::marker::GeneratorMarker;
use crate::paths;
use std::collections::{BTreeMap, BTreeSet};
use std::io::ErrorKind;
use std::path::Path;
use walkdir::WalkDir;

// ---------------------------------------------------------------------------
// RepositoryFingerprint
// ---------------------------------------------------------------------------

/// Immutable structural snapshot of a target repository, taken once per run.
///
/// Everything downstream of the prober (classification, conflict resolution)
/// works against this snapshot instead of touching the filesystem again, so
/// a whole planning pass sees one consistent view of the tree.
#[derive(Debug, Clone)]
pub struct RepositoryFingerprint {
    /// Relative path (forward slashes) → sha-256 of content.
    pub files: BTreeMap<String, String>,
    /// Stack markers inferred from manifest presence, e.g. "rust", "node".
    pub stack_markers: BTreeSet<String>,
    /// Parsed generator marker, if the repository has one.
    pub marker: Option<GeneratorMarker>,
}

impl RepositoryFingerprint {
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn hash_of(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// True if the tree holds anything that looks like source code.
    pub fn has_source_files(&self) -> bool {
        self.files.keys().any(|p| is_source_file(p))
    }

    /// How many of the expected generated units (artifact directories plus
    /// the rules file) are present. A directory counts when any file lives
    /// under it.
    pub fn generated_units_present(&self) -> usize {
        paths::GENERATED_UNITS
            .iter()
            .filter(|unit| {
                let prefix = format!("{unit}/");
                self.contains(unit) || self.files.keys().any(|p| p.starts_with(&prefix))
            })
            .count()
    }
}

// ---------------------------------------------------------------------------
// Stack inference
// ---------------------------------------------------------------------------

/// Root-level manifest file → inferred stack marker.
const MANIFEST_MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "rust"),
    ("package.json", "node"),
    ("pyproject.toml", "python"),
    ("requirements.txt", "python"),
    ("go.mod", "go"),
    ("pom.xml", "java"),
    ("build.gradle", "java"),
];

const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "kt", "rb", "c", "cc", "cpp", "h", "hpp",
    "cs", "swift",
];

fn is_source_file(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
}

// ---------------------------------------------------------------------------
// Prober
// ---------------------------------------------------------------------------

/// Walk `root` once and produce its fingerprint. Strictly read-only.
///
/// Symlinks are never followed, so the snapshot cannot escape the target
/// directory. VCS internals, build output, and our own backups are pruned —
/// they are not part of the repository's integration surface.
pub fn probe(root: &Path) -> Result<RepositoryFingerprint> {
    let meta = std::fs::metadata(root)?;
    if !meta.is_dir() {
        return Err(StencilError::Io(std::io::Error::new(
            ErrorKind::InvalidInput,
            format!("not a directory: {}", root.display()),
        )));
    }

    let mut files = BTreeMap::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_pruned(e));

    for entry in walker {
        let entry = entry.map_err(|e| {
            StencilError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("walk failed")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("walker yields paths under root")
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let content = std::fs::read(entry.path())?;
        files.insert(rel, crate::io::sha256_hex(&content));
    }

    let mut stack_markers = BTreeSet::new();
    for (manifest, marker) in MANIFEST_MARKERS {
        if files.contains_key(*manifest) {
            stack_markers.insert((*marker).to_string());
        }
    }

    let marker = GeneratorMarker::load(root)?;

    Ok(RepositoryFingerprint {
        files,
        stack_markers,
        marker,
    })
}

fn is_pruned(entry: &walkdir::DirEntry) -> bool {
    // Never prune the walk root itself, whatever it is named.
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if name == ".git" || name == "target" || name == "node_modules" {
        return true;
    }
    // .stencil/backups holds pre-images of the very files being compared;
    // fingerprinting it would make every apply look like a conflict.
    name == "backups"
        && entry
            .path()
            .parent()
            .and_then(|p| p.file_name())
            .is_some_and(|n| n == paths::STENCIL_DIR)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn probe_empty_dir() {
        let dir = TempDir::new().unwrap();
        let fp = probe(dir.path()).unwrap();
        assert!(fp.files.is_empty());
        assert!(fp.stack_markers.is_empty());
        assert!(fp.marker.is_none());
        assert!(!fp.has_source_files());
    }

    #[test]
    fn probe_hashes_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), "world").unwrap();

        let fp = probe(dir.path()).unwrap();
        assert_eq!(fp.files.len(), 2);
        assert_eq!(
            fp.hash_of("a.txt"),
            Some(crate::io::sha256_hex(b"hello").as_str())
        );
        assert!(fp.contains("sub/b.txt"));
    }

    #[test]
    fn probe_infers_stack_markers() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();

        let fp = probe(dir.path()).unwrap();
        assert!(fp.stack_markers.contains("rust"));
        assert!(fp.stack_markers.contains("node"));
        assert!(!fp.stack_markers.contains("python"));
    }

    #[test]
    fn probe_prunes_git_and_backups() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref").unwrap();
        std::fs::create_dir_all(dir.path().join(".stencil/backups")).unwrap();
        std::fs::write(dir.path().join(".stencil/backups/b.yaml"), "x").unwrap();
        std::fs::write(dir.path().join("kept.txt"), "y").unwrap();

        let fp = probe(dir.path()).unwrap();
        assert_eq!(fp.files.len(), 1);
        assert!(fp.contains("kept.txt"));
    }

    #[test]
    fn probe_nonexistent_root_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(probe(&missing), Err(StencilError::Io(_))));
    }

    #[test]
    fn probe_file_root_fails() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert!(matches!(probe(&file), Err(StencilError::Io(_))));
    }

    #[test]
    fn source_detection() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README.md"), "docs").unwrap();
        let fp = probe(dir.path()).unwrap();
        assert!(!fp.has_source_files());

        std::fs::write(dir.path().join("main.rs"), "fn main() {}").unwrap();
        let fp = probe(dir.path()).unwrap();
        assert!(fp.has_source_files());
    }

    #[test]
    fn generated_units_counting() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("RULES.md"), "# rules").unwrap();
        std::fs::create_dir_all(dir.path().join(".stencil/agents")).unwrap();
        std::fs::write(dir.path().join(".stencil/agents/reviewer.md"), "a").unwrap();

        let fp = probe(dir.path()).unwrap();
        assert_eq!(fp.generated_units_present(), 2);
    }
}
