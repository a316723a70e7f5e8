use crate::error::{Result, StencilError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const STENCIL_DIR: &str = ".stencil";
pub const AGENTS_DIR: &str = ".stencil/agents";
pub const SKILLS_DIR: &str = ".stencil/skills";
pub const KNOWLEDGE_DIR: &str = ".stencil/knowledge";
pub const TEMPLATES_DIR: &str = ".stencil/templates";
pub const BACKUPS_DIR: &str = ".stencil/backups";
pub const UPDATES_DIR: &str = ".stencil/updates";

pub const CONFIG_FILE: &str = ".stencil/config.yaml";
pub const MARKER_FILE: &str = ".stencil/generator.yaml";

/// Canonical rules file. Generated once, then owned by the user.
pub const RULES_FILE: &str = "RULES.md";

/// The units a finished generation run is expected to leave behind.
/// Scenario classification counts how many of these exist.
pub const GENERATED_UNITS: &[&str] = &[
    AGENTS_DIR,
    SKILLS_DIR,
    KNOWLEDGE_DIR,
    TEMPLATES_DIR,
    RULES_FILE,
];

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn stencil_dir(root: &Path) -> PathBuf {
    root.join(STENCIL_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn marker_path(root: &Path) -> PathBuf {
    root.join(MARKER_FILE)
}

pub fn backups_dir(root: &Path) -> PathBuf {
    root.join(BACKUPS_DIR)
}

pub fn backup_manifest(root: &Path, id: &str) -> PathBuf {
    backups_dir(root).join(format!("{id}.yaml"))
}

pub fn updates_dir(root: &Path) -> PathBuf {
    root.join(UPDATES_DIR)
}

pub fn rules_path(root: &Path) -> PathBuf {
    root.join(RULES_FILE)
}

// ---------------------------------------------------------------------------
// Id validation
// ---------------------------------------------------------------------------

static ID_RE: OnceLock<Regex> = OnceLock::new();

fn id_re() -> &'static Regex {
    ID_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

/// Blueprint ids and backup ids share the same shape: lowercase
/// alphanumeric with hyphens. Backup ids double as manifest file stems,
/// so anything else would let a caller escape `.stencil/backups/`.
pub fn validate_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= 64 && id_re().is_match(id)
}

pub fn validate_backup_id(id: &str) -> Result<()> {
    if validate_id(id) {
        Ok(())
    } else {
        Err(StencilError::InvalidBackupId(id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids() {
        for id in ["rust-cli", "a", "backup-20260807-ab12cd34", "x1"] {
            assert!(validate_id(id), "expected valid: {id}");
        }
    }

    #[test]
    fn invalid_ids() {
        for id in [
            "",
            "-starts-with-dash",
            "ends-with-dash-",
            "has spaces",
            "UPPER",
            "a_b",
            "../escape",
        ] {
            assert!(!validate_id(id), "expected invalid: {id}");
        }
    }

    #[test]
    fn path_helpers() {
        let root = Path::new("/tmp/proj");
        assert_eq!(
            config_path(root),
            PathBuf::from("/tmp/proj/.stencil/config.yaml")
        );
        assert_eq!(
            backup_manifest(root, "b-1"),
            PathBuf::from("/tmp/proj/.stencil/backups/b-1.yaml")
        );
        assert_eq!(rules_path(root), PathBuf::from("/tmp/proj/RULES.md"));
    }

    #[test]
    fn generated_units_include_rules_file() {
        assert!(GENERATED_UNITS.contains(&RULES_FILE));
        assert_eq!(GENERATED_UNITS.len(), 5);
    }
}
