use crate::blueprint::StackDescriptor;
use crate::error::{Result, StencilError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ProjectInfo
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// GeneratorConfig (top-level, .stencil/config.yaml)
// ---------------------------------------------------------------------------

/// User-declared input to a generation run. This file is the authoritative
/// stack declaration; it is never produced as a candidate file and never
/// overwritten by apply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectInfo,
    #[serde(default)]
    pub stack: StackDescriptor,
    /// Pinned blueprint id; when absent the matcher picks the best fit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

fn default_version() -> u32 {
    1
}

impl GeneratorConfig {
    pub fn new(project_name: impl Into<String>, stack: StackDescriptor) -> Self {
        Self {
            version: 1,
            project: ProjectInfo {
                name: project_name.into(),
                description: None,
            },
            stack,
            blueprint: None,
            variables: BTreeMap::new(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        Self::load_optional(root)?.ok_or(StencilError::NotInitialized)
    }

    /// Like [`load`], but absence is `None` instead of an error — analysis
    /// commands work on repositories that were never initialized.
    pub fn load_optional(root: &Path) -> Result<Option<Self>> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_yaml::from_str(&data)?))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Variables handed to the template renderer. Reserved names are derived
    /// from the config and win over user-supplied duplicates.
    pub fn template_vars(&self) -> BTreeMap<String, String> {
        let mut vars = self.variables.clone();
        vars.insert("project_name".to_string(), self.project.name.clone());
        vars.insert(
            "project_description".to_string(),
            self.project.description.clone().unwrap_or_default(),
        );
        vars.insert("language".to_string(), self.stack.language.clone());
        vars.insert("frameworks".to_string(), self.stack.frameworks.join(", "));
        vars
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.project.name.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "project.name is empty".to_string(),
            });
        }

        if self.stack.language.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "stack.language is empty — matching will rely on inferred markers only"
                    .to_string(),
            });
        }

        let mut seen = std::collections::BTreeSet::new();
        for fw in &self.stack.frameworks {
            if !seen.insert(fw.trim().to_lowercase()) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("duplicate framework '{}' in stack.frameworks", fw),
                });
            }
        }

        for key in self.variables.keys() {
            let ident = !key.is_empty()
                && key
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !ident {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!(
                        "variable '{}' is not a valid template name (use letters, digits, '_')",
                        key
                    ),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
