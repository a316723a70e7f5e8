use thiserror::Error;

#[derive(Debug, Error)]
pub enum StencilError {
    #[error("not initialized: run 'stencil init'")]
    NotInitialized,

    #[error("blueprint not found: {0}")]
    BlueprintNotFound(String),

    #[error("backup not found: {0}")]
    UnknownBackup(String),

    #[error("invalid backup id '{0}'")]
    InvalidBackupId(String),

    #[error("invalid resolution '{resolution}' for '{path}': {reason}")]
    PolicyViolation {
        path: String,
        resolution: String,
        reason: String,
    },

    #[error("template rendering failed for {} file(s), first: {}", failures.len(), failures.first().map(|f| f.to_string()).unwrap_or_default())]
    Render { failures: Vec<RenderFailure> },

    #[error("no merge strategy for '{0}'")]
    NoMergeStrategy(String),

    #[error(
        "apply failed at '{failed}': {reason} ({} step(s) done, {} remaining); \
         run 'stencil rollback {backup_id}' to restore the pre-apply state",
        completed.len(),
        remaining.len()
    )]
    Apply {
        backup_id: String,
        failed: String,
        completed: Vec<String>,
        remaining: Vec<String>,
        reason: String,
    },

    #[error(
        "rollback of backup '{backup_id}' incomplete: {} path(s) not restored: {}; \
         manual intervention required ({reason})",
        remaining.len(),
        remaining.join(", ")
    )]
    Rollback {
        backup_id: String,
        restored: Vec<String>,
        remaining: Vec<String>,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

/// One file that failed to render, with the renderer's reason.
#[derive(Debug, Clone)]
pub struct RenderFailure {
    pub path: String,
    pub reason: String,
}

impl std::fmt::Display for RenderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

pub type Result<T> = std::result::Result<T, StencilError>;
