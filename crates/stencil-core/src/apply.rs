use crate::error::{Result, StencilError};
use crate::io;
use crate::paths;
use crate::resolver::{rename_target, ApplyPlan, Resolution};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Backup
// ---------------------------------------------------------------------------

/// One pre-apply snapshot entry. `pre_image: None` is the tombstone for a
/// path that did not exist before apply — rollback deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    pub path: String,
    pub pre_image: Option<String>,
}

/// Append-only snapshot of everything an apply run is about to change.
/// Captured in full and persisted durably before the first mutation, which
/// is what makes rollback after a partial failure always possible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backup {
    pub id: String,
    pub created_at: chrono::DateTime<Utc>,
    pub entries: Vec<BackupEntry>,
}

impl Backup {
    fn new() -> Self {
        let id = format!(
            "b-{}-{}",
            Utc::now().format("%Y%m%d%H%M%S"),
            &Uuid::new_v4().simple().to_string()[..8]
        );
        Self {
            id,
            created_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    pub fn load(root: &Path, id: &str) -> Result<Self> {
        paths::validate_backup_id(id)?;
        let path = paths::backup_manifest(root, id);
        if !path.exists() {
            return Err(StencilError::UnknownBackup(id.to_string()));
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(serde_yaml::from_str(&data)?)
    }

    fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&paths::backup_manifest(root, &self.id), data.as_bytes())
    }

    /// Backup ids present under `.stencil/backups`, oldest first.
    pub fn list(root: &Path) -> Result<Vec<String>> {
        let dir = paths::backups_dir(root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".yaml") {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// ApplyReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct AppliedEntry {
    pub path: String,
    pub resolution: Resolution,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    /// Absent for dry runs and for plans with nothing to write.
    pub backup_id: Option<String>,
    pub dry_run: bool,
    pub applied: Vec<AppliedEntry>,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Execute a finalized plan against `root`.
///
/// Sequence: capture every pre-image and creation tombstone into one backup,
/// persist it, then execute writes in plan order. The capture phase strictly
/// precedes the first mutation; a failure during capture leaves the tree
/// untouched. A failure mid-write surfaces [`StencilError::Apply`] naming
/// the completed and remaining steps — the caller recovers by invoking
/// [`rollback`] with the backup id, never by re-running blindly.
pub fn apply(root: &Path, plan: &ApplyPlan) -> Result<ApplyReport> {
    let skipped = plan.count(Resolution::Skip);

    if plan.dry_run || plan.is_noop() {
        return Ok(ApplyReport {
            backup_id: None,
            dry_run: plan.dry_run,
            applied: if plan.dry_run {
                planned_actions(plan)
            } else {
                Vec::new()
            },
            skipped,
        });
    }

    // Phase 1: capture. No mutation may happen until the backup is on disk.
    let mut backup = Backup::new();
    for entry in &plan.entries {
        match entry.resolution {
            Resolution::Replace | Resolution::Merge => {
                let pre_image = std::fs::read_to_string(root.join(&entry.path))?;
                backup.entries.push(BackupEntry {
                    path: entry.path.clone(),
                    pre_image: Some(pre_image),
                });
            }
            Resolution::Add => backup.entries.push(BackupEntry {
                path: entry.path.clone(),
                pre_image: None,
            }),
            Resolution::Rename => backup.entries.push(BackupEntry {
                path: rename_target(&entry.path),
                pre_image: None,
            }),
            Resolution::Skip => {}
        }
    }
    backup.save(root)?;

    // Phase 2: execute, sequentially, in plan order.
    let mut applied = Vec::new();
    for (idx, entry) in plan.entries.iter().enumerate() {
        let step = execute_entry(root, entry);
        if let Err(e) = step {
            let remaining = plan.entries[idx..]
                .iter()
                .filter(|r| r.resolution.writes())
                .map(|r| r.path.clone())
                .collect();
            return Err(StencilError::Apply {
                backup_id: backup.id.clone(),
                failed: entry.path.clone(),
                completed: applied,
                remaining,
                reason: e.to_string(),
            });
        }
        if entry.resolution.writes() {
            applied.push(entry.path.clone());
        }
    }

    let applied = plan
        .entries
        .iter()
        .filter(|e| e.resolution.writes())
        .map(|e| AppliedEntry {
            path: e.path.clone(),
            resolution: e.resolution,
        })
        .collect();

    Ok(ApplyReport {
        backup_id: Some(backup.id),
        dry_run: false,
        applied,
        skipped,
    })
}

fn planned_actions(plan: &ApplyPlan) -> Vec<AppliedEntry> {
    plan.entries
        .iter()
        .filter(|e| e.resolution.writes())
        .map(|e| AppliedEntry {
            path: e.path.clone(),
            resolution: e.resolution,
        })
        .collect()
}

fn execute_entry(root: &Path, entry: &crate::resolver::ConflictEntry) -> Result<()> {
    match entry.resolution {
        Resolution::Skip => Ok(()),
        Resolution::Add | Resolution::Replace => {
            io::atomic_write(&root.join(&entry.path), entry.content.as_bytes())
        }
        Resolution::Rename => io::atomic_write(
            &root.join(rename_target(&entry.path)),
            entry.content.as_bytes(),
        ),
        Resolution::Merge => {
            let merge = crate::resolver::merge_strategy_for(&entry.path)
                .ok_or_else(|| StencilError::NoMergeStrategy(entry.path.clone()))?;
            let existing = std::fs::read_to_string(root.join(&entry.path))?;
            let merged = merge(&existing, &entry.content)?;
            io::atomic_write(&root.join(&entry.path), merged.as_bytes())
        }
    }
}

// ---------------------------------------------------------------------------
// Rollback
// ---------------------------------------------------------------------------

/// Restore every path recorded in the backup to its pre-apply state:
/// pre-images verbatim, tombstoned paths deleted. The backup record itself
/// is removed only after every restoration succeeds. On failure, every path
/// is still attempted, and the ones that could not be restored are surfaced
/// for manual intervention — no automatic retry, guessing at recovery of a
/// failed rollback risks further data loss.
pub fn rollback(root: &Path, backup_id: &str) -> Result<()> {
    let backup = Backup::load(root, backup_id)?;

    let mut restored = Vec::new();
    let mut remaining = Vec::new();
    let mut first_error: Option<String> = None;

    for entry in &backup.entries {
        let full = root.join(&entry.path);
        let outcome = match &entry.pre_image {
            Some(content) => io::atomic_write(&full, content.as_bytes()),
            None => match std::fs::remove_file(&full) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            },
        };
        match outcome {
            Ok(()) => restored.push(entry.path.clone()),
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e.to_string());
                }
                remaining.push(entry.path.clone());
            }
        }
    }

    if let Some(reason) = first_error {
        return Err(StencilError::Rollback {
            backup_id: backup_id.to_string(),
            restored,
            remaining,
            reason,
        });
    }

    std::fs::remove_file(paths::backup_manifest(root, backup_id))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
