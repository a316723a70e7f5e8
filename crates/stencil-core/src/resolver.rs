use crate::blueprint::ArtifactKind;
use crate::candidate::CandidateFile;
use crate::error::{Result, StencilError};
use crate::fingerprint::RepositoryFingerprint;
use serde::Serialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Path absent on disk — create it.
    Add,
    /// Existing content is identical — no-op. This is what makes re-running
    /// the generator idempotent on an unchanged target.
    Skip,
    /// Overwrite the existing file (pre-image goes to backup first).
    Replace,
    /// Write the candidate alongside the original under a suffixed name;
    /// the original is untouched.
    Rename,
    /// Fold the candidate into the existing file with the file-type-specific
    /// merge function.
    Merge,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Add => "add",
            Resolution::Skip => "skip",
            Resolution::Replace => "replace",
            Resolution::Rename => "rename",
            Resolution::Merge => "merge",
        }
    }

    /// True if applying this resolution writes anything.
    pub fn writes(&self) -> bool {
        !matches!(self, Resolution::Skip)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path a Rename resolution writes to. The original keeps its name.
pub fn rename_target(path: &str) -> String {
    format!("{path}.new")
}

// ---------------------------------------------------------------------------
// ConflictEntry / ApplyPlan
// ---------------------------------------------------------------------------

/// One candidate path with its resolved disposition. Every path in the
/// candidate set has exactly one entry by the time the plan is finalized.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictEntry {
    pub path: String,
    pub existing_hash: Option<String>,
    pub candidate_hash: String,
    pub kind: ArtifactKind,
    pub resolution: Resolution,
    /// Rendered candidate content, carried so apply needs no re-render.
    #[serde(skip)]
    pub content: String,
}

/// Finalized, immutable output of a resolve pass. Constructing it never
/// touches the filesystem, which is what makes dry-run display possible.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyPlan {
    pub entries: Vec<ConflictEntry>,
    pub dry_run: bool,
}

impl ApplyPlan {
    /// True when applying would write nothing.
    pub fn is_noop(&self) -> bool {
        self.entries.iter().all(|e| !e.resolution.writes())
    }

    pub fn count(&self, resolution: Resolution) -> usize {
        self.entries
            .iter()
            .filter(|e| e.resolution == resolution)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Merge strategies
// ---------------------------------------------------------------------------

pub const MANAGED_START: &str = "<!-- stencil:start -->";
pub const MANAGED_END: &str = "<!-- stencil:end -->";

pub type MergeFn = fn(existing: &str, candidate: &str) -> Result<String>;

/// File-type-specific merge function, if one exists. Only markdown has one
/// today: the managed-section splice. Everything else falls back to Rename.
pub fn merge_strategy_for(path: &str) -> Option<MergeFn> {
    match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("md") => Some(merge_managed_section),
        _ => None,
    }
}

/// Replace the managed section of `existing` with the candidate's managed
/// section, leaving user prose outside the markers untouched. If the
/// existing file has no markers yet, the managed section is appended.
fn merge_managed_section(existing: &str, candidate: &str) -> Result<String> {
    let section = extract_managed_section(candidate);
    match crate::io::replace_between_markers(existing, MANAGED_START, MANAGED_END, &section) {
        Some(updated) => Ok(updated),
        None => {
            let mut out = existing.trim_end().to_string();
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&section);
            out.push('\n');
            Ok(out)
        }
    }
}

/// The marked span of a candidate file, or the whole candidate wrapped in
/// markers when the template carries none.
fn extract_managed_section(candidate: &str) -> String {
    let start = candidate.find(MANAGED_START);
    let end = candidate.find(MANAGED_END);
    match (start, end) {
        (Some(s), Some(e)) if e > s => candidate[s..e + MANAGED_END.len()].to_string(),
        _ => format!("{MANAGED_START}\n{}\n{MANAGED_END}", candidate.trim_end()),
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

pub enum ResolvePolicy<'a> {
    /// Apply the default dispositions without prompting (non-interactive/CI).
    Automatic,
    /// Ask the supplied callback for every conflicting path. A returned
    /// resolution outside the allowed set for that entry is a policy
    /// violation and fails the whole resolve.
    Interactive(&'a mut dyn FnMut(&ConflictEntry) -> Resolution),
    /// Compute the full plan, guarantee zero writes downstream.
    DryRun,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Diff the candidate set against the fingerprint and resolve every path.
/// Pure with respect to the filesystem: only the fingerprint's hashes are
/// consulted, no I/O happens here.
pub fn resolve(
    fingerprint: &RepositoryFingerprint,
    candidates: Vec<CandidateFile>,
    mut policy: ResolvePolicy<'_>,
) -> Result<ApplyPlan> {
    let dry_run = matches!(policy, ResolvePolicy::DryRun);
    let mut entries = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        let existing_hash = fingerprint.hash_of(&candidate.path).map(str::to_string);
        let resolution = match existing_hash.as_deref() {
            None => Resolution::Add,
            Some(hash) if hash == candidate.content_hash => Resolution::Skip,
            Some(_) => {
                let default = default_conflict_resolution(&candidate);
                let mut entry = entry_for(&candidate, existing_hash.clone(), default);
                if let ResolvePolicy::Interactive(callback) = &mut policy {
                    let chosen = callback(&entry);
                    validate_choice(&entry, chosen)?;
                    entry.resolution = chosen;
                }
                entries.push(entry);
                continue;
            }
        };
        entries.push(entry_for(&candidate, existing_hash, resolution));
    }

    Ok(ApplyPlan { entries, dry_run })
}

fn entry_for(
    candidate: &CandidateFile,
    existing_hash: Option<String>,
    resolution: Resolution,
) -> ConflictEntry {
    ConflictEntry {
        path: candidate.path.clone(),
        existing_hash,
        candidate_hash: candidate.content_hash.clone(),
        kind: candidate.kind,
        resolution,
        content: candidate.content.clone(),
    }
}

/// Default disposition for a path that exists with differing content.
/// Generated-once files must never be silently replaced: merge when the file
/// type supports it, otherwise write the candidate alongside the original.
fn default_conflict_resolution(candidate: &CandidateFile) -> Resolution {
    match candidate.kind {
        ArtifactKind::GeneratedAlways => Resolution::Replace,
        ArtifactKind::GeneratedOnce => {
            if merge_strategy_for(&candidate.path).is_some() {
                Resolution::Merge
            } else {
                Resolution::Rename
            }
        }
    }
}

fn validate_choice(entry: &ConflictEntry, chosen: Resolution) -> Result<()> {
    let reason = match chosen {
        Resolution::Skip | Resolution::Rename => return Ok(()),
        Resolution::Add => "path already exists",
        Resolution::Replace => match entry.kind {
            ArtifactKind::GeneratedAlways => return Ok(()),
            ArtifactKind::GeneratedOnce => "generated-once files are never replaced",
        },
        Resolution::Merge => {
            if merge_strategy_for(&entry.path).is_some() {
                return Ok(());
            }
            "no merge strategy for this file type"
        }
    };
    Err(StencilError::PolicyViolation {
        path: entry.path.clone(),
        resolution: chosen.as_str().to_string(),
        reason: reason.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
