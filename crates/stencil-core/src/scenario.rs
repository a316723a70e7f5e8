use crate::fingerprint::RepositoryFingerprint;
use crate::marker::SCHEMA_VERSION;
use crate::paths;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// How far a target repository already matches the expected generated
/// structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Nothing recognizable yet — generate from scratch.
    Fresh,
    /// Only the rules file exists.
    Minimal,
    /// Some generated structure exists but it is incomplete or inconsistent.
    Partial,
    /// A marker from an older schema version — upgrade in place.
    Upgrade,
    /// Current structure and marker — nothing to do.
    Complete,
}

impl Scenario {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Fresh => "fresh",
            Scenario::Minimal => "minimal",
            Scenario::Partial => "partial",
            Scenario::Upgrade => "upgrade",
            Scenario::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Classify a fingerprint. Pure, deterministic, no I/O.
///
/// Rules are evaluated in order, first match wins. UPGRADE is checked before
/// PARTIAL on purpose: a stale-but-complete structure should be upgraded in
/// place, not treated as missing pieces.
pub fn classify(fp: &RepositoryFingerprint) -> Scenario {
    let present = fp.generated_units_present();
    let total = paths::GENERATED_UNITS.len();
    // A marker written by a newer generator counts as current: an older
    // binary must not tear down structure it does not understand.
    let marker_current = fp
        .marker
        .as_ref()
        .is_some_and(|m| m.schema_version >= SCHEMA_VERSION);

    // 1. Untouched target: no marker, no sources, no generated structure.
    if fp.marker.is_none() && present == 0 && !fp.has_source_files() {
        return Scenario::Fresh;
    }

    // 2. Only the rules file, nothing else generator-related.
    if fp.marker.is_none() && present == 1 && fp.contains(paths::RULES_FILE) {
        return Scenario::Minimal;
    }

    // 3. Stale marker wins over structural completeness.
    if fp.marker.as_ref().is_some_and(|m| m.is_stale()) {
        return Scenario::Upgrade;
    }

    // 4. Generated structure that is incomplete, or complete without a
    //    current marker, is inconsistent either way.
    if present > 0 && !(present == total && marker_current) {
        return Scenario::Partial;
    }

    // 5. Everything present and the marker matches.
    if present == total && marker_current {
        return Scenario::Complete;
    }

    // Occupied repository with no generated structure at all: from the
    // generator's point of view this is still a fresh target.
    Scenario::Fresh
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
