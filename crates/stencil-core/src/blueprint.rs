use crate::error::Result;
use crate::fingerprint::RepositoryFingerprint;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Stack descriptor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackDescriptor {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub frameworks: Vec<String>,
}

impl StackDescriptor {
    pub fn new(language: impl Into<String>, frameworks: &[&str]) -> Self {
        Self {
            language: language.into(),
            frameworks: frameworks.iter().map(|f| (*f).to_string()).collect(),
        }
    }

    /// Normalized feature set: language plus frameworks, lowercased.
    pub fn features(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        if !self.language.trim().is_empty() {
            set.insert(self.language.trim().to_lowercase());
        }
        for f in &self.frameworks {
            if !f.trim().is_empty() {
                set.insert(f.trim().to_lowercase());
            }
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Blueprint / catalog
// ---------------------------------------------------------------------------

/// Whether a generated file may be regenerated over, or is created once and
/// then belongs to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    GeneratedAlways,
    GeneratedOnce,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintFile {
    /// Repository-relative output path.
    pub path: String,
    /// Template text, rendered by the template renderer.
    pub template: String,
    pub kind: ArtifactKind,
}

/// A named, versioned template bundle. Catalog entries are read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub id: String,
    pub version: String,
    pub stack: StackDescriptor,
    pub files: Vec<BlueprintFile>,
}

/// Explicit, injected catalog — never a process-wide singleton, so tests and
/// embedders can substitute fixture catalogs freely. Declaration order is
/// meaningful: it is the tie-breaker for equal match scores.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlueprintCatalog {
    pub blueprints: Vec<Blueprint>,
}

impl BlueprintCatalog {
    pub fn get(&self, id: &str) -> Option<&Blueprint> {
        self.blueprints.iter().find(|b| b.id == id)
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Scores below this are reported but flagged; the caller decides whether to
/// proceed with the closest match or abort.
pub const MIN_MATCH_SCORE: f64 = 0.2;

/// Weight of a stack feature inferred from repository markers, relative to
/// an explicit declaration.
const INFERRED_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, Serialize)]
pub struct MatchScore {
    pub blueprint: String,
    pub score: f64,
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    pub good_match: bool,
}

/// Rank every catalog blueprint against the declared stack union the
/// prober's inferred markers. Declared features carry full weight, inferred
/// ones half; the score is a weighted Jaccard index in [0, 1]. The sort is
/// stable, so ties keep catalog declaration order.
pub fn match_blueprints(
    fingerprint: &RepositoryFingerprint,
    declared: &StackDescriptor,
    catalog: &BlueprintCatalog,
) -> Vec<MatchScore> {
    let mut target: BTreeMap<String, f64> = BTreeMap::new();
    for marker in &fingerprint.stack_markers {
        target.insert(marker.to_lowercase(), INFERRED_WEIGHT);
    }
    // Explicit declarations are authoritative and override inferred weight.
    for feature in declared.features() {
        target.insert(feature, 1.0);
    }

    let mut scores: Vec<MatchScore> = catalog
        .blueprints
        .iter()
        .map(|bp| score_one(bp, &target))
        .collect();
    scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scores
}

fn score_one(bp: &Blueprint, target: &BTreeMap<String, f64>) -> MatchScore {
    let bp_features = bp.stack.features();
    let mut intersection = 0.0;
    let mut union = 0.0;
    let mut matched = Vec::new();
    let mut missing = Vec::new();

    for (feature, weight) in target {
        union += weight;
        if bp_features.contains(feature) {
            intersection += weight;
            matched.push(feature.clone());
        }
    }
    for feature in &bp_features {
        if !target.contains_key(feature) {
            union += 1.0;
            missing.push(feature.clone());
        }
    }

    let score = if union > 0.0 { intersection / union } else { 0.0 };
    MatchScore {
        blueprint: bp.id.clone(),
        score,
        matched,
        missing,
        good_match: score >= MIN_MATCH_SCORE,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
