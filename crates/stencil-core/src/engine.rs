use crate::apply::{self, ApplyReport};
use crate::blueprint::{match_blueprints, ArtifactKind, BlueprintCatalog, MatchScore};
use crate::candidate::{build_candidates, CandidateFile};
use crate::config::GeneratorConfig;
use crate::error::{Result, StencilError};
use crate::fingerprint::{probe, RepositoryFingerprint};
use crate::marker::GeneratorMarker;
use crate::paths;
use crate::render::TemplateRenderer;
use crate::resolver::{resolve, ApplyPlan, ResolvePolicy};
use crate::scenario::{classify, Scenario};
use serde::Serialize;
use std::path::Path;

// ---------------------------------------------------------------------------
// Analysis (read-only)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Analysis {
    pub scenario: Scenario,
    pub matches: Vec<MatchScore>,
    pub stack_markers: Vec<String>,
    pub initialized: bool,
}

/// Scenario plus ranked blueprint report. Performs no writes; works on
/// repositories that were never initialized (the declared stack is then
/// empty and matching leans on inferred markers alone).
pub fn analyze(root: &Path, catalog: &BlueprintCatalog) -> Result<Analysis> {
    let fingerprint = probe(root)?;
    let config = GeneratorConfig::load_optional(root)?;
    let declared = config.as_ref().map(|c| c.stack.clone()).unwrap_or_default();
    let matches = match_blueprints(&fingerprint, &declared, catalog);

    Ok(Analysis {
        scenario: classify(&fingerprint),
        stack_markers: fingerprint.stack_markers.iter().cloned().collect(),
        matches,
        initialized: config.is_some(),
    })
}

// ---------------------------------------------------------------------------
// Integration planning
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct PlanOutcome {
    pub scenario: Scenario,
    pub blueprint_id: String,
    /// Present when the blueprint was picked by matching (not pinned).
    pub match_score: Option<MatchScore>,
    pub plan: ApplyPlan,
}

/// The full pipeline short of mutation:
/// probe → classify → match → build candidates → resolve.
///
/// The marker file rides the plan as an ordinary generated-always candidate,
/// appended last so stamping it is the final write of a successful apply and
/// so rollback covers it like everything else.
pub fn plan_integration(
    root: &Path,
    catalog: &BlueprintCatalog,
    renderer: &dyn TemplateRenderer,
    policy: ResolvePolicy<'_>,
    pinned: Option<&str>,
) -> Result<PlanOutcome> {
    let fingerprint = probe(root)?;
    let scenario = classify(&fingerprint);
    let config = GeneratorConfig::load(root)?;

    let (blueprint_id, match_score) =
        select_blueprint(&fingerprint, &config, catalog, pinned)?;
    let blueprint = catalog
        .get(&blueprint_id)
        .ok_or_else(|| StencilError::BlueprintNotFound(blueprint_id.clone()))?;

    let mut candidates = build_candidates(blueprint, &config, renderer)?;
    let marker = GeneratorMarker::new(blueprint.id.as_str());
    candidates.push(CandidateFile::new(
        paths::MARKER_FILE,
        marker.to_yaml()?,
        ArtifactKind::GeneratedAlways,
    ));

    let plan = resolve(&fingerprint, candidates, policy)?;

    Ok(PlanOutcome {
        scenario,
        blueprint_id,
        match_score,
        plan,
    })
}

/// Blueprint selection precedence: explicit argument, then the config pin,
/// then the best-scoring catalog entry. A below-threshold best match is
/// still returned — with its score, so the caller can decide to abort.
fn select_blueprint(
    fingerprint: &RepositoryFingerprint,
    config: &GeneratorConfig,
    catalog: &BlueprintCatalog,
    pinned: Option<&str>,
) -> Result<(String, Option<MatchScore>)> {
    if let Some(id) = pinned.or(config.blueprint.as_deref()) {
        if catalog.get(id).is_none() {
            return Err(StencilError::BlueprintNotFound(id.to_string()));
        }
        return Ok((id.to_string(), None));
    }

    let scores = match_blueprints(fingerprint, &config.stack, catalog);
    let best = scores
        .into_iter()
        .next()
        .ok_or_else(|| StencilError::BlueprintNotFound("<empty catalog>".to_string()))?;
    Ok((best.blueprint.clone(), Some(best)))
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Hand a finalized plan to the backup & apply engine. Dry-run plans pass
/// through untouched (zero writes).
pub fn execute(root: &Path, plan: &ApplyPlan) -> Result<ApplyReport> {
    apply::apply(root, plan)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::StackDescriptor;
    use crate::catalog;
    use crate::render::VarRenderer;
    use crate::resolver::Resolution;
    use tempfile::TempDir;

    fn init(dir: &TempDir, language: &str, frameworks: &[&str]) {
        GeneratorConfig::new("demo", StackDescriptor::new(language, frameworks))
            .save(dir.path())
            .unwrap();
    }

    #[test]
    fn analyze_uninitialized_fresh_repo() {
        let dir = TempDir::new().unwrap();
        let analysis = analyze(dir.path(), &catalog::builtin()).unwrap();
        assert_eq!(analysis.scenario, Scenario::Fresh);
        assert!(!analysis.initialized);
        assert_eq!(analysis.matches.len(), 3);
    }

    #[test]
    fn full_pipeline_apply_then_idempotent_reapply() {
        let dir = TempDir::new().unwrap();
        init(&dir, "rust", &["clap", "serde"]);

        let outcome = plan_integration(
            dir.path(),
            &catalog::builtin(),
            &VarRenderer,
            ResolvePolicy::Automatic,
            None,
        )
        .unwrap();
        assert_eq!(outcome.blueprint_id, "rust-cli");
        assert!(outcome.match_score.as_ref().unwrap().good_match);

        execute(dir.path(), &outcome.plan).unwrap();
        assert!(dir.path().join("RULES.md").exists());
        assert!(dir.path().join(".stencil/generator.yaml").exists());

        // Second pass sees only skips: the plan is idempotent.
        let again = plan_integration(
            dir.path(),
            &catalog::builtin(),
            &VarRenderer,
            ResolvePolicy::Automatic,
            None,
        )
        .unwrap();
        assert!(again.plan.entries.iter().all(|e| e.resolution == Resolution::Skip));
        assert_eq!(again.scenario, Scenario::Complete);
    }

    #[test]
    fn pinned_blueprint_skips_matching() {
        let dir = TempDir::new().unwrap();
        init(&dir, "rust", &[]);

        let outcome = plan_integration(
            dir.path(),
            &catalog::builtin(),
            &VarRenderer,
            ResolvePolicy::DryRun,
            Some("node-react"),
        )
        .unwrap();
        assert_eq!(outcome.blueprint_id, "node-react");
        assert!(outcome.match_score.is_none());
    }

    #[test]
    fn unknown_pinned_blueprint_fails() {
        let dir = TempDir::new().unwrap();
        init(&dir, "rust", &[]);

        let err = plan_integration(
            dir.path(),
            &catalog::builtin(),
            &VarRenderer,
            ResolvePolicy::DryRun,
            Some("no-such-bp"),
        )
        .unwrap_err();
        assert!(matches!(err, StencilError::BlueprintNotFound(_)));
    }

    #[test]
    fn plan_without_config_fails() {
        let dir = TempDir::new().unwrap();
        let err = plan_integration(
            dir.path(),
            &catalog::builtin(),
            &VarRenderer,
            ResolvePolicy::DryRun,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, StencilError::NotInitialized));
    }

    #[test]
    fn dry_run_pipeline_writes_nothing() {
        let dir = TempDir::new().unwrap();
        init(&dir, "python", &["fastapi"]);

        let outcome = plan_integration(
            dir.path(),
            &catalog::builtin(),
            &VarRenderer,
            ResolvePolicy::DryRun,
            None,
        )
        .unwrap();
        execute(dir.path(), &outcome.plan).unwrap();

        assert!(!dir.path().join("RULES.md").exists());
        assert!(!dir.path().join(".stencil/generator.yaml").exists());
        // Only the config we wrote ourselves exists under .stencil.
        let entries: Vec<_> = std::fs::read_dir(dir.path().join(".stencil"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["config.yaml"]);
    }

    #[test]
    fn user_edits_survive_reapply_via_merge() {
        let dir = TempDir::new().unwrap();
        init(&dir, "rust", &["clap", "serde"]);

        let outcome = plan_integration(
            dir.path(),
            &catalog::builtin(),
            &VarRenderer,
            ResolvePolicy::Automatic,
            None,
        )
        .unwrap();
        execute(dir.path(), &outcome.plan).unwrap();

        // User appends prose outside the managed block.
        let rules_path = dir.path().join("RULES.md");
        let mut rules = std::fs::read_to_string(&rules_path).unwrap();
        rules.push_str("\n## Team additions\n\nAlways squash merge.\n");
        std::fs::write(&rules_path, &rules).unwrap();

        let outcome = plan_integration(
            dir.path(),
            &catalog::builtin(),
            &VarRenderer,
            ResolvePolicy::Automatic,
            None,
        )
        .unwrap();
        let rules_entry = outcome
            .plan
            .entries
            .iter()
            .find(|e| e.path == "RULES.md")
            .unwrap();
        assert_eq!(rules_entry.resolution, Resolution::Merge);

        execute(dir.path(), &outcome.plan).unwrap();
        let merged = std::fs::read_to_string(&rules_path).unwrap();
        assert!(merged.contains("Always squash merge."));
        assert!(merged.contains("Generated baseline"));
    }
}
