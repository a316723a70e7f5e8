use crate::output;
use serde::Serialize;
use std::path::Path;
use stencil_core::catalog;
use stencil_core::engine::{self, PlanOutcome};
use stencil_core::render::VarRenderer;
use stencil_core::resolver::ResolvePolicy;

#[derive(Serialize)]
struct PreviewReport<'a> {
    scenario: String,
    blueprint: &'a str,
    plan: &'a stencil_core::resolver::ApplyPlan,
}

pub fn run(root: &Path, blueprint: Option<&str>, json: bool) -> anyhow::Result<()> {
    let outcome = engine::plan_integration(
        root,
        &catalog::builtin(),
        &VarRenderer,
        ResolvePolicy::DryRun,
        blueprint,
    )?;

    if json {
        return output::print_json(&PreviewReport {
            scenario: outcome.scenario.to_string(),
            blueprint: &outcome.blueprint_id,
            plan: &outcome.plan,
        });
    }

    print_plan(&outcome);
    Ok(())
}

pub fn print_plan(outcome: &PlanOutcome) {
    println!("scenario:  {}", outcome.scenario);
    println!("blueprint: {}", outcome.blueprint_id);
    if let Some(score) = &outcome.match_score {
        let flag = if score.good_match { "" } else { "  (below threshold)" };
        println!("match:     {:.2}{flag}", score.score);
    }
    println!();

    let rows = outcome
        .plan
        .entries
        .iter()
        .map(|e| {
            vec![
                e.resolution.to_string(),
                e.path.clone(),
                match e.kind {
                    stencil_core::blueprint::ArtifactKind::GeneratedOnce => "once".to_string(),
                    stencil_core::blueprint::ArtifactKind::GeneratedAlways => "always".to_string(),
                },
            ]
        })
        .collect();
    output::print_table(&["action", "path", "kind"], rows);

    if outcome.plan.is_noop() {
        println!("\nnothing to do — repository is up to date");
    }
}
