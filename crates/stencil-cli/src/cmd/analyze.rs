use crate::output;
use std::path::Path;
use stencil_core::catalog;
use stencil_core::engine;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let analysis = engine::analyze(root, &catalog::builtin())?;

    if json {
        return output::print_json(&analysis);
    }

    println!("scenario: {}", analysis.scenario);
    if !analysis.initialized {
        println!("config:   none (run 'stencil init' to declare the stack)");
    }
    if !analysis.stack_markers.is_empty() {
        println!("inferred: {}", analysis.stack_markers.join(", "));
    }
    println!();

    let rows = analysis
        .matches
        .iter()
        .map(|m| {
            vec![
                m.blueprint.clone(),
                format!("{:.2}", m.score),
                m.matched.join(", "),
                m.missing.join(", "),
            ]
        })
        .collect();
    output::print_table(&["blueprint", "score", "matched", "missing"], rows);

    if let Some(best) = analysis.matches.first() {
        if !best.good_match {
            println!("\nno good match: best score {:.2} is below the threshold", best.score);
        }
    }
    Ok(())
}
