use crate::output;
use std::io::BufRead;
use std::path::Path;
use stencil_core::blueprint::ArtifactKind;
use stencil_core::catalog;
use stencil_core::engine;
use stencil_core::render::VarRenderer;
use stencil_core::resolver::{merge_strategy_for, ConflictEntry, ResolvePolicy, Resolution};

pub fn run(
    root: &Path,
    interactive: bool,
    force: bool,
    blueprint: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let catalog = catalog::builtin();

    let outcome = if interactive {
        let mut callback = |entry: &ConflictEntry| prompt_resolution(entry);
        engine::plan_integration(
            root,
            &catalog,
            &VarRenderer,
            ResolvePolicy::Interactive(&mut callback),
            blueprint,
        )?
    } else {
        engine::plan_integration(root, &catalog, &VarRenderer, ResolvePolicy::Automatic, blueprint)?
    };

    if let Some(score) = &outcome.match_score {
        if !score.good_match && !force {
            anyhow::bail!(
                "best blueprint '{}' scores {:.2}, below the match threshold; \
                 pass --force to proceed or pin one with --blueprint",
                score.blueprint,
                score.score
            );
        }
    }

    let report = engine::execute(root, &outcome.plan)?;

    if json {
        return output::print_json(&report);
    }

    if report.applied.is_empty() {
        println!("nothing to do — repository is up to date");
        return Ok(());
    }
    for entry in &report.applied {
        println!("  {:7} {}", entry.resolution.to_string(), entry.path);
    }
    if report.skipped > 0 {
        println!("  {:7} {} unchanged file(s)", "skip", report.skipped);
    }
    if let Some(id) = &report.backup_id {
        println!("\nbackup: {id} (restore with 'stencil rollback {id}')");
    }
    Ok(())
}

/// Per-conflict prompt for the INTERACTIVE policy. Only the resolutions the
/// resolver would accept for this entry are offered; EOF falls back to the
/// safe choice.
fn prompt_resolution(entry: &ConflictEntry) -> Resolution {
    let allow_replace = entry.kind == ArtifactKind::GeneratedAlways;
    let allow_merge = merge_strategy_for(&entry.path).is_some();

    let mut options = vec!["[s]kip", "re[n]ame"];
    if allow_replace {
        options.push("[r]eplace");
    }
    if allow_merge {
        options.push("[m]erge");
    }
    println!("conflict: {} already exists with different content", entry.path);
    println!("  {}: ", options.join("  "));

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        match line.trim().to_lowercase().as_str() {
            "s" | "skip" => return Resolution::Skip,
            "n" | "rename" => return Resolution::Rename,
            "r" | "replace" if allow_replace => return Resolution::Replace,
            "m" | "merge" if allow_merge => return Resolution::Merge,
            other => println!("  unrecognized '{other}', expected one of: {}", options.join("  ")),
        }
    }
    Resolution::Skip
}
