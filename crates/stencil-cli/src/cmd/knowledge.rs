use crate::output;
use clap::Subcommand;
use serde::Serialize;
use std::path::Path;
use stencil_core::apply;
use stencil_core::knowledge::{
    aggregate, merge_plan, FileSourceAdapter, MergeStrategy, SourceAdapter,
};

#[derive(Subcommand)]
pub enum KnowledgeSubcommand {
    /// Aggregate update feeds under .stencil/updates and merge them into
    /// the knowledge files
    Sync {
        /// conservative, balanced, or aggressive
        #[arg(long, default_value = "balanced")]
        strategy: String,

        /// Compute and display the merge without writing anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Serialize)]
struct SyncReport {
    strategy: MergeStrategy,
    dry_run: bool,
    applied_records: usize,
    deferred: Vec<stencil_core::knowledge::DeferredUpdate>,
    failed_sources: Vec<String>,
    backup_id: Option<String>,
}

pub fn run(root: &Path, subcommand: KnowledgeSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        KnowledgeSubcommand::Sync { strategy, dry_run } => sync(root, &strategy, dry_run, json),
    }
}

fn sync(root: &Path, strategy: &str, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let strategy: MergeStrategy = strategy.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    let adapters: Vec<Box<dyn SourceAdapter>> = FileSourceAdapter::discover(root)?
        .into_iter()
        .map(|a| Box::new(a) as Box<dyn SourceAdapter>)
        .collect();
    let aggregation = aggregate(&adapters);

    let outcome = merge_plan(root, &aggregation.records, strategy, dry_run)?;
    let report = apply::apply(root, &outcome.plan)?;

    if json {
        return output::print_json(&SyncReport {
            strategy,
            dry_run,
            applied_records: outcome.applied_records,
            deferred: outcome.deferred,
            failed_sources: aggregation.failed_sources,
            backup_id: report.backup_id,
        });
    }

    if dry_run {
        println!("dry run — no writes performed");
    }
    println!(
        "{} record(s) applied across {} file(s)",
        outcome.applied_records,
        outcome.plan.entries.len()
    );
    for d in &outcome.deferred {
        println!("  deferred: {} #{} ({}) — {}", d.target, d.section, d.source_id, d.reason);
    }
    for source in &aggregation.failed_sources {
        println!("  warning: source '{source}' failed and was skipped");
    }
    if let Some(id) = &report.backup_id {
        println!("backup: {id}");
    }
    Ok(())
}
