use crate::output;
use clap::Subcommand;
use std::path::Path;
use stencil_core::apply::Backup;

#[derive(Subcommand)]
pub enum BackupSubcommand {
    /// List backups available for rollback, oldest first
    List,
}

pub fn run(root: &Path, subcommand: BackupSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        BackupSubcommand::List => list(root, json),
    }
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let ids = Backup::list(root)?;

    if json {
        return output::print_json(&ids);
    }

    if ids.is_empty() {
        println!("no backups");
        return Ok(());
    }
    let mut rows = Vec::new();
    for id in &ids {
        let backup = Backup::load(root, id)?;
        rows.push(vec![
            id.clone(),
            backup.created_at.to_rfc3339(),
            backup.entries.len().to_string(),
        ]);
    }
    output::print_table(&["id", "created", "paths"], rows);
    Ok(())
}
