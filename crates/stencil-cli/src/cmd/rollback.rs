use crate::output;
use serde::Serialize;
use std::path::Path;
use stencil_core::apply;

#[derive(Serialize)]
struct RollbackReport<'a> {
    backup_id: &'a str,
    restored: bool,
}

pub fn run(root: &Path, backup_id: &str, json: bool) -> anyhow::Result<()> {
    apply::rollback(root, backup_id)?;

    if json {
        return output::print_json(&RollbackReport {
            backup_id,
            restored: true,
        });
    }
    println!("restored pre-apply state from backup {backup_id}");
    Ok(())
}
