//! Doctor command - find and purge transactions without a connection

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(fix: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.connection_service;

    if fix {
        let report = service.purge_orphaned_transactions()?;
        if json {
            return output::json(&report);
        }
        if report.found == 0 {
            output::success("No orphaned transactions");
            return Ok(());
        }
        output::success(&format!("Deleted {} orphaned transaction(s)", report.deleted));
        if !report.failed_transaction_ids.is_empty() {
            output::warning(&format!(
                "{} could not be deleted: {}",
                report.failed_transaction_ids.len(),
                report.failed_transaction_ids.join(", ")
            ));
            std::process::exit(1);
        }
        return Ok(());
    }

    let orphans = service.find_orphaned_transactions()?;
    if json {
        return output::json(&orphans);
    }

    if orphans.is_empty() {
        output::success("No orphaned transactions");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Transaction", "Missing connection"]);
    for orphan in &orphans {
        table.add_row(vec![orphan.id.clone(), orphan.bank_connection_id.clone()]);
    }
    println!("{}", table);
    println!(
        "{}",
        format!("{} orphaned transaction(s). Run 'bl doctor --fix' to delete them.", orphans.len())
            .yellow()
    );
    Ok(())
}
