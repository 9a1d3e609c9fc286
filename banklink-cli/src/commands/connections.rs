//! Connections command - list, link and delete bank connections

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use banklink_core::Error;

use super::get_context;
use crate::output;

#[derive(Subcommand)]
pub enum ConnectionsCommands {
    /// List bank connections, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start linking a bank; prints the authorisation link
    Link {
        /// Institution id (see 'bl institutions')
        institution_id: String,
        /// Where the bank should send the user after authorising
        #[arg(long)]
        redirect: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a connection and all of its transactions
    Delete {
        /// Connection id
        id: String,
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: ConnectionsCommands) -> Result<()> {
    match command {
        ConnectionsCommands::List { json } => list(json),
        ConnectionsCommands::Link {
            institution_id,
            redirect,
            json,
        } => link(&institution_id, &redirect, json),
        ConnectionsCommands::Delete { id, force, json } => delete(&id, force, json),
    }
}

fn list(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let connections = ctx.connection_service.list_connections()?;

    if json {
        return output::json(&connections);
    }

    if connections.is_empty() {
        println!("No bank connections. Use 'bl connections link' to add one.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["ID", "Institution", "Provider", "Status", "Created"]);
    for conn in &connections {
        table.add_row(vec![
            conn.id.clone(),
            conn.display_name().to_string(),
            conn.provider.clone(),
            conn.status.clone(),
            conn.created_at.format("%Y-%m-%d %H:%M").to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn link(institution_id: &str, redirect: &str, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let Some(gocardless) = &ctx.gocardless else {
        anyhow::bail!(
            "The '{}' provider cannot start bank connections",
            ctx.token_provider.name()
        );
    };

    let started = match gocardless.start_connection(&ctx.connection_service, institution_id, redirect)
    {
        Ok(started) => started,
        Err(Error::NotConfigured) => anyhow::bail!("Not configured. Run 'bl setup' first."),
        Err(e) => return Err(e).context("Failed to start bank connection"),
    };

    if json {
        return output::json(&started);
    }

    output::success(&format!("Connection {} created", started.connection.id));
    println!("Open this link to authorise access at your bank:");
    println!("  {}", started.link.bold());
    Ok(())
}

fn delete(id: &str, force: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let service = &ctx.connection_service;

    let connection = service
        .get_connection(id)?
        .ok_or_else(|| anyhow::anyhow!("Connection '{}' not found", id))?;

    if !force && !json {
        let count = service.count_transactions(id)?;
        println!(
            "\n{}",
            format!(
                "This will delete '{}' and {} transaction(s).",
                connection.display_name(),
                count
            )
            .yellow()
        );
        if !Confirm::new()
            .with_prompt("Are you sure?")
            .default(false)
            .interact()?
        {
            println!("{}\n", "Cancelled".dimmed());
            return Ok(());
        }
    }

    let report = match service.delete_connection(id) {
        Ok(report) => report,
        Err(Error::PartialDelete {
            connection_id,
            failed_transaction_ids,
        }) => {
            anyhow::bail!(
                "Connection {} could not be deleted; {} transaction(s) also remain: {}",
                connection_id,
                failed_transaction_ids.len(),
                failed_transaction_ids.join(", ")
            )
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        return output::json(&report);
    }

    output::success(&format!(
        "Deleted connection {} and {} transaction(s)",
        report.connection_id, report.transactions_deleted
    ));
    if !report.is_complete() {
        output::warning(&format!(
            "{} transaction(s) could not be deleted: {}",
            report.transactions_failed(),
            report.failed_transaction_ids.join(", ")
        ));
        output::info("Run 'bl doctor --fix' to clean them up later.");
    }
    Ok(())
}
