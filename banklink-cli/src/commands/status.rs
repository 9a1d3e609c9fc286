//! Status command - show configuration status and connection summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.configuration_service.status()?;
    let connections = ctx.connection_service.list_connections()?;
    let linked = connections.iter().filter(|c| c.is_linked()).count();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "provider": ctx.token_provider.name(),
                "isConfigured": status.is_configured,
                "hasCredentials": status.has_credentials,
                "connections": connections.len(),
                "linkedConnections": linked,
            }))?
        );
        return Ok(());
    }

    println!("{}", "Banklink Status".bold());
    println!();

    let yes_no = |value: bool| (if value { "yes".green() } else { "no".red() }).to_string();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.add_row(vec!["Provider".to_string(), ctx.token_provider.name().to_string()]);
    table.add_row(vec!["Configured".to_string(), yes_no(status.is_configured)]);
    table.add_row(vec!["Credentials stored".to_string(), yes_no(status.has_credentials)]);
    table.add_row(vec!["Connections".to_string(), connections.len().to_string()]);
    table.add_row(vec!["Linked".to_string(), linked.to_string()]);
    println!("{}", table);

    if !status.is_configured {
        println!();
        println!("Run 'bl setup' to store your aggregator credentials.");
    }

    Ok(())
}
