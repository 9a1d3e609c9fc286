//! Remove command - delete stored aggregator credentials

use anyhow::Result;
use colored::Colorize;
use dialoguer::Confirm;

use super::get_context;

pub fn run(force: bool) -> Result<()> {
    let ctx = get_context()?;

    if !ctx.configuration_service.status()?.is_configured {
        println!("{}", "No aggregator credentials stored".dimmed());
        return Ok(());
    }

    if !force {
        println!("\n{}", "This will remove your aggregator credentials and tokens.".yellow());
        println!("{}\n", "Bank connections and their transactions are kept.".dimmed());

        if !Confirm::new()
            .with_prompt("Are you sure?")
            .default(false)
            .interact()?
        {
            println!("{}\n", "Cancelled".dimmed());
            return Ok(());
        }
    }

    ctx.configuration_service.remove()?;
    println!("\n{} Aggregator credentials removed\n", "✓".green());

    Ok(())
}
