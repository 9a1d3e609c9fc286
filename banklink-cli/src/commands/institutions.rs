//! Institutions command - list banks for a country

use anyhow::Result;
use colored::Colorize;

use banklink_core::Error;

use super::get_context;
use crate::output;

pub fn run(country: &str, search: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context()?;

    let mut institutions = match ctx.institution_catalog.list_institutions(country) {
        Ok(list) => list,
        Err(Error::NotConfigured) => anyhow::bail!("Not configured. Run 'bl setup' first."),
        Err(e) => return Err(e.into()),
    };

    if let Some(needle) = search.map(str::to_lowercase) {
        institutions.retain(|i| i.name.to_lowercase().contains(&needle));
    }

    if json {
        return output::json(&institutions);
    }

    if institutions.is_empty() {
        println!("No institutions found.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Name", "ID", "BIC", "History (days)"]);
    for inst in &institutions {
        table.add_row(vec![
            inst.name.clone(),
            inst.id.clone(),
            inst.bic.clone().unwrap_or_default(),
            inst.transaction_total_days
                .map(|d| d.to_string())
                .unwrap_or_default(),
        ]);
    }
    println!("{}", table);
    println!("{}", format!("{} institution(s)", institutions.len()).dimmed());

    Ok(())
}
