//! Setup command - validate and store aggregator credentials

use std::io::BufRead;

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::{Input, Password};

use banklink_core::Error;

use super::get_context;

/// Secret key from the flag, piped stdin, or an interactive prompt
fn read_secret_key(flag: Option<String>) -> Result<String> {
    if let Some(key) = flag {
        return Ok(key);
    }
    if atty::isnt(atty::Stream::Stdin) {
        let mut line = String::new();
        std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read secret key from stdin")?;
        return Ok(line.trim().to_string());
    }
    Ok(Password::new().with_prompt("Secret key").interact()?)
}

pub fn run(secret_id: Option<String>, secret_key: Option<String>, json: bool) -> Result<()> {
    let ctx = get_context()?;

    let secret_id = match secret_id {
        Some(id) => id,
        None => Input::new().with_prompt("Secret id").interact_text()?,
    };
    let secret_key = read_secret_key(secret_key)?;

    match ctx.configuration_service.save(&secret_id, &secret_key) {
        Ok(status) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{} Aggregator credentials saved", "Success!".green());
                println!("Run 'bl institutions --country <CC>' to find your bank.");
            }
            Ok(())
        }
        Err(Error::InvalidCredentials(_)) => {
            anyhow::bail!("The aggregator rejected these credentials. Nothing was saved.")
        }
        Err(e) => Err(e).context("Failed to save credentials"),
    }
}
