//! Token command - resolve an access token and report how it was obtained

use anyhow::Result;

use banklink_core::{Error, TokenOutcome};

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;

    let outcome = match ctx.token_manager.resolve() {
        Ok(outcome) => outcome,
        Err(Error::NotConfigured) => {
            anyhow::bail!("Not configured. Run 'bl setup' first.")
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!(
            "{}",
            serde_json::json!({ "outcome": outcome.label(), "usable": outcome.token().is_some() })
        );
        return Ok(());
    }

    match outcome {
        TokenOutcome::Valid(_) => output::success("Stored access token is valid"),
        TokenOutcome::Refreshed(_) => output::success("Access token refreshed"),
        TokenOutcome::ReAuthenticated(_) => {
            output::success("Re-authenticated with the stored secret pair")
        }
        TokenOutcome::Failed => {
            output::warning("The aggregator rejected both the refresh token and the secret pair.");
            output::info("Run 'bl setup' to enter new credentials.");
        }
    }
    Ok(())
}
