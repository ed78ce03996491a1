//! CLI `login` command — validate, activate and store an access code.

use anyhow::{bail, Result};

use super::ClientContext;

pub async fn login(ctx: &ClientContext, code: &str) -> Result<()> {
    let code = code.trim().to_uppercase();
    if code.is_empty() {
        bail!("Please enter an access code");
    }

    // Validate first so a bad code never consumes a session.
    let validation = ctx.client.validate_access_code(&code).await?;
    tracing::debug!(mode = ?validation.mode, "access code valid");

    let activation = ctx.client.use_access_code(&code).await?;

    let store = ctx.client.store();
    store.set_access_code(&code);
    store.clear_session_id();

    println!("Access code accepted.");
    if let Some(mode) = activation.mode.as_deref().or(validation.mode.as_deref()) {
        println!("  Mode:               {mode}");
    }
    if let Some(remaining) = activation.sessions_remaining {
        println!("  Sessions remaining: {remaining}");
    }
    println!("Run `hrdai chat` to start talking.");
    Ok(())
}
