//! CLI `end` and `logout` commands.

use anyhow::Result;

use super::ClientContext;

/// End the stored session and forget its id.
pub async fn end(ctx: &ClientContext, persist: bool) -> Result<()> {
    let store = ctx.client.store();
    let Some(session_id) = store.session_id() else {
        println!("No active session.");
        return Ok(());
    };

    let outcome = ctx.client.end_session(&session_id, persist).await?;
    store.clear_session_id();

    if outcome.success {
        println!("Session {session_id} ended.");
        println!("  Episodes created: {}", outcome.episodes_created.unwrap_or(0));
        println!("  Topics created:   {}", outcome.topics_created.unwrap_or(0));
        println!("  Topics updated:   {}", outcome.topics_updated.unwrap_or(0));
    } else {
        println!(
            "Session {session_id} closed without persisting: {}",
            outcome.error.as_deref().unwrap_or("no reason given")
        );
    }
    Ok(())
}

/// End the stored session (best effort) and clear both credentials.
pub async fn logout(ctx: &ClientContext) -> Result<()> {
    let store = ctx.client.store();
    if let Some(session_id) = store.session_id() {
        if let Err(e) = ctx.client.end_session(&session_id, true).await {
            tracing::warn!(error = %e, "failed to end session during logout");
        }
    }
    store.clear_session_id();
    store.clear_access_code();
    println!("Logged out.");
    Ok(())
}
