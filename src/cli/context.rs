use anyhow::{Context, Result};

use super::ClientContext;

/// Print the backend's context object as pretty JSON.
pub async fn context(ctx: &ClientContext, message: Option<&str>) -> Result<()> {
    let value = ctx.client.get_context(message).await?;
    let pretty = serde_json::to_string_pretty(&value).context("failed to format context")?;
    println!("{pretty}");
    Ok(())
}
