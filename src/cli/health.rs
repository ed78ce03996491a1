//! CLI `health` command — probe the API before entering a code.

use anyhow::Result;

use super::ClientContext;

pub async fn health(ctx: &ClientContext) -> Result<()> {
    println!("API:     {}", ctx.client.base_url());
    match ctx.client.check_health().await {
        Ok(status) if status.is_ok() => println!("Status:  connected"),
        Ok(status) => println!("Status:  degraded ({})", status.status),
        Err(e) => {
            println!("Status:  unavailable ({e})");
            println!("Cannot connect to the HrdAI API. Please try again later.");
        }
    }
    Ok(())
}
