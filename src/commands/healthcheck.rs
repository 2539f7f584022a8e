//! Healthcheck command, for container and systemd health probes.

use anyhow::Result;

use crate::health;

/// Query `url`; an unhealthy instance makes the command fail.
pub async fn run(url: &str) -> Result<()> {
    health::query(url).await?;
    println!("OK");
    Ok(())
}
