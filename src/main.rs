/*
 * Responsibility
 * - tokio runtime entry
 * - Calls app::run() (no logic here)
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    token_auth_handler::app::run().await
}
