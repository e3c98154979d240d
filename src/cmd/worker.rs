//! Worker side of remote dispatch (`mobilestudio-runner worker`).
//!
//! Reads exactly one JSON request from stdin and writes exactly one JSON
//! response to stdout.

use anyhow::{Context, Result};
use mobilestudio_runner::worker::{WorkerRequest, serve};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub async fn cmd_worker() -> Result<()> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("Failed to read worker request from stdin")?;

    let request: WorkerRequest =
        serde_json::from_str(input.trim()).context("Failed to parse worker request")?;
    let response = serve(request).await;

    let mut payload = serde_json::to_vec(&response).context("Failed to encode worker response")?;
    payload.push(b'\n');
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(&payload)
        .await
        .context("Failed to write worker response")?;
    stdout.flush().await.context("Failed to flush worker response")?;
    Ok(())
}
