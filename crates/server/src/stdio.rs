use crate::handler::ToolHandler;
use compass_protocol::{ErrorEnvelope, ToolRequest, ToolResponse};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

/// Serve the tool protocol over a line-delimited channel: one JSON request
/// object per input line, one JSON response object per output line.
///
/// A malformed line yields a validation error response with a null id; the
/// loop never dies on bad input.
pub async fn serve<R, W>(handler: Arc<ToolHandler>, input: R, output: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    let mut writer = BufWriter::new(output);

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ToolRequest>(line) {
            Ok(request) => handler.handle(request).await,
            Err(e) => ToolResponse::failure(
                Value::Null,
                ErrorEnvelope::validation(format!("malformed request: {e}")),
            ),
        };

        let json = serde_json::to_string(&response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    log::info!("Input channel closed, shutting down");
    Ok(())
}
