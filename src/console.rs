//! Line-based control console.
//!
//! Reads one command per line (`select <iface>`, `usage`, `interfaces`,
//! `threshold <bytes>`, `quit`) and answers each with one JSON line:
//! `{"ok": <reply>}` or `{"error": {"kind": ..., "message": ...}}`.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::commands::{parse_command, Command, CoordinatorHandle};
use crate::error::AppError;

/// Serve commands until `quit` or end of input.
pub async fn run_console<R, W>(
    handle: CoordinatorHandle,
    mut reader: R,
    mut writer: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = match decode_line(&buf) {
            Ok(line) => line,
            Err(e) => {
                write_line(&mut writer, &serde_json::json!({ "error": e })).await?;
                continue;
            }
        };

        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                write_line(&mut writer, &serde_json::json!({ "error": e })).await?;
                continue;
            }
        };

        // Shutdown is left to the caller so it happens exactly once.
        if command == Command::Shutdown {
            tracing::info!("Quit requested from console");
            return Ok(());
        }

        let response = match handle.execute(command).await {
            Ok(reply) => serde_json::json!({ "ok": reply }),
            Err(e) => serde_json::json!({ "error": e }),
        };
        write_line(&mut writer, &response).await?;
    }

    tracing::info!("Console input closed");
    Ok(())
}

/// Strip the line terminator and require UTF-8.
fn decode_line(raw: &[u8]) -> Result<&str, AppError> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    std::str::from_utf8(raw)
        .map_err(|e| AppError::InvalidInput(format!("Command line is not valid UTF-8: {e}")))
}

async fn write_line<W>(writer: &mut W, value: &serde_json::Value) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
