//! JSON-RPC message framing
//!
//! Every message is a `Content-Length` header block followed by a UTF-8
//! JSON body of exactly that many bytes.

use crate::error::{Result, SymbolError};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest message body accepted from a server (64 MiB)
pub const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// Read one framed message.
///
/// Returns `Ok(None)` on a clean end of stream between messages. A body that
/// is not valid JSON yields `Serialization` after the body has been consumed,
/// so the stream stays usable.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Value>>
where
    R: AsyncBufRead + Unpin,
{
    let mut content_length: Option<usize> = None;
    let mut headers_seen = false;
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            if headers_seen {
                return Err(SymbolError::Protocol(
                    "stream ended inside a header block".to_string(),
                ));
            }
            return Ok(None);
        }

        let header = line.trim_end_matches(['\r', '\n']);
        if header.is_empty() {
            if headers_seen {
                break;
            }
            continue;
        }
        headers_seen = true;

        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| SymbolError::Protocol(format!("malformed header: {}", header)))?;

        if name.trim().eq_ignore_ascii_case("content-length") {
            let length = value.trim().parse().map_err(|_| {
                SymbolError::Protocol(format!("invalid Content-Length: {}", value.trim()))
            })?;
            content_length = Some(length);
        }
    }

    let length = content_length
        .ok_or_else(|| SymbolError::Protocol("missing Content-Length".to_string()))?;
    if length > MAX_MESSAGE_BYTES {
        return Err(SymbolError::Protocol(format!(
            "Content-Length {} exceeds the {} byte limit",
            length, MAX_MESSAGE_BYTES
        )));
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;

    let message = serde_json::from_slice(&body)?;
    Ok(Some(message))
}

/// Write one framed message and flush
pub async fn write_message<W>(writer: &mut W, message: &Value) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let content = serde_json::to_vec(message)?;
    let header = format!("Content-Length: {}\r\n\r\n", content.len());

    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&content).await?;
    writer.flush().await?;

    Ok(())
}
