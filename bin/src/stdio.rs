//! JSON lines over stdin/stdout
//!
//! Each line on stdin is one [`Inbound`] message. Every [`Outbound`] message
//! is written to stdout as a single line.
use staging_core::{
    anyhow::{Context, Result},
    tokio::{
        io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
        sync::mpsc,
    },
    tracing::{debug, trace, warn},
    transport::{Inbound, Outbound},
};

/// Forward messages from `reader` until it reaches EOF or the server goes away.
/// Lines that do not decode are logged and skipped.
pub(crate) async fn read_inbound<R>(reader: R, tx: mpsc::Sender<Inbound>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let msg = match serde_json::from_str::<Inbound>(line) {
            Ok(msg) => msg,
            Err(err) => {
                warn!(?err, ?line, "malformed inbound message, skipping");
                continue;
            }
        };
        trace!(?msg, "decoded inbound message");
        if tx.send(msg).await.is_err() {
            debug!("server stopped, no longer reading stdin");
            return Ok(());
        }
    }
    debug!("stdin closed");
    Ok(())
}

/// Write every message from `rx` to `writer`, one JSON object per line
pub(crate) async fn write_outbound<W>(mut writer: W, mut rx: mpsc::Receiver<Outbound>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = rx.recv().await {
        let mut buf = serde_json::to_vec(&msg)?;
        buf.push(b'\n');
        writer
            .write_all(&buf)
            .await
            .context("failed to write stdout")?;
        writer.flush().await?;
    }
    Ok(())
}
