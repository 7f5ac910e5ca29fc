//! Sender loop (spec §4.2): flushes encoded buffers to the wire. Partial
//! writes are handled by `write_all`, which already loops until the whole
//! buffer is drained (or an error is returned) — this is the teacher's own
//! idiom (`AsyncWriteExt::write_all` throughout `postgres/connection/
//! stream.rs`) rather than a hand-rolled partial-write loop.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::dispatcher::transport_error::TransportErrorCell;
use crate::error::TransportError;

pub(crate) async fn run<W>(
    mut outgoing_rx: mpsc::Receiver<Vec<u8>>,
    mut writer: W,
    transport_error: Arc<TransportErrorCell>,
) where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(buf) = outgoing_rx.recv().await {
        if let Err(e) = writer.write_all(&buf).await {
            log::error!(target: "pgwire_dispatch::postgres::protocol", "write failed: {e}");
            transport_error.set(TransportError::from(e));
            return;
        }
    }

    let _ = writer.shutdown().await;
}
