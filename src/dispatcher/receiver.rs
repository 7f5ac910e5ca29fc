//! Receiver loop (spec §4.3): reads raw bytes off the socket. EOF (a `Ok(0)`
//! read) and I/O errors both publish a transport error and exit, matching
//! the teacher's treatment of EOF as a connection-ending condition in
//! `postgres/connection/stream.rs` rather than a silent empty read.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use crate::dispatcher::transport_error::TransportErrorCell;
use crate::error::TransportError;

pub(crate) async fn run<Rd>(
    mut reader: Rd,
    incoming_tx: mpsc::UnboundedSender<Bytes>,
    transport_error: Arc<TransportErrorCell>,
    buffer_size: usize,
) where
    Rd: tokio::io::AsyncRead + Unpin,
{
    let mut buf = vec![0u8; buffer_size.max(8 * 1024)];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                transport_error.set(TransportError::new("connection closed by peer"));
                return;
            }
            Ok(n) => {
                if incoming_tx.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
                    return;
                }
            }
            Err(e) => {
                log::error!(target: "pgwire_dispatch::postgres::protocol", "read failed: {e}");
                transport_error.set(TransportError::from(e));
                return;
            }
        }
    }
}
