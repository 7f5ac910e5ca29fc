//! Serializer loop (spec §4.1): turns queued encodings into contiguous byte
//! buffers. "Failure mode: none" — the only way this loop stops is its
//! input queue closing, which happens when the `Dispatcher` (and every
//! clone) is dropped or `stop` tears things down.

use tokio::sync::mpsc;

pub(crate) type SerializeMessage = Box<dyn FnOnce(&mut Vec<u8>) + Send>;

pub(crate) async fn run(
    mut serializer_rx: mpsc::UnboundedReceiver<SerializeMessage>,
    outgoing_tx: mpsc::Sender<Vec<u8>>,
) {
    while let Some(encode) = serializer_rx.recv().await {
        let mut buf = Vec::new();
        encode(&mut buf);
        if outgoing_tx.send(buf).await.is_err() {
            return;
        }
    }
}
