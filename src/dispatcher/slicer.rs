//! Slicer loop (spec §4.4): the framing state machine. Maintains a rolling
//! buffer and repeatedly peels one complete `[tag][len][payload]` message
//! off the front before blocking for more bytes. `BytesMut` gives the
//! amortised-growth, slice-without-copy behaviour spec §4.4 and §9 ask for —
//! `split_to`/`freeze` hand payloads out as views over the same allocation,
//! the same trick the teacher's `PgStream` rolling buffer uses
//! (`postgres/connection/stream.rs`).

use byteorder::{BigEndian, ByteOrder};
use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::message::RawMessage;

const HEADER_LEN: usize = 5; // 1-byte tag + 4-byte length-including-itself

pub(crate) async fn run(
    mut incoming_bytes_rx: mpsc::UnboundedReceiver<Bytes>,
    incoming_msg_tx: mpsc::UnboundedSender<RawMessage>,
) {
    let mut rolling = BytesMut::new();

    loop {
        while let Some(msg) = try_slice_one(&mut rolling) {
            if incoming_msg_tx.send(msg).is_err() {
                return;
            }
        }

        match incoming_bytes_rx.recv().await {
            Some(chunk) => rolling.extend_from_slice(&chunk),
            None => return,
        }
    }
}

fn try_slice_one(rolling: &mut BytesMut) -> Option<RawMessage> {
    if rolling.len() < HEADER_LEN {
        return None;
    }

    let tag = rolling[0];
    let len = BigEndian::read_i32(&rolling[1..HEADER_LEN]) as usize;

    if rolling.len() < 1 + len {
        return None;
    }

    let mut frame = rolling.split_to(1 + len);
    let payload = frame.split_off(HEADER_LEN).freeze();
    Some(RawMessage { tag, payload })
}
