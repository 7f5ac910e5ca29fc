//! Interpreter loop (spec §4.5): the heart of the dispatcher. Tracks one
//! piece of state — idle, or parsing against the head `ResultProcessor` —
//! and on every inbound message checks `resultProcessorQ` only *after*
//! handling the message, exactly as spec §4.5's "wake-up ordering" requires
//! to avoid a racy pre-check.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::dispatcher::transport_error::TransportErrorCell;
use crate::error::ProtocolError;
use crate::message::backend::{NotificationResponse, Response};
use crate::message::{BackendTag, Decode, RawMessage};
use crate::notification::{BackendEvent, Notification};
use crate::request::{Progress, ResultProcessor};

enum ParseState {
    Idle,
    Parsing(Box<dyn ResultProcessor>),
}

pub(crate) async fn run(
    mut incoming_msg_rx: mpsc::UnboundedReceiver<RawMessage>,
    mut processor_rx: mpsc::UnboundedReceiver<Box<dyn ResultProcessor>>,
    unaffiliated_tx: Option<mpsc::UnboundedSender<BackendEvent>>,
    transport_error: Arc<TransportErrorCell>,
) {
    let mut state = ParseState::Idle;

    loop {
        let msg = match incoming_msg_rx.recv().await {
            Some(msg) => msg,
            None => break,
        };

        let tag = BackendTag::from_u8(msg.tag);

        state = match state {
            ParseState::Idle => {
                handle_idle_message(tag, msg.payload, &unaffiliated_tx);
                dequeue_next(&mut processor_rx)
            }
            ParseState::Parsing(mut processor) => match processor.feed(tag, msg.payload) {
                Progress::NeedMore => ParseState::Parsing(processor),
                Progress::Done => dequeue_next(&mut processor_rx),
            },
        };
    }

    // incomingMsgQ closed: the slicer or receiver hit a transport error (or
    // we are being torn down by `stop`). Fail whatever was pending so no
    // caller is left hanging (spec §3 invariant 3, §5 cancellation).
    let err = transport_error.wait().await;
    if let ParseState::Parsing(processor) = state {
        processor.fail_transport(err.clone());
    }
    while let Ok(processor) = processor_rx.try_recv() {
        processor.fail_transport(err.clone());
    }
}

fn dequeue_next(processor_rx: &mut mpsc::UnboundedReceiver<Box<dyn ResultProcessor>>) -> ParseState {
    match processor_rx.try_recv() {
        Ok(processor) => ParseState::Parsing(processor),
        Err(_) => ParseState::Idle,
    }
}

fn handle_idle_message(
    tag: BackendTag,
    payload: bytes::Bytes,
    unaffiliated_tx: &Option<mpsc::UnboundedSender<BackendEvent>>,
) {
    match tag {
        BackendTag::NotificationResponse => match NotificationResponse::decode(payload) {
            Ok(n) => send(
                unaffiliated_tx,
                BackendEvent::Notification(Notification {
                    process_id: n.process_id,
                    channel: n.channel,
                    payload: n.payload,
                }),
            ),
            Err(e) => send(
                unaffiliated_tx,
                BackendEvent::ProtocolError(ProtocolError(e.to_string())),
            ),
        },
        BackendTag::ErrorResponse => {
            match Response::decode(payload).and_then(Response::into_backend_error) {
                Ok(err) => send(unaffiliated_tx, BackendEvent::BackendError(err)),
                Err(e) => send(
                    unaffiliated_tx,
                    BackendEvent::ProtocolError(ProtocolError(e.to_string())),
                ),
            }
        }
        BackendTag::ReadyForQuery | BackendTag::ParameterStatus | BackendTag::NoticeResponse => {}
        other => send(
            unaffiliated_tx,
            BackendEvent::ProtocolError(ProtocolError(format!(
                "unexpected message in idle state: {other:?}"
            ))),
        ),
    }
}

fn send(unaffiliated_tx: &Option<mpsc::UnboundedSender<BackendEvent>>, event: BackendEvent) {
    if let Some(tx) = unaffiliated_tx {
        let _ = tx.send(event);
    }
}
