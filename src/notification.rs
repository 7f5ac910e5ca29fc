//! The unaffiliated sink's payload (spec §3, §4.5): messages the interpreter
//! could not hand to any pending processor because none was active.

/// An asynchronous `NOTIFY` from the server.
#[derive(Debug, Clone)]
pub struct Notification {
    pub process_id: i32,
    pub channel: String,
    pub payload: String,
}

/// Everything the unaffiliated sink can carry. `Notification` is the only
/// variant spec.md names as "not an error"; the other two are routed here
/// rather than dropped because no processor was listening for them (spec
/// §4.5 step 1: `ErrorResponse` while idle, and an unexpected tag while
/// idle), matching the teacher's `PgStream::notifications` channel which
/// also carries the occasional idle-state server notice alongside `NOTIFY`
/// payloads (`postgres/connection/stream.rs`).
#[derive(Debug)]
pub enum BackendEvent {
    Notification(Notification),
    BackendError(crate::error::BackendError),
    ProtocolError(crate::error::ProtocolError),
}
