//! The connection dispatcher (spec §2, §4.6): wires the five loops together
//! over their queues and exposes `perform_request`/`stop` to callers. The
//! dispatcher itself is generic over any split-capable duplex stream
//! (`AsyncRead + AsyncWrite + Send`), so the same code runs over a
//! `tokio::net::TcpStream` or a `tokio::net::UnixStream` — TLS is out of
//! scope (spec §1); the caller hands over an already-negotiated stream,
//! mirroring the split-stream boundary in the teacher's `MaybeTlsStream`
//! (`sqlx-core/src/net/`).

mod interpreter;
mod receiver;
mod sender;
mod serializer;
mod slicer;
mod transport_error;

use std::sync::Arc;

use bytes::Bytes;
use futures_channel::oneshot;
use futures_intrusive::sync::Mutex as AsyncMutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, TransportError};
use crate::message::RawMessage;
use crate::notification::BackendEvent;
use crate::request::{Processor, Request, ResultProcessor};
use crate::session::Session;
use serializer::SerializeMessage;
use transport_error::TransportErrorCell;

/// Read buffer size and outbound backpressure knobs (spec §4.3's "≥ 8 KiB
/// recommended", and §5's bounded-queue flow-control path).
#[derive(Debug, Clone, Copy)]
pub struct DispatcherOptions {
    pub read_buffer_size: usize,
    pub outgoing_queue_depth: usize,
}

impl Default for DispatcherOptions {
    fn default() -> Self {
        Self {
            read_buffer_size: 8 * 1024,
            outgoing_queue_depth: 256,
        }
    }
}

/// The connection-scoped handle owning the five loops (spec GLOSSARY).
/// Cloning shares the same underlying pipeline — every clone's
/// `perform_request` admits into the same two queues.
#[derive(Clone)]
pub struct Dispatcher {
    serializer_tx: mpsc::UnboundedSender<SerializeMessage>,
    processor_tx: mpsc::UnboundedSender<Box<dyn ResultProcessor>>,
    admission: Arc<AsyncMutex<()>>,
    transport_error: Arc<TransportErrorCell>,
    handles: Arc<LoopHandles>,
}

struct LoopHandles {
    serializer: JoinHandle<()>,
    sender: JoinHandle<()>,
    receiver: JoinHandle<()>,
    slicer: JoinHandle<()>,
    interpreter: JoinHandle<()>,
}

impl Dispatcher {
    /// Starts the five loops over `stream`. `unaffiliated_tx`, if given,
    /// receives notifications and stray errors observed while idle (spec
    /// §3 invariant 4).
    pub fn start<S>(
        stream: S,
        unaffiliated_tx: Option<mpsc::UnboundedSender<BackendEvent>>,
        options: DispatcherOptions,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);

        let (serializer_tx, serializer_rx) = mpsc::unbounded_channel::<SerializeMessage>();
        let (outgoing_tx, outgoing_rx) = mpsc::channel::<Vec<u8>>(options.outgoing_queue_depth);
        let (incoming_bytes_tx, incoming_bytes_rx) = mpsc::unbounded_channel::<Bytes>();
        let (incoming_msg_tx, incoming_msg_rx) = mpsc::unbounded_channel::<RawMessage>();
        let (processor_tx, processor_rx) = mpsc::unbounded_channel::<Box<dyn ResultProcessor>>();

        let transport_error = Arc::new(TransportErrorCell::new());

        let serializer = tokio::spawn(serializer::run(serializer_rx, outgoing_tx));
        let sender = tokio::spawn(sender::run(outgoing_rx, writer, transport_error.clone()));
        let receiver = tokio::spawn(receiver::run(
            reader,
            incoming_bytes_tx,
            transport_error.clone(),
            options.read_buffer_size,
        ));
        let slicer = tokio::spawn(slicer::run(incoming_bytes_rx, incoming_msg_tx));
        let interpreter = tokio::spawn(interpreter::run(
            incoming_msg_rx,
            processor_rx,
            unaffiliated_tx,
            transport_error.clone(),
        ));

        Dispatcher {
            serializer_tx,
            processor_tx,
            admission: Arc::new(AsyncMutex::new((), true)),
            transport_error,
            handles: Arc::new(LoopHandles {
                serializer,
                sender,
                receiver,
                slicer,
                interpreter,
            }),
        }
    }

    /// Submits one `Request`, admitting its encoding and its processor into
    /// the two pipeline queues as a single atomic step (spec §4.6), then
    /// waits for its outcome — racing the ordinary result against the
    /// transport-error cell so a connection death never leaves a caller
    /// hanging (spec §4.6 step 4).
    pub async fn perform_request<R>(&self, request: Request<R>) -> Result<R, Error>
    where
        R: Send + 'static,
    {
        if let Some(err) = self.transport_error.get() {
            return Err(Error::Transport(err));
        }

        let (tx, rx) = oneshot::channel();
        let processor: Box<dyn ResultProcessor> = Box::new(Processor::new(request.parser, tx));

        {
            let _admission = self.admission.lock().await;

            if let Some(err) = self.transport_error.get() {
                return Err(Error::Transport(err));
            }

            if self.serializer_tx.send(request.encode).is_err()
                || self.processor_tx.send(processor).is_err()
            {
                let err = self
                    .transport_error
                    .get()
                    .unwrap_or_else(|| TransportError::new("dispatcher stopped"));
                return Err(Error::Transport(err));
            }
        }

        tokio::select! {
            result = rx => result.unwrap_or_else(|_| Err(Error::Transport(self.transport_error.get().unwrap_or_else(|| TransportError::new("dispatcher stopped"))))),
            err = self.transport_error.wait() => Err(Error::Transport(err)),
        }
    }

    /// Drives a [`Session`] to completion over this dispatcher (spec §4.7).
    pub async fn run_session<R: Send + 'static>(&self, session: Session<R>) -> R {
        session.run(self).await
    }

    /// Tears down all five loops. In-flight and future `perform_request`
    /// calls resolve with `TransportError("stopped")` (spec §5
    /// cancellation); there is no per-request cancellation.
    pub async fn stop(&self) {
        self.transport_error.set(TransportError::new("stopped"));
        self.handles.serializer.abort();
        self.handles.sender.abort();
        self.handles.receiver.abort();
        self.handles.slicer.abort();
        self.handles.interpreter.abort();
    }
}
