//! `Request<R>` and the type-erased `ResultProcessor` queue entry (spec §3,
//! §4.6). A `Request` is what a caller builds; a `ResultProcessor` is what
//! the interpreter actually holds — the erasure exists because
//! `resultProcessorQ` is heterogeneous (callers ask for many different `R`s)
//! but the interpreter must walk it without knowing any of them, mirroring
//! the teacher's `Command` enum wrapping per-call `oneshot::Sender<Result<T,
//! Error>>`s behind one non-generic channel (`sqlite/connection/worker.rs`).

use bytes::Bytes;
use futures_channel::oneshot;

use crate::error::{Error, TransportError};
use crate::message::BackendTag;
use crate::parser::{ParseStep, ResponseParser};

/// One atomic unit of pipeline admission: an encoder for the outbound bytes
/// and a parser that consumes the matching response (spec §3).
pub struct Request<R> {
    pub(crate) encode: Box<dyn FnOnce(&mut Vec<u8>) + Send>,
    pub(crate) parser: Box<dyn ResponseParser<Output = R> + Send>,
}

impl<R> Request<R>
where
    R: Send + 'static,
{
    pub fn new<P>(encode: impl FnOnce(&mut Vec<u8>) + Send + 'static, parser: P) -> Self
    where
        P: ResponseParser<Output = R> + Send + 'static,
    {
        Self {
            encode: Box::new(encode),
            parser: Box::new(parser),
        }
    }
}

/// Outcome of feeding one message to a queued processor.
pub(crate) enum Progress {
    NeedMore,
    Done,
}

/// The non-generic half of a `ResultProcessor`: what the interpreter needs
/// to drive it without knowing `R`. Dropping a completed processor is the
/// only cleanup required — it holds no resources beyond the oneshot sender.
pub(crate) trait ResultProcessor: Send {
    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> Progress;

    /// Fulfills with the terminal transport error (spec §4.2, §5 teardown).
    fn fail_transport(self: Box<Self>, err: TransportError);
}

pub(crate) struct Processor<P: ResponseParser> {
    parser: P,
    fulfill: Option<oneshot::Sender<Result<P::Output, Error>>>,
}

impl<P> Processor<P>
where
    P: ResponseParser + Send,
    P::Output: Send,
{
    pub(crate) fn new(parser: P, fulfill: oneshot::Sender<Result<P::Output, Error>>) -> Self {
        Self {
            parser,
            fulfill: Some(fulfill),
        }
    }
}

impl<P> ResultProcessor for Processor<P>
where
    P: ResponseParser + Send,
    P::Output: Send,
{
    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> Progress {
        match self.parser.feed(tag, payload) {
            ParseStep::NeedMore => Progress::NeedMore,
            ParseStep::Done(r) => {
                if let Some(tx) = self.fulfill.take() {
                    let _ = tx.send(Ok(r));
                }
                Progress::Done
            }
            ParseStep::Fail(text) => {
                if let Some(tx) = self.fulfill.take() {
                    let _ = tx.send(Err(Error::protocol(text)));
                }
                Progress::Done
            }
        }
    }

    fn fail_transport(mut self: Box<Self>, err: TransportError) {
        if let Some(tx) = self.fulfill.take() {
            let _ = tx.send(Err(Error::Transport(err)));
        }
    }
}
