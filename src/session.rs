//! `Session<R>`, the free sequential composition of requests (spec §3, §4.7,
//! §9). The recursive `Pure | Free(Request(Session))` shape is flattened
//! into a step interpreter per spec §9's design note: a session is either
//! done, or one `Request` away from its next step. The dispatcher drives it
//! by repeatedly running the pending request and handing the typed outcome
//! to a continuation — no host-language free-monad machinery, just a boxed
//! closure per step.

use std::future::Future;
use std::pin::Pin;

use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::request::Request;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A session that still has work to do, type-erased so `Session<R>` doesn't
/// carry the intermediate result type of every step it has ever taken. `X`
/// (this step's own request output) is concrete inside `StepFrame` itself,
/// so running it needs no generic dispatch through the trait object below.
trait Frame<R>: Send {
    fn run<'a>(self: Box<Self>, dispatcher: &'a Dispatcher) -> BoxFuture<'a, Session<R>>;
}

struct StepFrame<X, R, F> {
    request: Request<X>,
    cont: F,
    _result: std::marker::PhantomData<fn() -> R>,
}

impl<X, R, F> Frame<R> for StepFrame<X, R, F>
where
    X: Send + 'static,
    R: Send + 'static,
    F: FnOnce(Result<X, Error>) -> Session<R> + Send + 'static,
{
    fn run<'a>(self: Box<Self>, dispatcher: &'a Dispatcher) -> BoxFuture<'a, Session<R>> {
        let StepFrame { request, cont, .. } = *self;
        Box::pin(async move {
            let outcome = dispatcher.perform_request(request).await;
            cont(outcome)
        })
    }
}

/// A sequential composition of `Request`s: immediately `Pure(R)`, or one
/// more `Request` away from it.
pub struct Session<R>(SessionState<R>);

enum SessionState<R> {
    Pure(R),
    Free(Box<dyn Frame<R>>),
}

impl<R> Session<R>
where
    R: Send + 'static,
{
    pub fn pure(value: R) -> Self {
        Session(SessionState::Pure(value))
    }

    /// Runs `request`, then hands its typed outcome to `cont` to decide the
    /// rest of the session. `cont` is where a caller injects transport and
    /// protocol errors into `R` and short-circuits the chain (spec §4.7);
    /// backend errors are ordinary successful parses and do not need this.
    pub fn free<X>(
        request: Request<X>,
        cont: impl FnOnce(Result<X, Error>) -> Session<R> + Send + 'static,
    ) -> Self
    where
        X: Send + 'static,
    {
        Session(SessionState::Free(Box::new(StepFrame {
            request,
            cont,
            _result: std::marker::PhantomData,
        })))
    }

    /// Drives the session to completion against `dispatcher`, running each
    /// `Request` as its predecessor's result becomes available. Inner
    /// requests are never collapsed into a single pipeline entry — each is
    /// its own `ResultProcessor` admission (spec §4.7).
    pub async fn run(mut self, dispatcher: &Dispatcher) -> R {
        loop {
            match self.0 {
                SessionState::Pure(value) => return value,
                SessionState::Free(frame) => {
                    self = frame.run(dispatcher).await;
                }
            }
        }
    }
}
