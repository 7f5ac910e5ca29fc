//! Message-stream parser combinators (spec §4.5, §9).
//!
//! A parser is a small state machine fed one message at a time. This
//! replaces an effect-typed parser stack with plain data, per the teacher's
//! own preference for hand-rolled state machines over combinator libraries
//! in the hot decode path (`postgres/message/response.rs`'s `Fields`
//! iterator is the same style: walk-the-bytes-yourself rather than `nom`).

use bytes::Bytes;

use crate::message::backend::{
    BindComplete, CloseComplete, CommandComplete, DataRow, NoData, ParameterDescription,
    ParseComplete, PortalSuspended, ReadyForQuery, Response, RowDescription,
};
use crate::message::{BackendTag, Decode};

/// The outcome of feeding one message to a [`ResponseParser`].
pub enum ParseStep<R> {
    NeedMore,
    Done(R),
    Fail(String),
}

/// A pending response's parser: consumes backend messages until it can
/// produce `Output` or fails. Boxed as a trait object so heterogeneous
/// requests share one `resultProcessorQ` (spec §4.6); see
/// [`crate::request::ResultProcessor`] for the erasure.
pub trait ResponseParser: Send {
    type Output;

    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> ParseStep<Self::Output>;
}

/// Lets a boxed trait object stand in for a concrete parser, so
/// [`crate::request::Request`]'s already-erased `Box<dyn ResponseParser<..>>`
/// can still be wrapped by [`crate::request::Processor`]'s generic `P`.
impl<T: ResponseParser + ?Sized> ResponseParser for Box<T> {
    type Output = T::Output;

    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> ParseStep<Self::Output> {
        (**self).feed(tag, payload)
    }
}

/// `NoticeResponse` and `ParameterStatus` are transparently accepted at any
/// point inside a composed parser (spec §4.5); every combinator below
/// routes through this first.
pub(crate) fn is_transparent(tag: BackendTag) -> bool {
    matches!(tag, BackendTag::NoticeResponse | BackendTag::ParameterStatus)
}

/// Skips messages until (and including) `ReadyForQuery`. Used to drain the
/// simple-query protocol's tail, and as the terminal stage composed onto
/// every other parser below (a request's pipeline slot is not done until
/// the server says so).
pub struct SkipUntilReadyForQuery;

impl ResponseParser for SkipUntilReadyForQuery {
    type Output = ();

    fn feed(&mut self, tag: BackendTag, _payload: Bytes) -> ParseStep<()> {
        match tag {
            BackendTag::ReadyForQuery => ParseStep::Done(()),
            _ => ParseStep::NeedMore,
        }
    }
}

macro_rules! expect_one {
    ($name:ident, $tag:ident, $ty:ty) => {
        /// Expects exactly one `$tag`, transparently skipping
        /// `NoticeResponse`/`ParameterStatus`, and completing early (with a
        /// backend error, *not* a parse failure) if `ErrorResponse` arrives
        /// first — spec §4.5's "error interleaving". Stateless: the
        /// interpreter never feeds a parser again once it has returned
        /// `Done`/`Fail` (spec §4.5's single-active-processor invariant).
        #[derive(Default)]
        pub struct $name;

        impl $name {
            pub fn new() -> Self {
                Self
            }
        }

        impl ResponseParser for $name {
            type Output = Result<$ty, crate::error::BackendError>;

            fn feed(&mut self, tag: BackendTag, payload: Bytes) -> ParseStep<Self::Output> {
                if is_transparent(tag) {
                    return ParseStep::NeedMore;
                }

                match tag {
                    BackendTag::ErrorResponse => {
                        match Response::decode(payload).and_then(Response::into_backend_error) {
                            Ok(err) => ParseStep::Done(Err(err)),
                            Err(e) => ParseStep::Fail(e.to_string()),
                        }
                    }
                    BackendTag::$tag => match <$ty>::decode(payload) {
                        Ok(v) => ParseStep::Done(Ok(v)),
                        Err(e) => ParseStep::Fail(e.to_string()),
                    },
                    other => {
                        ParseStep::Fail(format!("expected {:?}, got {other:?}", BackendTag::$tag))
                    }
                }
            }
        }
    };
}

expect_one!(ExpectParseComplete, ParseComplete, ParseComplete);
expect_one!(ExpectBindComplete, BindComplete, BindComplete);
expect_one!(ExpectCloseComplete, CloseComplete, CloseComplete);
expect_one!(ExpectNoData, NoData, NoData);
expect_one!(ExpectParameterDescription, ParameterDescription, ParameterDescription);
expect_one!(ExpectRowDescription, RowDescription, RowDescription);
expect_one!(ExpectCommandComplete, CommandComplete, CommandComplete);
expect_one!(ExpectPortalSuspended, PortalSuspended, PortalSuspended);

/// Collects `DataRow`s until a terminating `CommandComplete`,
/// `EmptyQueryResponse`, or `PortalSuspended`, or an early `ErrorResponse`.
/// This is the `row-decoder`-agnostic half of spec §4.5's `data-row`
/// primitive parser — it hands raw [`DataRow`]s to the caller rather than
/// decoding columns itself, since column decoding is pluggable (spec §6).
pub struct CollectRows {
    rows: Vec<DataRow>,
    done: bool,
}

impl CollectRows {
    pub fn new() -> Self {
        Self {
            rows: Vec::new(),
            done: false,
        }
    }
}

impl Default for CollectRows {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a query that may or may not return rows.
pub enum QueryOutcome {
    Rows(Vec<DataRow>),
    RowsAffected(Option<u64>),
    EmptyQuery,
}

impl ResponseParser for CollectRows {
    type Output = Result<QueryOutcome, crate::error::BackendError>;

    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> ParseStep<Self::Output> {
        if is_transparent(tag) {
            return ParseStep::NeedMore;
        }

        if self.done {
            return ParseStep::Fail("parser fed a message after completion".into());
        }

        match tag {
            BackendTag::DataRow => match DataRow::decode(payload) {
                Ok(row) => {
                    self.rows.push(row);
                    ParseStep::NeedMore
                }
                Err(e) => ParseStep::Fail(e.to_string()),
            },
            BackendTag::CommandComplete => match CommandComplete::decode(payload) {
                Ok(cc) => {
                    let outcome = if self.rows.is_empty() {
                        QueryOutcome::RowsAffected(cc.rows_affected())
                    } else {
                        QueryOutcome::Rows(std::mem::take(&mut self.rows))
                    };
                    ParseStep::Done(Ok(outcome))
                }
                Err(e) => ParseStep::Fail(e.to_string()),
            },
            BackendTag::EmptyQueryResponse => ParseStep::Done(Ok(QueryOutcome::EmptyQuery)),
            BackendTag::ErrorResponse => {
                match Response::decode(payload).and_then(Response::into_backend_error) {
                    Ok(err) => ParseStep::Done(Err(err)),
                    Err(e) => ParseStep::Fail(e.to_string()),
                }
            }
            other => ParseStep::Fail(format!("unexpected message in row stream: {other:?}")),
        }
    }
}

/// Sequential composition (spec §4.5's "bind"): run `inner` to completion,
/// then silently skip messages up to and including `ReadyForQuery` before
/// declaring the whole
/// pipeline stage done. Every concrete `Request` built on top of this
/// module's primitives ends with this wrapper, because `ReadyForQuery`
/// marks the end of a request's response regardless of which primitive
/// parser produced the value (spec GLOSSARY).
pub struct ThenReadyForQuery<P: ResponseParser> {
    inner: Option<P>,
    result: Option<P::Output>,
}

impl<P: ResponseParser> ThenReadyForQuery<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner: Some(inner),
            result: None,
        }
    }
}

impl<P: ResponseParser> ResponseParser for ThenReadyForQuery<P>
where
    P::Output: Send,
{
    type Output = P::Output;

    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> ParseStep<Self::Output> {
        if self.result.is_none() {
            let inner = self
                .inner
                .as_mut()
                .expect("inner parser polled after completion");

            return match inner.feed(tag, payload) {
                ParseStep::NeedMore => ParseStep::NeedMore,
                ParseStep::Fail(e) => ParseStep::Fail(e),
                ParseStep::Done(r) => {
                    self.result = Some(r);
                    ParseStep::NeedMore
                }
            };
        }

        match tag {
            BackendTag::ReadyForQuery => match ReadyForQuery::decode(payload) {
                Ok(_) => ParseStep::Done(self.result.take().expect("result set above")),
                Err(e) => ParseStep::Fail(e.to_string()),
            },
            _ if is_transparent(tag) => ParseStep::NeedMore,
            other => ParseStep::Fail(format!("expected ReadyForQuery, got {other:?}")),
        }
    }
}

/// Alternative composition (spec §4.5/§9's "choice"): picks between two
/// parsers based on the *first* message's tag, then feeds every message —
/// including that first one — to whichever branch was picked. Neither
/// branch runs until that first tag is known, mirroring the spec's "choice
/// on the first message's tag" rather than, say, trying both branches and
/// backtracking.
pub struct ChooseByFirstTag<L, R, F> {
    left: Option<L>,
    right: Option<R>,
    select: Option<F>,
    chose_left: Option<bool>,
}

impl<L, R, F> ChooseByFirstTag<L, R, F>
where
    L: ResponseParser,
    R: ResponseParser<Output = L::Output>,
    F: FnOnce(BackendTag) -> bool,
{
    /// `select` is run once, against the first message's tag: `true` picks
    /// `left`, `false` picks `right`.
    pub fn new(left: L, right: R, select: F) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
            select: Some(select),
            chose_left: None,
        }
    }
}

impl<L, R, F> ResponseParser for ChooseByFirstTag<L, R, F>
where
    L: ResponseParser,
    R: ResponseParser<Output = L::Output>,
    F: FnOnce(BackendTag) -> bool + Send,
{
    type Output = L::Output;

    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> ParseStep<Self::Output> {
        let chose_left = *self.chose_left.get_or_insert_with(|| {
            let select = self.select.take().expect("select consumed only once");
            select(tag)
        });

        if chose_left {
            self.left
                .as_mut()
                .expect("left branch chosen")
                .feed(tag, payload)
        } else {
            self.right
                .as_mut()
                .expect("right branch chosen")
                .feed(tag, payload)
        }
    }
}

/// Maps [`ExpectRowDescription`]'s output into the shared shape
/// [`describe_response`] needs so its two branches agree on `Output`.
struct RowDescriptionBranch(ExpectRowDescription);

impl ResponseParser for RowDescriptionBranch {
    type Output = Result<Option<RowDescription>, crate::error::BackendError>;

    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> ParseStep<Self::Output> {
        match self.0.feed(tag, payload) {
            ParseStep::NeedMore => ParseStep::NeedMore,
            ParseStep::Done(Ok(rd)) => ParseStep::Done(Ok(Some(rd))),
            ParseStep::Done(Err(e)) => ParseStep::Done(Err(e)),
            ParseStep::Fail(e) => ParseStep::Fail(e),
        }
    }
}

/// Maps [`ExpectNoData`]'s output into the shared shape [`describe_response`]
/// needs so its two branches agree on `Output`.
struct NoDataBranch(ExpectNoData);

impl ResponseParser for NoDataBranch {
    type Output = Result<Option<RowDescription>, crate::error::BackendError>;

    fn feed(&mut self, tag: BackendTag, payload: Bytes) -> ParseStep<Self::Output> {
        match self.0.feed(tag, payload) {
            ParseStep::NeedMore => ParseStep::NeedMore,
            ParseStep::Done(Ok(_)) => ParseStep::Done(Ok(None)),
            ParseStep::Done(Err(e)) => ParseStep::Done(Err(e)),
            ParseStep::Fail(e) => ParseStep::Fail(e),
        }
    }
}

/// The response to `Describe` (spec §6): the server answers with either
/// `RowDescription` (the statement/portal produces rows) or `NoData` (it
/// doesn't) — a textbook instance of spec §4.5/§9's choice-on-first-tag
/// composition, built on [`ChooseByFirstTag`].
pub fn describe_response(
) -> impl ResponseParser<Output = Result<Option<RowDescription>, crate::error::BackendError>> {
    ChooseByFirstTag::new(
        RowDescriptionBranch(ExpectRowDescription::new()),
        NoDataBranch(ExpectNoData::new()),
        |tag| tag == BackendTag::RowDescription,
    )
}
