//! The result-set accessor interface exposed to callers (spec §6), and the
//! client-side row-decoding error domain (spec §7's fourth error kind, which
//! lives here rather than in [`crate::error`] since it is never carried
//! across a loop boundary — it only ever surfaces from these accessors).

use crate::message::backend::DataRow;
#[cfg(test)]
use crate::message::Decode;

/// A pluggable column decoder. The core has no per-type codecs (spec §1) —
/// this is the seam a higher layer fills in, mirroring the teacher's
/// `Row`/`Decode` split (`row.rs`, `decode.rs`) but reduced to the shape the
/// accessors below actually need: the raw row, which column, how many
/// columns total, and whether the server is using integer or floating-point
/// datetime encoding (a connection-wide flag negotiated at startup via
/// `ParameterStatus("integer_datetimes", ...)`).
pub trait RowDecoder: Sized {
    type Error: std::error::Error + Send + Sync + 'static;

    fn decode_row(
        row: &DataRow,
        row_index: usize,
        column_count: usize,
        integer_datetimes: bool,
    ) -> Result<Self, Self::Error>;
}

/// Client-side failure decoding a result set into caller-requested shapes.
#[derive(Debug, thiserror::Error)]
pub enum RowDecodeError<E: std::error::Error + 'static> {
    #[error("unexpected result: {0}")]
    UnexpectedResult(String),

    #[error("expected {expected} row(s), got {actual}")]
    UnexpectedAmountOfRows { expected: &'static str, actual: usize },

    #[error("error decoding row {index}: {source}")]
    RowError { index: usize, source: E },

    #[error(transparent)]
    ServerError(#[from] crate::error::BackendError),
}

/// One query's raw materialised result: the rows it returned (if any) and
/// whether it affected a row count instead (spec §4.5's `QueryOutcome`,
/// reused here as the input every accessor below consumes).
pub struct ResultSet {
    pub rows: Vec<DataRow>,
    pub rows_affected: Option<u64>,
    pub integer_datetimes: bool,
}

impl ResultSet {
    fn column_count(&self) -> Result<usize, crate::error::Error> {
        Ok(self
            .rows
            .first()
            .map(|r| r.column_count())
            .transpose()?
            .map(|c| c as usize)
            .unwrap_or(0))
    }

    /// No rows expected; fails if any came back.
    pub fn unit<E: std::error::Error + 'static>(&self) -> Result<(), RowDecodeError<E>> {
        if self.rows.is_empty() {
            Ok(())
        } else {
            Err(RowDecodeError::UnexpectedAmountOfRows {
                expected: "0",
                actual: self.rows.len(),
            })
        }
    }

    /// The server-reported affected-row count (from `CommandComplete`'s tag).
    pub fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    /// Zero or one row.
    pub fn maybe_one_row<R: RowDecoder>(&self) -> Result<Option<R>, RowDecodeError<R::Error>> {
        match self.rows.len() {
            0 => Ok(None),
            1 => self.decode_one(0).map(Some),
            n => Err(RowDecodeError::UnexpectedAmountOfRows {
                expected: "0 or 1",
                actual: n,
            }),
        }
    }

    /// Exactly one row.
    pub fn exactly_one_row<R: RowDecoder>(&self) -> Result<R, RowDecodeError<R::Error>> {
        match self.rows.len() {
            1 => self.decode_one(0),
            n => Err(RowDecodeError::UnexpectedAmountOfRows {
                expected: "1",
                actual: n,
            }),
        }
    }

    /// Every row, materialised.
    pub fn vector_of_rows<R: RowDecoder>(&self) -> Result<Vec<R>, RowDecodeError<R::Error>> {
        let column_count = self
            .column_count()
            .map_err(|e| RowDecodeError::UnexpectedResult(e.to_string()))?;

        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                R::decode_row(row, i, column_count, self.integer_datetimes)
                    .map_err(|source| RowDecodeError::RowError { index: i, source })
            })
            .collect()
    }

    /// Folds left-to-right without materialising the whole vector.
    pub fn left_fold<R, A>(
        &self,
        init: A,
        mut f: impl FnMut(A, R) -> A,
    ) -> Result<A, RowDecodeError<R::Error>>
    where
        R: RowDecoder,
    {
        let column_count = self
            .column_count()
            .map_err(|e| RowDecodeError::UnexpectedResult(e.to_string()))?;

        let mut acc = init;
        for (i, row) in self.rows.iter().enumerate() {
            let decoded = R::decode_row(row, i, column_count, self.integer_datetimes)
                .map_err(|source| RowDecodeError::RowError { index: i, source })?;
            acc = f(acc, decoded);
        }
        Ok(acc)
    }

    /// Folds right-to-left. Requires every row decoded up front since the
    /// wire and the row store are both forward-only.
    pub fn right_fold<R, A>(
        &self,
        init: A,
        mut f: impl FnMut(R, A) -> A,
    ) -> Result<A, RowDecodeError<R::Error>>
    where
        R: RowDecoder,
    {
        let decoded: Vec<R> = self.vector_of_rows()?;
        Ok(decoded.into_iter().rev().fold(init, |acc, row| f(row, acc)))
    }

    fn decode_one<R: RowDecoder>(&self, index: usize) -> Result<R, RowDecodeError<R::Error>> {
        let column_count = self
            .column_count()
            .map_err(|e| RowDecodeError::UnexpectedResult(e.to_string()))?;

        R::decode_row(&self.rows[index], index, column_count, self.integer_datetimes)
            .map_err(|source| RowDecodeError::RowError { index, source })
    }
}
