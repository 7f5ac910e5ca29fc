//! The write-once transport-error cell (spec §4.2, §5, §9): "put-if-empty"
//! and "read-or-wait" over a single slot. `tokio::sync::OnceCell` already
//! gives put-if-empty (`set` fails silently on a second writer); `Notify` is
//! layered on top for the read-or-wait half, using the
//! create-before-check-before-await pattern so a `set` racing a `wait`
//! cannot be missed (`Notify::notified`'s documented safe usage).

use tokio::sync::{Notify, OnceCell};

use crate::error::TransportError;

pub(crate) struct TransportErrorCell {
    cell: OnceCell<TransportError>,
    notify: Notify,
}

impl TransportErrorCell {
    pub(crate) fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            notify: Notify::new(),
        }
    }

    /// Put-if-empty: only the first caller's error is retained.
    pub(crate) fn set(&self, err: TransportError) {
        if self.cell.set(err).is_ok() {
            self.notify.notify_waiters();
        }
    }

    pub(crate) fn get(&self) -> Option<TransportError> {
        self.cell.get().cloned()
    }

    /// Resolves once an error has been published, immediately if one already
    /// has been.
    pub(crate) async fn wait(&self) -> TransportError {
        loop {
            let notified = self.notify.notified();
            if let Some(err) = self.get() {
                return err;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_set_does_not_overwrite_first() {
        let cell = TransportErrorCell::new();
        cell.set(TransportError::new("first"));
        cell.set(TransportError::new("second"));
        assert_eq!(cell.get().unwrap().0.as_ref(), "first");
    }

    #[tokio::test]
    async fn wait_resolves_once_set() {
        let cell = std::sync::Arc::new(TransportErrorCell::new());
        let waiter = {
            let cell = cell.clone();
            tokio::spawn(async move { cell.wait().await })
        };
        tokio::task::yield_now().await;
        cell.set(TransportError::new("boom"));
        let err = waiter.await.unwrap();
        assert_eq!(err.0.as_ref(), "boom");
    }
}
