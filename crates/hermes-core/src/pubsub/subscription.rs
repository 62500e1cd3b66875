use crate::error::{Error, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A live subscription returned by [`Hub::subscribe`](super::Hub::subscribe).
///
/// Holds two streams: decoded messages (bounded) and at most one terminal
/// error. Both close when the subscription ends. Receiving an error means the
/// subscription is dead; subscribe again if still needed.
pub struct Subscription<M> {
    messages: mpsc::Receiver<M>,
    errors: mpsc::Receiver<Error>,
    errors_closed: bool,
    cancel: CancellationToken,
}

impl<M> Subscription<M> {
    pub(crate) fn new(
        messages: mpsc::Receiver<M>,
        errors: mpsc::Receiver<Error>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            messages,
            errors,
            errors_closed: false,
            cancel,
        }
    }

    /// Wait for the next message or the terminal error.
    ///
    /// Messages already buffered are returned before the error. Returns `None`
    /// once both streams are closed.
    pub async fn next(&mut self) -> Option<Result<M>> {
        loop {
            tokio::select! {
                biased;
                msg = self.messages.recv() => {
                    return match msg {
                        Some(msg) => Some(Ok(msg)),
                        None if self.errors_closed => None,
                        None => self.errors.recv().await.map(Err),
                    };
                }
                err = self.errors.recv(), if !self.errors_closed => match err {
                    Some(e) => return Some(Err(e)),
                    None => self.errors_closed = true,
                },
            }
        }
    }

    /// Wait for the next decoded message. Returns `None` once the stream is
    /// closed.
    pub async fn recv(&mut self) -> Option<M> {
        self.messages.recv().await
    }

    /// Wait for the terminal error. Returns `None` if the subscription ended
    /// without one.
    pub async fn recv_error(&mut self) -> Option<Error> {
        if self.errors_closed {
            return None;
        }
        let err = self.errors.recv().await;
        if err.is_none() {
            self.errors_closed = true;
        }
        err
    }

    /// Stop the subscription. Both streams close without an error.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the subscription's token has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Split into the raw message and error receivers.
    #[must_use]
    pub fn into_parts(self) -> (mpsc::Receiver<M>, mpsc::Receiver<Error>) {
        (self.messages, self.errors)
    }
}
