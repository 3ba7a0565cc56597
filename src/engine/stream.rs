use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;

use crate::error::Result;

/// Ordered text deltas of one generation job.
///
/// Finite and non-restartable. Keeps the concatenation of every delta it
/// has yielded, so the text produced before a failure stays available.
/// Dropping the stream cancels the job.
pub struct TokenStream {
    rx: mpsc::Receiver<Result<String>>,
    text: String,
    finished: bool,
    failed: bool,
    _cancel_on_drop: DropGuard,
}

impl TokenStream {
    pub(crate) fn new(rx: mpsc::Receiver<Result<String>>, guard: DropGuard) -> Self {
        Self {
            rx,
            text: String::new(),
            finished: false,
            failed: false,
            _cancel_on_drop: guard,
        }
    }

    /// Concatenation of all deltas yielded so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the stream has ended, successfully or not.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the stream ended with a generation error.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Take the accumulated text, dropping (and so cancelling) the stream.
    pub fn into_text(mut self) -> String {
        std::mem::take(&mut self.text)
    }
}

impl Stream for TokenStream {
    type Item = Result<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(delta))) => {
                this.text.push_str(&delta);
                Poll::Ready(Some(Ok(delta)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                this.failed = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
