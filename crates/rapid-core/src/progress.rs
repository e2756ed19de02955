use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;

use crate::types::{OnProgress, ProgressEvent};

/// Read-through wrapper over a chunk's byte stream.
///
/// Every successfully polled payload adds to the running byte count and,
/// when a callback is installed, fires a [`ProgressEvent`] with the percent
/// of the current attempt's range. Errors and end-of-stream pass through
/// untouched; nothing is reported for failed reads.
pub struct ProgressReader<S> {
    inner: S,
    entry_id: String,
    chunk_index: usize,
    downloaded: u64,
    /// Bytes the current attempt is expected to fetch; None when the
    /// server didn't declare a length.
    total: Option<u64>,
    on_progress: Option<OnProgress>,
}

impl<S> ProgressReader<S> {
    pub fn new(
        inner: S,
        entry_id: String,
        chunk_index: usize,
        total: Option<u64>,
        on_progress: Option<OnProgress>,
    ) -> Self {
        Self {
            inner,
            entry_id,
            chunk_index,
            downloaded: 0,
            total,
            on_progress,
        }
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded
    }
}

impl<S, B, E> Stream for ProgressReader<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    type Item = Result<B, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let next = Pin::new(&mut this.inner).poll_next(cx);

        if let Poll::Ready(Some(Ok(payload))) = &next {
            this.downloaded += payload.as_ref().len() as u64;

            if let Some(on_progress) = &this.on_progress {
                let percent = match this.total {
                    Some(total) if total > 0 => {
                        100.0 * this.downloaded as f64 / total as f64
                    }
                    _ => 0.0,
                };
                on_progress(ProgressEvent {
                    entry_id: this.entry_id.clone(),
                    chunk_index: this.chunk_index,
                    downloaded: this.downloaded,
                    percent,
                });
            }
        }

        next
    }
}
