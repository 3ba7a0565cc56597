use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use serde::Serialize;

/// Create an SSE response from a stream of JSON-serializable values.
///
/// Each item is sent as one `data` event. Items that fail to serialize
/// are skipped.
pub fn sse_response<S, T>(stream: S) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let event_stream = stream.filter_map(|item| async move {
        format_sse_data(&item).map(|data| Ok(Event::default().data(data)))
    });

    Sse::new(event_stream).keep_alive(KeepAlive::default())
}

/// Format a single SSE data payload from a serializable value.
pub fn format_sse_data<T: Serialize>(value: &T) -> Option<String> {
    serde_json::to_string(value).ok()
}
