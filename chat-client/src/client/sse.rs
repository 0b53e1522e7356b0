use bytes::Buf;
use bytes::Bytes;
use bytes::BytesMut;
use futures::Stream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::client::FrameDecoder;
use crate::error::Error;
use crate::error::Result;
use crate::stream::ChatEvent;

/// Records on the wire are terminated by a blank line.
const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Payload lines carry this prefix, followed by optional whitespace.
const DATA_PREFIX: &str = "data:";

/// Buffers raw body fragments and yields delimiter-terminated frames.
///
/// Fragments arrive with no alignment to frame boundaries; the undelimited
/// tail stays buffered across pushes. The delimiter is ASCII, so splitting
/// on raw bytes stays correct even when a fragment ends mid UTF-8 sequence.
struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    fn push(&mut self, fragment: &[u8]) {
        self.buf.extend_from_slice(fragment);
    }

    /// Next complete frame, without its delimiter. `None` until one is
    /// fully buffered.
    fn next_frame(&mut self) -> Option<Bytes> {
        let at = self
            .buf
            .windows(FRAME_DELIMITER.len())
            .position(|window| window == FRAME_DELIMITER)?;
        let frame = self.buf.split_to(at).freeze();
        self.buf.advance(FRAME_DELIMITER.len());
        Some(frame)
    }
}

/// Session state for one response body. Terminal states exit the decode
/// loop; a fragment arriving afterwards is never processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SessionState {
    Open,
    Completed,
    Aborted,
    Failed,
}

/// Result of one wait on the chunk source. Cancellation is its own case
/// rather than an error so the two exits can never be conflated.
enum Wait {
    Fragment(Bytes),
    Eos,
    Canceled,
    Fault(Error),
}

/// Decode loop for one response body: byte fragments in, [`ChatEvent`]s out.
///
/// Exactly one terminal item is sent on `tx_event` (`Completed` or an
/// error), except on cancellation, where the channel closes with no
/// terminal item. Returning drops `stream`, which releases the underlying
/// connection.
pub(crate) async fn process_sse<S, D>(
    mut stream: S,
    mut decoder: D,
    tx_event: mpsc::Sender<Result<ChatEvent>>,
    cancel: CancellationToken,
) where
    S: Stream<Item = Result<Bytes>> + Send + 'static + Unpin,
    D: FrameDecoder,
{
    let mut frames = FrameBuffer::new();
    let mut state = SessionState::Open;

    while state == SessionState::Open {
        let wait = tokio::select! {
            biased;
            _ = cancel.cancelled() => Wait::Canceled,
            item = stream.next() => match item {
                Some(Ok(fragment)) => Wait::Fragment(fragment),
                Some(Err(err)) => Wait::Fault(err),
                None => Wait::Eos,
            },
        };

        state = match wait {
            Wait::Fragment(fragment) => {
                frames.push(&fragment);
                let mut next = SessionState::Open;
                while let Some(frame) = frames.next_frame() {
                    let Some(payload) = frame_payload(&frame) else {
                        continue;
                    };
                    trace!("received frame payload: {payload}");
                    if let Err(err) = decoder.on_frame(payload, &tx_event).await {
                        let _ = tx_event.send(Err(err)).await;
                        next = SessionState::Failed;
                        break;
                    }
                }
                next
            }
            Wait::Eos => {
                // Anything still buffered never got its closing delimiter;
                // the wire contract treats such a record as incomplete, so
                // it is dropped rather than delivered.
                let _ = tx_event.send(Ok(ChatEvent::Completed)).await;
                SessionState::Completed
            }
            Wait::Canceled => SessionState::Aborted,
            Wait::Fault(err) => {
                let _ = tx_event.send(Err(err)).await;
                SessionState::Failed
            }
        };
    }

    debug!(?state, "chat stream closed");
}

/// Extract the JSON payload of one frame, or `None` for frames the decoder
/// skips: non-UTF-8 content, lines without the `data:` prefix, and empty
/// payloads.
fn frame_payload(frame: &[u8]) -> Option<&str> {
    let text = match std::str::from_utf8(frame) {
        Ok(text) => text,
        Err(err) => {
            warn!("skipping non-UTF-8 frame: {err}");
            return None;
        }
    };
    let payload = text.trim().strip_prefix(DATA_PREFIX)?.trim_start();
    if payload.is_empty() {
        return None;
    }
    Some(payload)
}
