use async_trait::async_trait;
use futures::StreamExt;
use futures::TryStreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::decode::DeltaDecoder;
use crate::error::Error;
use crate::error::Result;
use crate::payload::ChatRequest;
use crate::payload::RagResponse;
use crate::stream::ChatEvent;
use crate::stream::ChatStream;
use crate::stream::StreamCallbacks;
use crate::stream::StreamOutcome;

pub(crate) mod sse;

/// Streaming chat endpoint (SSE body).
const STREAM_PATH: &str = "/api/chat/stream";
/// Single-shot chat endpoint (plain-text answer).
const CHAT_PATH: &str = "/api/chat/rag";
/// Retrieval-augmented chat endpoint (answer plus retrieved chunks).
const RAG_PATH: &str = "/api/chat/ragDb";

const EVENT_CHANNEL_CAPACITY: usize = 1600;

/// Decodes one extracted frame payload, emitting events on `tx`.
///
/// Frame-level problems must be absorbed (skip the frame, keep decoding);
/// a returned error ends the session as failed.
#[async_trait]
pub(crate) trait FrameDecoder: Send {
    async fn on_frame(
        &mut self,
        payload: &str,
        tx: &mpsc::Sender<Result<ChatEvent>>,
    ) -> Result<()>;
}

#[derive(Clone)]
pub struct ChatClientConfig {
    pub http_client: reqwest::Client,
    /// Backend origin, e.g. `http://localhost:8080`. Endpoint paths are
    /// appended to it.
    pub base_url: String,
}

impl ChatClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

/// Client for the chat backend. Cheap to clone; each streaming call owns
/// its decoding session, so concurrent streams never share state.
#[derive(Clone)]
pub struct ChatClient {
    config: ChatClientConfig,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Self {
        Self { config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Start a streaming chat turn.
    ///
    /// The returned stream yields deltas in arrival order and exactly one
    /// terminal event. Canceling `cancel` stops decoding and releases the
    /// connection; the stream then ends without a terminal event.
    pub async fn stream(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<ChatStream> {
        let resp = self
            .config
            .http_client
            .post(self.url(STREAM_PATH))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await?;
        let resp = ensure_success(resp).await?;

        let stream = resp
            .bytes_stream()
            .map_err(|err| Error::ResponseStreamFailed { source: err });
        let (tx_event, rx_event) = mpsc::channel::<Result<ChatEvent>>(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(sse::process_sse(stream, DeltaDecoder, tx_event, cancel));

        Ok(ChatStream { rx_event })
    }

    /// Drive one streaming turn to its end, routing events into
    /// `callbacks`. See [`StreamCallbacks`] for the terminal-sequence
    /// contract; the returned [`StreamOutcome`] names which sequence fired.
    pub async fn stream_chat(
        &self,
        request: &ChatRequest,
        mut callbacks: StreamCallbacks,
        cancel: CancellationToken,
    ) -> StreamOutcome {
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("chat request canceled before the stream opened");
                return StreamOutcome::Aborted;
            }
            res = self.stream(request, cancel.clone()) => match res {
                Ok(stream) => stream,
                Err(err) => {
                    callbacks.error(err);
                    return StreamOutcome::Failed;
                }
            },
        };

        while let Some(event) = stream.next().await {
            match event {
                Ok(ChatEvent::MessageDelta(text)) => callbacks.message(text),
                Ok(ChatEvent::Completed) => {
                    callbacks.complete();
                    return StreamOutcome::Completed;
                }
                Err(err) => {
                    callbacks.error(err);
                    return StreamOutcome::Failed;
                }
            }
        }

        // The decode loop dropped its sender without a terminal event:
        // the session was canceled.
        StreamOutcome::Aborted
    }

    /// Single-shot chat: the whole answer in one response body.
    pub async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let resp = self
            .config
            .http_client
            .post(self.url(CHAT_PATH))
            .json(request)
            .send()
            .await?;

        Ok(ensure_success(resp).await?.text().await?)
    }

    /// Retrieval-augmented chat: the answer plus the chunks retrieved from
    /// the vector store to ground it.
    pub async fn chat_rag(&self, request: &ChatRequest) -> Result<RagResponse> {
        let resp = self
            .config
            .http_client
            .post(self.url(RAG_PATH))
            .json(request)
            .send()
            .await?;

        Ok(ensure_success(resp).await?.json::<RagResponse>().await?)
    }
}

/// Precondition on every response: a non-success status fails the call
/// before any of the body is decoded.
async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read response>".to_string());
    Err(Error::UnexpectedStatus { status, body })
}
