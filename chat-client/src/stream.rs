use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use futures::Stream;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::error::Result;

/// Events yielded while one chat response body decodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// One increment of assistant text, in wire order.
    MessageDelta(String),
    /// Clean end of stream; sent exactly once, after every delta.
    Completed,
}

/// Receiver half of a decoding session started by
/// [`crate::ChatClient::stream`].
///
/// Yields zero or more `MessageDelta` items followed by exactly one
/// terminal item (`Completed` or an error). A canceled session ends the
/// stream without a terminal item.
pub struct ChatStream {
    pub(crate) rx_event: mpsc::Receiver<Result<ChatEvent>>,
}

impl Stream for ChatStream {
    type Item = Result<ChatEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx_event.poll_recv(cx)
    }
}

/// Terminal result of driving one stream with [`StreamCallbacks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// End of stream reached; `on_complete` fired.
    Completed,
    /// The cancellation token fired; no terminal callback fired.
    Aborted,
    /// Transport fault; `on_error` fired.
    Failed,
}

type MessageFn = Box<dyn FnMut(String) + Send>;
type ErrorFn = Box<dyn FnOnce(Error) + Send>;
type CompleteFn = Box<dyn FnOnce() + Send>;

/// Callback registration for one chat stream.
///
/// Exactly one terminal sequence fires: zero or more `on_message` then one
/// `on_complete`; zero or more `on_message` then one `on_error`; or zero
/// or more `on_message` then neither, when the caller cancels.
pub struct StreamCallbacks {
    on_message: MessageFn,
    on_error: Option<ErrorFn>,
    on_complete: Option<CompleteFn>,
}

impl StreamCallbacks {
    pub fn new(on_message: impl FnMut(String) + Send + 'static) -> Self {
        Self {
            on_message: Box::new(on_message),
            on_error: None,
            on_complete: None,
        }
    }

    pub fn on_error(mut self, on_error: impl FnOnce(Error) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(on_error));
        self
    }

    pub fn on_complete(mut self, on_complete: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(on_complete));
        self
    }

    pub(crate) fn message(&mut self, text: String) {
        (self.on_message)(text);
    }

    pub(crate) fn error(self, err: Error) {
        if let Some(on_error) = self.on_error {
            on_error(err);
        }
    }

    pub(crate) fn complete(self) {
        if let Some(on_complete) = self.on_complete {
            on_complete();
        }
    }
}
