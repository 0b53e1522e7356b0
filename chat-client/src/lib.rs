mod client;
mod decode;
mod error;
mod payload;
mod stream;

pub use crate::client::ChatClient;
pub use crate::client::ChatClientConfig;
pub use crate::error::Error;
pub use crate::error::Result;
pub use crate::payload::ChatRequest;
pub use crate::payload::RagResponse;
pub use crate::stream::ChatEvent;
pub use crate::stream::ChatStream;
pub use crate::stream::StreamCallbacks;
pub use crate::stream::StreamOutcome;
