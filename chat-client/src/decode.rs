use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::client::FrameDecoder;
use crate::error::Result;
use crate::stream::ChatEvent;

/// Discriminator of frames that carry incremental assistant text.
const DELTA_KIND: &str = "delta";

/// Routes `delta` frame payloads to the event channel. Every other frame
/// shape is valid wire traffic that this decoder deliberately ignores.
pub(crate) struct DeltaDecoder;

#[async_trait]
impl FrameDecoder for DeltaDecoder {
    async fn on_frame(
        &mut self,
        payload: &str,
        tx: &mpsc::Sender<Result<ChatEvent>>,
    ) -> Result<()> {
        let Ok(frame) = serde_json::from_str::<serde_json::Value>(payload) else {
            warn!("failed to parse stream frame as JSON: {payload}");
            return Ok(());
        };

        if frame.get("type").and_then(|kind| kind.as_str()) == Some(DELTA_KIND)
            && let Some(content) = frame.get("content").and_then(|content| content.as_str())
            && !content.is_empty()
        {
            let _ = tx
                .send(Ok(ChatEvent::MessageDelta(content.to_string())))
                .await;
        }

        Ok(())
    }
}
