use std::collections::BTreeMap;
use std::future::Future;

use thiserror::Error;
use tracing::info;

use crate::envelope::RecordEnvelope;

/// Attribute carrying the originating stream name on every published message.
pub const STREAM_ATTRIBUTE: &str = "stream";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub topic: String,
    pub payload: Vec<u8>,
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    pub message_id: String,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish to {topic} timed out")]
    Timeout { topic: String },
    #[error("broker unreachable while publishing to {topic}: {message}")]
    Unreachable { topic: String, message: String },
    #[error("broker rejected publish to {topic} (status {status}): {body}")]
    Rejected {
        topic: String,
        status: u16,
        body: String,
    },
    #[error("unreadable publish response for {topic}: {message}")]
    InvalidResponse { topic: String, message: String },
    #[error("broker returned no message id for {topic}")]
    MissingMessageId { topic: String },
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A message broker client. Each call resolves once the broker has accepted
/// (or refused) the message, yielding its message id.
pub trait Publisher {
    fn publish(
        &mut self,
        request: PublishRequest,
    ) -> impl Future<Output = Result<String, PublishError>> + Send;
}

/// Adapts envelopes and raw lines into [`PublishRequest`]s for a [`Publisher`].
#[derive(Debug)]
pub struct PublishSink<P> {
    publisher: P,
    topic_override: Option<String>,
}

impl<P: Publisher> PublishSink<P> {
    pub fn new(publisher: P, topic_override: Option<String>) -> Self {
        Self {
            publisher,
            topic_override,
        }
    }

    /// The configured topic if there is one, otherwise the stream name.
    pub fn resolve_topic<'a>(&'a self, stream: &'a str) -> &'a str {
        self.topic_override.as_deref().unwrap_or(stream)
    }

    pub async fn publish_envelope(
        &mut self,
        envelope: &RecordEnvelope<'_>,
    ) -> Result<PublishResult, PublishError> {
        let payload = envelope.to_bytes()?;
        self.send(&envelope.stream, payload).await
    }

    /// Republishes an input line verbatim (the `raw` publish mode).
    pub async fn publish_raw(
        &mut self,
        stream: &str,
        line: &str,
    ) -> Result<PublishResult, PublishError> {
        self.send(stream, line.as_bytes().to_vec()).await
    }

    async fn send(&mut self, stream: &str, payload: Vec<u8>) -> Result<PublishResult, PublishError> {
        let topic = self.resolve_topic(stream).to_string();
        let request = PublishRequest {
            topic: topic.clone(),
            payload,
            attributes: BTreeMap::from([(STREAM_ATTRIBUTE.to_string(), stream.to_string())]),
        };
        let message_id = self.publisher.publish(request).await?;
        info!(%topic, %message_id, "message published");
        Ok(PublishResult { message_id })
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn into_publisher(self) -> P {
        self.publisher
    }
}
