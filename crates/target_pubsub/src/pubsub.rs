//! Google Cloud Pub/Sub publisher over the REST API.
//!
//! Each call issues one `topics.publish` request carrying a single message and
//! waits for the broker's acknowledgement before returning, so the router
//! never has more than one publish outstanding.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ConfigError, TargetConfig};
use crate::sink::{PublishError, PublishRequest, Publisher};

pub const DEFAULT_ENDPOINT: &str = "https://pubsub.googleapis.com";
pub const EMULATOR_HOST_ENV: &str = "PUBSUB_EMULATOR_HOST";
pub const ACCESS_TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
pub const PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// Where and how to reach the broker.
#[derive(Clone, PartialEq, Eq)]
pub struct PubSubConnection {
    pub endpoint: String,
    pub project_id: String,
    pub access_token: Option<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for PubSubConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSubConnection")
            .field("endpoint", &self.endpoint)
            .field("project_id", &self.project_id)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl PubSubConnection {
    pub fn resolve(config: &TargetConfig) -> Result<Self, ConfigError> {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    /// Resolves the connection from `config`, falling back to variables read
    /// through `env`. An emulator host disables authentication.
    pub fn resolve_with(
        config: &TargetConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let project_id = config
            .project_id
            .clone()
            .or_else(|| env(PROJECT_ENV))
            .filter(|p| !p.is_empty())
            .ok_or(ConfigError::MissingProjectId)?;
        let timeout = Duration::from_secs(config.publish_timeout_secs);

        if let Some(host) = env(EMULATOR_HOST_ENV).filter(|h| !h.is_empty()) {
            return Ok(Self {
                endpoint: format!("http://{host}"),
                project_id,
                access_token: None,
                timeout,
            });
        }

        Ok(Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            project_id,
            access_token: config.access_token.clone().or_else(|| env(ACCESS_TOKEN_ENV)),
            timeout,
        })
    }

    /// Qualifies a bare topic name with the project; fully qualified names
    /// pass through.
    pub fn topic_path(&self, topic: &str) -> String {
        if topic.starts_with("projects/") {
            topic.to_string()
        } else {
            format!("projects/{}/topics/{topic}", self.project_id)
        }
    }

    fn publish_url(&self, topic: &str) -> String {
        format!(
            "{}/v1/{}:publish",
            self.endpoint.trim_end_matches('/'),
            self.topic_path(topic)
        )
    }
}

#[derive(Serialize)]
struct PublishBody<'a> {
    messages: [OutgoingMessage<'a>; 1],
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    data: String,
    attributes: &'a BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PubSubPublisher {
    client: reqwest::Client,
    connection: PubSubConnection,
}

impl PubSubPublisher {
    pub fn new(connection: PubSubConnection) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(connection.timeout)
            .build()?;
        Ok(Self { client, connection })
    }
}

impl Publisher for PubSubPublisher {
    async fn publish(&mut self, request: PublishRequest) -> Result<String, PublishError> {
        let topic = self.connection.topic_path(&request.topic);
        let body = PublishBody {
            messages: [OutgoingMessage {
                data: STANDARD.encode(&request.payload),
                attributes: &request.attributes,
            }],
        };

        let mut builder = self
            .client
            .post(self.connection.publish_url(&request.topic))
            .json(&body);
        if let Some(token) = &self.connection.access_token {
            builder = builder.bearer_auth(token);
        }

        debug!(%topic, bytes = request.payload.len(), "publishing message");
        let response = builder.send().await.map_err(|err| transport_error(&topic, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                topic,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: PublishResponse = response
            .json()
            .await
            .map_err(|err| PublishError::InvalidResponse {
                topic: topic.clone(),
                message: err.to_string(),
            })?;
        parsed
            .message_ids
            .into_iter()
            .next()
            .ok_or(PublishError::MissingMessageId { topic })
    }
}

fn transport_error(topic: &str, err: reqwest::Error) -> PublishError {
    if err.is_timeout() {
        PublishError::Timeout {
            topic: topic.to_string(),
        }
    } else {
        PublishError::Unreachable {
            topic: topic.to_string(),
            message: err.to_string(),
        }
    }
}
