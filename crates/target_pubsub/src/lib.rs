#![forbid(unsafe_code)]
//! Singer target that republishes tap output to Google Cloud Pub/Sub.
//!
//! The [`Router`] reads newline-delimited Singer messages, keeps each stream's
//! schema in a [`StreamRegistry`], validates records (Draft 4 JSON Schema), and
//! publishes one [`RecordEnvelope`] per `RECORD` through a [`Publisher`]. When
//! input ends it returns the [`StateValue`] the binary prints on stdout.
//!
//! ```rust,no_run
//! use target_pubsub::{PubSubConnection, PubSubPublisher, PublishSink, Router, TargetConfig};
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TargetConfig::load("config.json".as_ref())?;
//! let publisher = PubSubPublisher::new(PubSubConnection::resolve(&config)?)?;
//! let sink = PublishSink::new(publisher, config.topic.clone());
//! let mut router = Router::new(sink, config.router_options());
//! let state = router.run(tokio::io::stdin()).await?;
//! println!("{}", state.to_json_line()?);
//! # Ok(()) }
//! ```

mod config;
mod envelope;
mod error;
mod pubsub;
mod registry;
mod router;
mod sink;
mod state;
mod telemetry;
mod validator;

pub use config::{ConfigError, TargetConfig, DEFAULT_PUBLISH_TIMEOUT_SECS};
pub use envelope::RecordEnvelope;
pub use error::TargetError;
pub use pubsub::{
    PubSubConnection, PubSubPublisher, ACCESS_TOKEN_ENV, DEFAULT_ENDPOINT, EMULATOR_HOST_ENV,
    PROJECT_ENV,
};
pub use registry::{schema_hash, SchemaRecord, StreamRegistry};
pub use router::{PublishMode, Router, RouterOptions, RunPhase, RunSummary};
pub use sink::{
    PublishError, PublishRequest, PublishResult, PublishSink, Publisher, STREAM_ATTRIBUTE,
};
pub use state::{StateTracker, StateValue};
pub use telemetry::spawn_usage_stats;
pub use validator::{RecordValidator, SchemaCompileError, ValidationIssue, ValidationMode};
