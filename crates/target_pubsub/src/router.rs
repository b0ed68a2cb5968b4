use serde::Deserialize;
use singer_events::{
    IngestLimits, LineIngestor, LineRecord, RecordMessage, SchemaMessage, SingerMessage,
    SingerMessageParser,
};
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::envelope::RecordEnvelope;
use crate::error::TargetError;
use crate::registry::StreamRegistry;
use crate::sink::{PublishSink, Publisher};
use crate::state::{StateTracker, StateValue};
use crate::validator::ValidationMode;

/// What is published for each message.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
    /// One [`RecordEnvelope`] per `RECORD`; `SCHEMA` messages are not published.
    #[default]
    Envelope,
    /// Every `SCHEMA` and `RECORD` line is republished verbatim.
    Raw,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct RouterOptions {
    pub validation: ValidationMode,
    pub publish_mode: PublishMode,
    pub limits: IngestLimits,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum RunPhase {
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct RunSummary {
    pub schemas_registered: usize,
    pub records_published: usize,
    pub schemas_published: usize,
    pub state_messages: usize,
    pub unrecognized_skipped: usize,
}

/// Single-pass router from Singer tap output to a [`Publisher`].
///
/// Lines are handled strictly in input order and each publish is awaited
/// before the next line is read. The first fatal error stops the run;
/// messages already published stay published.
pub struct Router<P: Publisher> {
    registry: StreamRegistry,
    state: StateTracker,
    sink: PublishSink<P>,
    options: RouterOptions,
    phase: RunPhase,
    summary: RunSummary,
}

impl<P: Publisher> Router<P> {
    pub fn new(sink: PublishSink<P>, options: RouterOptions) -> Self {
        Self {
            registry: StreamRegistry::new(options.validation),
            state: StateTracker::new(),
            sink,
            options,
            phase: RunPhase::Idle,
            summary: RunSummary::default(),
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn into_publisher(self) -> P {
        self.sink.into_publisher()
    }

    /// Consumes `input` to the end and returns the final state snapshot.
    pub async fn run<R: AsyncRead + Unpin>(&mut self, input: R) -> Result<StateValue, TargetError> {
        if self.phase != RunPhase::Idle {
            return Err(TargetError::RouterReused);
        }
        self.phase = RunPhase::Running;

        match self.process(input).await {
            Ok(()) => {
                self.phase = RunPhase::Completed;
                let summary = self.summary;
                info!(
                    streams = self.registry.len(),
                    schemas = summary.schemas_registered,
                    records = summary.records_published,
                    states = summary.state_messages,
                    skipped = summary.unrecognized_skipped,
                    "input exhausted"
                );
                Ok(self.state.snapshot())
            }
            Err(err) => {
                self.phase = RunPhase::Failed;
                Err(err)
            }
        }
    }

    async fn process<R: AsyncRead + Unpin>(&mut self, input: R) -> Result<(), TargetError> {
        let mut ingestor = LineIngestor::new(input, SingerMessageParser::new(), self.options.limits);
        while let Some(LineRecord {
            line_number,
            line,
            outcome,
        }) = ingestor.next_record().await
        {
            let message =
                outcome.map_err(|err| TargetError::from_line_error(line_number, err))?;
            match message {
                SingerMessage::Schema(schema) => self.on_schema(line_number, &line, schema).await?,
                SingerMessage::Record(record) => self.on_record(line_number, &line, record).await?,
                SingerMessage::State(state) => {
                    self.state.on_state_message(state.value);
                    self.summary.state_messages += 1;
                }
                SingerMessage::Unrecognized { message_type } => {
                    warn!(line_number, %message_type, "skipping message of unrecognized type");
                    self.summary.unrecognized_skipped += 1;
                }
            }
        }
        Ok(())
    }

    async fn on_schema(
        &mut self,
        line_number: usize,
        line: &str,
        message: SchemaMessage,
    ) -> Result<(), TargetError> {
        let stream = message.stream.clone();
        let registered = self
            .registry
            .register_schema(message, line)
            .map_err(|err| TargetError::InvalidSchema {
                line_number,
                stream: stream.clone(),
                message: err.0,
            })?;
        debug!(
            line_number,
            %stream,
            schema_hash = %registered.schema_hash,
            "registered schema"
        );
        self.state.on_stream_registered(&stream);
        self.summary.schemas_registered += 1;

        if self.options.publish_mode == PublishMode::Raw {
            self.sink
                .publish_raw(&stream, line)
                .await
                .map_err(|source| TargetError::Publish {
                    line_number,
                    source,
                })?;
            self.summary.schemas_published += 1;
        }
        Ok(())
    }

    async fn on_record(
        &mut self,
        line_number: usize,
        line: &str,
        message: RecordMessage,
    ) -> Result<(), TargetError> {
        let RecordMessage { stream, record } = message;
        let Some(schema) = self.registry.lookup(&stream) else {
            return Err(TargetError::UnknownStream {
                line_number,
                stream,
            });
        };

        if let Err(issues) = self.registry.validate(&stream, &record) {
            if self.options.validation == ValidationMode::Strict {
                return Err(TargetError::Validation {
                    line_number,
                    stream,
                    issues,
                });
            }
            warn!(
                line_number,
                %stream,
                issues = issues.len(),
                "record does not match schema; publishing anyway"
            );
        }

        let published = match self.options.publish_mode {
            PublishMode::Envelope => {
                let envelope = RecordEnvelope::new(schema, &record);
                self.sink.publish_envelope(&envelope).await
            }
            PublishMode::Raw => self.sink.publish_raw(&stream, line).await,
        };
        published.map_err(|source| TargetError::Publish {
            line_number,
            source,
        })?;

        self.state
            .on_record_processed(&stream, &record, &schema.key_properties);
        self.summary.records_published += 1;
        Ok(())
    }
}
