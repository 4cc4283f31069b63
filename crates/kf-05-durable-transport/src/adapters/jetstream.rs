//! NATS JetStream transport.
//!
//! Events go to the `EVENTS` stream, which captures `evt.>` and keeps
//! messages for three days. Component presence lives in the `COMPONENTS`
//! key/value bucket with a 12 hour TTL. Consumers are durable pull
//! consumers named after their subject.

use crate::domain::{archive_subject, decode, encode, WireMessage};
use crate::error::{TransportError, TransportResult};
use crate::ports::{DurableTransport, ReceivedEvent, TransportListener};
use crate::{
    COMPONENTS_BUCKET, COMPONENTS_TTL, EVENT_RETENTION, EVENT_STREAM, EVENT_SUBJECTS,
    HEADER_REDELIVERY, MAX_MESSAGE_SIZE,
};
use async_nats::jetstream::{self, consumer::pull, kv, stream};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use shared_types::{Component, Event};
use std::sync::Arc;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct JetStreamTransport {
    client: async_nats::Client,
    context: jetstream::Context,
    stream: stream::Stream,
    components: kv::Store,
    consumers: Arc<DashMap<String, CancellationToken>>,
    closed: CancellationToken,
}

impl JetStreamTransport {
    /// Connect and make sure the stream and bucket exist.
    pub async fn connect(addr: &str) -> TransportResult<Self> {
        let connect_err = |e: &dyn std::fmt::Display| TransportError::Connect {
            addr: addr.to_string(),
            reason: e.to_string(),
        };

        let client = async_nats::connect(addr).await.map_err(|e| connect_err(&e))?;
        let context = jetstream::new(client.clone());

        let stream = context
            .get_or_create_stream(stream::Config {
                name: EVENT_STREAM.to_string(),
                subjects: vec![EVENT_SUBJECTS.to_string()],
                max_message_size: i32::try_from(MAX_MESSAGE_SIZE).unwrap_or(i32::MAX),
                max_age: EVENT_RETENTION,
                ..Default::default()
            })
            .await
            .map_err(|e| connect_err(&e))?;

        let components = context
            .create_key_value(kv::Config {
                bucket: COMPONENTS_BUCKET.to_string(),
                max_age: COMPONENTS_TTL,
                ..Default::default()
            })
            .await
            .map_err(|e| connect_err(&e))?;

        info!(addr, stream = EVENT_STREAM, bucket = COMPONENTS_BUCKET, "JetStream connected");
        Ok(Self {
            client,
            context,
            stream,
            components,
            consumers: Arc::new(DashMap::new()),
            closed: CancellationToken::new(),
        })
    }

    fn ensure_open(&self) -> TransportResult<()> {
        if self.closed.is_cancelled() {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

async fn deliver(msg: &jetstream::Message, listener: &dyn TransportListener) {
    let mut event = match decode(&msg.payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(subject = %msg.subject, error = %e, "Dropping undecodable message");
            return;
        }
    };
    if let Ok(info) = msg.info() {
        event.reduce_ttl_since(SystemTime::from(info.published));
    }
    let redelivery = msg
        .headers
        .as_ref()
        .and_then(|h| h.get(HEADER_REDELIVERY))
        .is_some_and(|v| v.as_str() == "true");

    listener
        .on_event(ReceivedEvent {
            event,
            subject: msg.subject.to_string(),
            redelivery,
        })
        .await;
}

#[async_trait]
impl DurableTransport for JetStreamTransport {
    async fn send(&self, msg: WireMessage) -> TransportResult<()> {
        self.ensure_open()?;
        let publish_err = |reason: String| TransportError::Publish {
            subject: msg.subject.clone(),
            reason,
        };

        let mut headers = async_nats::HeaderMap::new();
        for (k, v) in &msg.headers {
            headers.insert(k.as_str(), v.as_str());
        }

        let ack = self
            .context
            .publish_with_headers(msg.subject.clone(), headers, msg.payload.clone().into())
            .await
            .map_err(|e| publish_err(e.to_string()))?;

        let subject = msg.subject.clone();
        tokio::spawn(async move {
            if let Err(e) = ack.await {
                warn!(subject = %subject, error = %e, "Publish acknowledgement lost");
            }
        });
        Ok(())
    }

    async fn consume_events(
        &self,
        scope: CancellationToken,
        consumer: &str,
        subject: &str,
        listener: Arc<dyn TransportListener>,
    ) -> TransportResult<()> {
        self.ensure_open()?;
        if self
            .consumers
            .get(consumer)
            .is_some_and(|t| !t.is_cancelled())
        {
            debug!(consumer, "Consumer already running");
            return Ok(());
        }

        let consume_err = |e: &dyn std::fmt::Display| TransportError::Consume {
            consumer: consumer.to_string(),
            reason: e.to_string(),
        };
        let pull_consumer = self
            .stream
            .get_or_create_consumer(
                consumer,
                pull::Config {
                    durable_name: Some(consumer.to_string()),
                    filter_subject: subject.to_string(),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| consume_err(&e))?;
        let mut messages = pull_consumer.messages().await.map_err(|e| consume_err(&e))?;

        let token = scope.child_token();
        self.consumers.insert(consumer.to_string(), token.clone());
        let closed = self.closed.clone();
        let consumers = Arc::clone(&self.consumers);
        let consumer = consumer.to_string();
        debug!(consumer = %consumer, subject, "Consumer started");

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = token.cancelled() => break,
                    _ = closed.cancelled() => break,
                    next = messages.next() => next,
                };
                match next {
                    Some(Ok(msg)) => {
                        if let Err(e) = msg.ack().await {
                            warn!(consumer = %consumer, error = %e, "Ack failed");
                        }
                        deliver(&msg, listener.as_ref()).await;
                    }
                    Some(Err(e)) => warn!(consumer = %consumer, error = %e, "Consumer error"),
                    None => break,
                }
            }
            token.cancel();
            consumers.remove_if(&consumer, |_, t| t.is_cancelled());
            debug!(consumer = %consumer, "Consumer stopped");
        });
        Ok(())
    }

    async fn put_component(&self, component: &Component) -> TransportResult<()> {
        self.ensure_open()?;
        let value =
            serde_json::to_vec(component).map_err(|e| TransportError::Codec(e.to_string()))?;
        self.components
            .put(component.key(), value.into())
            .await
            .map_err(|e| TransportError::Bucket(e.to_string()))?;
        Ok(())
    }

    async fn record_event(&self, evt: &Event) -> TransportResult<()> {
        self.send(encode(&archive_subject(&evt.id), evt, false)?).await
    }

    async fn close(&self) {
        self.closed.cancel();
        self.consumers.clear();
        if let Err(e) = self.client.flush().await {
            warn!(error = %e, "Flush on close failed");
        }
        info!("JetStream transport closed");
    }

    fn is_healthy(&self) -> bool {
        !self.closed.is_cancelled()
            && self.client.connection_state() == async_nats::connection::State::Connected
    }
}
