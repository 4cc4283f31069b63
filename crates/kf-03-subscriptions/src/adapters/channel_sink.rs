//! `EventSink` over a bounded tokio channel.
//!
//! The receiving half stands in for a replica's event stream: whatever
//! drains it (an RPC stream writer, a test) sees events in delivery order.

use crate::ports::EventSink;
use async_trait::async_trait;
use shared_types::{BrokerError, BrokerResult, MatchedEvent};
use tokio::sync::mpsc;

pub struct ChannelSink {
    tx: mpsc::Sender<MatchedEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<MatchedEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn send(&self, evt: MatchedEvent) -> BrokerResult<()> {
        self.tx
            .send(evt)
            .await
            .map_err(|_| BrokerError::component_gone("event stream closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{event_type, Category, ErrorKind, Event};
    use std::time::Duration;

    fn matched() -> MatchedEvent {
        MatchedEvent {
            event: Event::new(Category::Message, event_type::CRON, Duration::from_secs(1)),
            route_id: 3,
            env: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_forwards_and_reports_closed_stream() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.send(matched()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().route_id, 3);

        drop(rx);
        let err = sink.send(matched()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ComponentGone);
    }
}
