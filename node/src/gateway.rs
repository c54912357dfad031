// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Live vehicle stream.
//!
//! Each connection gets its own subscription. The first message is a full
//! snapshot; after that every wakeup (however many reports piled up) yields
//! one fresh snapshot, and an idle connection gets a heartbeat once per
//! keepalive interval.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};

use crate::api::VehicleView;
use crate::notifier::{ChangeNotifier, Subscription, SubscriptionId};
use crate::query::QueryService;
use crate::store::RecordStore;

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayMessage {
    Snapshot(Vec<VehicleView>),
    Heartbeat,
}

#[derive(Clone)]
pub struct StreamGateway {
    query: QueryService,
    notifier: ChangeNotifier,
    keepalive: Duration,
}

struct Connection {
    subscription: Subscription,
    query: QueryService,
    keepalive: Duration,
    greeted: bool,
}

/// `None` ends the stream when the store cannot be read.
async fn snapshot(query: &QueryService, subscriber: SubscriptionId) -> Option<GatewayMessage> {
    match query.vehicles(None).await {
        Ok(views) => Some(GatewayMessage::Snapshot(views)),
        Err(e) => {
            tracing::error!("snapshot for subscriber {} failed: {}", subscriber, e);
            None
        }
    }
}

impl StreamGateway {
    pub fn new(query: QueryService, notifier: ChangeNotifier, keepalive: Duration) -> Self {
        Self {
            query,
            notifier,
            keepalive,
        }
    }

    /// Opens a connection. Dropping the stream releases the subscription.
    pub fn connect(&self) -> impl Stream<Item = GatewayMessage> + Send + 'static {
        let conn = Connection {
            subscription: self.notifier.subscribe(),
            query: self.query.clone(),
            keepalive: self.keepalive,
            greeted: false,
        };
        tracing::debug!("stream connection opened (subscriber {})", conn.subscription.id());

        stream::unfold(conn, |mut conn| async move {
            if !conn.greeted {
                conn.greeted = true;
                let msg = snapshot(&conn.query, conn.subscription.id()).await;
                return msg.map(|m| (m, conn));
            }

            match tokio::time::timeout(conn.keepalive, conn.subscription.recv()).await {
                Ok(Some(_)) => {
                    let coalesced = conn.subscription.drain().len();
                    if coalesced > 0 {
                        tracing::trace!("coalesced {} extra notifications", coalesced);
                    }
                    let msg = snapshot(&conn.query, conn.subscription.id()).await;
                    msg.map(|m| (m, conn))
                }
                Ok(None) => {
                    tracing::debug!("subscription {} closed", conn.subscription.id());
                    None
                }
                Err(_) => Some((GatewayMessage::Heartbeat, conn)),
            }
        })
    }
}

/// Convenience for callers holding the parts in `Arc`s.
pub fn gateway_for(store: Arc<RecordStore>, notifier: ChangeNotifier, keepalive: Duration) -> StreamGateway {
    StreamGateway::new(QueryService::new(store), notifier, keepalive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestHandler;
    use futures::StreamExt;
    use serde_json::json;

    fn setup(keepalive: Duration) -> (IngestHandler, StreamGateway, ChangeNotifier) {
        let store = Arc::new(RecordStore::in_memory());
        let notifier = ChangeNotifier::new(8);
        let ingest = IngestHandler::new(Arc::clone(&store), notifier.clone());
        let gateway = gateway_for(store, notifier.clone(), keepalive);
        (ingest, gateway, notifier)
    }

    #[tokio::test]
    async fn test_initial_snapshot_then_update() {
        let (ingest, gateway, _) = setup(Duration::from_secs(5));
        ingest.ingest(json!({"tid": "bus01", "lat": 17.0, "lon": 78.0})).unwrap();

        let mut stream = Box::pin(gateway.connect());
        match stream.next().await.unwrap() {
            GatewayMessage::Snapshot(v) => assert_eq!(v.len(), 1),
            other => panic!("unexpected {:?}", other),
        }

        ingest.ingest(json!({"tid": "bus02", "lat": 17.5, "lon": 78.5})).unwrap();
        let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap();
        match next {
            GatewayMessage::Snapshot(v) => {
                assert!(v.iter().any(|view| view.device_id == "bus02"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_burst_is_coalesced() {
        let (ingest, gateway, _) = setup(Duration::from_millis(200));
        let mut stream = Box::pin(gateway.connect());
        stream.next().await.unwrap();

        for i in 0..5 {
            ingest
                .ingest(json!({"tid": "bus01", "lat": 17.0 + i as f64 * 0.01, "lon": 78.0}))
                .unwrap();
        }

        match stream.next().await.unwrap() {
            GatewayMessage::Snapshot(v) => assert!((v[0].latitude - 17.04).abs() < 1e-9),
            other => panic!("unexpected {:?}", other),
        }
        // Nothing left pending, so the next message is a heartbeat.
        let heartbeat = tokio::time::timeout(Duration::from_secs(2), stream.next()).await.unwrap();
        assert_eq!(heartbeat, Some(GatewayMessage::Heartbeat));
    }

    #[tokio::test]
    async fn test_idle_connection_gets_heartbeat() {
        let (_, gateway, _) = setup(Duration::from_millis(50));
        let mut stream = Box::pin(gateway.connect());
        assert_eq!(stream.next().await, Some(GatewayMessage::Snapshot(vec![])));
        assert_eq!(stream.next().await, Some(GatewayMessage::Heartbeat));
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let (_, gateway, notifier) = setup(Duration::from_secs(5));
        let stream = gateway.connect();
        assert_eq!(notifier.subscriber_count(), 1);
        drop(stream);
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
