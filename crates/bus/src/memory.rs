use std::{
    collections::BTreeMap,
    future,
    sync::{PoisonError, RwLock},
};

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

use crate::{topic_matches, validate_topic, BusMessage, PublishError, Publisher, Subscriber};

pub struct Bus {
    events: broadcast::Sender<BusMessage>,
    retained: RwLock<BTreeMap<String, String>>,
}

impl Bus {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        Self {
            events,
            retained: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn retained(&self, topic: &str) -> Option<String> {
        self.retained
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
    }

    pub fn retained_matching(&self, filter: &str) -> Vec<BusMessage> {
        self.retained
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(topic, _)| topic_matches(filter, topic))
            .map(|(topic, payload)| BusMessage {
                topic: topic.clone(),
                payload: payload.clone(),
                retain: true,
            })
            .collect()
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn store_retained(&self, topic: &str, payload: &str) {
        let mut retained = self
            .retained
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // An empty retained payload clears the topic.
        if payload.is_empty() {
            retained.remove(topic);
        } else {
            retained.insert(topic.to_string(), payload.to_string());
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl Publisher for Bus {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), PublishError> {
        validate_topic(topic)?;
        if retain {
            self.store_retained(topic, payload);
        }

        let delivered = self
            .events
            .send(BusMessage {
                topic: topic.to_string(),
                payload: payload.to_string(),
                retain,
            })
            .unwrap_or(0);
        debug!(topic, retain, delivered, "bus publish");
        Ok(())
    }
}

impl Subscriber for Bus {
    fn subscribe(&self, filter: &str) -> BoxStream<'static, BusMessage> {
        // Subscribe before snapshotting retained messages so nothing published
        // in between is lost.
        let live = BroadcastStream::new(self.events.subscribe());
        let replay = futures::stream::iter(self.retained_matching(filter));

        let filter = filter.to_string();
        let live = live.filter_map(move |received| {
            let message = match received {
                Ok(message) if topic_matches(&filter, &message.topic) => Some(message),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(
                        filter = %filter,
                        skipped,
                        "bus subscriber lagged; messages dropped"
                    );
                    None
                }
            };
            future::ready(message)
        });

        replay.chain(live).boxed()
    }
}
