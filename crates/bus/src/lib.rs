use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod memory;

pub use memory::Bus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    pub topic: String,
    pub payload: String,
    #[serde(default)]
    pub retain: bool,
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid topic '{0}'")]
    InvalidTopic(String),
    #[error("transport failure: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<(), PublishError>;
}

pub trait Subscriber: Send + Sync {
    /// Messages whose topic matches `filter`, starting with matching retained
    /// messages.
    fn subscribe(&self, filter: &str) -> BoxStream<'static, BusMessage>;
}

/// MQTT topic filter matching: `+` matches exactly one level, a trailing `#`
/// matches any number of remaining levels (including none).
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return filter_levels.next().is_none(),
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

pub fn validate_topic(topic: &str) -> Result<(), PublishError> {
    if topic.is_empty() || topic.contains(['+', '#']) {
        return Err(PublishError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
