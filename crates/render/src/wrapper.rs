use std::sync::Arc;

use bus::Publisher;
use shared::{config::GatewayConfig, domain::SessionToken};
use tracing::debug;

use crate::{payloads, topics, Entity, RenderError, PAYLOAD_AVAILABLE, PAYLOAD_NOT_AVAILABLE};

pub struct WrapperFactory {
    publisher: Arc<dyn Publisher>,
    cfg: Arc<GatewayConfig>,
    token: SessionToken,
}

impl WrapperFactory {
    pub fn new(
        publisher: Arc<dyn Publisher>,
        cfg: Arc<GatewayConfig>,
        token: SessionToken,
    ) -> Self {
        Self {
            publisher,
            cfg,
            token,
        }
    }

    pub fn wrap<'a>(&'a self, entity: Entity<'a>) -> EntityWrapper<'a> {
        EntityWrapper {
            factory: self,
            entity,
        }
    }
}

pub struct EntityWrapper<'a> {
    factory: &'a WrapperFactory,
    entity: Entity<'a>,
}

impl EntityWrapper<'_> {
    pub async fn set_available(&self) -> Result<(), RenderError> {
        let payload = PAYLOAD_AVAILABLE.to_string();
        self.publish("availability", payload).await
    }

    pub async fn set_unavailable(&self) -> Result<(), RenderError> {
        let payload = PAYLOAD_NOT_AVAILABLE.to_string();
        self.publish("availability", payload).await
    }

    pub async fn configure(&self) -> Result<(), RenderError> {
        let cfg = self.factory.cfg.as_ref();
        let payload = match self.entity {
            Entity::State => return Ok(()),
            Entity::Partition(partition) => {
                payloads::partition_config(cfg, &self.factory.token, partition)?
            }
            Entity::Sensor(sensor) => payloads::sensor_config(cfg, sensor)?,
        };
        self.publish("config", payload).await
    }

    pub async fn unconfigure(&self) -> Result<(), RenderError> {
        if matches!(self.entity, Entity::State) {
            return Ok(());
        }
        self.publish("config", String::new()).await
    }

    pub async fn update_state(&self) -> Result<(), RenderError> {
        let payload = match self.entity {
            Entity::State => return Ok(()),
            Entity::Partition(partition) => payloads::partition_state(&partition.status),
            Entity::Sensor(sensor) => payloads::sensor_state(sensor).to_string(),
        };
        self.publish("state", payload).await
    }

    pub async fn update_attributes(&self) -> Result<(), RenderError> {
        let payload = match self.entity {
            Entity::State => return Ok(()),
            Entity::Partition(partition) => payloads::partition_attributes(partition)?,
            Entity::Sensor(sensor) => payloads::sensor_attributes(sensor)?,
        };
        self.publish("attributes", payload).await
    }

    fn topic(&self, leaf: &str) -> String {
        let cfg = self.factory.cfg.as_ref();
        match self.entity {
            // The gateway only has an availability topic.
            Entity::State => topics::gateway_availability(cfg),
            Entity::Partition(partition) => {
                format!("{}/{leaf}", topics::partition_base(cfg, partition.id))
            }
            Entity::Sensor(sensor) => {
                format!("{}/{leaf}", topics::sensor_base(cfg, sensor.zone_id))
            }
        }
    }

    async fn publish(&self, leaf: &str, payload: String) -> Result<(), RenderError> {
        let topic = self.topic(leaf);
        self.factory
            .publisher
            .publish(&topic, &payload, self.factory.cfg.retain)
            .await?;
        debug!(entity = %self.entity.label(), topic = %topic, "rendered");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/wrapper_tests.rs"]
pub(crate) mod tests;
