use bus::PublishError;
use state::{Partition, Sensor};
use thiserror::Error;

mod payloads;
pub mod topics;
mod updater;
mod wrapper;

pub use payloads::{partition_state, sensor_device_class, sensor_state};
pub use updater::StateUpdater;
pub use wrapper::{EntityWrapper, WrapperFactory};

pub const PAYLOAD_AVAILABLE: &str = "online";
pub const PAYLOAD_NOT_AVAILABLE: &str = "offline";

#[derive(Debug, Clone, Copy)]
pub enum Entity<'a> {
    State,
    Partition(&'a Partition),
    Sensor(&'a Sensor),
}

impl Entity<'_> {
    pub fn label(&self) -> String {
        match self {
            Self::State => "state".to_string(),
            Self::Partition(partition) => format!("partition {}", partition.id),
            Self::Sensor(sensor) => format!("sensor {}", sensor.zone_id),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error("failed to serialize payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
