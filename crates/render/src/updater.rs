use state::StateChange;
use tracing::{debug, error};

use crate::{Entity, WrapperFactory};

#[derive(Debug, Clone, Copy)]
enum Step {
    Configure,
    Unconfigure,
    State,
    Attributes,
    Available,
    Unavailable,
}

impl Step {
    fn name(self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Unconfigure => "unconfigure",
            Self::State => "update_state",
            Self::Attributes => "update_attributes",
            Self::Available => "set_available",
            Self::Unavailable => "set_unavailable",
        }
    }
}

const ADDED: &[Step] = &[Step::Configure, Step::State, Step::Attributes, Step::Available];
const REMOVED: &[Step] = &[Step::Unavailable, Step::Unconfigure];

pub struct StateUpdater<'a> {
    factory: &'a WrapperFactory,
}

impl<'a> StateUpdater<'a> {
    pub fn new(factory: &'a WrapperFactory) -> Self {
        Self { factory }
    }

    /// Renders every change in order. A failed publish is logged and the
    /// remaining steps still run.
    pub async fn apply(&self, changes: &[StateChange]) {
        for change in changes {
            match change {
                StateChange::PartitionAdded(partition) => {
                    self.render(Entity::Partition(partition), ADDED).await
                }
                StateChange::PartitionRemoved(partition) => {
                    self.render(Entity::Partition(partition), REMOVED).await
                }
                StateChange::PartitionConfig(partition) => {
                    self.render(Entity::Partition(partition), &[Step::Configure])
                        .await
                }
                StateChange::PartitionStatus {
                    partition,
                    previous,
                } => {
                    debug!(
                        partition_id = partition.id.0,
                        from = %previous,
                        to = %partition.status,
                        "partition status changed"
                    );
                    self.render(Entity::Partition(partition), &[Step::State])
                        .await
                }
                StateChange::PartitionAttributes(partition) => {
                    self.render(Entity::Partition(partition), &[Step::Attributes]).await
                }
                StateChange::SensorAdded(sensor) => {
                    self.render(Entity::Sensor(sensor), ADDED).await
                }
                StateChange::SensorRemoved(sensor) => {
                    self.render(Entity::Sensor(sensor), REMOVED).await
                }
                StateChange::SensorConfig(sensor) => {
                    self.render(Entity::Sensor(sensor), &[Step::Configure]).await
                }
                StateChange::SensorStatus { sensor, previous } => {
                    debug!(
                        zone_id = sensor.zone_id.0,
                        from = %previous,
                        to = %sensor.status,
                        "sensor status changed"
                    );
                    self.render(Entity::Sensor(sensor), &[Step::State]).await
                }
                StateChange::SensorAttributes(sensor) => {
                    self.render(Entity::Sensor(sensor), &[Step::Attributes])
                        .await
                }
            }
        }
    }

    async fn render(&self, entity: Entity<'_>, steps: &[Step]) {
        let wrapper = self.factory.wrap(entity);
        for step in steps {
            let result = match step {
                Step::Configure => wrapper.configure().await,
                Step::Unconfigure => wrapper.unconfigure().await,
                Step::State => wrapper.update_state().await,
                Step::Attributes => wrapper.update_attributes().await,
                Step::Available => wrapper.set_available().await,
                Step::Unavailable => wrapper.set_unavailable().await,
            };
            if let Err(err) = result {
                error!(
                    entity = %entity.label(),
                    step = step.name(),
                    error = %err,
                    "failed to render state change"
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/updater_tests.rs"]
mod tests;
