//! In-memory model of the panel: partitions and the sensors they own.

use std::collections::BTreeMap;

use shared::{
    domain::{PartitionId, ZoneId},
    protocol::{InfoSummary, ZoneRecord},
};
use tracing::{debug, info, warn};

mod partition;
mod sensor;

pub use partition::Partition;
pub use sensor::Sensor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    PartitionAdded(Partition),
    PartitionRemoved(Partition),
    PartitionConfig(Partition),
    PartitionStatus {
        partition: Partition,
        previous: String,
    },
    PartitionAttributes(Partition),
    SensorAdded(Sensor),
    SensorRemoved(Sensor),
    SensorConfig(Sensor),
    SensorStatus {
        sensor: Sensor,
        previous: String,
    },
    SensorAttributes(Sensor),
}

#[derive(Debug, Default, Clone)]
pub struct StateStore {
    partitions: BTreeMap<PartitionId, Partition>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition(&self, partition_id: PartitionId) -> Option<&Partition> {
        self.partitions.get(&partition_id)
    }

    pub fn partition_mut(&mut self, partition_id: PartitionId) -> Option<&mut Partition> {
        self.partitions.get_mut(&partition_id)
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values()
    }

    pub fn zone(&self, zone_id: ZoneId) -> Option<&Sensor> {
        self.partitions.values().find_map(|p| p.zone(zone_id))
    }

    pub fn apply_info(&mut self, summary: &InfoSummary) -> Vec<StateChange> {
        let mut changes = Vec::new();

        let listed: Vec<PartitionId> = summary
            .partitions
            .iter()
            .map(|p| p.partition_id)
            .collect();
        let removed: Vec<PartitionId> = self
            .partitions
            .keys()
            .filter(|id| !listed.contains(id))
            .copied()
            .collect();
        for partition_id in removed {
            if let Some(partition) = self.partitions.remove(&partition_id) {
                info!(
                    partition_id = partition_id.0,
                    "partition removed from panel summary"
                );
                let sensors = partition.sensors().cloned();
                changes.extend(sensors.map(StateChange::SensorRemoved));
                changes.push(StateChange::PartitionRemoved(partition));
            }
        }

        for record in &summary.partitions {
            match self.partitions.get_mut(&record.partition_id) {
                Some(partition) => changes.extend(partition.update_from_record(record)),
                None => {
                    let partition = Partition::from_record(record);
                    debug!(
                        partition_id = partition.id.0,
                        sensors = record.zone_list.len(),
                        "partition added"
                    );
                    changes.push(StateChange::PartitionAdded(partition.clone()));
                    let sensors = partition.sensors().cloned();
                    changes.extend(sensors.map(StateChange::SensorAdded));
                    self.partitions.insert(partition.id, partition);
                }
            }
        }

        changes
    }

    pub fn zone_open(&mut self, zone_id: ZoneId) -> Vec<StateChange> {
        self.zone_activity(zone_id, true)
    }

    pub fn zone_closed(&mut self, zone_id: ZoneId) -> Vec<StateChange> {
        self.zone_activity(zone_id, false)
    }

    pub fn zone_update(&mut self, record: &ZoneRecord) -> Vec<StateChange> {
        match self.locate_zone(record.zone_id) {
            Some(partition) => partition.update_sensor(record),
            None => {
                warn!(zone_id = record.zone_id.0, "zone update for unknown zone");
                Vec::new()
            }
        }
    }

    pub fn zone_add(&mut self, record: &ZoneRecord) -> Vec<StateChange> {
        if self.locate_zone(record.zone_id).is_some() {
            return self.zone_update(record);
        }
        match self.partitions.get_mut(&record.partition_id) {
            Some(partition) => partition.add_sensor(Sensor::from_record(record)),
            None => {
                warn!(
                    zone_id = record.zone_id.0,
                    partition_id = record.partition_id.0,
                    "zone added to unknown partition"
                );
                Vec::new()
            }
        }
    }

    pub fn zone_delete(&mut self, zone_id: ZoneId) -> Vec<StateChange> {
        match self.locate_zone(zone_id) {
            Some(partition) => partition.remove_zone(zone_id),
            None => {
                warn!(zone_id = zone_id.0, "zone delete for unknown zone");
                Vec::new()
            }
        }
    }

    fn zone_activity(&mut self, zone_id: ZoneId, open: bool) -> Vec<StateChange> {
        match self.locate_zone(zone_id) {
            Some(partition) => partition.zone_activity(zone_id, open),
            None => {
                warn!(zone_id = zone_id.0, open, "zone activity for unknown zone");
                Vec::new()
            }
        }
    }

    fn locate_zone(&mut self, zone_id: ZoneId) -> Option<&mut Partition> {
        self.partitions
            .values_mut()
            .find(|partition| partition.zone(zone_id).is_some())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
