use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{
    domain::{PartitionId, ZoneId},
    protocol::{PartitionRecord, ZoneRecord},
};
use tracing::{debug, error};

use crate::{
    sensor::{Sensor, SensorDelta},
    StateChange,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Partition {
    pub id: PartitionId,
    pub name: String,
    pub status: String,
    pub secure_arm: bool,
    pub alarm_type: Option<String>,
    #[serde(skip)]
    sensors: BTreeMap<ZoneId, Sensor>,
    pub last_error_type: Option<String>,
    pub last_error_desc: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub disarm_failed: u32,
    pub tampered_sensors: Vec<ZoneId>,
}

impl Partition {
    pub fn new(id: PartitionId, name: impl Into<String>, status: &str, secure_arm: bool) -> Self {
        Self {
            id,
            name: name.into(),
            status: status.to_ascii_uppercase(),
            secure_arm,
            alarm_type: None,
            sensors: BTreeMap::new(),
            last_error_type: None,
            last_error_desc: None,
            last_error_at: None,
            disarm_failed: 0,
            tampered_sensors: Vec::new(),
        }
    }

    pub(crate) fn from_record(record: &PartitionRecord) -> Self {
        let mut partition = Self::new(
            record.partition_id,
            record.name.clone(),
            &record.status,
            record.secure_arm,
        );
        for zone in &record.zone_list {
            partition.insert_sensor(Sensor::from_record(zone));
        }
        partition.tampered_sensors = partition.compute_tampered();
        partition
    }

    pub fn sensors(&self) -> impl Iterator<Item = &Sensor> {
        self.sensors.values()
    }

    pub fn zone(&self, zone_id: ZoneId) -> Option<&Sensor> {
        self.sensors.get(&zone_id)
    }

    pub fn set_status(&mut self, value: &str) -> Vec<StateChange> {
        let new_value = value.to_ascii_uppercase();
        let mut previous = None;
        let mut attributes = false;

        if self.status != new_value {
            debug!(
                partition_id = self.id.0,
                name = %self.name,
                status = %new_value,
                "partition status updated"
            );
            previous = Some(std::mem::replace(&mut self.status, new_value.clone()));
        }

        if new_value == "DISARM" && self.disarm_failed != 0 {
            self.disarm_failed = 0;
            attributes = true;
        }

        if self.alarm_type.take().is_some() {
            attributes = true;
        }

        let mut changes = Vec::new();
        if let Some(previous) = previous {
            changes.push(StateChange::PartitionStatus {
                partition: self.clone(),
                previous,
            });
        }
        if attributes {
            changes.push(StateChange::PartitionAttributes(self.clone()));
        }
        changes
    }

    pub fn set_secure_arm(&mut self, value: bool) -> Vec<StateChange> {
        if self.secure_arm == value {
            return Vec::new();
        }
        debug!(
            partition_id = self.id.0,
            secure_arm = value,
            "partition secure arm updated"
        );
        self.secure_arm = value;
        vec![StateChange::PartitionConfig(self.clone())]
    }

    pub fn triggered(&mut self, alarm_type: Option<&str>) -> Vec<StateChange> {
        let mut changes = self.set_status("ALARM");
        let alarm_type = alarm_type.map(str::to_ascii_uppercase);
        if self.alarm_type != alarm_type {
            self.alarm_type = alarm_type;
            changes.push(StateChange::PartitionAttributes(self.clone()));
        }
        changes
    }

    pub fn errored(&mut self, error_type: &str, description: &str) -> Vec<StateChange> {
        self.last_error_type = Some(error_type.to_string());
        self.last_error_desc = Some(description.to_string());
        self.last_error_at = Some(Utc::now());

        if error_type.eq_ignore_ascii_case("DISARM_FAILED") {
            self.disarm_failed += 1;
        }

        vec![StateChange::PartitionAttributes(self.clone())]
    }

    pub(crate) fn update_from_record(&mut self, record: &PartitionRecord) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if self.name != record.name {
            self.name = record.name.clone();
            changes.push(StateChange::PartitionConfig(self.clone()));
        }
        changes.extend(self.set_secure_arm(record.secure_arm));
        changes.extend(self.set_status(&record.status));

        let listed: Vec<ZoneId> = record.zone_list.iter().map(|z| z.zone_id).collect();
        let removed: Vec<ZoneId> = self
            .sensors
            .keys()
            .filter(|zone_id| !listed.contains(zone_id))
            .copied()
            .collect();
        for zone_id in removed {
            changes.extend(self.remove_zone(zone_id));
        }

        for zone in &record.zone_list {
            if self.sensors.contains_key(&zone.zone_id) {
                changes.extend(self.update_sensor(zone));
            } else {
                changes.extend(self.add_sensor(Sensor::from_record(zone)));
            }
        }

        changes
    }

    pub(crate) fn add_sensor(&mut self, sensor: Sensor) -> Vec<StateChange> {
        if let Some(existing) = self.sensors.get(&sensor.zone_id) {
            error!(
                zone_id = sensor.zone_id.0,
                existing_sensor = %existing.id,
                sensor = %sensor.id,
                "zone already used by another sensor; skipping"
            );
            return Vec::new();
        }

        let mut changes = vec![StateChange::SensorAdded(sensor.clone())];
        self.insert_sensor(sensor);
        changes.extend(self.refresh_tampered());
        changes
    }

    pub(crate) fn update_sensor(&mut self, record: &ZoneRecord) -> Vec<StateChange> {
        let Some(sensor) = self.sensors.get_mut(&record.zone_id) else {
            return Vec::new();
        };
        let delta = sensor.update(record);
        let snapshot = sensor.clone();
        let mut changes = sensor_changes(snapshot, delta);
        changes.extend(self.refresh_tampered());
        changes
    }

    pub(crate) fn zone_activity(&mut self, zone_id: ZoneId, open: bool) -> Vec<StateChange> {
        let Some(sensor) = self.sensors.get_mut(&zone_id) else {
            return Vec::new();
        };
        let delta = sensor.activity(open);
        let snapshot = sensor.clone();
        let mut changes = sensor_changes(snapshot, delta);
        changes.extend(self.refresh_tampered());
        changes
    }

    pub(crate) fn remove_zone(&mut self, zone_id: ZoneId) -> Vec<StateChange> {
        let Some(sensor) = self.sensors.remove(&zone_id) else {
            return Vec::new();
        };
        let mut changes = vec![StateChange::SensorRemoved(sensor)];
        changes.extend(self.refresh_tampered());
        changes
    }

    fn insert_sensor(&mut self, sensor: Sensor) {
        self.sensors.insert(sensor.zone_id, sensor);
    }

    fn compute_tampered(&self) -> Vec<ZoneId> {
        self.sensors
            .values()
            .filter(|sensor| sensor.is_tampered())
            .map(|sensor| sensor.zone_id)
            .collect()
    }

    fn refresh_tampered(&mut self) -> Vec<StateChange> {
        let tampered = self.compute_tampered();
        if tampered == self.tampered_sensors {
            return Vec::new();
        }
        self.tampered_sensors = tampered;
        vec![StateChange::PartitionAttributes(self.clone())]
    }
}

fn sensor_changes(sensor: Sensor, delta: SensorDelta) -> Vec<StateChange> {
    if delta.is_empty() {
        return Vec::new();
    }

    let mut changes = Vec::new();
    if delta.config {
        changes.push(StateChange::SensorConfig(sensor.clone()));
    }
    if delta.attributes {
        changes.push(StateChange::SensorAttributes(sensor.clone()));
    }
    if let Some(previous) = delta.status {
        changes.push(StateChange::SensorStatus { sensor, previous });
    }
    changes
}
