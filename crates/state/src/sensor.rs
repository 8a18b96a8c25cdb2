use serde::Serialize;
use shared::{
    domain::{PartitionId, ZoneId},
    protocol::ZoneRecord,
};
use tracing::debug;

const STATUS_OPEN: &str = "Open";
const STATUS_CLOSED: &str = "Closed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sensor {
    pub id: String,
    pub zone_id: ZoneId,
    pub name: String,
    pub group: String,
    pub status: String,
    pub state: String,
    pub sensor_type: String,
    pub zone_type: i64,
    pub zone_physical_type: i64,
    pub zone_alarm_type: i64,
    pub partition_id: PartitionId,
    tampered: bool,
    #[serde(skip)]
    reopened: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct SensorDelta {
    pub(crate) config: bool,
    pub(crate) status: Option<String>,
    pub(crate) attributes: bool,
}

impl SensorDelta {
    pub(crate) fn is_empty(&self) -> bool {
        !self.config && self.status.is_none() && !self.attributes
    }
}

impl Sensor {
    pub fn from_record(record: &ZoneRecord) -> Self {
        Self {
            id: record.id.clone(),
            zone_id: record.zone_id,
            name: record.name.clone(),
            group: record.group.clone(),
            status: record.status.clone(),
            state: record.state.clone(),
            sensor_type: record.sensor_type.clone(),
            zone_type: record.zone_type,
            zone_physical_type: record.zone_physical_type,
            zone_alarm_type: record.zone_alarm_type,
            partition_id: record.partition_id,
            tampered: false,
            reopened: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.eq_ignore_ascii_case("open")
    }

    pub fn is_tampered(&self) -> bool {
        self.tampered
    }

    /// Applies a zone activity report. The panel reports a tampered sensor
    /// as an open while the zone is already open; the sensor is restored by
    /// an open followed by a close, or by a close while already closed.
    pub(crate) fn activity(&mut self, open: bool) -> SensorDelta {
        let was_tampered = self.tampered;
        let mut delta = SensorDelta::default();

        if open {
            if !self.is_open() {
                delta = self.set_status(STATUS_OPEN);
            } else if self.tampered {
                self.reopened = true;
            } else {
                self.tampered = true;
            }
        } else {
            if self.tampered && (self.reopened || !self.is_open()) {
                self.tampered = false;
                self.reopened = false;
            }
            delta = self.set_status(STATUS_CLOSED);
        }

        if self.tampered != was_tampered {
            debug!(
                zone_id = self.zone_id.0,
                tampered = self.tampered,
                "sensor tamper state changed"
            );
            delta.attributes = true;
        }
        delta
    }

    pub(crate) fn set_status(&mut self, value: &str) -> SensorDelta {
        let mut delta = SensorDelta::default();
        if self.status != value {
            delta.status = Some(std::mem::replace(&mut self.status, value.to_string()));
        }
        delta
    }

    pub(crate) fn update(&mut self, record: &ZoneRecord) -> SensorDelta {
        let mut delta = self.set_status(&record.status);

        if self.name != record.name || self.sensor_type != record.sensor_type {
            self.name = record.name.clone();
            self.sensor_type = record.sensor_type.clone();
            delta.config = true;
        }

        if self.group != record.group
            || self.state != record.state
            || self.zone_type != record.zone_type
            || self.zone_physical_type != record.zone_physical_type
            || self.zone_alarm_type != record.zone_alarm_type
        {
            self.group = record.group.clone();
            self.state = record.state.clone();
            self.zone_type = record.zone_type;
            self.zone_physical_type = record.zone_physical_type;
            self.zone_alarm_type = record.zone_alarm_type;
            delta.attributes = true;
        }

        delta
    }
}
