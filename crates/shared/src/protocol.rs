//! Events emitted by the panel over its JSON-lines socket.

use serde::{Deserialize, Serialize};

use crate::{
    domain::{PartitionId, ZoneId},
    error::EventDecodeError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub id: String,
    #[serde(rename = "type", default)]
    pub sensor_type: String,
    pub name: String,
    #[serde(default)]
    pub group: String,
    pub status: String,
    #[serde(default)]
    pub state: String,
    pub zone_id: ZoneId,
    #[serde(default)]
    pub zone_physical_type: i64,
    #[serde(default)]
    pub zone_alarm_type: i64,
    #[serde(default)]
    pub zone_type: i64,
    pub partition_id: PartitionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRecord {
    pub partition_id: PartitionId,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub secure_arm: bool,
    #[serde(default)]
    pub zone_list: Vec<ZoneRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoSummary {
    #[serde(rename = "partition_list")]
    pub partitions: Vec<PartitionRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneActivity {
    pub zone_id: ZoneId,
    pub status: String,
}

impl ZoneActivity {
    pub fn is_open(&self) -> bool {
        self.status.eq_ignore_ascii_case("open")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEventKind {
    Info(InfoSummary),
    SecureArm {
        partition_id: PartitionId,
        value: bool,
    },
    ArmingChanged {
        partition_id: PartitionId,
        arming_type: String,
    },
    AlarmTriggered {
        partition_id: PartitionId,
        alarm_type: Option<String>,
    },
    ZoneActive(ZoneActivity),
    ZoneUpdate(ZoneRecord),
    ZoneAdd(ZoneRecord),
    ZoneDelete {
        zone_id: ZoneId,
    },
    Error {
        partition_id: PartitionId,
        error_type: String,
        description: String,
    },
    Unrecognized,
}

impl PanelEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info(_) => "info",
            Self::SecureArm { .. } => "secure_arm",
            Self::ArmingChanged { .. } => "arming",
            Self::AlarmTriggered { .. } => "alarm",
            Self::ZoneActive(_) => "zone_active",
            Self::ZoneUpdate(_) => "zone_update",
            Self::ZoneAdd(_) => "zone_add",
            Self::ZoneDelete { .. } => "zone_delete",
            Self::Error { .. } => "error",
            Self::Unrecognized => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelEvent {
    raw: String,
    kind: PanelEventKind,
}

impl PanelEvent {
    pub fn new(raw: impl Into<String>, kind: PanelEventKind) -> Self {
        Self {
            raw: raw.into(),
            kind,
        }
    }

    pub fn from_line(line: &str) -> Result<Self, EventDecodeError> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        if !value.is_object() {
            return Err(EventDecodeError::NotAnObject);
        }

        let kind = serde_json::from_value::<WireEvent>(value)
            .map(PanelEventKind::from)
            .unwrap_or(PanelEventKind::Unrecognized);

        Ok(Self::new(line, kind))
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &PanelEventKind {
        &self.kind
    }
}

#[derive(Deserialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
enum WireEvent {
    Info(WireInfo),
    ZoneEvent(WireZoneEvent),
    Arming {
        partition_id: PartitionId,
        arming_type: String,
    },
    Alarm {
        partition_id: PartitionId,
        #[serde(default)]
        alarm_type: Option<String>,
    },
    Error {
        partition_id: PartitionId,
        error_type: String,
        #[serde(default)]
        description: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "info_type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WireInfo {
    Summary(InfoSummary),
    SecureArm {
        partition_id: PartitionId,
        value: bool,
    },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
#[serde(tag = "zone_event_type", rename_all = "SCREAMING_SNAKE_CASE")]
enum WireZoneEvent {
    ZoneActive { zone: ZoneActivity },
    ZoneUpdate { zone: ZoneRecord },
    ZoneAdd { zone: ZoneRecord },
    ZoneDelete { zone: WireZoneRef },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct WireZoneRef {
    zone_id: ZoneId,
}

impl From<WireEvent> for PanelEventKind {
    fn from(value: WireEvent) -> Self {
        match value {
            WireEvent::Info(WireInfo::Summary(summary)) => Self::Info(summary),
            WireEvent::Info(WireInfo::SecureArm {
                partition_id,
                value,
            }) => Self::SecureArm {
                partition_id,
                value,
            },
            WireEvent::ZoneEvent(WireZoneEvent::ZoneActive { zone }) => Self::ZoneActive(zone),
            WireEvent::ZoneEvent(WireZoneEvent::ZoneUpdate { zone }) => Self::ZoneUpdate(zone),
            WireEvent::ZoneEvent(WireZoneEvent::ZoneAdd { zone }) => Self::ZoneAdd(zone),
            WireEvent::ZoneEvent(WireZoneEvent::ZoneDelete { zone }) => Self::ZoneDelete {
                zone_id: zone.zone_id,
            },
            WireEvent::Arming {
                partition_id,
                arming_type,
            } => Self::ArmingChanged {
                partition_id,
                arming_type,
            },
            WireEvent::Alarm {
                partition_id,
                alarm_type,
            } => Self::AlarmTriggered {
                partition_id,
                alarm_type: alarm_type.filter(|value| !value.trim().is_empty()),
            },
            WireEvent::Error {
                partition_id,
                error_type,
                description,
            } => Self::Error {
                partition_id,
                error_type,
                description,
            },
            WireEvent::Info(WireInfo::Other)
            | WireEvent::ZoneEvent(WireZoneEvent::Other)
            | WireEvent::Other => Self::Unrecognized,
        }
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
