use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use shared::{
    config::GatewayConfig,
    domain::{PartitionId, SessionToken, ZoneId},
};
use state::{Partition, Sensor};

use crate::{topics, PAYLOAD_AVAILABLE, PAYLOAD_NOT_AVAILABLE};

const MANUFACTURER: &str = "Qolsys";
const MODEL: &str = "IQ Panel";
const SENSOR_OPEN: &str = "Open";
const SENSOR_CLOSED: &str = "Closed";
const REMOTE_CODE: &str = "REMOTE_CODE";

pub fn partition_state(status: &str) -> String {
    match status.to_ascii_uppercase().as_str() {
        "DISARM" => "disarmed".to_string(),
        "ARM_STAY" => "armed_home".to_string(),
        "ARM_AWAY" => "armed_away".to_string(),
        "ARM_NIGHT" => "armed_night".to_string(),
        "ENTRY_DELAY" => "pending".to_string(),
        "ALARM" => "triggered".to_string(),
        other if other.ends_with("EXIT_DELAY") => "arming".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

pub fn sensor_state(sensor: &Sensor) -> &'static str {
    if sensor.is_open() {
        SENSOR_OPEN
    } else {
        SENSOR_CLOSED
    }
}

pub fn sensor_device_class<'a>(sensor_type: &str, default: &'a str) -> &'a str {
    match sensor_type.to_ascii_lowercase().as_str() {
        "door_window" | "door_window_m" => "door",
        "tilt" | "garagetilt" => "garage_door",
        "motion" | "panel motion" | "occupancy_sensor" => "motion",
        "glassbreak" | "panel glass break" | "shock" => "vibration",
        "bluetooth" => "presence",
        "smoke_heat" | "smoke_m" | "smokedetector" => "smoke",
        "co" | "codetector" => "gas",
        "water" => "moisture",
        "freeze" => "cold",
        "temp" | "temperature" | "heat" => "heat",
        "doorbell" => "sound",
        _ => default,
    }
}

#[derive(Serialize)]
struct Availability {
    topic: String,
}

#[derive(Serialize)]
struct Device<'a> {
    name: &'a str,
    identifiers: Vec<&'a str>,
    manufacturer: &'static str,
    model: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    connections: Vec<(&'static str, &'a str)>,
}

impl<'a> Device<'a> {
    fn of(cfg: &'a GatewayConfig) -> Self {
        Self {
            name: &cfg.panel_device_name,
            identifiers: vec![&cfg.panel_unique_id],
            manufacturer: MANUFACTURER,
            model: MODEL,
            connections: cfg
                .panel_mac
                .as_deref()
                .map(|mac| vec![("mac", mac)])
                .unwrap_or_default(),
        }
    }
}

fn availability(cfg: &GatewayConfig, own_base: &str) -> Vec<Availability> {
    vec![
        Availability {
            topic: topics::gateway_availability(cfg),
        },
        Availability {
            topic: format!("{own_base}/availability"),
        },
    ]
}

#[derive(Serialize)]
struct PartitionConfig<'a> {
    name: &'a str,
    unique_id: String,
    state_topic: String,
    command_topic: String,
    command_template: String,
    json_attributes_topic: String,
    availability_mode: &'static str,
    availability: Vec<Availability>,
    payload_available: &'static str,
    payload_not_available: &'static str,
    code_arm_required: bool,
    code_disarm_required: bool,
    code_trigger_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'a str>,
    device: Device<'a>,
}

/// Discovery document for a partition. The command template embeds the
/// session token so only consumers that read this document can control the
/// panel through the gateway.
pub(crate) fn partition_config(
    cfg: &GatewayConfig,
    token: &SessionToken,
    partition: &Partition,
) -> Result<String, serde_json::Error> {
    let base = topics::partition_base(cfg, partition.id);
    // Without a configured panel code the consumer has to supply one whenever
    // the panel asks for it: always on disarm, on arm when secure arm is on.
    let no_panel_code = cfg.panel_user_code.is_none();
    let code_arm_required = cfg.code_arm_required || (partition.secure_arm && no_panel_code);
    let code_disarm_required = cfg.code_disarm_required || no_panel_code;
    let code_trigger_required = cfg.code_trigger_required;
    let any_code_required = code_arm_required || code_disarm_required || code_trigger_required;

    let code = if !any_code_required {
        None
    } else if cfg.ha_check_user_code {
        cfg.ha_user_code
            .as_deref()
            .or(cfg.panel_user_code.as_deref())
            .or(Some(REMOTE_CODE))
    } else {
        Some(REMOTE_CODE)
    };

    serde_json::to_string(&PartitionConfig {
        name: &partition.name,
        unique_id: topics::partition_unique_id(cfg, partition.id),
        state_topic: format!("{base}/state"),
        command_topic: cfg.control_topic(),
        command_template: command_template(partition.id, token),
        json_attributes_topic: format!("{base}/attributes"),
        availability_mode: "all",
        availability: availability(cfg, &base),
        payload_available: PAYLOAD_AVAILABLE,
        payload_not_available: PAYLOAD_NOT_AVAILABLE,
        code_arm_required,
        code_disarm_required,
        code_trigger_required,
        code,
        device: Device::of(cfg),
    })
}

fn command_template(partition_id: PartitionId, token: &SessionToken) -> String {
    json!({
        "partition_id": partition_id.to_string(),
        "action": "{{ action }}",
        "session_token": token.as_str(),
        "code": "{{ code }}",
    })
    .to_string()
}

#[derive(Serialize)]
struct PartitionAttributes<'a> {
    alarm_type: Option<&'a str>,
    secure_arm: bool,
    last_error_type: Option<&'a str>,
    last_error_desc: Option<&'a str>,
    last_error_at: Option<DateTime<Utc>>,
    disarm_failed: u32,
    tampered_sensors: &'a [ZoneId],
}

pub(crate) fn partition_attributes(partition: &Partition) -> Result<String, serde_json::Error> {
    serde_json::to_string(&PartitionAttributes {
        alarm_type: partition.alarm_type.as_deref(),
        secure_arm: partition.secure_arm,
        last_error_type: partition.last_error_type.as_deref(),
        last_error_desc: partition.last_error_desc.as_deref(),
        last_error_at: partition.last_error_at,
        disarm_failed: partition.disarm_failed,
        tampered_sensors: &partition.tampered_sensors,
    })
}

#[derive(Serialize)]
struct SensorConfig<'a> {
    name: &'a str,
    unique_id: String,
    device_class: &'a str,
    state_topic: String,
    payload_on: &'static str,
    payload_off: &'static str,
    json_attributes_topic: String,
    availability_mode: &'static str,
    availability: Vec<Availability>,
    payload_available: &'static str,
    payload_not_available: &'static str,
    device: Device<'a>,
}

pub(crate) fn sensor_config(
    cfg: &GatewayConfig,
    sensor: &Sensor,
) -> Result<String, serde_json::Error> {
    let base = topics::sensor_base(cfg, sensor.zone_id);
    serde_json::to_string(&SensorConfig {
        name: &sensor.name,
        unique_id: topics::sensor_unique_id(cfg, sensor.zone_id),
        device_class: sensor_device_class(
            &sensor.sensor_type,
            &cfg.default_sensor_device_class,
        ),
        state_topic: format!("{base}/state"),
        payload_on: SENSOR_OPEN,
        payload_off: SENSOR_CLOSED,
        json_attributes_topic: format!("{base}/attributes"),
        availability_mode: "all",
        availability: availability(cfg, &base),
        payload_available: PAYLOAD_AVAILABLE,
        payload_not_available: PAYLOAD_NOT_AVAILABLE,
        device: Device::of(cfg),
    })
}

#[derive(Serialize)]
struct SensorAttributes<'a> {
    id: &'a str,
    zone_id: ZoneId,
    partition_id: PartitionId,
    group: &'a str,
    state: &'a str,
    sensor_type: &'a str,
    zone_type: i64,
    zone_physical_type: i64,
    zone_alarm_type: i64,
    tampered: bool,
}

pub(crate) fn sensor_attributes(sensor: &Sensor) -> Result<String, serde_json::Error> {
    serde_json::to_string(&SensorAttributes {
        id: &sensor.id,
        zone_id: sensor.zone_id,
        partition_id: sensor.partition_id,
        group: &sensor.group,
        state: &sensor.state,
        sensor_type: &sensor.sensor_type,
        zone_type: sensor.zone_type,
        zone_physical_type: sensor.zone_physical_type,
        zone_alarm_type: sensor.zone_alarm_type,
        tampered: sensor.is_tampered(),
    })
}
