use shared::{
    config::GatewayConfig,
    domain::{PartitionId, ZoneId},
};

pub fn gateway_availability(cfg: &GatewayConfig) -> String {
    format!(
        "{}/alarm_control_panel/{}/availability",
        cfg.discovery_topic, cfg.panel_unique_id
    )
}

pub fn partition_unique_id(cfg: &GatewayConfig, partition_id: PartitionId) -> String {
    format!("{}_p{}", cfg.panel_unique_id, partition_id)
}

pub fn sensor_unique_id(cfg: &GatewayConfig, zone_id: ZoneId) -> String {
    format!("{}_s{}", cfg.panel_unique_id, zone_id)
}

pub fn partition_base(cfg: &GatewayConfig, partition_id: PartitionId) -> String {
    format!(
        "{}/alarm_control_panel/{}",
        cfg.discovery_topic,
        partition_unique_id(cfg, partition_id)
    )
}

pub fn sensor_base(cfg: &GatewayConfig, zone_id: ZoneId) -> String {
    format!(
        "{}/binary_sensor/{}",
        cfg.discovery_topic,
        sensor_unique_id(cfg, zone_id)
    )
}
