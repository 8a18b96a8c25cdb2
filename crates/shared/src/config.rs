use serde::{Deserialize, Serialize};

use crate::{domain::AlarmType, error::ConfigError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub panel_host: String,
    pub panel_port: u16,
    pub panel_token: String,
    pub panel_unique_id: String,
    pub panel_device_name: String,
    pub panel_mac: Option<String>,
    #[serde(alias = "panel_disarm_code")]
    pub panel_user_code: Option<String>,

    pub arm_away_exit_delay: Option<u32>,
    pub keep_alive_interval_secs: u64,
    pub reconnect_delay_secs: u64,

    pub discovery_topic: String,
    pub control_topic: Option<String>,
    pub event_topic: Option<String>,
    pub retain: bool,

    #[serde(alias = "ha_check_disarm_code")]
    pub ha_check_user_code: bool,
    #[serde(alias = "ha_disarm_code")]
    pub ha_user_code: Option<String>,
    pub code_arm_required: bool,
    pub code_disarm_required: bool,
    pub code_trigger_required: bool,
    pub default_trigger_alarm_type: AlarmType,
    pub default_sensor_device_class: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            panel_host: String::new(),
            panel_port: 12345,
            panel_token: String::new(),
            panel_unique_id: "qolsys_panel".into(),
            panel_device_name: "Qolsys Panel".into(),
            panel_mac: None,
            panel_user_code: None,
            arm_away_exit_delay: None,
            keep_alive_interval_secs: 240,
            reconnect_delay_secs: 60,
            discovery_topic: "homeassistant".into(),
            control_topic: None,
            event_topic: None,
            retain: true,
            ha_check_user_code: true,
            ha_user_code: None,
            code_arm_required: false,
            code_disarm_required: false,
            code_trigger_required: false,
            default_trigger_alarm_type: AlarmType::Police,
            default_sensor_device_class: "safety".into(),
        }
    }
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.panel_host.trim().is_empty() {
            return Err(ConfigError::Missing("panel_host"));
        }
        if self.panel_token.trim().is_empty() {
            return Err(ConfigError::Missing("panel_token"));
        }
        if self.panel_unique_id.is_empty()
            || self.panel_unique_id.contains(['/', '+', '#'])
        {
            return Err(ConfigError::Invalid {
                name: "panel_unique_id",
                message: "must be non-empty and must not contain '/', '+' or '#'".into(),
            });
        }
        if self.keep_alive_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "keep_alive_interval_secs",
                message: "must be greater than zero".into(),
            });
        }
        Ok(())
    }

    pub fn control_topic(&self) -> String {
        self.control_topic.clone().unwrap_or_else(|| {
            format!(
                "{}/alarm_control_panel/{}/set",
                self.discovery_topic, self.panel_unique_id
            )
        })
    }

    pub fn event_topic(&self) -> String {
        self.event_topic
            .clone()
            .unwrap_or_else(|| format!("qolsys/{}/event", self.panel_unique_id))
    }

    pub fn panel_addr(&self) -> String {
        format!("{}:{}", self.panel_host, self.panel_port)
    }
}
