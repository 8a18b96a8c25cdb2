use serde_json::{json, Map, Value};

use crate::domain::{AlarmType, PartitionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    Info,
    ArmAway {
        partition_id: PartitionId,
        panel_code: Option<String>,
        delay: Option<u32>,
    },
    ArmStay {
        partition_id: PartitionId,
        panel_code: Option<String>,
    },
    Disarm {
        partition_id: PartitionId,
        panel_code: Option<String>,
    },
    Trigger {
        partition_id: PartitionId,
        alarm_type: AlarmType,
    },
}

impl PanelAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::ArmAway { .. } => "arm_away",
            Self::ArmStay { .. } => "arm_stay",
            Self::Disarm { .. } => "disarm",
            Self::Trigger { .. } => "trigger",
        }
    }

    pub fn partition_id(&self) -> Option<PartitionId> {
        match self {
            Self::Info => None,
            Self::ArmAway { partition_id, .. }
            | Self::ArmStay { partition_id, .. }
            | Self::Disarm { partition_id, .. }
            | Self::Trigger { partition_id, .. } => Some(*partition_id),
        }
    }

    pub fn to_wire(&self, token: &str) -> Value {
        let mut data = Map::new();
        data.insert("version".into(), json!(0));
        data.insert("source".into(), json!("C4"));
        data.insert("nonce".into(), json!("qolsys"));
        data.insert("token".into(), json!(token));

        match self {
            Self::Info => {
                data.insert("action".into(), json!("INFO"));
                data.insert("info_type".into(), json!("SUMMARY"));
            }
            Self::ArmAway {
                partition_id,
                panel_code,
                delay,
            } => {
                insert_arming(&mut data, "ARM_AWAY", *partition_id, panel_code.as_deref());
                if let Some(delay) = delay {
                    data.insert("delay".into(), json!(delay));
                }
            }
            Self::ArmStay {
                partition_id,
                panel_code,
            } => insert_arming(&mut data, "ARM_STAY", *partition_id, panel_code.as_deref()),
            Self::Disarm {
                partition_id,
                panel_code,
            } => insert_arming(&mut data, "DISARM", *partition_id, panel_code.as_deref()),
            Self::Trigger {
                partition_id,
                alarm_type,
            } => {
                data.insert("action".into(), json!("ALARM"));
                data.insert("alarm_type".into(), json!(alarm_type.as_str()));
                data.insert("partition_id".into(), json!(partition_id.0));
            }
        }

        Value::Object(data)
    }

    pub fn to_line(&self, token: &str) -> String {
        let mut line = self.to_wire(token).to_string();
        line.push('\n');
        line
    }
}

fn insert_arming(
    data: &mut Map<String, Value>,
    arming_type: &str,
    partition_id: PartitionId,
    panel_code: Option<&str>,
) {
    data.insert("action".into(), json!("ARMING"));
    data.insert("arming_type".into(), json!(arming_type));
    data.insert("partition_id".into(), json!(partition_id.0));
    if let Some(code) = panel_code {
        data.insert("usercode".into(), json!(code));
    }
}
