use std::fmt;

use serde_json::Value;

use crate::{
    actions::PanelAction,
    config::GatewayConfig,
    domain::{AlarmType, PartitionId},
    error::ControlError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    Disarm,
    ArmAway { delay: Option<u32> },
    ArmVacation { delay: Option<u32> },
    ArmHome,
    ArmNight,
    Trigger,
    TriggerPolice,
    TriggerFire,
    TriggerAuxiliary,
}

impl ControlKind {
    fn from_action(action: &str, delay: Option<u32>) -> Option<Self> {
        let normalized: String = action
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let kind = match normalized.as_str() {
            "DISARM" => Self::Disarm,
            "ARMAWAY" => Self::ArmAway { delay },
            "ARMVACATION" => Self::ArmVacation { delay },
            "ARMHOME" => Self::ArmHome,
            "ARMNIGHT" => Self::ArmNight,
            "TRIGGER" => Self::Trigger,
            "TRIGGERPOLICE" => Self::TriggerPolice,
            "TRIGGERFIRE" => Self::TriggerFire,
            "TRIGGERAUXILIARY" => Self::TriggerAuxiliary,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Disarm => "Disarm",
            Self::ArmAway { .. } => "ArmAway",
            Self::ArmVacation { .. } => "ArmVacation",
            Self::ArmHome => "ArmHome",
            Self::ArmNight => "ArmNight",
            Self::Trigger => "Trigger",
            Self::TriggerPolice => "TriggerPolice",
            Self::TriggerFire => "TriggerFire",
            Self::TriggerAuxiliary => "TriggerAuxiliary",
        }
    }

    fn code_required_by(&self, cfg: &GatewayConfig) -> bool {
        match self {
            Self::Disarm => cfg.code_disarm_required,
            Self::ArmAway { .. } | Self::ArmVacation { .. } | Self::ArmHome | Self::ArmNight => {
                cfg.code_arm_required
            }
            Self::Trigger | Self::TriggerPolice | Self::TriggerFire | Self::TriggerAuxiliary => {
                cfg.code_trigger_required
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CodeCheck {
    panel_needs_code: bool,
    panel_code: Option<String>,
    check_code: bool,
    valid_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlRequest {
    kind: ControlKind,
    partition_id: Option<PartitionId>,
    code: Option<String>,
    session_token: Option<String>,
    raw: Value,
    code_check: CodeCheck,
    default_alarm_type: AlarmType,
}

impl ControlRequest {
    pub fn new(
        kind: ControlKind,
        partition_id: Option<PartitionId>,
        code: Option<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            kind,
            partition_id,
            code: code.filter(|c| !c.is_empty()),
            session_token,
            raw: Value::Null,
            code_check: CodeCheck::default(),
            default_alarm_type: AlarmType::default(),
        }
    }

    pub fn from_json(payload: &str) -> Result<Self, ControlError> {
        let raw: Value = serde_json::from_str(payload)
            .map_err(|e| ControlError::Decode(e.to_string()))?;
        let Some(fields) = raw.as_object() else {
            return Err(ControlError::Decode("expected a JSON object".into()));
        };

        let action = fields
            .get("action")
            .and_then(Value::as_str)
            .ok_or_else(|| ControlError::Decode("missing 'action'".into()))?;
        let delay = optional_u32(fields.get("delay"), "delay")?;
        let kind = ControlKind::from_action(action, delay)
            .ok_or_else(|| ControlError::UnknownControl(action.to_string()))?;

        let partition_id =
            optional_u32(fields.get("partition_id"), "partition_id")?.map(PartitionId);
        let code = optional_string(fields.get("code"));
        let session_token = optional_string(fields.get("session_token"));

        let mut request = Self::new(kind, partition_id, code, session_token);
        request.raw = raw;
        Ok(request)
    }

    pub fn kind(&self) -> &ControlKind {
        &self.kind
    }

    pub fn partition_id(&self) -> Option<PartitionId> {
        self.partition_id
    }

    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_deref()
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn requires_configuration(&self) -> bool {
        match self.kind {
            ControlKind::Disarm
            | ControlKind::ArmAway { .. }
            | ControlKind::ArmVacation { .. }
            | ControlKind::ArmHome
            | ControlKind::ArmNight
            | ControlKind::Trigger
            | ControlKind::TriggerPolice
            | ControlKind::TriggerFire
            | ControlKind::TriggerAuxiliary => true,
        }
    }

    /// Resolves configuration-dependent fields. `partition_secure_arm` is the
    /// target partition's secure-arm flag (false when the partition is unknown).
    pub fn configure(&mut self, cfg: &GatewayConfig, partition_secure_arm: bool) {
        let code_required = self.kind.code_required_by(cfg) || partition_secure_arm;
        let check_code = code_required && !cfg.ha_check_user_code;

        self.code_check = CodeCheck {
            panel_needs_code: partition_secure_arm,
            panel_code: cfg.panel_user_code.clone(),
            check_code,
            valid_code: if check_code {
                cfg.ha_user_code
                    .clone()
                    .or_else(|| cfg.panel_user_code.clone())
            } else {
                None
            },
        };

        match &mut self.kind {
            ControlKind::Disarm => self.code_check.panel_needs_code = true,
            ControlKind::ArmAway { delay } | ControlKind::ArmVacation { delay } => {
                if delay.is_none() {
                    *delay = cfg.arm_away_exit_delay;
                }
            }
            ControlKind::ArmHome | ControlKind::ArmNight => {}
            ControlKind::Trigger
            | ControlKind::TriggerPolice
            | ControlKind::TriggerFire
            | ControlKind::TriggerAuxiliary => {
                self.code_check.panel_needs_code = false;
                self.default_alarm_type = cfg.default_trigger_alarm_type;
            }
        }
    }

    pub fn check(&mut self) -> Result<(), ControlError> {
        if self.code_check.check_code {
            if let Some(valid) = &self.code_check.valid_code {
                if self.code.as_deref() != Some(valid.as_str()) {
                    return Err(ControlError::InvalidCode);
                }
            }
        }

        if self.code_check.panel_needs_code && self.code_check.panel_code.is_none() {
            // No configured panel code: fall back to the code the user sent.
            match &self.code {
                Some(code) => self.code_check.panel_code = Some(code.clone()),
                None => return Err(ControlError::MissingDisarmCode),
            }
        }

        Ok(())
    }

    pub fn action(&self) -> Option<PanelAction> {
        let partition_id = self.partition_id?;
        let panel_code = self.code_check.panel_code.clone();

        let action = match &self.kind {
            ControlKind::Disarm => PanelAction::Disarm {
                partition_id,
                panel_code,
            },
            ControlKind::ArmAway { delay } | ControlKind::ArmVacation { delay } => {
                PanelAction::ArmAway {
                    partition_id,
                    panel_code,
                    delay: *delay,
                }
            }
            ControlKind::ArmHome | ControlKind::ArmNight => PanelAction::ArmStay {
                partition_id,
                panel_code,
            },
            ControlKind::Trigger => PanelAction::Trigger {
                partition_id,
                alarm_type: self.default_alarm_type,
            },
            ControlKind::TriggerPolice => PanelAction::Trigger {
                partition_id,
                alarm_type: AlarmType::Police,
            },
            ControlKind::TriggerFire => PanelAction::Trigger {
                partition_id,
                alarm_type: AlarmType::Fire,
            },
            ControlKind::TriggerAuxiliary => PanelAction::Trigger {
                partition_id,
                alarm_type: AlarmType::Auxiliary,
            },
        };
        Some(action)
    }
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} partition_id={} code={} session_token={}>",
            self.kind.name(),
            self.partition_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "None".into()),
            if self.code.is_some() { "<redacted>" } else { "None" },
            self.session_token.as_deref().unwrap_or("None"),
        )
    }
}

fn optional_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn optional_u32(value: Option<&Value>, name: &str) -> Result<Option<u32>, ControlError> {
    let invalid = || ControlError::Decode(format!("'{name}' must be a non-negative integer"));
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid()),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(invalid),
        Some(_) => Err(invalid()),
    }
}

#[cfg(test)]
#[path = "tests/control_tests.rs"]
mod tests;
