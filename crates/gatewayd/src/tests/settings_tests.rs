use std::{collections::HashMap, fs};

use shared::domain::AlarmType;

use super::*;

fn env(vars: &[(&str, &str)]) -> Environment {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    environment().source(Some(vars))
}

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("gateway.toml");
    fs::write(&path, contents).expect("write config");
    (dir, path)
}

#[test]
fn file_values_override_defaults() {
    let (_dir, path) = write_config(
        r#"
http_bind = "0.0.0.0:9000"

[gateway]
panel_host = "192.168.1.20"
panel_token = "secret"
panel_user_code = "0042"
arm_away_exit_delay = 45
default_trigger_alarm_type = "FIRE"
"#,
    );

    let settings = load_settings_from(Some(&path), env(&[])).expect("settings");

    assert_eq!(settings.http_bind, "0.0.0.0:9000");
    assert_eq!(settings.log_level, "info");
    assert_eq!(settings.gateway.panel_host, "192.168.1.20");
    assert_eq!(settings.gateway.panel_port, 12345);
    assert_eq!(settings.gateway.panel_user_code.as_deref(), Some("0042"));
    assert_eq!(settings.gateway.arm_away_exit_delay, Some(45));
    assert_eq!(settings.gateway.default_trigger_alarm_type, AlarmType::Fire);
}

#[test]
fn environment_overrides_file() {
    let (_dir, path) = write_config(
        r#"
[gateway]
panel_host = "192.168.1.20"
panel_token = "secret"
"#,
    );

    let settings = load_settings_from(
        Some(&path),
        env(&[
            ("APP__GATEWAY__PANEL_HOST", "10.0.0.5"),
            ("APP__GATEWAY__PANEL_PORT", "12346"),
            ("APP__GATEWAY__HA_CHECK_USER_CODE", "false"),
            ("APP__GATEWAY__PANEL_USER_CODE", "0007"),
            ("APP__LOG_LEVEL", "debug"),
        ]),
    )
    .expect("settings");

    assert_eq!(settings.gateway.panel_host, "10.0.0.5");
    assert_eq!(settings.gateway.panel_port, 12346);
    assert!(!settings.gateway.ha_check_user_code);
    // Codes stay strings; leading zeros survive.
    assert_eq!(settings.gateway.panel_user_code.as_deref(), Some("0007"));
    assert_eq!(settings.log_level, "debug");
}

#[test]
fn missing_panel_host_is_rejected() {
    let (_dir, path) = write_config(
        r#"
[gateway]
panel_token = "secret"
"#,
    );

    let err = load_settings_from(Some(&path), env(&[])).expect_err("invalid");
    assert!(format!("{err:#}").contains("panel_host"));
}

#[test]
fn explicit_config_path_must_exist() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");

    assert!(load_settings_from(Some(&missing), env(&[])).is_err());
}
