use super::*;

fn cfg() -> GatewayConfig {
    GatewayConfig {
        panel_host: "panel".into(),
        panel_token: "token".into(),
        ..GatewayConfig::default()
    }
}

#[test]
fn decodes_action_names_loosely() {
    for action in ["ARM_AWAY", "arm_away", "ArmAway", "arm-away"] {
        let payload =
            format!(r#"{{"action":"{action}","partition_id":0,"session_token":"T1"}}"#);
        let request = ControlRequest::from_json(&payload).expect("decode");
        assert_eq!(request.kind(), &ControlKind::ArmAway { delay: None });
        assert_eq!(request.session_token(), Some("T1"));
    }
}

#[test]
fn accepts_stringly_typed_fields_from_templates() {
    let request = ControlRequest::from_json(
        r#"{"action":"DISARM","partition_id":"1","code":"","session_token":"T1"}"#,
    )
    .expect("decode");
    assert_eq!(request.partition_id(), Some(PartitionId(1)));
    assert_eq!(
        request.to_string(),
        "<Disarm partition_id=1 code=None session_token=T1>"
    );

    let with_delay =
        ControlRequest::from_json(r#"{"action":"ARM_AWAY","partition_id":0,"delay":"15"}"#)
            .expect("decode");
    assert_eq!(with_delay.kind(), &ControlKind::ArmAway { delay: Some(15) });
}

#[test]
fn unknown_action_is_reported() {
    let err = ControlRequest::from_json(r#"{"action":"ARM_CUSTOM_BYPASS","partition_id":0}"#)
        .expect_err("should fail");
    assert!(matches!(err, ControlError::UnknownControl(action) if action == "ARM_CUSTOM_BYPASS"));

    assert!(matches!(
        ControlRequest::from_json("not json"),
        Err(ControlError::Decode(_))
    ));
}

#[test]
fn display_redacts_code() {
    let request = ControlRequest::new(
        ControlKind::Disarm,
        Some(PartitionId(0)),
        Some("1234".into()),
        Some("T1".into()),
    );
    let shown = request.to_string();
    assert!(shown.contains("<redacted>"));
    assert!(!shown.contains("1234"));
}

#[test]
fn disarm_without_any_code_is_missing_code() {
    let mut request = ControlRequest::new(
        ControlKind::Disarm,
        Some(PartitionId(0)),
        None,
        Some("T1".into()),
    );
    assert!(request.requires_configuration());
    request.configure(&cfg(), false);
    assert!(matches!(request.check(), Err(ControlError::MissingDisarmCode)));
}

#[test]
fn disarm_falls_back_to_user_code_when_panel_code_missing() {
    let mut request = ControlRequest::new(
        ControlKind::Disarm,
        Some(PartitionId(0)),
        Some("4321".into()),
        Some("T1".into()),
    );
    request.configure(&cfg(), false);
    request.check().expect("check");
    assert_eq!(
        request.action(),
        Some(PanelAction::Disarm {
            partition_id: PartitionId(0),
            panel_code: Some("4321".into()),
        })
    );
}

#[test]
fn disarm_uses_configured_panel_code() {
    let cfg = GatewayConfig {
        panel_user_code: Some("1111".into()),
        ..cfg()
    };
    let mut request = ControlRequest::new(ControlKind::Disarm, Some(PartitionId(0)), None, None);
    request.configure(&cfg, false);
    request.check().expect("check");
    assert_eq!(
        request.action(),
        Some(PanelAction::Disarm {
            partition_id: PartitionId(0),
            panel_code: Some("1111".into()),
        })
    );
}

#[test]
fn gateway_side_code_check_rejects_wrong_code() {
    let cfg = GatewayConfig {
        panel_user_code: Some("1111".into()),
        ha_check_user_code: false,
        code_disarm_required: true,
        ..cfg()
    };
    let mut wrong = ControlRequest::new(
        ControlKind::Disarm,
        Some(PartitionId(0)),
        Some("9999".into()),
        None,
    );
    wrong.configure(&cfg, false);
    assert!(matches!(wrong.check(), Err(ControlError::InvalidCode)));

    let mut right = ControlRequest::new(
        ControlKind::Disarm,
        Some(PartitionId(0)),
        Some("1111".into()),
        None,
    );
    right.configure(&cfg, false);
    right.check().expect("valid code");
}

#[test]
fn ha_user_code_takes_precedence_for_validation() {
    let cfg = GatewayConfig {
        panel_user_code: Some("1111".into()),
        ha_user_code: Some("2222".into()),
        ha_check_user_code: false,
        code_arm_required: true,
        ..cfg()
    };
    let mut request = ControlRequest::new(
        ControlKind::ArmHome,
        Some(PartitionId(0)),
        Some("2222".into()),
        None,
    );
    request.configure(&cfg, false);
    request.check().expect("ha code accepted");
    assert_eq!(
        request.action(),
        Some(PanelAction::ArmStay {
            partition_id: PartitionId(0),
            panel_code: Some("1111".into()),
        })
    );
}

#[test]
fn arm_away_needs_no_code_and_defaults_delay() {
    let cfg = GatewayConfig {
        arm_away_exit_delay: Some(45),
        ..cfg()
    };
    let mut request = ControlRequest::new(
        ControlKind::ArmAway { delay: None },
        Some(PartitionId(0)),
        None,
        Some("T1".into()),
    );
    request.configure(&cfg, false);
    request.check().expect("check");
    assert_eq!(
        request.action(),
        Some(PanelAction::ArmAway {
            partition_id: PartitionId(0),
            panel_code: None,
            delay: Some(45),
        })
    );
}

#[test]
fn secure_arm_partition_requires_code_for_arming() {
    let mut request = ControlRequest::new(ControlKind::ArmNight, Some(PartitionId(0)), None, None);
    request.configure(&cfg(), true);
    assert!(matches!(request.check(), Err(ControlError::MissingDisarmCode)));
}

#[test]
fn triggers_never_need_a_panel_code() {
    let cfg = GatewayConfig {
        default_trigger_alarm_type: AlarmType::Auxiliary,
        ..cfg()
    };
    let mut plain = ControlRequest::new(ControlKind::Trigger, Some(PartitionId(0)), None, None);
    plain.configure(&cfg, true);
    plain.check().expect("check");
    assert_eq!(
        plain.action(),
        Some(PanelAction::Trigger {
            partition_id: PartitionId(0),
            alarm_type: AlarmType::Auxiliary,
        })
    );

    let mut fire = ControlRequest::new(ControlKind::TriggerFire, Some(PartitionId(3)), None, None);
    fire.configure(&cfg, false);
    fire.check().expect("check");
    assert_eq!(
        fire.action(),
        Some(PanelAction::Trigger {
            partition_id: PartitionId(3),
            alarm_type: AlarmType::Fire,
        })
    );
}

#[test]
fn request_without_partition_has_no_action() {
    let mut request = ControlRequest::new(ControlKind::ArmHome, None, None, None);
    request.configure(&cfg(), false);
    request.check().expect("check");
    assert_eq!(request.action(), None);
}
