use std::{
    io,
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use async_trait::async_trait;
use bus::{Bus, PublishError, Publisher};
use panel_link::{LinkEvent, PanelLink};
use serde_json::json;
use shared::{
    config::GatewayConfig,
    control::ControlRequest,
    domain::{AlarmType, PartitionId, ZoneId},
    protocol::{InfoSummary, PanelEvent, PanelEventKind, PartitionRecord, ZoneActivity, ZoneRecord},
};
use tokio::sync::{mpsc, Notify};

use super::*;

const GATEWAY_AVAILABILITY: &str = "homeassistant/alarm_control_panel/qolsys_panel/availability";
const EVENT_TOPIC: &str = "qolsys/qolsys_panel/event";
const CONTROL_TOPIC: &str = "homeassistant/alarm_control_panel/qolsys_panel/set";

#[derive(Default)]
struct FakeLink {
    sent: StdMutex<Vec<PanelAction>>,
    fail_sends: bool,
    events: StdMutex<Option<mpsc::Sender<LinkEvent>>>,
    listening: Notify,
}

impl FakeLink {
    fn sent(&self) -> Vec<PanelAction> {
        self.sent.lock().expect("sent lock").clone()
    }

    async fn events(&self) -> mpsc::Sender<LinkEvent> {
        self.listening.notified().await;
        self.events
            .lock()
            .expect("events lock")
            .clone()
            .expect("listener registered")
    }
}

#[async_trait]
impl PanelLink for FakeLink {
    async fn listen(&self, events: mpsc::Sender<LinkEvent>) {
        *self.events.lock().expect("events lock") = Some(events);
        self.listening.notify_one();
        std::future::pending::<()>().await;
    }

    async fn keep_alive(&self) {
        std::future::pending::<()>().await;
    }

    async fn send(&self, action: &PanelAction) -> Result<(), LinkError> {
        if self.fail_sends {
            return Err(LinkError::NotConnected);
        }
        self.sent.lock().expect("sent lock").push(action.clone());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    published: StdMutex<Vec<(String, String)>>,
    fail_suffix: Option<&'static str>,
}

impl RecordingPublisher {
    fn failing_on(suffix: &'static str) -> Self {
        Self {
            fail_suffix: Some(suffix),
            ..Self::default()
        }
    }

    fn on_topic(&self, topic: &str) -> Vec<String> {
        self.published
            .lock()
            .expect("published lock")
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    fn count(&self) -> usize {
        self.published.lock().expect("published lock").len()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &str, _retain: bool) -> Result<(), PublishError> {
        if self.fail_suffix.is_some_and(|suffix| topic.ends_with(suffix)) {
            return Err(PublishError::Transport("transport down".into()));
        }
        self.published
            .lock()
            .expect("published lock")
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

struct Harness {
    gateway: Arc<Gateway>,
    link: Arc<FakeLink>,
    publisher: Arc<RecordingPublisher>,
    bus: Arc<Bus>,
}

fn harness_with(cfg: GatewayConfig, link: FakeLink, publisher: RecordingPublisher) -> Harness {
    let link = Arc::new(link);
    let publisher = Arc::new(publisher);
    let bus = Arc::new(Bus::default());
    let gateway = Gateway::new(
        cfg,
        Arc::clone(&link) as Arc<dyn PanelLink>,
        Arc::clone(&publisher) as Arc<dyn Publisher>,
        Arc::clone(&bus) as Arc<dyn bus::Subscriber>,
    );
    Harness {
        gateway,
        link,
        publisher,
        bus,
    }
}

fn harness() -> Harness {
    harness_with(
        GatewayConfig::default(),
        FakeLink::default(),
        RecordingPublisher::default(),
    )
}

fn zone(zone_id: u32, partition_id: u32, status: &str) -> ZoneRecord {
    ZoneRecord {
        id: format!("001-{zone_id:04}"),
        sensor_type: "Door_Window".into(),
        name: format!("Zone {zone_id}"),
        group: "entryexit-delay".into(),
        status: status.into(),
        state: "0".into(),
        zone_id: ZoneId(zone_id),
        zone_physical_type: 1,
        zone_alarm_type: 3,
        zone_type: 1,
        partition_id: PartitionId(partition_id),
    }
}

/// Two partitions, three sensors. Partition 1 is secure-armed.
fn summary_event() -> PanelEvent {
    let summary = InfoSummary {
        partitions: vec![
            PartitionRecord {
                partition_id: PartitionId(0),
                name: "partition0".into(),
                status: "DISARM".into(),
                secure_arm: false,
                zone_list: vec![zone(1, 0, "Closed"), zone(2, 0, "Closed")],
            },
            PartitionRecord {
                partition_id: PartitionId(1),
                name: "partition1".into(),
                status: "ARM_STAY".into(),
                secure_arm: true,
                zone_list: vec![zone(10, 1, "Closed")],
            },
        ],
    };
    let partition_list = serde_json::to_value(&summary.partitions)
        .expect("partition list");
    let raw = json!({
        "event": "INFO",
        "info_type": "SUMMARY",
        "partition_list": partition_list,
    })
    .to_string();
    PanelEvent::new(raw, PanelEventKind::Info(summary))
}

fn event(kind: PanelEventKind) -> PanelEvent {
    PanelEvent::new(format!("{{\"test\":\"{}\"}}", kind.name()), kind)
}

fn control(fields: serde_json::Value) -> ControlRequest {
    ControlRequest::from_json(&fields.to_string())
        .expect("control request")
}

async fn started(h: &Harness) -> String {
    let token = h.gateway.start().await.expect("start");
    h.gateway.on_panel_event(summary_event()).await;
    token.to_string()
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

#[tokio::test]
async fn start_marks_gateway_unavailable_and_refuses_a_second_start() {
    let h = harness();
    let token = h.gateway.start().await.expect("start");

    assert_eq!(h.publisher.on_topic(GATEWAY_AVAILABILITY), vec!["offline"]);
    assert_eq!(h.gateway.session_token(), Some(&token));
    assert!(matches!(
        h.gateway.start().await,
        Err(GatewayError::AlreadyStarted)
    ));
}

#[tokio::test]
async fn start_survives_failed_initial_render() {
    let h = harness_with(
        GatewayConfig::default(),
        FakeLink::default(),
        RecordingPublisher::failing_on("/availability"),
    );
    h.gateway
        .start()
        .await
        .expect("start despite render failure");
    assert!(h.gateway.session_token().is_some());
}

#[tokio::test]
async fn stop_before_start_is_a_no_op() {
    let h = harness();
    let report = h.gateway.stop().await;

    assert!(report.is_empty());
    assert_eq!(h.publisher.count(), 0);
}

#[tokio::test]
async fn stop_renders_every_entity_unavailable() {
    let h = harness();
    started(&h).await;

    let report = h.gateway.stop().await;

    let labels: Vec<&str> = report
        .entries()
        .iter()
        .map(|(label, _)| label.as_str())
        .collect();
    assert_eq!(
        labels,
        vec!["state", "sensor 1", "sensor 2", "sensor 10", "partition 0", "partition 1"]
    );
    assert_eq!(report.failures(), 0);
    assert_eq!(
        h.publisher
            .on_topic("homeassistant/binary_sensor/qolsys_panel_s10/availability")
            .last()
            .map(String::as_str),
        Some("offline")
    );
}

#[tokio::test]
async fn stop_attempts_every_render_even_when_all_fail() {
    let h = harness_with(
        GatewayConfig::default(),
        FakeLink::default(),
        RecordingPublisher::failing_on("/availability"),
    );
    started(&h).await;

    let report = h.gateway.stop().await;

    // 3 sensors + 2 partitions + the gateway itself.
    assert_eq!(report.len(), 6);
    assert_eq!(report.failures(), 6);
}

#[tokio::test]
async fn every_panel_event_is_republished_exactly_once() {
    let h = harness();
    h.gateway.start().await.expect("start");

    let summary = summary_event();
    let raw_summary = summary.raw().to_string();
    h.gateway.on_panel_event(summary).await;
    h.gateway
        .on_panel_event(event(PanelEventKind::Unrecognized))
        .await;
    h.gateway
        .on_panel_event(event(PanelEventKind::ArmingChanged {
            partition_id: PartitionId(9),
            arming_type: "ARM_AWAY".into(),
        }))
        .await;

    let republished = h.publisher.on_topic(EVENT_TOPIC);
    assert_eq!(republished.len(), 3);
    assert_eq!(republished[0], raw_summary);
    assert_eq!(republished[1], "{\"test\":\"unrecognized\"}");
}

#[tokio::test]
async fn zone_active_status_is_matched_case_insensitively() {
    let h = harness();
    started(&h).await;

    for (status, open) in [("OPEN", true), ("Closed", false), ("open", true), ("closed", false)] {
        h.gateway
            .on_panel_event(event(PanelEventKind::ZoneActive(ZoneActivity {
                zone_id: ZoneId(1),
                status: status.into(),
            })))
            .await;
        let is_open = h
            .gateway
            .with_state(|state| {
                state.zone(ZoneId(1)).expect("zone").is_open()
            })
            .await
            .expect("session");
        assert_eq!(is_open, open, "status {status}");
    }

    assert_eq!(
        h.publisher
            .on_topic("homeassistant/binary_sensor/qolsys_panel_s1/state"),
        vec!["Closed", "Open", "Closed", "Open", "Closed"]
    );
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<StdMutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().expect("logs lock").clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("logs lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn arming_and_alarm_for_unknown_partition_are_discarded() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let h = harness();
    started(&h).await;
    let before = h.publisher.count();

    h.gateway
        .on_panel_event(event(PanelEventKind::ArmingChanged {
            partition_id: PartitionId(7),
            arming_type: "ARM_AWAY".into(),
        }))
        .await;
    h.gateway
        .on_panel_event(event(PanelEventKind::AlarmTriggered {
            partition_id: PartitionId(7),
            alarm_type: None,
        }))
        .await;

    // Only the two raw republishes.
    assert_eq!(h.publisher.count(), before + 2);
    let statuses = h
        .gateway
        .with_state(|state| {
            state
                .partitions()
                .map(|p| p.status.clone())
                .collect::<Vec<_>>()
        })
        .await
        .expect("session");
    assert_eq!(statuses, vec!["DISARM", "ARM_STAY"]);

    let warnings: Vec<String> = logs
        .lines()
        .into_iter()
        .filter(|line| {
            line.contains("WARN")
                && line.contains("partition not found")
                && line.contains("partition_id=7")
        })
        .collect();
    assert_eq!(warnings.len(), 2, "{warnings:?}");
    assert!(warnings[0].contains("event=\"arming\""));
    assert!(warnings[1].contains("event=\"alarm\""));
}

#[tokio::test]
async fn arming_and_alarm_update_the_partition_state() {
    let h = harness();
    started(&h).await;
    let state_topic = "homeassistant/alarm_control_panel/qolsys_panel_p0/state";

    h.gateway
        .on_panel_event(event(PanelEventKind::ArmingChanged {
            partition_id: PartitionId(0),
            arming_type: "arm_away".into(),
        }))
        .await;
    h.gateway
        .on_panel_event(event(PanelEventKind::AlarmTriggered {
            partition_id: PartitionId(0),
            alarm_type: Some("FIRE".into()),
        }))
        .await;

    assert_eq!(
        h.publisher.on_topic(state_topic),
        vec!["disarmed", "armed_away", "triggered"]
    );
    let alarm_type = h
        .gateway
        .with_state(|state| {
            state
                .partition(PartitionId(0))
                .expect("partition")
                .alarm_type
                .clone()
        })
        .await
        .expect("session");
    assert_eq!(alarm_type.as_deref(), Some("FIRE"));
}

#[tokio::test]
async fn mismatched_token_never_reaches_the_panel() {
    let h = harness();
    started(&h).await;
    let before = h.publisher.count();

    for token in [json!("not-the-token"), json!(null)] {
        let outcome = h
            .gateway
            .on_control_request(control(json!({
                "action": "DISARM",
                "partition_id": 0,
                "code": "1234",
                "session_token": token,
            })))
            .await
            .expect("no transport error");
        assert!(matches!(
            outcome,
            ControlOutcome::Rejected(Rejection::Unauthorized)
        ));
    }

    assert!(h.link.sent().is_empty());
    assert_eq!(h.publisher.count(), before);
}

#[tokio::test]
async fn control_before_start_is_unauthorized() {
    let h = harness();
    let outcome = h
        .gateway
        .on_control_request(control(json!({"action": "DISARM", "partition_id": 0})))
        .await
        .expect("no transport error");
    assert!(matches!(
        outcome,
        ControlOutcome::Rejected(Rejection::Unauthorized)
    ));
}

#[tokio::test]
async fn arm_away_with_valid_token_sends_exactly_one_action() {
    let cfg = GatewayConfig {
        arm_away_exit_delay: Some(30),
        ..GatewayConfig::default()
    };
    let h = harness_with(cfg, FakeLink::default(), RecordingPublisher::default());
    let token = started(&h).await;

    let outcome = h
        .gateway
        .on_control_request(control(json!({
            "action": "ARM_AWAY",
            "partition_id": 0,
            "session_token": token,
        })))
        .await
        .expect("sent");

    let expected = PanelAction::ArmAway {
        partition_id: PartitionId(0),
        panel_code: None,
        delay: Some(30),
    };
    assert!(matches!(&outcome, ControlOutcome::Sent(action) if *action == expected));
    assert_eq!(h.link.sent(), vec![expected]);
}

#[tokio::test]
async fn disarm_without_any_code_is_rejected_before_sending() {
    let h = harness();
    let token = started(&h).await;

    let outcome = h
        .gateway
        .on_control_request(control(json!({
            "action": "DISARM",
            "partition_id": 0,
            "session_token": token,
        })))
        .await
        .expect("no transport error");

    assert!(matches!(
        outcome,
        ControlOutcome::Rejected(Rejection::Invalid(ControlError::MissingDisarmCode))
    ));
    assert!(h.link.sent().is_empty());
}

#[tokio::test]
async fn disarm_uses_the_user_code_when_no_panel_code_is_configured() {
    let h = harness();
    let token = started(&h).await;

    h.gateway
        .on_control_request(control(json!({
            "action": "disarm",
            "partition_id": 0,
            "code": "1234",
            "session_token": token,
        })))
        .await
        .expect("sent");

    assert_eq!(
        h.link.sent(),
        vec![PanelAction::Disarm {
            partition_id: PartitionId(0),
            panel_code: Some("1234".into()),
        }]
    );
}

#[tokio::test]
async fn wrong_user_code_is_rejected_when_the_gateway_checks_codes() {
    let cfg = GatewayConfig {
        code_disarm_required: true,
        ha_check_user_code: false,
        ha_user_code: Some("0000".into()),
        panel_user_code: Some("4321".into()),
        ..GatewayConfig::default()
    };
    let h = harness_with(cfg, FakeLink::default(), RecordingPublisher::default());
    let token = started(&h).await;

    let outcome = h
        .gateway
        .on_control_request(control(json!({
            "action": "DISARM",
            "partition_id": 0,
            "code": "1234",
            "session_token": token,
        })))
        .await
        .expect("no transport error");

    assert!(matches!(
        outcome,
        ControlOutcome::Rejected(Rejection::Invalid(ControlError::InvalidCode))
    ));
    assert!(h.link.sent().is_empty());
}

#[tokio::test]
async fn secure_arm_partition_needs_a_code_to_arm() {
    let h = harness();
    let token = started(&h).await;

    let outcome = h
        .gateway
        .on_control_request(control(json!({
            "action": "ARM_HOME",
            "partition_id": 1,
            "session_token": token,
        })))
        .await
        .expect("no transport error");

    assert!(matches!(
        outcome,
        ControlOutcome::Rejected(Rejection::Invalid(ControlError::MissingDisarmCode))
    ));
    assert!(h.link.sent().is_empty());
}

#[tokio::test]
async fn trigger_uses_the_configured_alarm_type() {
    let cfg = GatewayConfig {
        default_trigger_alarm_type: AlarmType::Fire,
        ..GatewayConfig::default()
    };
    let h = harness_with(cfg, FakeLink::default(), RecordingPublisher::default());
    let token = started(&h).await;

    h.gateway
        .on_control_request(control(json!({
            "action": "TRIGGER",
            "partition_id": 0,
            "session_token": token,
        })))
        .await
        .expect("sent");

    assert_eq!(
        h.link.sent(),
        vec![PanelAction::Trigger {
            partition_id: PartitionId(0),
            alarm_type: AlarmType::Fire,
        }]
    );
}

#[tokio::test]
async fn request_without_partition_is_a_no_op() {
    let h = harness();
    let token = started(&h).await;

    let outcome = h
        .gateway
        .on_control_request(control(json!({
            "action": "ARM_AWAY",
            "session_token": token,
        })))
        .await
        .expect("no transport error");

    assert!(matches!(outcome, ControlOutcome::NoOp));
    assert!(h.link.sent().is_empty());
}

#[tokio::test]
async fn transport_failure_is_returned_to_the_caller() {
    let link = FakeLink {
        fail_sends: true,
        ..FakeLink::default()
    };
    let h = harness_with(
        GatewayConfig::default(),
        link,
        RecordingPublisher::default(),
    );
    let token = started(&h).await;

    let err = h
        .gateway
        .on_control_request(control(json!({
            "action": "ARM_AWAY",
            "partition_id": 0,
            "session_token": token,
        })))
        .await
        .expect_err("send fails");

    assert!(matches!(err, GatewayError::Send(LinkError::NotConnected)));
}

#[tokio::test]
async fn link_events_flow_through_the_event_listener() {
    let h = harness();
    h.gateway.start().await.expect("start");
    let events = h.link.events().await;

    events.send(LinkEvent::Connected).await.expect("send");
    events
        .send(LinkEvent::Event(summary_event()))
        .await
        .expect("send");
    events.send(LinkEvent::Disconnected).await.expect("send");

    let published = || h.publisher.on_topic(GATEWAY_AVAILABILITY).len();
    eventually(|| published() == 3).await;
    assert_eq!(
        h.publisher.on_topic(GATEWAY_AVAILABILITY),
        vec!["offline", "online", "offline"]
    );
    assert_eq!(h.publisher.on_topic(EVENT_TOPIC).len(), 1);
    assert!(!h
        .publisher
        .on_topic("homeassistant/binary_sensor/qolsys_panel_s10/config")
        .is_empty());
}

#[tokio::test]
async fn control_topic_requests_reach_the_panel_until_stop() {
    let h = harness();
    let token = started(&h).await;
    let request = json!({
        "action": "ARM_AWAY",
        "partition_id": 0,
        "session_token": token,
    })
    .to_string();

    h.bus
        .publish(CONTROL_TOPIC, "not json", false)
        .await
        .expect("publish");
    h.bus
        .publish(CONTROL_TOPIC, &request, false)
        .await
        .expect("publish");
    eventually(|| h.link.sent().len() == 1).await;

    h.gateway.stop().await;
    h.bus
        .publish(CONTROL_TOPIC, &request, false)
        .await
        .expect("publish");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.link.sent().len(), 1);
}
