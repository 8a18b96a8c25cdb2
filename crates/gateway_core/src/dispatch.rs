use render::StateUpdater;
use shared::{
    control::ControlRequest,
    domain::PartitionId,
    protocol::{PanelEvent, PanelEventKind},
};
use state::{Partition, StateChange, StateStore};
use tracing::{debug, error, info, warn};

use crate::{ControlOutcome, Gateway, GatewayError, Rejection};

impl Gateway {
    pub async fn on_panel_event(&self, event: PanelEvent) {
        let Some(session) = self.session.get() else {
            warn!(
                event = event.kind().name(),
                "panel event without a session; dropped"
            );
            return;
        };

        let event_topic = self.cfg.event_topic();
        if let Err(err) = self
            .publisher
            .publish(&event_topic, event.raw(), false)
            .await
        {
            error!(
                topic = %event_topic,
                error = %err,
                "failed to republish panel event"
            );
        }

        let changes = {
            let mut state = session.state.lock().await;
            apply_event(&mut state, event.kind())
        };
        if !changes.is_empty() {
            StateUpdater::new(&session.factory).apply(&changes).await;
        }
    }

    /// Only a transport failure is an error; rejected requests are outcomes.
    pub async fn on_control_request(
        &self,
        mut request: ControlRequest,
    ) -> Result<ControlOutcome, GatewayError> {
        let Some(session) = self
            .session
            .get()
            .filter(|session| session.token.matches(request.session_token()))
        else {
            error!(
                request = %request,
                "invalid session token for control request"
            );
            return Ok(ControlOutcome::Rejected(Rejection::Unauthorized));
        };

        if request.requires_configuration() {
            let secure_arm = match request.partition_id() {
                Some(partition_id) => session
                    .state
                    .lock()
                    .await
                    .partition(partition_id)
                    .is_some_and(|partition| partition.secure_arm),
                None => false,
            };
            request.configure(&self.cfg, secure_arm);
        }

        if let Err(err) = request.check() {
            error!(
                request = %request,
                kind = err.kind(),
                error = %err,
                "control request rejected"
            );
            return Ok(ControlOutcome::Rejected(Rejection::Invalid(err)));
        }

        let Some(action) = request.action() else {
            info!(request = %request, "no action for control request");
            return Ok(ControlOutcome::NoOp);
        };

        self.link.send(&action).await?;
        debug!(
            request = %request,
            action = action.name(),
            "control request sent to panel"
        );
        Ok(ControlOutcome::Sent(action))
    }
}

fn apply_event(state: &mut StateStore, kind: &PanelEventKind) -> Vec<StateChange> {
    match kind {
        PanelEventKind::Info(summary) => state.apply_info(summary),
        PanelEventKind::SecureArm {
            partition_id,
            value,
        } => with_partition(state, *partition_id, "secure_arm", |partition| {
            partition.set_secure_arm(*value)
        }),
        PanelEventKind::ZoneActive(zone) => {
            debug!(
                zone_id = zone.zone_id.0,
                status = %zone.status,
                "zone active"
            );
            if zone.is_open() {
                state.zone_open(zone.zone_id)
            } else {
                state.zone_closed(zone.zone_id)
            }
        }
        PanelEventKind::ZoneUpdate(zone) => state.zone_update(zone),
        PanelEventKind::ZoneAdd(zone) => state.zone_add(zone),
        PanelEventKind::ZoneDelete { zone_id } => state.zone_delete(*zone_id),
        PanelEventKind::ArmingChanged {
            partition_id,
            arming_type,
        } => with_partition(state, *partition_id, "arming", |partition| {
            partition.set_status(arming_type)
        }),
        PanelEventKind::AlarmTriggered {
            partition_id,
            alarm_type,
        } => with_partition(state, *partition_id, "alarm", |partition| {
            partition.triggered(alarm_type.as_deref())
        }),
        PanelEventKind::Error {
            partition_id,
            error_type,
            description,
        } => with_partition(state, *partition_id, "error", |partition| {
            partition.errored(error_type, description)
        }),
        PanelEventKind::Unrecognized => {
            debug!("unrecognized panel event; republished only");
            Vec::new()
        }
    }
}

fn with_partition(
    state: &mut StateStore,
    partition_id: PartitionId,
    event: &'static str,
    mutate: impl FnOnce(&mut Partition) -> Vec<StateChange>,
) -> Vec<StateChange> {
    match state.partition_mut(partition_id) {
        Some(partition) => mutate(partition),
        None => {
            warn!(
                partition_id = partition_id.0,
                event,
                "partition not found; event discarded"
            );
            Vec::new()
        }
    }
}
