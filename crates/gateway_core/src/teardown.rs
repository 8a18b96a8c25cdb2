use render::{Entity, RenderError};
use state::Partition;
use tracing::error;

use crate::gateway::Session;

#[derive(Debug, Default)]
pub struct TeardownReport {
    entries: Vec<(String, Result<(), RenderError>)>,
}

impl TeardownReport {
    pub(crate) async fn collect(session: &Session) -> Self {
        let partitions: Vec<Partition> = {
            let state = session.state.lock().await;
            state.partitions().cloned().collect()
        };

        let mut report = Self::default();
        report.render(session, Entity::State).await;
        for sensor in partitions.iter().flat_map(|p| p.sensors()) {
            report.render(session, Entity::Sensor(sensor)).await;
        }
        for partition in &partitions {
            report.render(session, Entity::Partition(partition)).await;
        }
        report
    }

    async fn render(&mut self, session: &Session, entity: Entity<'_>) {
        let label = entity.label();
        let outcome = session.factory.wrap(entity).set_unavailable().await;
        if let Err(err) = &outcome {
            error!(
                entity = %label,
                error = %err,
                "failed to mark entity unavailable"
            );
        }
        self.entries.push((label, outcome));
    }

    pub fn entries(&self) -> &[(String, Result<(), RenderError>)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, outcome)| outcome.is_err())
            .count()
    }
}
