//! Session orchestrator between the panel link, the state store and the bus.

use panel_link::LinkError;
use shared::{actions::PanelAction, error::ControlError};
use thiserror::Error;

mod dispatch;
mod gateway;
mod teardown;

pub use gateway::Gateway;
pub use teardown::TeardownReport;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway session already started")]
    AlreadyStarted,
    #[error("failed to send action to the panel: {0}")]
    Send(#[from] LinkError),
}

#[derive(Debug)]
pub enum Rejection {
    Unauthorized,
    Invalid(ControlError),
}

#[derive(Debug)]
pub enum ControlOutcome {
    Rejected(Rejection),
    NoOp,
    Sent(PanelAction),
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
