//! Connection to the panel's JSON-lines control socket.

use async_trait::async_trait;
use shared::{actions::PanelAction, protocol::PanelEvent};
use thiserror::Error;
use tokio::sync::mpsc;

mod socket;

pub use socket::PanelSocket;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    Event(PanelEvent),
}

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("not connected to the panel")]
    NotConnected,
    #[error("panel socket i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait PanelLink: Send + Sync {
    async fn listen(&self, events: mpsc::Sender<LinkEvent>);

    async fn keep_alive(&self);

    async fn send(&self, action: &PanelAction) -> Result<(), LinkError>;
}
