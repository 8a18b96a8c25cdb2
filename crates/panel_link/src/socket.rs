use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use shared::{actions::PanelAction, config::GatewayConfig, protocol::PanelEvent};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{mpsc, Mutex, Notify},
};
use tracing::{debug, info, warn};

use crate::{LinkError, LinkEvent, PanelLink};

const KEEP_ALIVE_LINE: &[u8] = b"\n";
const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(240);
const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(60);

struct Connection {
    writer: OwnedWriteHalf,
    dropped: Arc<Notify>,
}

enum ReadOutcome {
    Closed,
    ConsumerGone,
}

pub struct PanelSocket {
    addr: String,
    token: String,
    keep_alive_interval: Duration,
    reconnect_delay: Duration,
    connection: Mutex<Option<Connection>>,
}

impl PanelSocket {
    pub fn new(addr: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            token: token.into(),
            keep_alive_interval: DEFAULT_KEEP_ALIVE_INTERVAL,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            connection: Mutex::new(None),
        }
    }

    pub fn from_config(cfg: &GatewayConfig) -> Self {
        Self::new(cfg.panel_addr(), cfg.panel_token.clone())
            .with_keep_alive_interval(Duration::from_secs(cfg.keep_alive_interval_secs))
            .with_reconnect_delay(Duration::from_secs(cfg.reconnect_delay_secs))
    }

    pub fn with_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.keep_alive_interval = interval;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    async fn connect(&self) -> Result<(OwnedReadHalf, Arc<Notify>), LinkError> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        let (reader, mut writer) = stream.into_split();

        // Ask for the full picture first; the panel answers with a summary.
        writer
            .write_all(PanelAction::Info.to_line(&self.token).as_bytes())
            .await?;

        let dropped = Arc::new(Notify::new());
        *self.connection.lock().await = Some(Connection {
            writer,
            dropped: Arc::clone(&dropped),
        });
        Ok((reader, dropped))
    }

    async fn read_lines(
        &self,
        reader: OwnedReadHalf,
        dropped: &Notify,
        events: &mpsc::Sender<LinkEvent>,
    ) -> ReadOutcome {
        let mut lines = BufReader::new(reader).lines();
        loop {
            let next = tokio::select! {
                _ = dropped.notified() => {
                    warn!(
                        addr = %self.addr,
                        "panel connection dropped after a failed write"
                    );
                    return ReadOutcome::Closed;
                }
                next = lines.next_line() => next,
            };

            match next {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match PanelEvent::from_line(line) {
                        Ok(event) => {
                            debug!(event = event.kind().name(), "panel event received");
                            if events.send(LinkEvent::Event(event)).await.is_err() {
                                return ReadOutcome::ConsumerGone;
                            }
                        }
                        // The panel acknowledges commands with a bare `ACK`.
                        Err(err) => debug!(line, error = %err, "ignoring non-event panel line"),
                    }
                }
                Ok(None) => {
                    info!(addr = %self.addr, "panel closed the connection");
                    return ReadOutcome::Closed;
                }
                Err(err) => {
                    warn!(addr = %self.addr, error = %err, "panel socket read failed");
                    return ReadOutcome::Closed;
                }
            }
        }
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut guard = self.connection.lock().await;
        let connection = guard.as_mut().ok_or(LinkError::NotConnected)?;
        if let Err(err) = connection.writer.write_all(bytes).await {
            if let Some(connection) = guard.take() {
                connection.dropped.notify_one();
            }
            return Err(err.into());
        }
        Ok(())
    }
}

#[async_trait]
impl PanelLink for PanelSocket {
    async fn listen(&self, events: mpsc::Sender<LinkEvent>) {
        loop {
            match self.connect().await {
                Ok((reader, dropped)) => {
                    info!(addr = %self.addr, "connected to panel");
                    if events.send(LinkEvent::Connected).await.is_err() {
                        break;
                    }
                    let outcome = self.read_lines(reader, &dropped, &events).await;
                    self.connection.lock().await.take();
                    if matches!(outcome, ReadOutcome::ConsumerGone)
                        || events.send(LinkEvent::Disconnected).await.is_err()
                    {
                        break;
                    }
                }
                Err(err) => warn!(
                    addr = %self.addr,
                    error = %err,
                    retry_in_ms = self.reconnect_delay.as_millis() as u64,
                    "unable to connect to panel"
                ),
            }
            tokio::time::sleep(self.reconnect_delay).await;
        }
        debug!(
            addr = %self.addr,
            "panel event consumer closed; listener exiting"
        );
    }

    async fn keep_alive(&self) {
        let mut ticker = tokio::time::interval(self.keep_alive_interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match self.write(KEEP_ALIVE_LINE).await {
                Ok(()) => debug!("panel keep-alive sent"),
                Err(LinkError::NotConnected) => {}
                Err(err) => warn!(error = %err, "panel keep-alive failed"),
            }
        }
    }

    async fn send(&self, action: &PanelAction) -> Result<(), LinkError> {
        self.write(action.to_line(&self.token).as_bytes()).await?;
        info!(
            action = action.name(),
            partition_id = ?action.partition_id().map(|id| id.0),
            "action sent to panel"
        );
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/socket_tests.rs"]
mod tests;
