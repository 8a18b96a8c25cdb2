use std::{
    sync::{Arc, Mutex as StdMutex, OnceLock, PoisonError},
    time::Duration,
};

use bus::{BusMessage, Publisher, Subscriber};
use futures::{stream::BoxStream, StreamExt};
use panel_link::{LinkEvent, PanelLink};
use render::{Entity, WrapperFactory};
use shared::{config::GatewayConfig, control::ControlRequest, domain::SessionToken};
use state::StateStore;
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{ControlOutcome, GatewayError, TeardownReport};

const LINK_EVENT_CAPACITY: usize = 256;
const LISTENER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct Session {
    pub(crate) token: SessionToken,
    pub(crate) state: Mutex<StateStore>,
    pub(crate) factory: WrapperFactory,
}

#[derive(Default)]
struct Tasks {
    link: Vec<JoinHandle<()>>,
    listeners: Vec<JoinHandle<()>>,
}

pub struct Gateway {
    pub(crate) cfg: Arc<GatewayConfig>,
    pub(crate) link: Arc<dyn PanelLink>,
    pub(crate) publisher: Arc<dyn Publisher>,
    subscriber: Arc<dyn Subscriber>,
    pub(crate) session: OnceLock<Session>,
    shutdown: watch::Sender<bool>,
    tasks: StdMutex<Tasks>,
}

impl Gateway {
    pub fn new(
        cfg: GatewayConfig,
        link: Arc<dyn PanelLink>,
        publisher: Arc<dyn Publisher>,
        subscriber: Arc<dyn Subscriber>,
    ) -> Arc<Self> {
        let (shutdown, _) = watch::channel(false);
        Arc::new(Self {
            cfg: Arc::new(cfg),
            link,
            publisher,
            subscriber,
            session: OnceLock::new(),
            shutdown,
            tasks: StdMutex::new(Tasks::default()),
        })
    }

    pub fn session_token(&self) -> Option<&SessionToken> {
        self.session.get().map(|session| &session.token)
    }

    pub async fn with_state<R>(&self, read: impl FnOnce(&StateStore) -> R) -> Option<R> {
        let session = self.session.get()?;
        let state = session.state.lock().await;
        Some(read(&state))
    }

    /// Returns once every listener is registered, without waiting for the panel.
    pub async fn start(self: &Arc<Self>) -> Result<SessionToken, GatewayError> {
        let token = SessionToken::generate();
        let session = Session {
            token: token.clone(),
            state: Mutex::new(StateStore::new()),
            factory: WrapperFactory::new(
                Arc::clone(&self.publisher),
                Arc::clone(&self.cfg),
                token.clone(),
            ),
        };
        self.session
            .set(session)
            .map_err(|_| GatewayError::AlreadyStarted)?;
        info!(panel = %self.cfg.panel_addr(), "starting gateway session");

        if let Some(session) = self.session.get() {
            if let Err(err) = session
                .factory
                .wrap(Entity::State)
                .set_unavailable()
                .await
            {
                warn!(
                    error = %err,
                    "failed to mark gateway unavailable at startup"
                );
            }
        }

        let (events_tx, events_rx) = mpsc::channel(LINK_EVENT_CAPACITY);
        let controls = self.subscriber.subscribe(&self.cfg.control_topic());

        let link_tasks = {
            let listen_link = Arc::clone(&self.link);
            let keep_alive_link = Arc::clone(&self.link);
            vec![
                tokio::spawn(async move { listen_link.listen(events_tx).await }),
                tokio::spawn(async move { keep_alive_link.keep_alive().await }),
            ]
        };
        let event_listener = {
            let shutdown = self.shutdown.subscribe();
            Arc::clone(self).run_event_listener(events_rx, shutdown)
        };
        let control_listener = {
            let shutdown = self.shutdown.subscribe();
            Arc::clone(self).run_control_listener(controls, shutdown)
        };
        let listener_tasks = vec![tokio::spawn(event_listener), tokio::spawn(control_listener)];

        {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            tasks.link.extend(link_tasks);
            tasks.listeners.extend(listener_tasks);
        }

        info!(
            control_topic = %self.cfg.control_topic(),
            event_topic = %self.cfg.event_topic(),
            "gateway started"
        );
        Ok(token)
    }

    pub async fn stop(&self) -> TeardownReport {
        let Some(session) = self.session.get() else {
            info!("no gateway session; nothing to tear down");
            return TeardownReport::default();
        };
        info!("stopping gateway session");

        self.shutdown.send_replace(true);
        self.halt_tasks().await;

        let report = TeardownReport::collect(session).await;
        if report.failures() > 0 {
            warn!(
                attempted = report.len(),
                failed = report.failures(),
                "gateway stopped with render failures"
            );
        } else {
            info!(attempted = report.len(), "gateway stopped");
        }
        report
    }

    pub async fn on_panel_connected(&self) {
        debug!("panel connected");
        self.render_gateway_availability(true).await;
    }

    pub async fn on_panel_disconnected(&self) {
        debug!("panel disconnected");
        self.render_gateway_availability(false).await;
    }

    async fn render_gateway_availability(&self, available: bool) {
        let Some(session) = self.session.get() else {
            warn!(available, "panel connectivity changed without a session");
            return;
        };
        let wrapper = session.factory.wrap(Entity::State);
        let result = if available {
            wrapper.set_available().await
        } else {
            wrapper.set_unavailable().await
        };
        if let Err(err) = result {
            error!(
                available,
                error = %err,
                "failed to render gateway availability"
            );
        }
    }

    async fn halt_tasks(&self) {
        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };

        for task in tasks.link {
            task.abort();
        }
        for task in tasks.listeners {
            let abort = task.abort_handle();
            match tokio::time::timeout(LISTENER_DRAIN_TIMEOUT, task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) if err.is_cancelled() => {}
                Ok(Err(err)) => error!(error = %err, "gateway listener panicked"),
                Err(_) => {
                    warn!("gateway listener did not drain in time; aborting");
                    abort.abort();
                }
            }
        }
    }

    async fn run_event_listener(
        self: Arc<Self>,
        mut events: mpsc::Receiver<LinkEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            match event {
                LinkEvent::Connected => self.on_panel_connected().await,
                LinkEvent::Disconnected => self.on_panel_disconnected().await,
                LinkEvent::Event(event) => self.on_panel_event(event).await,
            }
        }
        debug!("panel event listener stopped");
    }

    async fn run_control_listener(
        self: Arc<Self>,
        mut controls: BoxStream<'static, BusMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                message = controls.next() => match message {
                    Some(message) => message,
                    None => break,
                },
            };
            if message.payload.is_empty() {
                continue;
            }

            let request = match ControlRequest::from_json(&message.payload) {
                Ok(request) => request,
                Err(err) => {
                    warn!(
                        topic = %message.topic,
                        kind = err.kind(),
                        error = %err,
                        "discarding undecodable control request"
                    );
                    continue;
                }
            };

            match self.on_control_request(request).await {
                Ok(ControlOutcome::Sent(action)) => {
                    debug!(action = action.name(), "control request forwarded")
                }
                Ok(outcome) => debug!(?outcome, "control request not forwarded"),
                Err(err) => error!(error = %err, "control request failed"),
            }
        }
        debug!("control listener stopped");
    }
}
