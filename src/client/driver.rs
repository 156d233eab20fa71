//! Tokio event loop that drives a [`Session`].
//!
//! One task owns the session. Channel events, operator input and timer
//! expirations are consumed one at a time in arrival order, so the store and
//! the connection status never see concurrent writers.

use crate::client::connection::{Action, ChannelEvent, ChannelId};
use crate::client::session::{Session, UiEvent};
use crate::client::transport::{ChannelHandle, Connector};
use crate::error::{DeckError, Result};
use crate::view::model::DashboardView;
use futures_util::stream::{BoxStream, StreamExt};
use std::collections::HashMap;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

/// Input accepted by a running driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCommand {
    Ui(UiEvent),
    Shutdown,
}

/// Handle to a driver running on its own task.
pub struct DashboardHandle {
    commands: mpsc::UnboundedSender<DriverCommand>,
    views: watch::Receiver<DashboardView>,
    task: JoinHandle<()>,
}

impl DashboardHandle {
    /// Forward operator input. Returns false once the driver has stopped.
    pub fn send_ui(&self, event: UiEvent) -> bool {
        self.commands.send(DriverCommand::Ui(event)).is_ok()
    }

    /// The most recently rendered view.
    pub fn current_view(&self) -> DashboardView {
        self.views.borrow().clone()
    }

    /// Stream of rendered views, starting with the current one.
    pub fn views(&self) -> BoxStream<'static, DashboardView> {
        WatchStream::new(self.views.clone()).boxed()
    }

    /// Dispose the session and wait for the loop to finish.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.commands.send(DriverCommand::Shutdown);
        self.task
            .await
            .map_err(|e| DeckError::transport_error(format!("Driver task failed: {}", e)))
    }
}

/// Start the session on a new task.
pub fn spawn<C: Connector>(session: Session, connector: C) -> DashboardHandle {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (views_tx, views_rx) = watch::channel(session.view());

    let task = tokio::spawn(run(session, connector, commands_rx, views_tx));

    DashboardHandle {
        commands: commands_tx,
        views: views_rx,
        task,
    }
}

/// Run the session until shutdown is requested or every command sender is dropped.
pub async fn run<C: Connector>(
    mut session: Session,
    connector: C,
    mut commands: mpsc::UnboundedReceiver<DriverCommand>,
    views: watch::Sender<DashboardView>,
) {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut runtime = ChannelRuntime {
        connector,
        events: events_tx,
        channels: HashMap::new(),
    };

    let actions = session.start(now());
    runtime.perform(&session, actions, &views);

    loop {
        let deadline = session.next_deadline();
        let timer = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(Instant::from_std(at)).await,
                None => std::future::pending::<()>().await,
            }
        };

        let actions = tokio::select! {
            Some(event) = events_rx.recv() => session.handle_channel(event, now()),
            command = commands.recv() => match command {
                Some(DriverCommand::Ui(event)) => session.handle_ui(event),
                Some(DriverCommand::Shutdown) | None => break,
            },
            _ = timer => session.poll_timers(now()),
        };

        runtime.perform(&session, actions, &views);
    }

    info!("Dashboard session shutting down");
    let actions = session.dispose();
    runtime.perform(&session, actions, &views);
    let _ = views.send_replace(session.view());
}

/// Current time on tokio's clock, which tests can pause and advance.
fn now() -> std::time::Instant {
    Instant::now().into_std()
}

struct ChannelRuntime<C> {
    connector: C,
    events: mpsc::UnboundedSender<ChannelEvent>,
    channels: HashMap<ChannelId, ChannelHandle>,
}

impl<C: Connector> ChannelRuntime<C> {
    fn perform(
        &mut self,
        session: &Session,
        actions: Vec<Action>,
        views: &watch::Sender<DashboardView>,
    ) {
        let mut render = false;

        for action in actions {
            match action {
                Action::Open(id) => {
                    let handle = self.connector.connect(id, self.events.clone());
                    self.channels.insert(id, handle);
                }
                Action::Close(id) => {
                    if let Some(handle) = self.channels.remove(&id) {
                        handle.close();
                    }
                }
                Action::Send(id, message) => {
                    let text = match message.encode() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Failed to encode {:?}: {}", message, e);
                            continue;
                        }
                    };
                    let sent = self.channels.get(&id).is_some_and(|handle| handle.send(text));
                    if sent {
                        debug!("Sent {:?} on channel {}", message, id);
                    } else {
                        debug!("Channel {} gone, dropped {:?}", id, message);
                    }
                }
                Action::Render => render = true,
                Action::Deliver(_) => {}
            }
        }

        if render {
            let _ = views.send_replace(session.view());
        }
    }
}
