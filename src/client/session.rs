//! The dashboard's single context object.
//!
//! A [`Session`] owns every piece of mutable dashboard state: the runtime
//! store, the connection state machine, the filter criteria and what the
//! device said about itself. Drivers feed it events in arrival order and
//! carry out the [`Action`]s it returns.

use crate::board::catalog::PinCatalog;
use crate::board::runtime::RuntimeStateStore;
use crate::client::config::ClientConfig;
use crate::client::connection::{Action, ChannelEvent, ConnectionManager, ConnectionStatus};
use crate::client::dispatcher::{CommandDispatcher, Dispatch};
use crate::error::{DeckError, Result};
use crate::protocol::InboundMessage;
use crate::view::filter::{CategoryFilter, PinFilter};
use crate::view::model::{render_filtered, DashboardView, StatusIndicator};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, warn};

/// What the device has reported about itself. Kept across disconnects.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub target: Option<String>,
    pub uptime_ms: Option<u64>,
    pub last_snapshot_at: Option<DateTime<Utc>>,
    /// Latest command rejection sent by the device
    pub last_error: Option<String>,
}

/// Operator input coming from the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// A mode selector changed; values are the raw control attributes
    ModeSelected { gpio: String, mode: String },
    /// A toggle button was pressed
    TogglePressed { gpio: String, next: String },
    FilterChanged(String),
    SearchChanged(String),
}

#[derive(Debug)]
pub struct Session {
    catalog: PinCatalog,
    store: RuntimeStateStore,
    connection: ConnectionManager,
    dispatcher: CommandDispatcher,
    filter: PinFilter,
    device: DeviceInfo,
}

impl Session {
    /// Build a session; fails if the configured filter is not a known category.
    pub fn new(catalog: PinCatalog, config: &ClientConfig) -> Result<Self> {
        let category = config
            .filter
            .parse::<CategoryFilter>()
            .map_err(|e| DeckError::config_error(e))?;

        Ok(Self {
            catalog,
            store: RuntimeStateStore::new(),
            connection: ConnectionManager::new(config.connect_timeout(), config.reconnect_delay()),
            dispatcher: CommandDispatcher::new(),
            filter: PinFilter::new(category, &config.search),
            device: DeviceInfo::default(),
        })
    }

    pub fn catalog(&self) -> &PinCatalog {
        &self.catalog
    }

    pub fn store(&self) -> &RuntimeStateStore {
        &self.store
    }

    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn filter(&self) -> &PinFilter {
        &self.filter
    }

    /// Open the first channel.
    pub fn start(&mut self, now: Instant) -> Vec<Action> {
        let actions = self.connection.open(now);
        self.absorb(actions)
    }

    pub fn handle_channel(&mut self, event: ChannelEvent, now: Instant) -> Vec<Action> {
        let actions = self.connection.handle_channel(event, now);
        self.absorb(actions)
    }

    /// Fire due timers. Drivers call this when [`next_deadline`](Self::next_deadline) passes.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<Action> {
        let actions = self.connection.poll_timers(now);
        self.absorb(actions)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.connection.next_deadline()
    }

    /// Apply operator input. Commands never touch the store directly.
    pub fn handle_ui(&mut self, event: UiEvent) -> Vec<Action> {
        match event {
            UiEvent::ModeSelected { gpio, mode } => {
                let dispatch = self
                    .dispatcher
                    .request_mode_change(&self.connection, &gpio, &mode);
                dispatched(dispatch)
            }
            UiEvent::TogglePressed { gpio, next } => {
                let dispatch = self.dispatcher.request_write(&self.connection, &gpio, &next);
                dispatched(dispatch)
            }
            UiEvent::FilterChanged(raw) => match raw.parse::<CategoryFilter>() {
                Ok(category) => {
                    self.filter.set_category(category);
                    vec![Action::Render]
                }
                Err(e) => {
                    warn!("Ignoring filter change: {}", e);
                    Vec::new()
                }
            },
            UiEvent::SearchChanged(query) => {
                self.filter.set_query(&query);
                vec![Action::Render]
            }
        }
    }

    /// Current presentation of the dashboard.
    pub fn view(&self) -> DashboardView {
        let status = self.connection.status();
        DashboardView {
            status: StatusIndicator::from(status),
            filter: self.filter.category().to_string(),
            search: self.filter.query().to_string(),
            device: self.device.clone(),
            grid: render_filtered(&self.catalog, &self.store, status, &self.filter),
        }
    }

    /// Cancel timers and close the current channel.
    pub fn dispose(&mut self) -> Vec<Action> {
        self.connection.dispose()
    }

    /// Apply delivered messages; everything else goes back to the driver.
    fn absorb(&mut self, actions: Vec<Action>) -> Vec<Action> {
        let mut remaining = Vec::with_capacity(actions.len());
        for action in actions {
            match action {
                Action::Deliver(message) => self.apply_inbound(message),
                other => remaining.push(other),
            }
        }
        remaining
    }

    fn apply_inbound(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::Snapshot(snapshot) => {
                let report = self.store.merge(&self.catalog, &snapshot.pins);
                debug!(
                    "Merged snapshot: {} applied, {} discarded",
                    report.applied, report.discarded
                );
                if snapshot.target.is_some() {
                    self.device.target = snapshot.target;
                }
                if snapshot.uptime_ms.is_some() {
                    self.device.uptime_ms = snapshot.uptime_ms;
                }
                self.device.last_snapshot_at = Some(Utc::now());
            }
            InboundMessage::DeviceError { message } => {
                warn!("Device rejected a command: {}", message);
                self.device.last_error = Some(message);
            }
        }
    }
}

fn dispatched(dispatch: Dispatch) -> Vec<Action> {
    match dispatch {
        Dispatch::Sent { channel, message } => vec![Action::Send(channel, message)],
        Dispatch::Dropped(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::connection::ChannelId;
    use crate::protocol::OutboundMessage;

    fn connected_session() -> (Session, ChannelId, Instant) {
        let now = Instant::now();
        let mut session = Session::new(PinCatalog::reference(), &ClientConfig::default()).unwrap();
        session.start(now);
        let id = session.connection().current_channel().unwrap();
        session.handle_channel(ChannelEvent::Opened(id), now);
        (session, id, now)
    }

    #[test]
    fn test_rejects_unknown_filter() {
        let config = ClientConfig::default().with_filter("analog");
        assert!(matches!(
            Session::new(PinCatalog::reference(), &config),
            Err(DeckError::Config(_))
        ));
    }

    #[test]
    fn test_snapshot_updates_store_and_device_info() {
        let (mut session, id, now) = connected_session();
        let actions = session.handle_channel(
            ChannelEvent::Message(
                id,
                r#"{"type":"snapshot","target":"esp32s3","uptimeMs":500,"pins":[{"gpio":14,"mode":"output","value":1}]}"#
                    .into(),
            ),
            now,
        );

        assert_eq!(actions, vec![Action::Render]);
        assert!(session.store().get(14).unwrap().value);
        assert_eq!(session.device().target.as_deref(), Some("esp32s3"));
        assert_eq!(session.device().uptime_ms, Some(500));
        assert!(session.device().last_snapshot_at.is_some());
    }

    #[test]
    fn test_device_error_is_recorded_without_disconnect() {
        let (mut session, id, now) = connected_session();
        session.handle_channel(
            ChannelEvent::Message(id, r#"{"type":"error","message":"GPIO not in output mode"}"#.into()),
            now,
        );

        assert_eq!(session.status(), ConnectionStatus::Connected);
        assert_eq!(session.device().last_error.as_deref(), Some("GPIO not in output mode"));
    }

    #[test]
    fn test_ui_commands_do_not_mutate_store() {
        let (mut session, id, _) = connected_session();
        let actions = session.handle_ui(UiEvent::ModeSelected {
            gpio: "14".into(),
            mode: "output".into(),
        });

        assert_eq!(
            actions,
            vec![Action::Send(
                id,
                OutboundMessage::Set { gpio: 14, mode: crate::board::PinMode::Output }
            )]
        );
        assert!(session.store().get(14).is_none());
    }

    #[test]
    fn test_filter_and_search_changes_render() {
        let (mut session, _, _) = connected_session();

        assert_eq!(session.handle_ui(UiEvent::FilterChanged("power".into())), vec![Action::Render]);
        assert_eq!(session.view().grid.cards().len(), 3);

        assert!(session.handle_ui(UiEvent::FilterChanged("bogus".into())).is_empty());
        assert_eq!(session.view().filter, "power");

        session.handle_ui(UiEvent::SearchChanged("  3V3 ".into()));
        let view = session.view();
        assert_eq!(view.search, "3v3");
        assert_eq!(view.grid.cards().len(), 1);
    }
}
