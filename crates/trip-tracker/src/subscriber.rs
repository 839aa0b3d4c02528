//! Live trip location subscriber.
//!
//! Each subscription is served by one driver task that owns the transport
//! connection. The driver moves through
//! `Connecting -> Connected -> Disconnected -> Connecting ...` and settles in
//! `Failed` once the reconnect policy is exhausted. Updates are decoded and
//! handed to the listeners on the driver task, so delivery is sequential and
//! in arrival order.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::Config;
use crate::listeners::{ListenerId, Listeners};
use crate::position::{PositionUpdate, TripId};
use crate::state::{ConnectionState, Lifecycle, ReconnectPolicy};
use crate::transport::{Connection, Frame, Transport};

/// Subscribes to position updates for one trip at a time.
///
/// Holds at most one underlying connection, regardless of how many times
/// [`Subscriber::subscribe`] is called. Must be used from within a Tokio
/// runtime.
pub struct Subscriber<T: Transport> {
    transport: Arc<T>,
    policy: ReconnectPolicy,
    lifecycle_buffer: usize,
    listeners: Listeners,
    active: Option<Active>,
}

impl<T: Transport> Subscriber<T> {
    #[must_use]
    pub fn new(transport: T, config: &Config) -> Self {
        Self {
            transport: Arc::new(transport),
            policy: config.reconnect,
            lifecycle_buffer: config.lifecycle_buffer.max(1),
            listeners: Listeners::default(),
            active: None,
        }
    }

    /// Subscribe to updates for `trip_id`.
    ///
    /// Returns `None` without connecting when the trip id is empty or absent.
    /// A live connection is reused: the previous trip's room is left and the
    /// new one joined, or membership is re-announced for the same trip. A
    /// failed subscription is replaced by a fresh connection.
    pub fn subscribe<'a>(
        &mut self, trip_id: impl Into<Option<&'a str>>,
    ) -> Option<SubscriptionHandle> {
        let Some(trip_id) = TripId::parse(trip_id) else {
            debug!("no trip id, not subscribing");
            return None;
        };

        if let Some(active) = self.active.as_mut().filter(|active| active.is_live())
            && active.commands.send(trip_id.clone()).is_ok()
        {
            debug!(trip_id = %trip_id, "reusing live connection");
            active.trip_id = trip_id;
            return Some(active.handle());
        }

        if let Some(stale) = self.active.take() {
            debug!(trip_id = %stale.trip_id, state = %stale.state(), "replacing stale connection");
            stale.token.cancel();
        }

        let (active, handle) = self.start(trip_id);
        self.active = Some(active);
        Some(handle)
    }

    /// Tear down the connection and clear every registered handler.
    ///
    /// Safe to call when nothing is subscribed. Once this returns no handler
    /// is invoked again, including for updates already in flight.
    pub fn unsubscribe(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
            active.state.send_replace(ConnectionState::Disconnected);
            info!(trip_id = %active.trip_id, "unsubscribed from trip");
        }
        self.listeners.clear();
    }

    /// Register a handler invoked once per received update.
    pub fn on_position_update(
        &self, handler: impl Fn(&PositionUpdate) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.add(handler)
    }

    /// Deregister a handler. Returns `false` if it was not registered.
    pub fn off_position_update(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.count()
    }

    /// Trip currently subscribed to, if any.
    #[must_use]
    pub fn trip_id(&self) -> Option<&TripId> {
        self.active.as_ref().map(|active| &active.trip_id)
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.active.as_ref().map_or(ConnectionState::Disconnected, Active::state)
    }

    fn start(&self, trip_id: TripId) -> (Active, SubscriptionHandle) {
        let token = CancellationToken::new();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(ConnectionState::Connecting);
        let state = Arc::new(state);

        // subscribe before the driver runs so no signal is missed
        let (lifecycle, events) = broadcast::channel(self.lifecycle_buffer);

        let driver = Driver {
            transport: Arc::clone(&self.transport),
            policy: self.policy,
            trip_id: trip_id.clone(),
            listeners: self.listeners.clone(),
            token: token.clone(),
            commands: command_rx,
            state: Arc::clone(&state),
            lifecycle: lifecycle.clone(),
        };

        let span = info_span!("trip_subscription", trip_id = %trip_id);
        let task = tokio::spawn(driver.run().instrument(span));

        let handle = SubscriptionHandle { trip_id: trip_id.clone(), state: state_rx, events };
        let active = Active { trip_id, token, commands, state, lifecycle, task };
        (active, handle)
    }
}

impl<T: Transport> Drop for Subscriber<T> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.token.cancel();
        }
    }
}

struct Active {
    trip_id: TripId,
    token: CancellationToken,
    commands: mpsc::UnboundedSender<TripId>,
    state: Arc<watch::Sender<ConnectionState>>,
    lifecycle: broadcast::Sender<Lifecycle>,
    task: JoinHandle<()>,
}

impl Active {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn is_live(&self) -> bool {
        !self.token.is_cancelled()
            && !self.task.is_finished()
            && self.state() != ConnectionState::Failed
    }

    fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            trip_id: self.trip_id.clone(),
            state: self.state.subscribe(),
            events: self.lifecycle.subscribe(),
        }
    }
}

/// Observes the state and lifecycle signals of one subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    trip_id: TripId,
    state: watch::Receiver<ConnectionState>,
    events: broadcast::Receiver<Lifecycle>,
}

impl SubscriptionHandle {
    #[must_use]
    pub const fn trip_id(&self) -> &TripId {
        &self.trip_id
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait for the next state change. `None` once the subscription is gone.
    pub async fn changed(&mut self) -> Option<ConnectionState> {
        self.state.changed().await.ok()?;
        Some(*self.state.borrow_and_update())
    }

    /// Wait until the subscription reaches `target`. Returns `false` if the
    /// subscription ends first.
    pub async fn wait_for(&mut self, target: ConnectionState) -> bool {
        self.state.wait_for(|state| *state == target).await.is_ok()
    }

    /// Next lifecycle signal. `None` once the subscription is gone.
    pub async fn next_lifecycle(&mut self) -> Option<Lifecycle> {
        loop {
            match self.events.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, trip_id = %self.trip_id, "lifecycle receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Clone for SubscriptionHandle {
    fn clone(&self) -> Self {
        Self {
            trip_id: self.trip_id.clone(),
            state: self.state.clone(),
            events: self.events.resubscribe(),
        }
    }
}

enum SessionEnd {
    Cancelled,
    Dropped(String),
}

struct Driver<T: Transport> {
    transport: Arc<T>,
    policy: ReconnectPolicy,
    trip_id: TripId,
    listeners: Listeners,
    token: CancellationToken,
    commands: mpsc::UnboundedReceiver<TripId>,
    state: Arc<watch::Sender<ConnectionState>>,
    lifecycle: broadcast::Sender<Lifecycle>,
}

impl<T: Transport> Driver<T> {
    async fn run(mut self) {
        let mut attempt = 0;

        loop {
            self.set_state(ConnectionState::Connecting);

            let connected = tokio::select! {
                biased;
                () = self.token.cancelled() => return,
                result = self.transport.connect() => result,
            };

            match connected {
                Ok(connection) => {
                    attempt = 0;
                    match self.session(connection).await {
                        SessionEnd::Cancelled => return,
                        SessionEnd::Dropped(reason) => {
                            warn!(
                                monotonic_counter.connection_drops = 1,
                                trip_id = %self.trip_id,
                                reason = %reason,
                                "connection dropped"
                            );
                            self.set_state(ConnectionState::Disconnected);
                            self.publish(Lifecycle::Disconnected { reason });
                        }
                    }
                }
                Err(err) => {
                    warn!(
                        monotonic_counter.connection_errors = 1,
                        trip_id = %self.trip_id,
                        error = %err,
                        "connection failed"
                    );
                    self.publish(Lifecycle::ConnectError { error: format!("{err:#}") });
                }
            }

            attempt += 1;
            if !self.policy.allows(attempt) {
                let attempts = attempt - 1;
                error!(
                    monotonic_counter.reconnects_exhausted = 1,
                    trip_id = %self.trip_id,
                    attempts,
                    "reconnection attempts exhausted"
                );
                self.set_state(ConnectionState::Failed);
                self.publish(Lifecycle::ReconnectFailed { attempts });
                return;
            }

            let delay = self.policy.backoff(attempt);
            info!(trip_id = %self.trip_id, attempt, delay = ?delay, "reconnecting");
            self.publish(Lifecycle::ReconnectAttempt { attempt });

            if !self.back_off(delay).await {
                return;
            }
        }
    }

    async fn session(&mut self, mut connection: T::Connection) -> SessionEnd {
        // trip changes requested while connecting
        while let Ok(trip_id) = self.commands.try_recv() {
            self.trip_id = trip_id;
        }

        if let Err(err) = connection.join(&self.trip_id).await {
            Self::close(connection).await;
            return SessionEnd::Dropped(format!("{err:#}"));
        }

        self.set_state(ConnectionState::Connected);
        self.publish(Lifecycle::Connected);
        info!(monotonic_counter.trip_joins = 1, trip_id = %self.trip_id, "joined trip room");

        loop {
            tokio::select! {
                biased;
                () = self.token.cancelled() => {
                    Self::close(connection).await;
                    return SessionEnd::Cancelled;
                }
                Some(trip_id) = self.commands.recv() => {
                    if let Err(err) = self.rejoin(&mut connection, trip_id).await {
                        Self::close(connection).await;
                        return SessionEnd::Dropped(format!("{err:#}"));
                    }
                }
                frame = connection.recv() => match frame {
                    Some(Frame::Update(payload)) => self.deliver(payload),
                    Some(Frame::Error(error)) => {
                        warn!(trip_id = %self.trip_id, error = %error, "transport error");
                        self.publish(Lifecycle::ConnectError { error });
                    }
                    Some(Frame::Closed(reason)) => return SessionEnd::Dropped(reason),
                    None => return SessionEnd::Dropped("connection closed".to_string()),
                },
            }
        }
    }

    // Leave the previous room before joining another trip's.
    async fn rejoin(
        &mut self, connection: &mut T::Connection, trip_id: TripId,
    ) -> anyhow::Result<()> {
        // the new trip is current even if leaving fails, so a reconnect joins it
        if trip_id != self.trip_id {
            let previous = std::mem::replace(&mut self.trip_id, trip_id);
            info!(from = %previous, to = %self.trip_id, "switching trip room");
            connection.leave(&previous).await?;
        }
        connection.join(&self.trip_id).await
    }

    // Wait out the back-off delay. Trip changes requested meanwhile are
    // applied on the next connection. Returns `false` if cancelled.
    async fn back_off(&mut self, delay: Duration) -> bool {
        let sleep = time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                () = self.token.cancelled() => return false,
                () = &mut sleep => return true,
                Some(trip_id) = self.commands.recv() => self.trip_id = trip_id,
            }
        }
    }

    fn deliver(&self, payload: Value) {
        match PositionUpdate::from_payload(payload) {
            Ok(update) => {
                let handlers = self.listeners.notify(&update, &self.token);
                debug!(
                    trip_id = %self.trip_id,
                    latitude = update.latitude,
                    longitude = update.longitude,
                    timestamp = %update.timestamp,
                    handlers,
                    "position update"
                );
            }
            Err(err) => {
                warn!(
                    monotonic_counter.invalid_updates = 1,
                    trip_id = %self.trip_id,
                    error = %err,
                    "dropping malformed position update"
                );
            }
        }
    }

    // The subscriber owns the state once cancelled.
    fn set_state(&self, next: ConnectionState) {
        let token = &self.token;
        self.state.send_if_modified(|state| {
            if token.is_cancelled() || *state == next {
                return false;
            }
            *state = next;
            true
        });
    }

    fn publish(&self, event: Lifecycle) {
        if !self.token.is_cancelled() {
            // no receivers is fine
            let _ = self.lifecycle.send(event);
        }
    }

    async fn close(connection: T::Connection) {
        if let Err(err) = connection.close().await {
            warn!(error = %err, "failed to close connection");
        }
    }
}
