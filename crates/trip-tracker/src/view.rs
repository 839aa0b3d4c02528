//! # Trip view
//!
//! Binds a [`Subscriber`] to a display surface: each update moves the trip's
//! marker and refreshes the timestamp readout.

use std::sync::{Arc, Mutex, PoisonError};

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::position::{PositionUpdate, TripId};
use crate::state::ConnectionState;
use crate::subscriber::{Subscriber, SubscriptionHandle};
use crate::transport::Transport;

/// Signal indicator shown next to the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Signal {
    /// Joined to the trip's room.
    Live,
    /// Connection lost, whether or not a reconnect is still pending.
    NoSignal,
}

/// The display collaborator, e.g. a map widget.
pub trait MapSurface: Send + Sync + 'static {
    fn move_marker(&self, latitude: f64, longitude: f64);

    fn set_timestamp_label(&self, label: &str);

    fn set_signal(&self, signal: Signal);
}

/// A view tracking one trip at a time.
pub struct TripView<T: Transport, S: MapSurface> {
    subscriber: Subscriber<T>,
    surface: Arc<S>,
    timezone: Tz,
    last: Arc<Mutex<Option<PositionUpdate>>>,
    watcher: Option<JoinHandle<()>>,
}

impl<T: Transport, S: MapSurface> TripView<T, S> {
    #[must_use]
    pub fn new(subscriber: Subscriber<T>, surface: Arc<S>, timezone: Tz) -> Self {
        Self { subscriber, surface, timezone, last: Arc::default(), watcher: None }
    }

    /// Open the view on `trip_id`, closing whatever trip was shown before.
    ///
    /// Returns `None`, leaving the view closed, when the trip id is empty or
    /// absent.
    pub fn open<'a>(&mut self, trip_id: impl Into<Option<&'a str>>) -> Option<SubscriptionHandle> {
        self.close();
        let trip_id = TripId::parse(trip_id)?;
        *lock(&self.last) = None;

        let surface = Arc::clone(&self.surface);
        let last = Arc::clone(&self.last);
        let timezone = self.timezone;
        self.subscriber.on_position_update(move |update| {
            surface.move_marker(update.latitude, update.longitude);
            surface.set_timestamp_label(&update.time_label(timezone));
            *lock(&last) = Some(update.clone());
        });

        let handle = self.subscriber.subscribe(trip_id.as_str())?;
        self.watcher = Some(tokio::spawn(show_signal(handle.clone(), Arc::clone(&self.surface))));
        debug!(trip_id = %trip_id, "trip view opened");

        Some(handle)
    }

    /// Close the view. Later updates no longer reach the surface.
    pub fn close(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        self.subscriber.unsubscribe();
    }

    /// The most recently displayed update, kept while the signal is lost.
    #[must_use]
    pub fn last_position(&self) -> Option<PositionUpdate> {
        lock(&self.last).clone()
    }

    #[must_use]
    pub fn trip_id(&self) -> Option<&TripId> {
        self.subscriber.trip_id()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.subscriber.state()
    }
}

// The stale marker stays on screen when the signal is lost.
async fn show_signal<S: MapSurface>(mut handle: SubscriptionHandle, surface: Arc<S>) {
    let mut state = handle.state();
    loop {
        match state {
            ConnectionState::Connected => surface.set_signal(Signal::Live),
            ConnectionState::Disconnected | ConnectionState::Failed => {
                surface.set_signal(Signal::NoSignal);
            }
            ConnectionState::Connecting => {}
        }
        let Some(next) = handle.changed().await else { return };
        state = next;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
