#![allow(missing_docs)]


use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono_tz::Tz;
use pretty_assertions::assert_eq;
use trip_tracker::view::{MapSurface, Signal, TripView};
use trip_tracker::{ConnectionState, Subscriber};

use self::provider::{Broker, MockTransport, config, eventually, position, settle};

#[derive(Default)]
struct MockSurface {
    markers: Mutex<Vec<(f64, f64)>>,
    labels: Mutex<Vec<String>>,
    signals: Mutex<Vec<Signal>>,
}

impl MockSurface {
    fn markers(&self) -> Vec<(f64, f64)> {
        self.markers.lock().expect("should lock").clone()
    }

    fn labels(&self) -> Vec<String> {
        self.labels.lock().expect("should lock").clone()
    }

    fn signals(&self) -> Vec<Signal> {
        self.signals.lock().expect("should lock").clone()
    }
}

impl MapSurface for MockSurface {
    fn move_marker(&self, latitude: f64, longitude: f64) {
        self.markers.lock().expect("should lock").push((latitude, longitude));
    }

    fn set_timestamp_label(&self, label: &str) {
        self.labels.lock().expect("should lock").push(label.to_string());
    }

    fn set_signal(&self, signal: Signal) {
        self.signals.lock().expect("should lock").push(signal);
    }
}

fn view(broker: &Broker, surface: &Arc<MockSurface>) -> TripView<MockTransport, MockSurface> {
    let subscriber = Subscriber::new(broker.transport(), &config());
    TripView::new(subscriber, Arc::clone(surface), Tz::UTC)
}

// Should move the marker while open and ignore updates once closed.
#[tokio::test]
async fn open_then_close() {
    let broker = Broker::default();
    let surface = Arc::new(MockSurface::default());
    let mut view = view(&broker, &surface);

    let mut handle = view.open("T1").expect("should open");
    assert!(handle.wait_for(ConnectionState::Connected).await);

    broker.publish("T1", position(-8.1, -79.0, "2024-01-01T10:00:00Z"));
    eventually(|| surface.markers().len() == 1).await;

    assert_eq!(surface.markers(), vec![(-8.1, -79.0)]);
    assert_eq!(surface.labels(), vec!["10:00:00"]);
    assert_eq!(view.last_position().map(|u| u.timestamp), Some("2024-01-01T10:00:00Z".to_string()));
    eventually(|| surface.signals() == vec![Signal::Live]).await;

    view.close();
    broker.publish("T1", position(-8.2, -79.1, "2024-01-01T10:00:05Z"));
    eventually(|| broker.open_connections() == 0).await;
    settle().await;

    assert_eq!(surface.markers(), vec![(-8.1, -79.0)]);
    assert_eq!(surface.labels(), vec!["10:00:00"]);
    assert_eq!(view.state(), ConnectionState::Disconnected);
}

// Should show no signal, keeping the stale marker, once retries run out.
#[tokio::test]
async fn no_signal_keeps_marker() {
    let broker = Broker::default();
    let surface = Arc::new(MockSurface::default());
    let mut view = view(&broker, &surface);

    let mut handle = view.open("T1").expect("should open");
    assert!(handle.wait_for(ConnectionState::Connected).await);
    broker.publish("T1", position(-8.1, -79.0, "2024-01-01T10:00:00Z"));
    eventually(|| surface.markers().len() == 1).await;

    broker.refuse_connections(true);
    broker.drop_connections();
    assert!(handle.wait_for(ConnectionState::Failed).await);
    eventually(|| surface.signals().last() == Some(&Signal::NoSignal)).await;

    assert_eq!(surface.markers(), vec![(-8.1, -79.0)]);
    assert!(view.last_position().is_some());
}

// Should close the previous trip before showing another.
#[tokio::test]
async fn switch_trip() {
    let broker = Broker::default();
    let surface = Arc::new(MockSurface::default());
    let mut view = view(&broker, &surface);

    let mut handle = view.open("T1").expect("should open");
    assert!(handle.wait_for(ConnectionState::Connected).await);

    let mut handle = view.open("T2").expect("should open");
    assert!(handle.wait_for(ConnectionState::Connected).await);
    eventually(|| broker.open_connections() == 1).await;
    assert_eq!(view.trip_id().map(ToString::to_string), Some("T2".to_string()));

    assert_eq!(broker.publish("T1", position(1.0, 1.0, "2024-01-01T09:00:00Z")), 0);
    broker.publish("T2", position(2.0, 2.0, "2024-01-01T11:30:15Z"));
    eventually(|| surface.markers().len() == 1).await;

    assert_eq!(surface.markers(), vec![(2.0, 2.0)]);
    assert_eq!(surface.labels(), vec!["11:30:15"]);
}

// Should stay closed when no trip id is available yet.
#[tokio::test]
async fn open_without_trip() {
    let broker = Broker::default();
    let surface = Arc::new(MockSurface::default());
    let mut view = view(&broker, &surface);

    assert!(view.open(None).is_none());
    assert!(view.open("").is_none());
    settle().await;

    assert_eq!(broker.attempts(), 0);
    assert_eq!(view.state(), ConnectionState::Disconnected);
    assert!(view.trip_id().is_none());
}

// Should show no signal as soon as the connection drops and live again once rejoined.
#[tokio::test]
async fn drop_shows_no_signal() {
    let broker = Broker::default();
    let surface = Arc::new(MockSurface::default());
    let mut config = config();
    config.reconnect.delay = Duration::from_millis(200);
    config.reconnect.max_delay = Duration::from_millis(200);
    let subscriber = Subscriber::new(broker.transport(), &config);
    let mut view = TripView::new(subscriber, Arc::clone(&surface), Tz::UTC);

    let mut handle = view.open("T1").expect("should open");
    assert!(handle.wait_for(ConnectionState::Connected).await);
    eventually(|| surface.signals() == vec![Signal::Live]).await;

    broker.drop_connections();
    eventually(|| surface.signals() == vec![Signal::Live, Signal::NoSignal]).await;
    assert_eq!(view.state(), ConnectionState::Disconnected);

    eventually(|| surface.signals() == vec![Signal::Live, Signal::NoSignal, Signal::Live]).await;
    assert_eq!(broker.joins(), vec!["T1", "T1"]);
}
