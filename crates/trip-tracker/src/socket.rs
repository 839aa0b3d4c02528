//! # Socket.IO transport
//!
//! [`Transport`] implementation for a Socket.IO server that groups clients in
//! rooms keyed by trip id.

use anyhow::{Context, Result};
use futures::FutureExt;
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::{Event, Payload, TransportType};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::{Config, Events};
use crate::position::TripId;
use crate::transport::{Connection, Frame, Transport};

/// Opens websocket connections to the Socket.IO server.
#[derive(Debug, Clone)]
pub struct SocketTransport {
    url: String,
    namespace: String,
    events: Events,
    credential: Option<String>,
}

impl SocketTransport {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            url: config.url.clone(),
            namespace: config.namespace.clone(),
            events: config.events.clone(),
            credential: None,
        }
    }

    /// Bearer credential sent in the handshake `auth` payload.
    #[must_use]
    pub fn credential(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(token.into());
        self
    }
}

impl Transport for SocketTransport {
    type Connection = SocketConnection;

    async fn connect(&self) -> Result<SocketConnection> {
        let (tx, frames) = mpsc::unbounded_channel();

        let updates = tx.clone();
        let errors = tx.clone();
        let closed = tx;

        let mut builder = ClientBuilder::new(self.url.as_str())
            .namespace(self.namespace.as_str())
            .transport_type(TransportType::Websocket)
            // the subscriber owns reconnection
            .reconnect(false)
            .on(self.events.update.as_str(), move |payload: Payload, _: Client| {
                let updates = updates.clone();
                async move {
                    if let Some(value) = first_value(payload) {
                        let _ = updates.send(Frame::Update(value));
                    }
                }
                .boxed()
            })
            .on(Event::Error, move |payload: Payload, _: Client| {
                let errors = errors.clone();
                async move {
                    let _ = errors.send(Frame::Error(describe(payload)));
                }
                .boxed()
            })
            .on(Event::Close, move |_: Payload, _: Client| {
                let closed = closed.clone();
                async move {
                    let _ = closed.send(Frame::Closed("server closed the connection".to_string()));
                }
                .boxed()
            });

        if let Some(token) = &self.credential {
            builder = builder.auth(json!({ "token": token }));
        }

        let client = builder
            .connect()
            .await
            .with_context(|| format!("connecting to realtime server at {}", self.url))?;
        debug!(url = %self.url, "socket connected");

        Ok(SocketConnection { client, frames, events: self.events.clone() })
    }
}

/// An open Socket.IO connection.
pub struct SocketConnection {
    client: Client,
    frames: mpsc::UnboundedReceiver<Frame>,
    events: Events,
}

impl Connection for SocketConnection {
    async fn join(&mut self, trip_id: &TripId) -> Result<()> {
        self.client
            .emit(self.events.join.as_str(), json!({ "tripId": trip_id.as_str() }))
            .await
            .with_context(|| format!("joining room for trip {trip_id}"))
    }

    async fn leave(&mut self, trip_id: &TripId) -> Result<()> {
        self.client
            .emit(self.events.leave.as_str(), json!({ "tripId": trip_id.as_str() }))
            .await
            .with_context(|| format!("leaving room for trip {trip_id}"))
    }

    async fn recv(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }

    async fn close(self) -> Result<()> {
        self.client.disconnect().await.context("disconnecting from realtime server")
    }
}

// Servers emit a single object per update.
fn first_value(payload: Payload) -> Option<Value> {
    match payload {
        Payload::Text(values) => values.into_iter().next(),
        Payload::Binary(bytes) => serde_json::from_slice(&bytes).ok(),
        _ => None,
    }
}

fn describe(payload: Payload) -> String {
    match payload {
        Payload::Text(values) => values
            .iter()
            .map(|value| value.as_str().map_or_else(|| value.to_string(), ToString::to_string))
            .collect::<Vec<_>>()
            .join(", "),
        Payload::Binary(bytes) => format!("{} bytes of binary error data", bytes.len()),
        _ => "unknown transport error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_payload() {
        let payload = Payload::Text(vec![
            json!({ "latitude": -8.1, "longitude": -79.0, "timestamp": "2024-01-01T10:00:00Z" }),
            json!("ignored"),
        ]);
        let value = first_value(payload).expect("should have a value");
        assert_eq!(value["latitude"], json!(-8.1));
    }

    #[test]
    fn binary_payload() {
        let bytes = br#"{"latitude":1.0,"longitude":2.0,"timestamp":"t"}"#.to_vec();
        let value = first_value(Payload::Binary(bytes.into())).expect("should decode");
        assert_eq!(value["longitude"], json!(2.0));
    }

    #[test]
    fn error_description() {
        let payload = Payload::Text(vec![json!("websocket closed"), json!({ "code": 1006 })]);
        assert_eq!(describe(payload), r#"websocket closed, {"code":1006}"#);
    }
}
