//! # Transport
//!
//! Transport defines the real-time channel the subscriber connects through.
//! The host application supplies the implementation; [`crate::socket`] holds
//! the Socket.IO one.

use anyhow::Result;
use serde_json::Value;

use crate::position::TripId;

/// Frames received from an open connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A position payload pushed to a joined room.
    Update(Value),

    /// A transport error that did not close the connection.
    Error(String),

    /// The connection was dropped by the peer or the network.
    Closed(String),
}

/// The `Transport` trait opens connections to the real-time server.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;

    /// Open a connection and complete the handshake.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection>> + Send;
}

/// An open duplex connection.
pub trait Connection: Send + 'static {
    /// Announce membership of the trip's room.
    fn join(&mut self, trip_id: &TripId) -> impl Future<Output = Result<()>> + Send;

    /// Leave the trip's room.
    fn leave(&mut self, trip_id: &TripId) -> impl Future<Output = Result<()>> + Send;

    /// Next inbound frame. `None` once the connection is gone.
    ///
    /// Must be cancel safe: it is raced against cancellation and commands.
    fn recv(&mut self) -> impl Future<Output = Option<Frame>> + Send;

    /// Close the connection.
    fn close(self) -> impl Future<Output = Result<()>> + Send;
}
