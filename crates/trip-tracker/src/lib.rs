//! # Trip Tracker
//!
//! Subscribes to live position updates for a single trip and surfaces them to
//! a display.
//!
//! A [`Subscriber`] owns at most one connection to the real-time transport.
//! Calling [`Subscriber::subscribe`] joins the trip's channel, and every
//! [`PositionUpdate`] pushed to that channel is handed, in arrival order, to
//! the handlers registered with [`Subscriber::on_position_update`].
//! [`Subscriber::unsubscribe`] tears the connection down and clears the
//! handlers.
//!
//! Connection drops are retried with a bounded back-off. Once retries are
//! exhausted the subscription settles in [`ConnectionState::Failed`] and a
//! [`Lifecycle::ReconnectFailed`] signal is published.

pub mod config;
pub mod socket;
pub mod transport;
pub mod view;

mod listeners;
mod position;
mod state;
mod subscriber;

pub use self::config::Config;
pub use self::listeners::ListenerId;
pub use self::position::{PositionUpdate, TripId};
pub use self::state::{ConnectionState, Lifecycle, ReconnectPolicy};
pub use self::subscriber::{Subscriber, SubscriptionHandle};
pub use self::transport::{Connection, Frame, Transport};
