//! # Fleet API
//!
//! Request/response client for the fleet backend's REST endpoints. Records
//! are opaque JSON: validation and the data model belong to the backend.

mod client;
mod resource;

pub mod provider;

pub use self::client::Client;
pub use self::resource::{IncidentStatus, Resource};
