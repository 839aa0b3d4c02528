//! # Provider
//!
//! Provider defines external data interfaces for the crate.

use fleet_core::{Config, HttpRequest, Identity};

/// Provider entry point implemented by the host application.
pub trait Provider: HttpRequest + Config + Identity {}
