//! # Fleet Core
//!
//! Core modules shared by the fleet console crates.

mod error;
mod provider;

pub use crate::error::*;
pub use crate::provider::*;
