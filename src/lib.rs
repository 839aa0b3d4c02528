//! # Fleet Console
//!
//! Host wiring for the console: the environment-backed provider handed to the
//! REST client and the session store the live tracker authenticates with.

mod config;
mod provider;
mod session;
mod surface;

pub use self::provider::Provider;
pub use self::session::{Profile, Session};
pub use self::surface::ConsoleSurface;
