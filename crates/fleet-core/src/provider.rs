//! # Provider
//!
//! Provider defines external data interfaces for the crate.

use anyhow::Result;
use bytes::Bytes;
use http::{Request, Response};

/// The `HttpRequest` trait defines the behavior for calling the backend's REST
/// endpoints.
pub trait HttpRequest: Send + Sync {
    /// Make outbound HTTP request.
    fn fetch(&self, request: Request<Bytes>) -> impl Future<Output = Result<Response<Bytes>>> + Send;
}

/// The `Config` trait is used by implementers to provide configuration to
/// dependent crates.
pub trait Config: Send + Sync {
    /// Request configuration setting.
    fn get(&self, key: &str) -> impl Future<Output = Result<String>> + Send;
}

/// The `Identity` trait gives read access to the session store holding the
/// signed-in administrator's credential.
pub trait Identity: Send + Sync {
    /// Bearer credential for the current session, if one is held.
    fn access_token(&self) -> impl Future<Output = Result<Option<String>>> + Send;
}
