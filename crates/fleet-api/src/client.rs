//! Backend REST calls.
//!
//! Every request carries the session's bearer credential. A missing credential
//! fails with [`Error::Unauthorized`] before anything is sent.

use anyhow::Context;
use bytes::Bytes;
use fleet_core::{Config, Error, HttpRequest, Identity, Result, bad_gateway, bad_request};
use fleet_core::{not_found, unauthorized};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{Method, Request, StatusCode};
use serde_json::{Value, json};

use crate::provider::Provider;
use crate::resource::{IncidentStatus, Resource};

/// Client for the fleet backend's record collections.
#[derive(Debug)]
pub struct Client<'a, P: Provider> {
    provider: &'a P,
}

impl<'a, P: Provider> Client<'a, P> {
    #[must_use]
    pub const fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Create a record, returning the backend's copy.
    ///
    /// # Errors
    ///
    /// Returns an error when no credential is held or the backend rejects the
    /// request.
    pub async fn create(&self, resource: Resource, record: &Value) -> Result<Value> {
        let path = format!("/api/{resource}");
        self.send(Method::POST, &path, Some(record)).await
    }

    /// List records matching the query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error when no credential is held or the backend rejects the
    /// request.
    pub async fn search(&self, resource: Resource, query: &[(&str, &str)]) -> Result<Value> {
        let path = format!("/api/{resource}{}", query_string(query));
        self.send(Method::GET, &path, None).await
    }

    /// Fetch a single record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] when the record does not exist.
    pub async fn get(&self, resource: Resource, id: &str) -> Result<Value> {
        let path = record_path(resource, id)?;
        self.send(Method::GET, &path, None).await
    }

    /// Replace a record.
    ///
    /// # Errors
    ///
    /// Returns an error when no credential is held or the backend rejects the
    /// request.
    pub async fn update(&self, resource: Resource, id: &str, record: &Value) -> Result<Value> {
        let path = record_path(resource, id)?;
        self.send(Method::PUT, &path, Some(record)).await
    }

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns an error when no credential is held or the backend rejects the
    /// request.
    pub async fn delete(&self, resource: Resource, id: &str) -> Result<()> {
        let path = record_path(resource, id)?;
        self.send(Method::DELETE, &path, None).await?;
        Ok(())
    }

    /// List incidents, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns an error when no credential is held or the backend rejects the
    /// request.
    pub async fn incidents(&self, status: Option<IncidentStatus>) -> Result<Value> {
        let query = status.map(|s| vec![("status", s.as_str())]).unwrap_or_default();
        self.search(Resource::Incidents, &query).await
    }

    /// Move an incident to a new status.
    ///
    /// # Errors
    ///
    /// Returns an error when no credential is held or the backend rejects the
    /// transition.
    pub async fn transition_incident(&self, id: &str, status: IncidentStatus) -> Result<Value> {
        let path = format!("{}/status", record_path(Resource::Incidents, id)?);
        self.send(Method::PATCH, &path, Some(&json!({ "status": status }))).await
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let Some(token) = Identity::access_token(self.provider).await? else {
            return Err(unauthorized!("no credential held by the session store"));
        };
        let url = Config::get(self.provider, "FLEET_API_URL")
            .await
            .context("getting `FLEET_API_URL`")?;

        let body = body.map(serde_json::to_vec).transpose()?.map(Bytes::from).unwrap_or_default();
        let request = Request::builder()
            .method(method.clone())
            .uri(format!("{}{path}", url.trim_end_matches('/')))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .context("building fleet api request")?;

        let response = HttpRequest::fetch(self.provider, request)
            .await
            .map_err(|e| bad_gateway!("{method} {path}: {e:#}"))?;
        let status = response.status();
        let bytes = response.into_body();

        if !status.is_success() {
            tracing::warn!(monotonic_counter.api_errors = 1, %method, path, status = status.as_u16());
            return Err(status_error(status, &bytes));
        }
        tracing::debug!(%method, path, status = status.as_u16(), "fleet api call");

        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).context("deserializing fleet api response").map_err(Into::into)
    }
}

fn record_path(resource: Resource, id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(bad_request!("missing {resource} id"));
    }
    Ok(format!("/api/{resource}/{}", urlencoding::encode(id)))
}

fn query_string(query: &[(&str, &str)]) -> String {
    if query.is_empty() {
        return String::new();
    }
    let pairs = query
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>();
    format!("?{}", pairs.join("&"))
}

// Prefer the backend's `message` field when the error body carries one.
fn status_error(status: StatusCode, body: &[u8]) -> Error {
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(ToString::to_string))
        .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned());
    let message = if message.is_empty() { status.to_string() } else { message };

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => bad_request!("{message}"),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => unauthorized!("{message}"),
        StatusCode::NOT_FOUND => not_found!("{message}"),
        _ => bad_gateway!("{status}: {message}"),
    }
}
