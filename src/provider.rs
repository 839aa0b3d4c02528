use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use fleet_core::{Config, HttpRequest, Identity};
use http::{Request, Response};

use crate::config;
use crate::session::Session;

/// Host-side implementation of the crates' provider traits.
#[derive(Debug, Clone)]
pub struct Provider {
    client: reqwest::Client,
    session: Session,
}

impl Provider {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self { client: reqwest::Client::new(), session }
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }
}

impl fleet_api::provider::Provider for Provider {}

impl HttpRequest for Provider {
    async fn fetch(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let (parts, body) = request.into_parts();
        tracing::debug!(method = %parts.method, uri = %parts.uri, "outbound request");

        let response = self
            .client
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .send()
            .await
            .context("sending request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.context("reading response body")?;

        let mut builder = Response::builder().status(status);
        if let Some(map) = builder.headers_mut() {
            map.extend(headers);
        }
        builder.body(body).context("failed to build response")
    }
}

impl Config for Provider {
    async fn get(&self, key: &str) -> Result<String> {
        match key {
            "FLEET_API_URL" => Ok(config::get_fleet_api_url()),
            _ => std::env::var(key).map_err(|_| anyhow!("{key} not set")),
        }
    }
}

impl Identity for Provider {
    async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.session.token().map(ToString::to_string))
    }
}
