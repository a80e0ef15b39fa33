//! Raw REST session against one node, bastion-aware.

use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::node::NodeConnection;
use crate::ssh::{ConnectOptions, TcpRelay};

const HTTP_TIMEOUT_SECS: u64 = 30;

pub struct RestSession {
    http: reqwest::Client,
    base_url: String,
    host: String,
    relay: Option<TcpRelay>,
}

impl RestSession {
    /// Open an HTTP session to `node` on the given port. When the node is
    /// behind a bastion, a local TCP relay is started first and the session
    /// points at it.
    pub async fn open(node: &NodeConnection, port: u16, options: &ConnectOptions) -> Result<Self> {
        let (base_url, relay) = match &node.bastion {
            None => (format!("http://{}:{port}", node.hostname), None),
            Some(bastion) => {
                let relay = TcpRelay::open(bastion, options, &node.hostname, port)
                    .await
                    .map_err(|e| Error::connection(&node.hostname, e))?;
                (format!("http://{}", relay.local_addr()), Some(relay))
            }
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::connection(&node.hostname, e))?;

        Ok(Self {
            http,
            base_url,
            host: node.hostname.clone(),
            relay,
        })
    }

    pub async fn get(&self, path: &str, headers: &[(&str, &str)]) -> Result<Value> {
        let url = format!("{}/{path}", self.base_url);
        tracing::debug!("GET {url}");
        let mut request = self.http.get(&url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::connection(&self.host, e))?;
        Self::check(url, response).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: Option<&Value>,
        headers: &[(&str, &str)],
    ) -> Result<Value> {
        let url = format!("{}/{path}", self.base_url);
        tracing::debug!("POST {url} {body:?}");
        let mut request = self.http.post(&url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::connection(&self.host, e))?;
        Self::check(url, response).await
    }

    /// Accept exactly 200; anything else, including other 2xx codes, is an
    /// `Http` error. Empty bodies parse as `Null`.
    async fn check(url: String, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Http {
                status: status.as_u16(),
                url,
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Protocol(format!("failed to read body of {url}: {e}")))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Protocol(format!("malformed JSON from {url}: {e}")))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn close(self) {
        // Drop the HTTP client before the relay so no request can race the
        // listener teardown.
        drop(self.http);
        if let Some(relay) = self.relay {
            relay.close().await;
        }
    }
}
