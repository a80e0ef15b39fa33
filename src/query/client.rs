//! Client for the engine's HTTP statement protocol.
//!
//! A statement is POSTed to `/v1/statement`; the server answers with a JSON
//! document carrying result pages and a `nextUri` to poll until the query
//! reaches a terminal state. Session properties ride along as a request
//! header, and `SET`/`RESET SESSION` control statements keep the server and
//! the local property map in step.

use reqwest::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::node::{Brand, NodeConnection};
use crate::ssh::{ConnectOptions, TcpRelay};

const HTTP_TIMEOUT_SECS: u64 = 60;

/// Rows plus the final stats object reported by the engine.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query_id: Option<String>,
    pub rows: Vec<Vec<Value>>,
    pub stats: Value,
}

pub struct QueryClient {
    http: reqwest::Client,
    base_url: String,
    host: String,
    user: String,
    brand: Brand,
    session_properties: BTreeMap<String, String>,
    relay: Option<TcpRelay>,
}

impl QueryClient {
    /// Open a statement-protocol session against `node`'s engine API port.
    pub async fn open(
        node: &NodeConnection,
        user: Option<&str>,
        session_properties: BTreeMap<String, String>,
        options: &ConnectOptions,
    ) -> Result<Self> {
        let (base_url, relay) = match &node.bastion {
            None => (format!("http://{}:{}", node.hostname, node.api_port), None),
            Some(bastion) => {
                let relay = TcpRelay::open(bastion, options, &node.hostname, node.api_port)
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
            user: user.unwrap_or(&node.username).to_string(),
            brand: node.brand,
            session_properties,
            relay,
        })
    }

    fn session_header_value(&self) -> Option<String> {
        if self.session_properties.is_empty() {
            return None;
        }
        Some(
            self.session_properties
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    /// Execute a statement. With `fetch_all` the full result set is
    /// accumulated across pages; otherwise polling stops at the first page
    /// that carries data and the rest of the query is abandoned.
    pub async fn execute(&self, sql: &str, fetch_all: bool) -> Result<QueryOutcome> {
        tracing::debug!("executing: {sql}");

        let url = format!("{}/v1/statement", self.base_url);
        let mut request = self
            .http
            .post(&url)
            .header(self.brand.user_header(), &self.user)
            .body(sql.to_string());
        if let Some(session) = self.session_header_value() {
            request = request.header(self.brand.session_header(), session);
        }

        let mut payload = self.fetch(request, &url).await.inspect_err(|_| {
            tracing::error!("failed to execute query: {sql}");
        })?;

        let query_id = payload
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let mut rows: Vec<Vec<Value>> = Vec::new();
        let mut stats = Value::Null;

        loop {
            if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown engine error");
                tracing::error!("failed to execute query: {sql}");
                return Err(Error::Protocol(message.to_string()));
            }

            if let Some(data) = payload.get("data").and_then(Value::as_array) {
                rows.extend(
                    data.iter()
                        .map(|row| row.as_array().cloned().unwrap_or_default()),
                );
            }
            if let Some(s) = payload.get("stats") {
                stats = s.clone();
            }

            let next = payload
                .get("nextUri")
                .and_then(Value::as_str)
                .map(str::to_string);
            let Some(next) = next else { break };

            if !fetch_all && !rows.is_empty() {
                // Abandon the rest of the result set.
                let _ = self
                    .http
                    .delete(&next)
                    .header(self.brand.user_header(), &self.user)
                    .send()
                    .await;
                break;
            }

            let request = self
                .http
                .get(&next)
                .header(self.brand.user_header(), &self.user);
            payload = self.fetch(request, &next).await?;
        }

        Ok(QueryOutcome {
            query_id,
            rows,
            stats,
        })
    }

    async fn fetch(&self, request: reqwest::RequestBuilder, url: &str) -> Result<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::connection(&self.host, e))?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| Error::Protocol(format!("malformed statement response from {url}: {e}")))
    }

    /// Issue `SET SESSION` and remember the property for later statements.
    pub async fn set_session(&mut self, key: &str, value: &str) -> Result<()> {
        self.execute(&format!("SET SESSION {key}={value}"), true)
            .await?;
        self.session_properties
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Issue `RESET SESSION` and forget the property.
    pub async fn reset_session(&mut self, key: &str) -> Result<()> {
        self.execute(&format!("RESET SESSION {key}"), true).await?;
        self.session_properties.remove(key);
        Ok(())
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn close(self) {
        drop(self.http);
        if let Some(relay) = self.relay {
            relay.close().await;
        }
    }
}
