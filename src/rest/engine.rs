//! Engine `v1` REST endpoints: node info, thread dumps, query metadata.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::node::NodeConnection;
use crate::ssh::ConnectOptions;
use crate::transport::Transport;

use super::client::RestSession;

/// User the management calls identify as.
const SERVICE_USER: &str = "varada";

pub struct EngineRest {
    rest: RestSession,
    user_header: &'static str,
}

impl EngineRest {
    pub async fn open(node: &NodeConnection, options: &ConnectOptions) -> Result<Self> {
        let rest = RestSession::open(node, node.api_port, options).await?;
        Ok(Self {
            rest,
            user_header: node.brand.user_header(),
        })
    }

    fn headers(&self) -> [(&str, &str); 1] {
        [(self.user_header, SERVICE_USER)]
    }

    pub async fn info(&self) -> Result<Value> {
        self.rest.get("v1/info", &self.headers()).await
    }

    /// Full thread stack dump of the engine JVM.
    pub async fn thread_dump(&self) -> Result<Value> {
        self.rest.get("v1/thread", &self.headers()).await
    }

    pub async fn query_json(&self, query_id: &str) -> Result<Value> {
        self.rest
            .get(&format!("v1/query/{query_id}?pretty"), &self.headers())
            .await
    }

    pub fn host(&self) -> &str {
        self.rest.host()
    }

    pub async fn close(self) {
        self.rest.close().await;
    }
}

#[derive(Clone)]
pub struct EngineTransport {
    options: ConnectOptions,
}

impl EngineTransport {
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Transport for EngineTransport {
    type Session = EngineRest;

    async fn open(&self, node: &NodeConnection) -> Result<EngineRest> {
        EngineRest::open(node, &self.options).await
    }

    async fn close(&self, session: EngineRest) {
        session.close().await;
    }
}
