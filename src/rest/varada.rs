//! Acceleration-layer REST endpoints (`v1/ext/varada`): warm-up rules,
//! row-group counters, debug log markers.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::Result;
use crate::node::NodeConnection;
use crate::ssh::ConnectOptions;
use crate::transport::Transport;

use super::client::RestSession;

const BASE: &str = "v1/ext/varada";

pub struct VaradaRest {
    rest: RestSession,
}

impl VaradaRest {
    pub async fn open(node: &NodeConnection, options: &ConnectOptions) -> Result<Self> {
        let rest = RestSession::open(node, node.varada_port, options).await?;
        Ok(Self { rest })
    }

    pub async fn row_group_count(&self) -> Result<Value> {
        self.rest
            .post(
                &format!("{BASE}/row-group-count"),
                Some(&json!({"commandName": "all"})),
                &[],
            )
            .await
    }

    pub async fn warmup_rule_get(&self) -> Result<Value> {
        self.rest
            .post(&format!("{BASE}/warmup-rule-get"), None, &[])
            .await
    }

    pub async fn warmup_rule_set(&self, rule: &Value) -> Result<Value> {
        let mut rule = rule.clone();
        // The endpoint rejects null predicates; an absent set means "none".
        if let Some(object) = rule.as_object_mut() {
            let predicates = object.entry("predicates").or_insert(Value::Null);
            if predicates.is_null() {
                *predicates = json!([]);
            }
        }
        self.rest
            .post(&format!("{BASE}/warmup-rule-set"), Some(&json!([rule])), &[])
            .await
    }

    pub async fn warmup_rule_delete(&self, rule_id: i64) -> Result<Value> {
        self.rest
            .post(
                &format!("{BASE}/warmup-rule-delete"),
                Some(&json!([rule_id])),
                &[],
            )
            .await
    }

    /// Write a marker line into the node's debug log.
    pub async fn debug_log(&self, message: &str) -> Result<()> {
        self.rest
            .post(
                &format!("{BASE}/debug-log"),
                Some(&json!({"logLine": message})),
                &[],
            )
            .await?;
        Ok(())
    }

    pub fn host(&self) -> &str {
        self.rest.host()
    }

    pub async fn close(self) {
        self.rest.close().await;
    }
}

#[derive(Clone)]
pub struct VaradaTransport {
    options: ConnectOptions,
}

impl VaradaTransport {
    pub fn new(options: ConnectOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Transport for VaradaTransport {
    type Session = VaradaRest;

    async fn open(&self, node: &NodeConnection) -> Result<VaradaRest> {
        VaradaRest::open(node, &self.options).await
    }

    async fn close(&self, session: VaradaRest) {
        session.close().await;
    }
}
