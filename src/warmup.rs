//! Warm-up validation: prime each warm query, then poll the warming
//! service's JMX counters until the cluster stops making progress.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::node::NodeConnection;
use crate::query::QueryClient;
use crate::rest::VaradaRest;
use crate::ssh::ConnectOptions;

/// Session property that turns a warm query into a cheap no-result probe.
pub const EMPTY_QUERY_PROPERTY: &str = "varada.empty_query";

/// Aggregated warming-service counters, one row of six sums.
pub const COUNTERS_QUERY: &str = "select sum(warm_scheduled) as warm_scheduled, \
     sum(warm_started) as warm_started, \
     sum(warm_finished) as warm_finished, \
     sum(warm_failed) as warm_failed, \
     sum(warm_skipped_due_queue_size) as warm_skipped_due_queue_size, \
     sum(warm_skipped_due_demoter) as warm_skipped_due_demoter \
     from jmx.current.\"io.varada.presto:type=VaradaStatsWarmingService,name=warming-service.varada\"";

/// Snapshot of the warming-service counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupCounters {
    pub scheduled: i64,
    pub started: i64,
    pub finished: i64,
    pub failed: i64,
    pub skipped_queue_size: i64,
    pub skipped_demoter: i64,
}

impl WarmupCounters {
    /// Parse the single row returned by [`COUNTERS_QUERY`]; the six sums
    /// arrive in a fixed column order. Sums over an empty JMX table come
    /// back as nulls and count as zero.
    pub fn from_row(row: &[Value]) -> Result<Self> {
        if row.len() < 6 {
            return Err(Error::Protocol(format!(
                "expected 6 warm-up counters, got {}",
                row.len()
            )));
        }
        let field = |idx: usize| row[idx].as_i64().unwrap_or(0);
        Ok(Self {
            scheduled: field(0),
            started: field(1),
            finished: field(2),
            failed: field(3),
            skipped_queue_size: field(4),
            skipped_demoter: field(5),
        })
    }

    /// Steady-state invariant: everything scheduled has either finished,
    /// failed, or been skipped by the demoter. Queue-size skips are
    /// re-scheduled by the service and therefore not subtracted.
    pub fn is_settled(&self) -> bool {
        self.scheduled - self.failed - self.skipped_demoter == self.finished
    }
}

/// The two endpoints the validation loop talks to: the statement protocol
/// for priming and counter polling, and the accelerator REST API for the
/// after-the-fact row-group report.
#[async_trait]
pub trait WarmupProbe: Send {
    /// Issue the warm query with the empty-query property set.
    async fn prime(&mut self, query: &str) -> Result<()>;

    /// Fetch a fresh counter snapshot. Failures here are fatal to the run.
    async fn counters(&mut self) -> Result<WarmupCounters>;

    /// Row-group status report; best-effort only.
    async fn row_groups(&mut self) -> Result<Value>;
}

/// Warm-up validation state machine. Queries are validated one at a time,
/// in order; intervals are fields so tests can run without real delays.
#[derive(Debug, Clone)]
pub struct Validator {
    /// Delay between counter polls while warming is in progress.
    pub progress_interval: Duration,
    /// Delay between the two snapshots of the steady check.
    pub settle_interval: Duration,
    /// Grace period after the first priming of each query.
    pub prime_delay: Duration,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            progress_interval: Duration::from_secs(60),
            settle_interval: Duration::from_secs(15),
            prime_delay: Duration::from_secs(3),
        }
    }
}

impl Validator {
    pub async fn run(&self, probe: &mut dyn WarmupProbe, queries: &[String]) -> Result<()> {
        for query in queries {
            self.validate_query(probe, query).await?;

            match probe.row_groups().await {
                Ok(report) => {
                    tracing::info!("row-group count after warm query:\n{query}");
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&report).unwrap_or_default()
                    );
                }
                Err(e) => {
                    tracing::error!("row-group-count call failed: {e}");
                }
            }
        }
        tracing::info!("warm-up complete");
        Ok(())
    }

    async fn validate_query(&self, probe: &mut dyn WarmupProbe, query: &str) -> Result<()> {
        probe.prime(query).await?;
        tokio::time::sleep(self.prime_delay).await;

        loop {
            while !probe.counters().await?.is_settled() {
                tracing::info!(
                    "warm-up in progress, checking again in {}s",
                    self.progress_interval.as_secs()
                );
                tokio::time::sleep(self.progress_interval).await;
            }

            tracing::info!("warm-up iteration complete, verifying no additional warm-up needed");
            probe.prime(query).await?;
            let before = probe.counters().await?;
            tokio::time::sleep(self.settle_interval).await;
            let after = probe.counters().await?;

            if after.is_settled() && after.started == before.started {
                tracing::info!("warm-up settled, moving to next warm query");
                return Ok(());
            }
            tracing::info!("additional warm-up iteration in progress");
        }
    }
}

/// Production probe: a statement-protocol session plus an accelerator REST
/// session against the same node, reused sequentially across the loop.
pub struct EngineProbe {
    query_client: QueryClient,
    varada: VaradaRest,
}

impl EngineProbe {
    pub async fn open(
        node: &NodeConnection,
        user: Option<&str>,
        options: &ConnectOptions,
    ) -> Result<Self> {
        let query_client = QueryClient::open(node, user, BTreeMap::new(), options).await?;
        let varada = match VaradaRest::open(node, options).await {
            Ok(varada) => varada,
            Err(e) => {
                query_client.close().await;
                return Err(e);
            }
        };
        Ok(Self {
            query_client,
            varada,
        })
    }

    pub async fn close(self) {
        self.varada.close().await;
        self.query_client.close().await;
    }
}

#[async_trait]
impl WarmupProbe for EngineProbe {
    async fn prime(&mut self, query: &str) -> Result<()> {
        self.query_client
            .set_session(EMPTY_QUERY_PROPERTY, "true")
            .await?;
        self.query_client.execute(query, true).await?;
        self.query_client.reset_session(EMPTY_QUERY_PROPERTY).await
    }

    async fn counters(&mut self) -> Result<WarmupCounters> {
        let outcome = self.query_client.execute(COUNTERS_QUERY, true).await?;
        let row = outcome
            .rows
            .last()
            .ok_or_else(|| Error::Protocol("warm-up counters query returned no rows".into()))?;
        let counters = WarmupCounters::from_row(row)?;
        tracing::info!("warm status: {counters:?}");
        Ok(counters)
    }

    async fn row_groups(&mut self) -> Result<Value> {
        self.varada.row_group_count().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settled_when_finished_accounts_for_skips() {
        let counters = WarmupCounters {
            scheduled: 10,
            started: 10,
            finished: 8,
            failed: 1,
            skipped_queue_size: 0,
            skipped_demoter: 1,
        };
        assert!(counters.is_settled());
    }

    #[test]
    fn not_settled_while_work_remains() {
        let counters = WarmupCounters {
            scheduled: 10,
            started: 9,
            finished: 8,
            failed: 0,
            skipped_queue_size: 0,
            skipped_demoter: 0,
        };
        assert!(!counters.is_settled());
    }

    #[test]
    fn queue_size_skips_do_not_count_as_done() {
        let counters = WarmupCounters {
            scheduled: 10,
            started: 10,
            finished: 8,
            failed: 0,
            skipped_queue_size: 2,
            skipped_demoter: 0,
        };
        assert!(!counters.is_settled());
    }

    #[test]
    fn parses_counter_row() {
        let row = vec![json!(10), json!(9), json!(8), json!(1), json!(0), json!(1)];
        let counters = WarmupCounters::from_row(&row).unwrap();
        assert_eq!(counters.scheduled, 10);
        assert_eq!(counters.skipped_demoter, 1);
    }

    #[test]
    fn null_sums_count_as_zero() {
        let row = vec![
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
            Value::Null,
        ];
        let counters = WarmupCounters::from_row(&row).unwrap();
        assert!(counters.is_settled());
    }

    #[test]
    fn short_row_is_rejected() {
        let row = vec![json!(1), json!(2)];
        assert!(matches!(
            WarmupCounters::from_row(&row),
            Err(Error::Protocol(_))
        ));
    }
}
