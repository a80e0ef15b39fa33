//! Warm-up validation loop behavior against a scripted probe.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::time::Duration;

use trinoctl::error::{Error, Result};
use trinoctl::warmup::{Validator, WarmupCounters, WarmupProbe};

fn counters(scheduled: i64, started: i64, finished: i64) -> WarmupCounters {
    WarmupCounters {
        scheduled,
        started,
        finished,
        failed: 0,
        skipped_queue_size: 0,
        skipped_demoter: 0,
    }
}

/// Probe that replays a fixed counter sequence and records priming.
struct ScriptedProbe {
    snapshots: VecDeque<Result<WarmupCounters>>,
    primed: Vec<String>,
    row_group_report: Result<Value>,
    row_group_calls: usize,
}

impl ScriptedProbe {
    fn new(snapshots: Vec<Result<WarmupCounters>>) -> Self {
        Self {
            snapshots: snapshots.into(),
            primed: Vec::new(),
            row_group_report: Ok(json!({"rowGroups": 42})),
            row_group_calls: 0,
        }
    }
}

#[async_trait]
impl WarmupProbe for ScriptedProbe {
    async fn prime(&mut self, query: &str) -> Result<()> {
        self.primed.push(query.to_string());
        Ok(())
    }

    async fn counters(&mut self) -> Result<WarmupCounters> {
        self.snapshots
            .pop_front()
            .unwrap_or_else(|| Err(Error::Protocol("scripted probe ran out of snapshots".into())))
    }

    async fn row_groups(&mut self) -> Result<Value> {
        self.row_group_calls += 1;
        match &self.row_group_report {
            Ok(report) => Ok(report.clone()),
            Err(_) => Err(Error::Http {
                status: 500,
                url: "row-group-count".into(),
            }),
        }
    }
}

fn fast_validator() -> Validator {
    Validator {
        progress_interval: Duration::ZERO,
        settle_interval: Duration::ZERO,
        prime_delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn settles_when_counters_hold_steady() {
    // One progress poll, then two identical settle snapshots.
    let mut probe = ScriptedProbe::new(vec![
        Ok(counters(10, 10, 10)),
        Ok(counters(10, 10, 10)),
        Ok(counters(10, 10, 10)),
    ]);

    fast_validator()
        .run(&mut probe, &["select * from t".to_string()])
        .await
        .unwrap();

    // Primed once up front and once for the steady check.
    assert_eq!(probe.primed.len(), 2);
    assert_eq!(probe.row_group_calls, 1);
}

#[tokio::test]
async fn polls_while_warming_is_in_progress() {
    // scheduled != finished keeps the loop in the progress state.
    let mut probe = ScriptedProbe::new(vec![
        Ok(counters(10, 8, 6)),
        Ok(counters(10, 9, 8)),
        Ok(counters(10, 10, 10)),
        Ok(counters(10, 10, 10)),
        Ok(counters(10, 10, 10)),
    ]);

    fast_validator()
        .run(&mut probe, &["q".to_string()])
        .await
        .unwrap();

    assert_eq!(probe.primed.len(), 2);
    // All five snapshots were consumed on the way to steady state.
    assert!(probe.snapshots.is_empty());
}

#[tokio::test]
async fn started_moving_during_settle_check_triggers_another_round() {
    let mut probe = ScriptedProbe::new(vec![
        // First round: settled, but `started` moves between snapshots.
        Ok(counters(10, 10, 10)),
        Ok(counters(10, 10, 10)),
        Ok(counters(12, 12, 12)),
        // Second round: steady.
        Ok(counters(12, 12, 12)),
        Ok(counters(12, 12, 12)),
        Ok(counters(12, 12, 12)),
    ]);

    fast_validator()
        .run(&mut probe, &["q".to_string()])
        .await
        .unwrap();

    // Initial prime plus one per settle check.
    assert_eq!(probe.primed.len(), 3);
}

#[tokio::test]
async fn spec_counter_examples() {
    let settled = WarmupCounters {
        scheduled: 10,
        started: 10,
        finished: 8,
        failed: 1,
        skipped_queue_size: 0,
        skipped_demoter: 1,
    };
    assert!(settled.is_settled());

    let in_progress = WarmupCounters {
        scheduled: 10,
        started: 10,
        finished: 8,
        failed: 0,
        skipped_queue_size: 0,
        skipped_demoter: 0,
    };
    assert!(!in_progress.is_settled());
}

#[tokio::test]
async fn counter_fetch_failure_is_fatal() {
    let mut probe = ScriptedProbe::new(vec![Err(Error::Protocol("jmx query failed".into()))]);

    let outcome = fast_validator().run(&mut probe, &["q".to_string()]).await;
    assert!(matches!(outcome, Err(Error::Protocol(_))));
    // The loop never reached the best-effort report.
    assert_eq!(probe.row_group_calls, 0);
}

#[tokio::test]
async fn row_group_report_failure_is_swallowed() {
    let mut probe = ScriptedProbe::new(vec![
        Ok(counters(5, 5, 5)),
        Ok(counters(5, 5, 5)),
        Ok(counters(5, 5, 5)),
    ]);
    probe.row_group_report = Err(Error::Http {
        status: 500,
        url: "row-group-count".into(),
    });

    fast_validator()
        .run(&mut probe, &["q".to_string()])
        .await
        .unwrap();
    assert_eq!(probe.row_group_calls, 1);
}

#[tokio::test]
async fn queries_are_validated_in_order() {
    let mut probe = ScriptedProbe::new(vec![
        Ok(counters(1, 1, 1)),
        Ok(counters(1, 1, 1)),
        Ok(counters(1, 1, 1)),
        Ok(counters(2, 2, 2)),
        Ok(counters(2, 2, 2)),
        Ok(counters(2, 2, 2)),
    ]);

    fast_validator()
        .run(&mut probe, &["first".to_string(), "second".to_string()])
        .await
        .unwrap();

    assert_eq!(probe.primed, ["first", "first", "second", "second"]);
    assert_eq!(probe.row_group_calls, 2);
}
