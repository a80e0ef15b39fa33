use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

use crate::executor::Fanout;
use crate::warmup::{EngineProbe, Validator};

/// Prime each warm query through the coordinator and poll the warming
/// counters until the cluster settles.
pub async fn validate(fanout: &Fanout, queries_path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(queries_path)
        .with_context(|| format!("failed to read {}", queries_path.display()))?;
    let parsed: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", queries_path.display()))?;
    let queries: Vec<String> = parsed
        .get("warm_queries")
        .and_then(Value::as_array)
        .with_context(|| format!("{} has no 'warm_queries' array", queries_path.display()))?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    let connection = fanout.topology().coordinator_connection();
    let mut probe = EngineProbe::open(&connection, None, fanout.options()).await?;
    let outcome = Validator::default().run(&mut probe, &queries).await;
    probe.close().await;
    outcome?;
    Ok(())
}
