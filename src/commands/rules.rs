use anyhow::{bail, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::executor::Fanout;
use crate::rest::VaradaRest;
use crate::rules::{filter_rules, parse_csv_rules, parse_json_rules};

/// Apply warm-up rules from a JSON or CSV file to the coordinator.
pub async fn apply(fanout: &Fanout, json: Option<&Path>, csv: Option<&Path>) -> Result<()> {
    let rules = match (json, csv) {
        (Some(path), _) => parse_json_rules(&std::fs::read_to_string(path)?)?,
        (None, Some(path)) => parse_csv_rules(&std::fs::read_to_string(path)?)?,
        (None, None) => bail!("either --json or --csv is required"),
    };

    let varada = open_coordinator(fanout).await?;
    let mut outcome = Ok(());
    for rule in &rules {
        tracing::info!("setting rule: {rule}");
        if let Err(e) = varada.warmup_rule_set(rule).await {
            outcome = Err(e);
            break;
        }
    }
    varada.close().await;
    outcome?;
    println!("applied {} rule(s)", rules.len());
    Ok(())
}

/// Fetch rules, optionally filtered, and print or save them.
pub async fn get(
    fanout: &Fanout,
    table: Option<&str>,
    column: Option<&str>,
    destination: Option<PathBuf>,
) -> Result<()> {
    if column.is_some() && table.is_none() {
        bail!("a column filter needs a table; run with -t TABLE as well");
    }

    let varada = open_coordinator(fanout).await?;
    let outcome = varada.warmup_rule_get().await;
    varada.close().await;

    let rules = match outcome? {
        Value::Array(rules) => rules,
        other => bail!("expected a rule array, got {other}"),
    };
    let rules = filter_rules(rules, table, column);

    if let Some(dir) = destination {
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("rules.json");
        std::fs::write(&path, serde_json::to_string_pretty(&rules)?)?;
        println!("saved {} rule(s) to {}", rules.len(), path.display());
    } else {
        println!("{}", serde_json::to_string_pretty(&rules)?);
    }
    Ok(())
}

/// Delete rules by id, or every rule on the cluster.
pub async fn delete(fanout: &Fanout, ids: &[i64], all: bool) -> Result<()> {
    if ids.is_empty() && !all {
        bail!("either --ids or --all is required");
    }

    let varada = open_coordinator(fanout).await?;
    let outcome = delete_rules(&varada, ids, all).await;
    varada.close().await;
    let deleted = outcome?;
    println!("deleted {deleted} rule(s)");
    Ok(())
}

async fn delete_rules(varada: &VaradaRest, ids: &[i64], all: bool) -> crate::Result<usize> {
    let ids: Vec<i64> = if all {
        tracing::info!("deleting all rules from the cluster");
        match varada.warmup_rule_get().await? {
            Value::Array(rules) => rules
                .iter()
                .filter_map(|rule| rule.get("id").and_then(Value::as_i64))
                .collect(),
            _ => Vec::new(),
        }
    } else {
        tracing::info!("deleting rule(s): {ids:?}");
        ids.to_vec()
    };

    for id in &ids {
        varada.warmup_rule_delete(*id).await?;
    }
    Ok(ids.len())
}

async fn open_coordinator(fanout: &Fanout) -> crate::Result<VaradaRest> {
    let connection = fanout.topology().coordinator_connection();
    VaradaRest::open(&connection, fanout.options()).await
}
