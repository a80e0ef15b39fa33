use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::Target;
use crate::executor::Fanout;
use crate::query::QueryClient;

/// One row, one boolean: do active nodes account for every registered node.
const ALL_NODES_ACTIVE_QUERY: &str =
    "with a as (select count(*) as a1 from system.runtime.nodes where state='active'), \
     b as (select count(*) as b1 from system.runtime.nodes) \
     select a.a1=b.b1 from a,b";

pub async fn start(fanout: &Fanout) -> Result<()> {
    control(fanout, "start").await
}

pub async fn stop(fanout: &Fanout) -> Result<()> {
    control(fanout, "stop").await
}

pub async fn restart(fanout: &Fanout) -> Result<()> {
    control(fanout, "restart").await
}

async fn control(fanout: &Fanout, action: &str) -> Result<()> {
    let service = fanout.topology().distribution.brand.service_name();
    let results = fanout
        .run_command(Target::All, &format!("sudo systemctl {action} {service}"))
        .await;
    for result in &results {
        result.print_status(&format!("{action} issued"));
    }
    Ok(())
}

/// Ask the coordinator whether every registered node is active.
pub async fn status(fanout: &Fanout) -> Result<()> {
    let connection = fanout.topology().coordinator_connection();
    let client =
        QueryClient::open(&connection, None, BTreeMap::new(), fanout.options()).await?;
    let outcome = client.execute(ALL_NODES_ACTIVE_QUERY, true).await;
    client.close().await;

    let connected = outcome?
        .rows
        .first()
        .and_then(|row| row.first())
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if connected {
        println!("All nodes are connected");
    } else {
        println!("Not all nodes are connected");
    }
    Ok(())
}
