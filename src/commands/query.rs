use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Target;
use crate::executor::Fanout;
use crate::query::{QueryClient, QueryOutcome};

const MULTI_QUERY_ROW_LIMIT: usize = 10;

pub struct RunParams {
    pub json: Option<PathBuf>,
    pub file: Option<PathBuf>,
    pub iterations: u32,
    pub sleep: u64,
    pub session_properties: Option<String>,
    pub results: bool,
    pub series: Vec<String>,
}

/// Run query series through the coordinator: queries within a series run
/// serially, series run concurrently, the whole set is iterated.
pub async fn run(fanout: &Fanout, params: RunParams) -> Result<()> {
    let queries = load_queries(&params)?;
    let series = select_series(&params.series, &queries)?;
    let properties = parse_session_properties(params.session_properties.as_deref())?;

    // A lone query gets its full result set; anything more is trimmed.
    let single_query = series.len() == 1 && series[0].len() == 1 && params.iterations == 1;

    for iteration in 0..params.iterations {
        if params.iterations > 1 {
            tracing::info!("iteration {} of {}", iteration + 1, params.iterations);
        }

        let handles: Vec<_> = series
            .iter()
            .cloned()
            .map(|serial| {
                let fanout = fanout.clone();
                let properties = properties.clone();
                let print_results = params.results;
                tokio::spawn(async move {
                    run_series(fanout, serial, properties, print_results, single_query).await
                })
            })
            .collect();
        for handle in handles {
            handle.await??;
        }

        if iteration + 1 < params.iterations && params.sleep > 0 {
            tracing::info!("sleeping {}s before next iteration", params.sleep);
            tokio::time::sleep(Duration::from_secs(params.sleep)).await;
        }
    }
    Ok(())
}

async fn run_series(
    fanout: Fanout,
    queries: Vec<(String, String)>,
    properties: BTreeMap<String, String>,
    print_results: bool,
    full_results: bool,
) -> Result<()> {
    let fanout = fanout.with_progress(false);
    let connection = fanout.topology().coordinator_connection();
    let client = QueryClient::open(&connection, None, properties, fanout.options()).await?;

    let mut outcome = Ok(());
    for (name, sql) in &queries {
        // Leave a marker in every node's debug log so engine-side traces
        // can be correlated with this run.
        fanout
            .send_debug_log(Target::All, &format!("trinoctl query run: {name}"))
            .await;

        let text = if print_results {
            format!("--{name}\n {sql}")
        } else {
            format!("--{name}\n EXPLAIN ANALYZE {sql}")
        };
        match client.execute(&text, true).await {
            Ok(result) => {
                print_stats(name, &result);
                if print_results {
                    print_rows(&result, full_results);
                }
            }
            Err(e) => {
                outcome = Err(e.into());
                break;
            }
        }
    }
    client.close().await;
    outcome
}

fn load_queries(params: &RunParams) -> Result<Vec<(String, String)>> {
    match (&params.json, &params.file) {
        (Some(path), _) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let map: serde_json::Map<String, Value> =
                serde_json::from_str(&content).context("query JSON must map names to SQL")?;
            map.into_iter()
                .map(|(name, sql)| match sql {
                    Value::String(sql) => Ok((name, sql)),
                    other => bail!("query '{name}' must be a SQL string, got {other}"),
                })
                .collect()
        }
        (None, Some(path)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(content
                .split(';')
                .map(str::trim)
                .filter(|sql| !sql.is_empty())
                .enumerate()
                .map(|(idx, sql)| (idx.to_string(), sql.to_string()))
                .collect())
        }
        (None, None) => bail!("either --json or --file is required"),
    }
}

/// Resolve series arguments (comma-joined query names) against the loaded
/// queries; no arguments means one serial run of everything.
fn select_series(
    series: &[String],
    queries: &[(String, String)],
) -> Result<Vec<Vec<(String, String)>>> {
    if series.is_empty() {
        return Ok(vec![queries.to_vec()]);
    }
    series
        .iter()
        .map(|spec| {
            spec.split(',')
                .map(|name| {
                    queries
                        .iter()
                        .find(|(known, _)| known == name)
                        .cloned()
                        .with_context(|| format!("query '{name}' is not in the query file"))
                })
                .collect()
        })
        .collect()
}

fn parse_session_properties(spec: Option<&str>) -> Result<BTreeMap<String, String>> {
    let Some(spec) = spec else {
        return Ok(BTreeMap::new());
    };
    spec.split(',')
        .map(|pair| {
            pair.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .with_context(|| format!("bad session property '{pair}', expected key=value"))
        })
        .collect()
}

fn print_stats(name: &str, result: &QueryOutcome) {
    let stats = &result.stats;
    let seconds = |field: &str| stats.get(field).and_then(Value::as_f64).unwrap_or(0.0) / 1000.0;
    let count = |field: &str| stats.get(field).and_then(Value::as_i64).unwrap_or(0);
    println!(
        "{name}: queryId {} elapsed {:.3}s cpu {:.3}s rows {} bytes {} splits {}",
        result.query_id.as_deref().unwrap_or("-"),
        seconds("elapsedTimeMillis"),
        seconds("cpuTimeMillis"),
        count("processedRows"),
        count("processedBytes"),
        count("totalSplits"),
    );
}

fn print_rows(result: &QueryOutcome, full: bool) {
    let limit = if full {
        result.rows.len()
    } else {
        MULTI_QUERY_ROW_LIMIT
    };
    for row in result.rows.iter().take(limit) {
        println!("{}", serde_json::to_string(row).unwrap_or_default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queries() -> Vec<(String, String)> {
        vec![
            ("q1".to_string(), "select 1".to_string()),
            ("q2".to_string(), "select 2".to_string()),
        ]
    }

    #[test]
    fn empty_series_runs_everything_serially() {
        let series = select_series(&[], &queries()).unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].len(), 2);
    }

    #[test]
    fn series_args_split_into_parallel_groups() {
        let args = vec!["q1,q2".to_string(), "q2".to_string()];
        let series = select_series(&args, &queries()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].len(), 2);
        assert_eq!(series[1][0].0, "q2");
    }

    #[test]
    fn unknown_query_name_is_rejected() {
        let args = vec!["q9".to_string()];
        assert!(select_series(&args, &queries()).is_err());
    }

    #[test]
    fn parses_session_properties() {
        let properties = parse_session_properties(Some("a=1,b=two")).unwrap();
        assert_eq!(properties["a"], "1");
        assert_eq!(properties["b"], "two");
        assert!(parse_session_properties(Some("broken")).is_err());
        assert!(parse_session_properties(None).unwrap().is_empty());
    }
}
