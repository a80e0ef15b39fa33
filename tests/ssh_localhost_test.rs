//! End-to-end shell fan-out against localhost. Skipped unless passwordless
//! SSH to localhost works, like on a developer machine or CI with a
//! configured ssh daemon.

use std::process::Command;

use trinoctl::config::Target;
use trinoctl::ssh::ConnectOptions;
use trinoctl::{Fanout, Topology};

fn can_ssh_to_localhost() -> bool {
    let output = Command::new("ssh")
        .args([
            "-o",
            "ConnectTimeout=2",
            "-o",
            "StrictHostKeyChecking=no",
            "-o",
            "UserKnownHostsFile=/dev/null",
            "-o",
            "PasswordAuthentication=no",
            "-o",
            "BatchMode=yes",
            "localhost",
            "echo",
            "test",
        ])
        .output();
    matches!(output, Ok(result) if result.status.success())
}

fn localhost_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "root".to_string())
}

fn localhost_cluster() -> Fanout {
    let topology = Topology::parse(&format!(
        r#"{{
            "coordinator": "localhost",
            "workers": ["localhost"],
            "username": "{}",
            "port": 22
        }}"#,
        localhost_user()
    ))
    .unwrap();
    Fanout::new(topology, ConnectOptions::default()).with_progress(false)
}

#[tokio::test]
async fn echo_over_ssh_returns_stdout() {
    if !can_ssh_to_localhost() {
        eprintln!("Skipping integration test: cannot SSH to localhost");
        return;
    }

    let results = localhost_cluster()
        .run_command(Target::Coordinator, "echo ok")
        .await;

    assert_eq!(results.len(), 1);
    let output = results[0].outcome.as_ref().expect("command should succeed");
    assert_eq!(output, "ok\n");
}

#[tokio::test]
async fn unreachable_node_yields_connection_error_without_emptying_batch() {
    if !can_ssh_to_localhost() {
        eprintln!("Skipping integration test: cannot SSH to localhost");
        return;
    }

    // Port 1 is refused; the localhost node still answers.
    let topology = Topology::parse(&format!(
        r#"{{
            "coordinator": "localhost",
            "workers": [],
            "username": "{}",
            "port": 22
        }}"#,
        localhost_user()
    ))
    .unwrap();
    let fanout = Fanout::new(topology, ConnectOptions::default()).with_progress(false);

    let mut bad = fanout.topology().coordinator_connection();
    bad.port = 1;
    let good = fanout.topology().coordinator_connection();

    let connections = vec![bad, good];
    let options = ConnectOptions::default();
    let results = fanout
        .run_on(connections, move |node| {
            let options = options.clone();
            async move {
                let session = trinoctl::ssh::ShellSession::open(&node, &options).await?;
                let output = session.execute("echo ok").await;
                session.close().await;
                output
            }
        })
        .await;

    assert_eq!(results.len(), 2);
    assert!(!results[0].is_success());
    assert!(results[0]
        .outcome
        .as_ref()
        .err()
        .is_some_and(|e| e.is_connection()));
    assert_eq!(results[1].outcome.as_ref().unwrap(), "ok\n");
}
