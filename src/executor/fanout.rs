//! Core fan-out executor: one task per target node, bounded by node count,
//! with per-node failure isolation.

use futures::future::join_all;
use futures::FutureExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::{Target, Topology};
use crate::error::{Error, Result};
use crate::node::NodeConnection;
use crate::rest::{EngineTransport, VaradaTransport};
use crate::ssh::{ConnectOptions, SftpTransport, ShellTransport};
use crate::transport::scoped;

use super::result::TaskResult;

const PROGRESS_TICK_MS: u64 = 80;

/// Fans one logical operation out to every node in a target selection.
#[derive(Clone)]
pub struct Fanout {
    topology: Arc<Topology>,
    options: ConnectOptions,
    show_progress: bool,
}

impl Fanout {
    pub fn new(topology: Topology, options: ConnectOptions) -> Self {
        Self {
            topology: Arc::new(topology),
            options,
            show_progress: true,
        }
    }

    /// Suppress the per-node spinners, for runs whose output would
    /// otherwise interleave with them.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Run `op` once per node in the selection, concurrently, and collect
    /// the outcomes in topology order. A failing node never aborts its
    /// siblings; an empty selection yields an empty list.
    pub async fn run<T, F, Fut>(&self, target: Target, op: F) -> Vec<TaskResult<T>>
    where
        F: Fn(NodeConnection) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        self.run_on(self.topology.resolve(target), op).await
    }

    /// Same as [`run`](Self::run) for an explicit connection list.
    pub async fn run_on<T, F, Fut>(
        &self,
        connections: Vec<NodeConnection>,
        op: F,
    ) -> Vec<TaskResult<T>>
    where
        F: Fn(NodeConnection) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        if connections.is_empty() {
            return Vec::new();
        }

        // One permit per node: this is fan-out, not a queueing scheduler.
        let semaphore = Arc::new(Semaphore::new(connections.len()));
        let multi_progress = if self.show_progress {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden())
        };
        let style = spinner_style();

        let tasks: Vec<_> = connections
            .iter()
            .map(|connection| {
                let node = connection.clone();
                let op = op.clone();
                let semaphore = Arc::clone(&semaphore);
                let pb = multi_progress.add(ProgressBar::new_spinner());
                pb.set_style(style.clone());
                pb.set_prefix(format!("[{}]", node.hostname));
                pb.set_message(format!("{}", "connecting...".cyan()));
                pb.enable_steady_tick(std::time::Duration::from_millis(PROGRESS_TICK_MS));

                tokio::spawn(async move {
                    let _permit = match semaphore.acquire().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            pb.finish_with_message(format!("{}", "aborted".red()));
                            return TaskResult {
                                outcome: Err(Error::connection(
                                    &node.hostname,
                                    format!("semaphore closed: {e}"),
                                )),
                                node,
                            };
                        }
                    };

                    let outcome = op(node.clone()).await;

                    match &outcome {
                        Ok(_) => pb.finish_with_message(format!("{}", "done".green())),
                        Err(e) => {
                            let message = e.to_string();
                            let first_line = message.lines().next().unwrap_or("failed");
                            pb.finish_with_message(format!("{}", first_line.red()));
                        }
                    }

                    TaskResult { node, outcome }
                })
            })
            .collect();

        let joined = join_all(tasks).await;

        // Preserve submission (topology) order; a panicked task still
        // yields a result for its node so the batch stays complete.
        joined
            .into_iter()
            .enumerate()
            .map(|(idx, task)| match task {
                Ok(result) => result,
                Err(e) => {
                    let node = connections[idx].clone();
                    tracing::error!("task for {} failed: {e}", node.hostname);
                    TaskResult {
                        outcome: Err(Error::connection(
                            &node.hostname,
                            format!("task panicked: {e}"),
                        )),
                        node,
                    }
                }
            })
            .collect()
    }

    /// Run a shell command on every selected node, returning each node's
    /// stdout.
    pub async fn run_command(&self, target: Target, command: &str) -> Vec<TaskResult<String>> {
        let transport = Arc::new(ShellTransport::new(self.options.clone()));
        let command: Arc<str> = Arc::from(command);
        self.run(target, move |node| {
            let transport = Arc::clone(&transport);
            let command = Arc::clone(&command);
            async move {
                scoped(transport.as_ref(), &node, move |session| {
                    async move { session.execute(&command).await }.boxed()
                })
                .await
            }
        })
        .await
    }

    /// Fetch the same remote file from every selected node into
    /// `<local_dir>/<role>-<hostname>/<basename>`.
    pub async fn download(
        &self,
        target: Target,
        remote_path: &str,
        local_dir: &Path,
    ) -> Vec<TaskResult<PathBuf>> {
        let transport = Arc::new(SftpTransport::new(self.options.clone()));
        let remote_path: Arc<str> = Arc::from(remote_path);
        let local_dir = local_dir.to_path_buf();
        let basename = Path::new(remote_path.as_ref())
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());

        self.run(target, move |node| {
            let transport = Arc::clone(&transport);
            let remote_path = Arc::clone(&remote_path);
            let local_path = local_dir
                .join(format!("{}-{}", node.role, node.hostname))
                .join(&basename);
            async move {
                scoped(transport.as_ref(), &node, move |session| {
                    async move {
                        session.fetch(&remote_path, &local_path).await?;
                        Ok(local_path)
                    }
                    .boxed()
                })
                .await
            }
        })
        .await
    }

    /// Upload one local file to the same remote path on every selected node.
    pub async fn upload(
        &self,
        target: Target,
        local_path: &Path,
        remote_path: &str,
    ) -> Vec<TaskResult<()>> {
        let transport = Arc::new(SftpTransport::new(self.options.clone()));
        let local_path = local_path.to_path_buf();
        let remote_path: Arc<str> = Arc::from(remote_path);

        self.run(target, move |node| {
            let transport = Arc::clone(&transport);
            let local_path = local_path.clone();
            let remote_path = Arc::clone(&remote_path);
            async move {
                scoped(transport.as_ref(), &node, move |session| {
                    async move { session.send(&local_path, &remote_path).await }.boxed()
                })
                .await
            }
        })
        .await
    }

    /// Write a marker line into the debug log of every selected node.
    pub async fn send_debug_log(&self, target: Target, message: &str) -> Vec<TaskResult<()>> {
        let transport = Arc::new(VaradaTransport::new(self.options.clone()));
        let message: Arc<str> = Arc::from(message);
        self.run(target, move |node| {
            let transport = Arc::clone(&transport);
            let message = Arc::clone(&message);
            async move {
                scoped(transport.as_ref(), &node, move |session| {
                    async move { session.debug_log(&message).await }.boxed()
                })
                .await
            }
        })
        .await
    }

    /// Collect a thread stack dump from every selected node.
    pub async fn thread_dumps(&self, target: Target) -> Vec<TaskResult<serde_json::Value>> {
        let transport = Arc::new(EngineTransport::new(self.options.clone()));
        self.run(target, move |node| {
            let transport = Arc::clone(&transport);
            async move {
                scoped(transport.as_ref(), &node, move |session| {
                    async move { session.thread_dump().await }.boxed()
                })
                .await
            }
        })
        .await
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:.bold} {spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷ ")
}
