//! Common session lifecycle for the transport variants.
//!
//! Every transport exposes the same contract: open a session against one
//! node, run one kind of operation on it, close it. `scoped` enforces the
//! pairing: a session that was opened is closed exactly once, whether the
//! operation succeeds or fails.

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::Result;
use crate::node::NodeConnection;

#[async_trait]
pub trait Transport: Send + Sync {
    type Session: Send;

    /// Open a session for one node, relaying through its bastion when the
    /// connection carries one. Failures surface as `Error::Connection`.
    async fn open(&self, node: &NodeConnection) -> Result<Self::Session>;

    /// Release the session. Close failures are logged, never raised, so
    /// they cannot mask the operation's outcome.
    async fn close(&self, session: Self::Session);
}

/// Run `op` against a freshly opened session, closing it afterwards
/// regardless of the outcome.
pub async fn scoped<T, R, F>(transport: &T, node: &NodeConnection, op: F) -> Result<R>
where
    T: Transport,
    F: for<'a> FnOnce(&'a mut T::Session) -> BoxFuture<'a, Result<R>> + Send,
{
    let mut session = transport.open(node).await?;
    let outcome = op(&mut session).await;
    transport.close(session).await;
    outcome
}
