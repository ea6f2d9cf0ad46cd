//! Bounded worker pool and single-assignment completion handles.
//!
//! Each node gets one [`DeploymentFuture`], created unresolved when the
//! deployer is built. Splitting it yields a [`Resolver`] and a
//! [`Completion`]; both are consumed on use, so a result is written once
//! and read once.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{DeployError, DeployResult};

/// Unresolved completion handle for one node's install attempt.
#[derive(Debug)]
pub struct DeploymentFuture<T> {
    resolver: Resolver<T>,
    completion: Completion<T>,
}

impl<T> DeploymentFuture<T> {
    pub fn new(node: impl Into<String>) -> Self {
        let node = node.into();
        let (tx, rx) = oneshot::channel();
        Self {
            resolver: Resolver {
                node: node.clone(),
                tx,
            },
            completion: Completion { node, rx },
        }
    }

    pub fn node(&self) -> &str {
        &self.completion.node
    }

    pub fn split(self) -> (Resolver<T>, Completion<T>) {
        (self.resolver, self.completion)
    }
}

/// Write side of a [`DeploymentFuture`].
#[derive(Debug)]
pub struct Resolver<T> {
    node: String,
    tx: oneshot::Sender<T>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        if self.tx.send(value).is_err() {
            debug!(node = %self.node, "completion dropped before the result arrived");
        }
    }
}

/// Read side of a [`DeploymentFuture`].
#[derive(Debug)]
pub struct Completion<T> {
    node: String,
    rx: oneshot::Receiver<T>,
}

impl<T> Completion<T> {
    /// Wait for the result. A resolver dropped without a value (panicked
    /// or cancelled task) is reported as [`DeployError::TaskAborted`].
    pub async fn wait(self) -> DeployResult<T> {
        self.rx.await.map_err(|_| {
            warn!(node = %self.node, "install task ended without a result");
            DeployError::TaskAborted { node: self.node }
        })
    }
}

/// Runs submitted tasks with at most `size` of them in flight.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Spawn `task` once a slot is free and resolve `resolver` with its output.
    pub fn submit<F, T>(&self, resolver: Resolver<T>, task: F) -> JoinHandle<()>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            // The semaphore is never closed; a failed acquire drops the resolver.
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            debug!(node = %resolver.node, "install task running");
            resolver.resolve(task.await);
        })
    }
}
