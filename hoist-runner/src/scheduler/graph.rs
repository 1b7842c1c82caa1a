//! Dependency graph of async tasks
//!
//! Tasks are registered with the keys of the tasks they depend on; a key
//! can only depend on keys registered before it, so the graph is acyclic by
//! construction. Running the graph spawns every task at once. Each task is
//! a shared future, resolved once, that its dependents await.
//!
//! Rules:
//! - A task runs only if every dependency succeeded, otherwise it is skipped
//! - Once any task failed, tasks that have not started yet are skipped
//! - Tasks already running when a failure happens are left to finish
//! - A panicking task counts as failed
//! - `run` returns only after every task has settled

use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info};

/// Bounds every task key satisfies
pub trait TaskKey: Copy + Eq + Hash + Display + Debug + Send + Sync + 'static {}

impl<K> TaskKey for K where K: Copy + Eq + Hash + Display + Debug + Send + Sync + 'static {}

type TaskFuture = BoxFuture<'static, anyhow::Result<()>>;
type OutcomeFuture = Shared<BoxFuture<'static, TaskOutcome>>;

/// How a task ended
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Succeeded,
    Failed(Arc<anyhow::Error>),
    /// Not run: a dependency did not succeed or the run was halted
    Skipped,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError<K: Display + Debug> {
    #[error("task {0} is registered twice")]
    Duplicate(K),

    #[error("task {task} depends on {dependency}, which is not registered before it")]
    UnknownDependency { task: K, dependency: K },
}

struct Node<K> {
    key: K,
    dependencies: Vec<K>,
    task: TaskFuture,
}

/// Tasks and their dependencies, not started until [`TaskGraph::run`]
pub struct TaskGraph<K> {
    nodes: Vec<Node<K>>,
}

impl<K: TaskKey> TaskGraph<K> {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Registers a task
    ///
    /// # Arguments
    /// * `key` - Unique task key
    /// * `dependencies` - Keys of already registered tasks that must succeed first
    /// * `task` - The work; it is not polled before its dependencies succeeded
    pub fn add<F>(&mut self, key: K, dependencies: &[K], task: F) -> Result<(), GraphError<K>>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if self.contains(key) {
            return Err(GraphError::Duplicate(key));
        }

        if let Some(&dependency) = dependencies.iter().find(|dep| !self.contains(**dep)) {
            return Err(GraphError::UnknownDependency {
                task: key,
                dependency,
            });
        }

        self.nodes.push(Node {
            key,
            dependencies: dependencies.to_vec(),
            task: task.boxed(),
        });

        Ok(())
    }

    pub fn contains(&self, key: K) -> bool {
        self.nodes.iter().any(|node| node.key == key)
    }

    /// Runs every task and waits until all of them settled
    pub async fn run(self) -> GraphReport<K> {
        let halted: Arc<OnceLock<K>> = Arc::new(OnceLock::new());
        let mut outcomes: HashMap<K, OutcomeFuture> = HashMap::new();
        let mut handles = Vec::with_capacity(self.nodes.len());

        for node in self.nodes {
            // Registration order guarantees every dependency is already here
            let dependencies: Vec<(K, OutcomeFuture)> = node
                .dependencies
                .iter()
                .filter_map(|dep| outcomes.get(dep).map(|outcome| (*dep, outcome.clone())))
                .collect();

            let outcome = run_task(node.key, dependencies, node.task, halted.clone())
                .boxed()
                .shared();

            outcomes.insert(node.key, outcome.clone());
            handles.push((node.key, tokio::spawn(outcome)));
        }

        let keys: Vec<K> = handles.iter().map(|(key, _)| *key).collect();
        let joined = join_all(handles.into_iter().map(|(_, handle)| handle)).await;

        let outcomes = keys
            .into_iter()
            .zip(joined)
            .map(|(key, joined)| {
                let outcome = joined.unwrap_or_else(|e| {
                    TaskOutcome::Failed(Arc::new(anyhow::anyhow!("task {} aborted: {}", key, e)))
                });
                (key, outcome)
            })
            .collect();

        GraphReport {
            outcomes,
            first_failure: halted.get().copied(),
        }
    }
}

impl<K: TaskKey> Default for TaskGraph<K> {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_task<K: TaskKey>(
    key: K,
    dependencies: Vec<(K, OutcomeFuture)>,
    task: TaskFuture,
    halted: Arc<OnceLock<K>>,
) -> TaskOutcome {
    let settled = join_all(
        dependencies
            .into_iter()
            .map(|(dep, outcome)| async move { (dep, outcome.await) }),
    )
    .await;

    if let Some((dep, _)) = settled.iter().find(|(_, outcome)| !outcome.is_success()) {
        debug!("Skipping {}: {} did not succeed", key, dep);
        return TaskOutcome::Skipped;
    }

    if let Some(failed) = halted.get() {
        debug!("Skipping {}: run halted after {} failed", key, failed);
        return TaskOutcome::Skipped;
    }

    info!("Starting {}", key);
    let started = Instant::now();

    let error = match AssertUnwindSafe(task).catch_unwind().await {
        Ok(Ok(())) => {
            info!("Finished {} ({:.2?})", key, started.elapsed());
            return TaskOutcome::Succeeded;
        }
        Ok(Err(e)) => e,
        Err(panic) => anyhow::anyhow!("task {} panicked: {}", key, panic_message(&*panic)),
    };

    // Only the first failure halts the run
    let _ = halted.set(key);
    error!("{} failed after {:.2?}: {:#}", key, started.elapsed(), error);

    TaskOutcome::Failed(Arc::new(error))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Outcome of every task of a run
#[derive(Debug, Clone)]
pub struct GraphReport<K> {
    /// Outcomes in registration order
    pub outcomes: Vec<(K, TaskOutcome)>,
    /// Task whose failure halted the run
    pub first_failure: Option<K>,
}

impl<K: TaskKey> GraphReport<K> {
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(|(_, outcome)| outcome.is_success())
    }

    pub fn outcome(&self, key: K) -> Option<&TaskOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, outcome)| outcome)
    }

    /// The failure that halted the run, with the task that raised it
    pub fn failure(&self) -> Option<(K, &anyhow::Error)> {
        let key = self.first_failure?;
        match self.outcome(key)? {
            TaskOutcome::Failed(error) => Some((key, error.as_ref())),
            _ => None,
        }
    }

    /// Tasks that never ran
    pub fn skipped(&self) -> Vec<K> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| matches!(outcome, TaskOutcome::Skipped))
            .map(|(key, _)| *key)
            .collect()
    }
}
