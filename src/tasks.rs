//! Supervised background tasks
//!
//! Every task runs in its own tokio task. Errors and panics are sent as
//! [`TaskFailure`] on one channel instead of being logged and forgotten;
//! `report_failures` is the default consumer.

use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::telemetry::Metrics;

#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub task: String,
    pub error: String,
    pub at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Supervisor {
    failures: mpsc::UnboundedSender<TaskFailure>,
}

impl Supervisor {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TaskFailure>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { failures: tx }, rx)
    }

    fn report(&self, task: &str, error: String) {
        let failure = TaskFailure {
            task: task.to_string(),
            error,
            at: Utc::now(),
        };
        if self.failures.send(failure).is_err() {
            error!("[TASK] {} failed with no failure consumer attached", task);
        }
    }

    /// Run `fut` once; an `Err` or a panic is reported.
    pub fn spawn<F, E>(&self, name: &str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let sup = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            match tokio::spawn(fut).await {
                Ok(Ok(())) => debug!("[TASK] {} finished", name),
                Ok(Err(e)) => sup.report(&name, e.to_string()),
                Err(join) => sup.report(&name, panic_message(join)),
            }
        })
    }

    /// Run `make()` every `period`, starting immediately. A failed run is
    /// reported and the loop keeps going.
    pub fn spawn_periodic<M, F, E>(&self, name: &str, period: Duration, mut make: M) -> JoinHandle<()>
    where
        M: FnMut() -> F + Send + 'static,
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let sup = self.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match tokio::spawn(make()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => sup.report(&name, e.to_string()),
                    Err(join) => sup.report(&name, panic_message(join)),
                }
            }
        })
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if err.is_cancelled() {
        return "cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown payload".to_string());
            format!("panicked: {}", detail)
        }
        Err(e) => e.to_string(),
    }
}

/// Log and count every failure until all supervisors are dropped.
pub async fn report_failures(mut rx: mpsc::UnboundedReceiver<TaskFailure>, metrics: Arc<Metrics>) {
    while let Some(failure) = rx.recv().await {
        error!(
            "[TASK] {} failed at {}: {}",
            failure.task,
            failure.at.to_rfc3339(),
            failure.error
        );
        metrics
            .task_failures
            .with_label_values(&[failure.task.as_str()])
            .inc();
    }
}
