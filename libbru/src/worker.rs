//! Per-lane worker queue.
//!
//! Each queue runs one task at a time. Pending tasks are kept sorted by
//! ascending priority (payload size in MB), so a small file queued behind a
//! large one still runs first. Tasks execute on the blocking thread pool; a
//! panic rejects that task only and the loop moves on.

use crate::error::EngineError;
use crate::model::{Document, DocumentKind};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{oneshot, Notify};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, trace, warn};

/// A conversion request.
#[derive(Clone, Debug)]
pub enum Operation {
    /// Text to document.
    ToJson {
        text: String,
        kind: DocumentKind,
        filename: Option<String>,
    },
    /// Document to text.
    ToText { document: Document },
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::ToJson { .. } => "toJson",
            Operation::ToText { .. } => "toText",
        }
    }
}

/// Result of a conversion.
#[derive(Clone, Debug, PartialEq)]
pub enum Output {
    Document(Document),
    Text(String),
}

/// A queued unit of work. Lower priority runs first.
#[derive(Clone, Debug)]
pub struct Task {
    pub priority: f64,
    pub operation: Operation,
}

/// Runs operations inside a worker.
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, operation: Operation) -> Result<Output, EngineError>;
}

/// Calls the parser and serializer.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConversionExecutor;

impl Executor for ConversionExecutor {
    fn execute(&self, operation: Operation) -> Result<Output, EngineError> {
        match operation {
            Operation::ToJson {
                text,
                kind,
                filename,
            } => Ok(Output::Document(crate::parse_with_filename(
                &text,
                kind,
                filename.as_deref(),
            )?)),
            Operation::ToText { document } => Ok(Output::Text(crate::stringify(&document))),
        }
    }
}

type Reply = oneshot::Sender<Result<Output, EngineError>>;

struct Pending {
    priority: f64,
    operation: Operation,
    reply: Reply,
}

struct Shared {
    label: String,
    pending: Mutex<Vec<Pending>>,
    active: AtomicUsize,
    notify: Notify,
    executor: Arc<dyn Executor>,
}

impl Shared {
    fn lock_pending(&self) -> MutexGuard<'_, Vec<Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop the lowest-priority task and mark it active.
    fn take_next(&self) -> Option<Pending> {
        let mut pending = self.lock_pending();
        if pending.is_empty() {
            return None;
        }
        self.active.fetch_add(1, Ordering::SeqCst);
        Some(pending.remove(0))
    }
}

/// A serial, priority-ordered task queue backed by one worker loop.
pub struct WorkerQueue {
    shared: Arc<Shared>,
    handle: JoinHandle<()>,
}

impl WorkerQueue {
    /// Start a queue and its worker loop. Must be called within a Tokio runtime.
    pub fn new(label: impl Into<String>, executor: Arc<dyn Executor>) -> Self {
        let shared = Arc::new(Shared {
            label: label.into(),
            pending: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            notify: Notify::new(),
            executor,
        });
        let handle = tokio::spawn(run(Arc::clone(&shared)));
        Self { shared, handle }
    }

    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Queue a task. The task is in the queue as soon as this returns; the
    /// future resolves when it has run.
    pub fn enqueue(
        &self,
        task: Task,
    ) -> impl Future<Output = Result<Output, EngineError>> + Send + 'static {
        let (reply, rx) = oneshot::channel();
        let depth = {
            let mut pending = self.shared.lock_pending();
            pending.push(Pending {
                priority: task.priority,
                operation: task.operation,
                reply,
            });
            // Stable, so equal priorities keep arrival order.
            pending.sort_by(|a, b| a.priority.total_cmp(&b.priority));
            pending.len()
        };
        self.shared.notify.notify_one();
        trace!(lane = %self.shared.label, priority = task.priority, depth, "task queued");

        async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(EngineError::QueueClosed),
            }
        }
    }

    /// Tasks waiting plus the one running.
    pub fn depth(&self) -> usize {
        self.shared.lock_pending().len() + self.shared.active.load(Ordering::SeqCst)
    }
}

impl Drop for WorkerQueue {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(shared: Arc<Shared>) {
    loop {
        let Some(job) = shared.take_next() else {
            shared.notify.notified().await;
            continue;
        };

        let Pending {
            priority,
            operation,
            reply,
        } = job;
        let op = operation.name();
        debug!(lane = %shared.label, op, priority, "dispatching task");

        let executor = Arc::clone(&shared.executor);
        let result = match tokio::task::spawn_blocking(move || executor.execute(operation)).await {
            Ok(result) => result,
            Err(err) => {
                let reason = crash_reason(err);
                warn!(lane = %shared.label, op, %reason, "worker task crashed");
                Err(EngineError::WorkerCrashed(reason))
            }
        };

        shared.active.fetch_sub(1, Ordering::SeqCst);
        if reply.send(result).is_err() {
            trace!(lane = %shared.label, op, "caller went away before the result");
        }
    }
}

fn crash_reason(err: JoinError) -> String {
    if !err.is_panic() {
        return "task cancelled".to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Environment, Meta, Request};
    use std::sync::mpsc;

    /// Records the order documents are written; `gate` blocks until released,
    /// `boom` panics.
    struct Recorder {
        order: Mutex<Vec<String>>,
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl Executor for Recorder {
        fn execute(&self, operation: Operation) -> Result<Output, EngineError> {
            let Operation::ToText { document } = operation else {
                return Err(EngineError::UnexpectedOutput("a document"));
            };
            match document.name() {
                "gate" => {
                    let _ = self.gate.lock().unwrap().recv();
                }
                "boom" => panic!("boom"),
                _ => {}
            }
            self.order.lock().unwrap().push(document.name().to_string());
            Ok(Output::Text(document.name().to_string()))
        }
    }

    fn recorder() -> (Arc<Recorder>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let rec = Arc::new(Recorder {
            order: Mutex::new(Vec::new()),
            gate: Mutex::new(rx),
        });
        (rec, tx)
    }

    fn task(name: &str, priority: f64) -> Task {
        let document = Document::Request(Request {
            meta: Meta::named(name),
            ..Request::default()
        });
        Task {
            priority,
            operation: Operation::ToText { document },
        }
    }

    #[tokio::test]
    async fn test_runs_in_priority_order() {
        let (rec, gate) = recorder();
        let queue = WorkerQueue::new("test", rec.clone());

        let held = queue.enqueue(task("gate", 0.0));
        let five = queue.enqueue(task("5", 5.0));
        let one = queue.enqueue(task("1", 1.0));
        let three = queue.enqueue(task("3", 3.0));
        assert_eq!(queue.depth(), 4);

        gate.send(()).unwrap();
        held.await.unwrap();
        let (five, one, three) = tokio::join!(five, one, three);
        assert_eq!(one.unwrap(), Output::Text("1".to_string()));
        assert!(three.is_ok() && five.is_ok());

        assert_eq!(*rec.order.lock().unwrap(), vec!["gate", "1", "3", "5"]);
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test]
    async fn test_crash_rejects_only_that_task() {
        let (rec, _gate) = recorder();
        let queue = WorkerQueue::new("test", rec.clone());

        let crashed = queue.enqueue(task("boom", 1.0)).await;
        assert!(matches!(crashed, Err(EngineError::WorkerCrashed(ref m)) if m == "boom"));

        let next = queue.enqueue(task("after", 1.0)).await;
        assert_eq!(next.unwrap(), Output::Text("after".to_string()));
    }

    #[test]
    fn test_conversion_executor() {
        let exec = ConversionExecutor;
        let out = exec
            .execute(Operation::ToJson {
                text: "meta {\n  name: dev\n}\n\nvars {\n}\n".to_string(),
                kind: DocumentKind::Environment,
                filename: None,
            })
            .unwrap();
        let Output::Document(doc) = out else {
            panic!("expected a document");
        };
        assert_eq!(
            doc,
            Document::Environment(Environment {
                name: "dev".to_string(),
                ..Environment::default()
            })
        );

        let err = exec
            .execute(Operation::ToJson {
                text: "get {\n".to_string(),
                kind: DocumentKind::Request,
                filename: Some("broken.bru".to_string()),
            })
            .unwrap_err();
        assert!(err.to_string().ends_with("of <broken.bru>"));
    }

    #[tokio::test]
    async fn test_dropped_queue_closes_pending() {
        let (rec, _gate) = recorder();
        let queue = WorkerQueue::new("test", rec);
        let waiting = queue.enqueue(task("never", 1.0));
        drop(queue);
        assert!(matches!(waiting.await, Err(EngineError::QueueClosed)));
    }
}
