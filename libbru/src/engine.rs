//! Async conversion facade over the lane router.

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::lanes::LaneRouter;
use crate::model::{Document, DocumentKind};
use crate::worker::{ConversionExecutor, Executor, Operation, Output, Task};
use std::sync::Arc;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Payload size in megabytes, which is also its priority.
pub fn payload_size_mb(bytes: usize) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

/// Runs parse and stringify on size-tiered worker lanes.
pub struct Engine {
    router: LaneRouter,
}

impl Engine {
    /// Must be called within a Tokio runtime.
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_executor(config, Arc::new(ConversionExecutor))
    }

    pub fn with_executor(config: &EngineConfig, executor: Arc<dyn Executor>) -> Self {
        Self {
            router: LaneRouter::new(&config.lanes, executor),
        }
    }

    pub fn router(&self) -> &LaneRouter {
        &self.router
    }

    /// Parse text into a document.
    pub async fn parse(&self, text: &str, kind: DocumentKind) -> Result<Document, EngineError> {
        self.parse_named(text, kind, None).await
    }

    /// Parse text into a document, naming the file in error messages.
    pub async fn parse_named(
        &self,
        text: &str,
        kind: DocumentKind,
        filename: Option<&str>,
    ) -> Result<Document, EngineError> {
        let operation = Operation::ToJson {
            text: text.to_string(),
            kind,
            filename: filename.map(String::from),
        };
        match self.submit(payload_size_mb(text.len()), operation).await? {
            Output::Document(doc) => Ok(doc),
            Output::Text(_) => Err(EngineError::UnexpectedOutput("a document")),
        }
    }

    /// Write a document as text.
    pub async fn stringify(&self, document: &Document) -> Result<String, EngineError> {
        // Sized by its JSON encoding.
        let json = serde_json::to_vec(document).map_err(|e| EngineError::Measure(e.to_string()))?;
        let operation = Operation::ToText {
            document: document.clone(),
        };
        match self.submit(payload_size_mb(json.len()), operation).await? {
            Output::Text(text) => Ok(text),
            Output::Document(_) => Err(EngineError::UnexpectedOutput("text")),
        }
    }

    async fn submit(&self, size_mb: f64, operation: Operation) -> Result<Output, EngineError> {
        let lane = self.router.route(size_mb);
        lane.queue
            .enqueue(Task {
                priority: size_mb,
                operation,
            })
            .await
    }
}
