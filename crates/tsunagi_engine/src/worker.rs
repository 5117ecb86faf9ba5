//! Worker process handle with sticky crash semantics.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::{
    Diagnostic, EngineDocId, EngineOp, FaultInjector, LintEngine, ProcessCrashed, TextChange,
};

/// Identifies one worker for logging and fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(u64);

impl WorkerId {
    /// Creates a worker id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker#{}", self.0)
    }
}

/// A handle to one live worker hosting a [`LintEngine`].
///
/// The first failing operation marks the handle crashed; every later
/// operation fails synchronously with [`ProcessCrashed`] without reaching
/// the engine, so callers never race a zombie engine. The engine instance
/// is torn down when the last holder drops the handle.
pub struct WorkerHandle {
    id: WorkerId,
    engine: Box<dyn LintEngine>,
    injector: Arc<dyn FaultInjector>,
    crashed: AtomicBool,
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("crashed", &self.is_crashed())
            .finish_non_exhaustive()
    }
}

impl WorkerHandle {
    /// Wraps a freshly launched engine.
    pub fn new(id: WorkerId, engine: Box<dyn LintEngine>, injector: Arc<dyn FaultInjector>) -> Self {
        Self {
            id,
            engine,
            injector,
            crashed: AtomicBool::new(false),
        }
    }

    /// The worker's id.
    pub fn id(&self) -> WorkerId {
        self.id
    }

    /// Whether this worker has been observed to crash.
    pub fn is_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Marks the worker crashed. Idempotent; the flag never clears.
    pub fn mark_crashed(&self) {
        if !self.crashed.swap(true, Ordering::SeqCst) {
            warn!("{} marked crashed", self.id);
        }
    }

    /// Creates an engine-side document initialized to `text`.
    pub async fn create_document(&self, text: &str) -> Result<EngineDocId, ProcessCrashed> {
        self.begin_op(EngineOp::CreateDocument).await?;
        self.watch(self.engine.create_document(text).await)
    }

    /// Applies one incremental change to an engine-side document.
    pub async fn apply_change(
        &self,
        doc: EngineDocId,
        change: &TextChange,
    ) -> Result<(), ProcessCrashed> {
        self.begin_op(EngineOp::ApplyChange).await?;
        self.watch(self.engine.apply_change(doc, change).await)
    }

    /// Lints an engine-side document.
    pub async fn lint(&self, doc: EngineDocId) -> Result<Vec<Diagnostic>, ProcessCrashed> {
        self.begin_op(EngineOp::Lint).await?;
        self.watch(self.engine.lint(doc).await)
    }

    /// Releases an engine-side document.
    pub async fn destroy_document(&self, doc: EngineDocId) -> Result<(), ProcessCrashed> {
        self.begin_op(EngineOp::DestroyDocument).await?;
        self.watch(self.engine.destroy_document(doc).await)
    }

    /// Gate run at the start of every engine operation.
    ///
    /// A crashed handle fails synchronously. Otherwise the op yields once
    /// (every engine call is a suspension point), re-checks the flag in
    /// case another holder crashed the worker while we were suspended, and
    /// finally consults the fault injector.
    async fn begin_op(&self, op: EngineOp) -> Result<(), ProcessCrashed> {
        if self.is_crashed() {
            return Err(ProcessCrashed);
        }
        tokio::task::yield_now().await;
        if self.is_crashed() {
            return Err(ProcessCrashed);
        }
        if let Err(crash) = self.injector.maybe_inject_fault(self.id, op) {
            debug!("injected crash on {} during {}", self.id, op.name());
            self.mark_crashed();
            return Err(crash);
        }
        Ok(())
    }

    fn watch<T>(&self, result: Result<T, ProcessCrashed>) -> Result<T, ProcessCrashed> {
        if result.is_err() {
            self.mark_crashed();
        }
        result
    }
}
