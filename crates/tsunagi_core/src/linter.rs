//! Per-document linter state machine with crash recovery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use tsunagi_engine::{Diagnostic, EngineDocId, ProcessCrashed, TextChange, WorkerHandle};

use crate::config::LinterOptions;
use crate::document::LinterDocument;
use crate::error::LinterError;
use crate::manager::DocumentProcessManager;

/// Lifecycle phase of a [`DocumentLinter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinterPhase {
    /// No engine-side document exists yet.
    Unopened,
    /// An engine-side document is being materialized. Bookkeeping for the
    /// operation that is doing it; [`DocumentLinter::phase`] serializes
    /// behind that operation and never reports this phase.
    Initializing,
    /// The engine-side document is live; edits flow through it.
    Ready,
    /// Terminal. No further engine calls are made.
    Disposed,
}

/// State advanced by the serialized operations.
struct LinterState {
    phase: LinterPhase,
    worker: Option<Arc<WorkerHandle>>,
    engine_doc: Option<EngineDocId>,
    /// Value of `ops_started` at the moment the live engine document was
    /// materialized from the editor text. Changes belonging to operations
    /// that started at or before this point are already part of that text;
    /// applying them again would double-edit the engine document.
    snapshot_op: u64,
}

/// Drives one editor document through a shared, crash-prone lint worker.
///
/// Public operations are serialized through a fair queue: one operation
/// runs at a time and the engine-side effects of concurrent calls land in
/// call order, so the N-th call completes strictly after the (N-1)-th.
///
/// A worker crash observed mid-operation discards the engine-side document
/// and re-materializes it on a fresh worker from the editor's current text,
/// which reflects every edit applied so far. Accumulated incremental
/// changes are forfeit: the replacement worker has no memory of them, and
/// the editor owns the canonical text. No journal of individual changes is
/// replayed.
pub struct DocumentLinter {
    document: Arc<dyn LinterDocument>,
    manager: Arc<DocumentProcessManager>,
    options: LinterOptions,
    /// Tickets handed to operations as they begin, before they join the
    /// queue. Compared against `LinterState::snapshot_op`.
    ops_started: AtomicU64,
    /// Set before `dispose` joins the queue, so operations queued ahead of
    /// it settle with [`LinterError::Disposed`] instead of touching the
    /// engine.
    disposed: AtomicBool,
    /// The serial executor; waiters acquire in FIFO order.
    state: Mutex<LinterState>,
}

impl DocumentLinter {
    /// Creates a linter for `document`, drawing workers from `manager`.
    pub fn new(document: Arc<dyn LinterDocument>, manager: Arc<DocumentProcessManager>) -> Self {
        Self::with_options(document, manager, LinterOptions::default())
    }

    /// Creates a linter with explicit [`LinterOptions`].
    pub fn with_options(
        document: Arc<dyn LinterDocument>,
        manager: Arc<DocumentProcessManager>,
        options: LinterOptions,
    ) -> Self {
        Self {
            document,
            manager,
            options,
            ops_started: AtomicU64::new(0),
            disposed: AtomicBool::new(false),
            state: Mutex::new(LinterState {
                phase: LinterPhase::Unopened,
                worker: None,
                engine_doc: None,
                snapshot_op: 0,
            }),
        }
    }

    /// Current lifecycle phase.
    ///
    /// Waits behind any in-flight operation, so callers observe settled
    /// phases only: [`LinterPhase::Initializing`] is internal to the
    /// operation that set it.
    pub async fn phase(&self) -> LinterPhase {
        self.state.lock().await.phase
    }

    /// The editor opened or re-revealed this document: ensure the engine
    /// has a document for it, lint, and publish the diagnostics.
    ///
    /// Idempotent, but a repeat call still round-trips through the engine
    /// so the published set reflects a fresh lint of the current text.
    ///
    /// # Errors
    ///
    /// [`LinterError::LintingCrashed`] if the worker crashed before a lint
    /// succeeded. The previously published diagnostics are untouched and
    /// the linter remains usable: the next call provisions a fresh worker.
    /// [`LinterError::Disposed`] if the linter was disposed first.
    pub async fn editor_changed_visibility(&self) -> Result<(), LinterError> {
        let ticket = self.ops_started.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock().await;
        self.admit(&state)?;

        match self.lint_pass(&mut state, ticket, None).await {
            Ok(diagnostics) => {
                state.phase = LinterPhase::Ready;
                self.document.set_diagnostics(diagnostics);
                Ok(())
            }
            Err(ProcessCrashed) => {
                self.discard_crashed_worker(&mut state).await;
                if self.disposed.load(Ordering::SeqCst) {
                    state.phase = LinterPhase::Disposed;
                    return Err(LinterError::Disposed);
                }
                state.phase = LinterPhase::Unopened;
                warn!("worker crashed while opening document; surfacing to caller");
                Err(LinterError::LintingCrashed)
            }
        }
    }

    /// The editor just applied `changes` to the document: feed them to the
    /// engine-side document and relint.
    ///
    /// The engine is driven by the change list alone; the editor text is
    /// not consulted, because later edits may already have mutated it.
    /// Only materialization (first use, or after a crash) reads the
    /// current text.
    ///
    /// A worker crash here is absorbed: the engine document is
    /// re-materialized on a fresh worker from the current text, which
    /// already includes `changes`, and the call resolves successfully once
    /// a lint lands.
    ///
    /// # Errors
    ///
    /// [`LinterError::Disposed`] if the linter was disposed;
    /// [`LinterError::LintingCrashed`] only when a configured recovery cap
    /// is exhausted.
    pub async fn text_changed(&self, changes: &[TextChange]) -> Result<(), LinterError> {
        let ticket = self.ops_started.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock().await;
        self.admit(&state)?;

        let mut recoveries: u32 = 0;
        loop {
            match self.lint_pass(&mut state, ticket, Some(changes)).await {
                Ok(diagnostics) => {
                    state.phase = LinterPhase::Ready;
                    self.document.set_diagnostics(diagnostics);
                    return Ok(());
                }
                Err(ProcessCrashed) => {
                    self.discard_crashed_worker(&mut state).await;
                    if self.disposed.load(Ordering::SeqCst) {
                        state.phase = LinterPhase::Disposed;
                        return Err(LinterError::Disposed);
                    }
                    recoveries += 1;
                    if let Some(cap) = self.options.max_recovery_attempts
                        && recoveries > cap
                    {
                        state.phase = LinterPhase::Unopened;
                        warn!("giving up after {cap} consecutive crash recoveries");
                        return Err(LinterError::LintingCrashed);
                    }
                    debug!("worker crashed mid-edit; recovering on a fresh worker (attempt {recoveries})");
                    // The engine document is gone; the next pass
                    // re-materializes from the current text, which already
                    // reflects `changes`.
                }
            }
        }
    }

    /// Disposes the linter.
    ///
    /// Operations already queued settle with
    /// [`LinterError::Disposed`]; the in-flight operation, if any, runs to
    /// its settle point first. The engine-side document is released and the
    /// published diagnostics are cleared. Idempotent; never fails.
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        let mut state = self.state.lock().await;

        if let Some(worker) = state.worker.take() {
            if let Some(doc) = state.engine_doc.take() {
                if worker.destroy_document(doc).await.is_err() {
                    // The worker died during teardown; the document is gone
                    // either way.
                    debug!("{} crashed while destroying document", worker.id());
                }
            }
        }
        state.engine_doc = None;
        state.phase = LinterPhase::Disposed;
        self.document.remove_diagnostics();
    }

    fn admit(&self, state: &LinterState) -> Result<(), LinterError> {
        if state.phase == LinterPhase::Disposed || self.disposed.load(Ordering::SeqCst) {
            return Err(LinterError::Disposed);
        }
        Ok(())
    }

    /// One attempt at the engine round-trip for an operation: ensure a
    /// worker, ensure an engine document, apply the changes that are not
    /// already part of the materialized text, lint.
    async fn lint_pass(
        &self,
        state: &mut LinterState,
        ticket: u64,
        changes: Option<&[TextChange]>,
    ) -> Result<Vec<Diagnostic>, ProcessCrashed> {
        let worker = match &state.worker {
            Some(worker) if !worker.is_crashed() => Arc::clone(worker),
            _ => {
                let worker = self.manager.acquire_worker().await?;
                state.worker = Some(Arc::clone(&worker));
                worker
            }
        };

        let doc = match state.engine_doc {
            Some(doc) => {
                if let Some(changes) = changes
                    && ticket > state.snapshot_op
                {
                    for change in changes {
                        worker.apply_change(doc, change).await?;
                    }
                }
                doc
            }
            None => {
                state.phase = LinterPhase::Initializing;
                // Everything that started before this read, including the
                // changes this operation carries, is in the snapshot.
                state.snapshot_op = self.ops_started.load(Ordering::SeqCst);
                let doc = worker.create_document(&self.document.text()).await?;
                state.engine_doc = Some(doc);
                doc
            }
        };

        worker.lint(doc).await
    }

    async fn discard_crashed_worker(&self, state: &mut LinterState) {
        if let Some(worker) = state.worker.take() {
            self.manager.report_crashed(&worker).await;
        }
        state.engine_doc = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tsunagi_engine::DemoEngineLauncher;

    struct StaticDocument {
        text: &'static str,
        diagnostics: StdMutex<Vec<Diagnostic>>,
    }

    impl StaticDocument {
        fn new(text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                text,
                diagnostics: StdMutex::new(Vec::new()),
            })
        }
    }

    impl LinterDocument for StaticDocument {
        fn text(&self) -> String {
            self.text.to_string()
        }

        fn set_diagnostics(&self, diagnostics: Vec<Diagnostic>) {
            *self.diagnostics.lock().unwrap() = diagnostics;
        }

        fn remove_diagnostics(&self) {
            self.diagnostics.lock().unwrap().clear();
        }
    }

    fn demo_manager() -> Arc<DocumentProcessManager> {
        Arc::new(DocumentProcessManager::new(Box::new(DemoEngineLauncher)))
    }

    #[tokio::test]
    async fn test_starts_unopened() {
        let linter = DocumentLinter::new(StaticDocument::new("let x;"), demo_manager());
        assert_eq!(linter.phase().await, LinterPhase::Unopened);
    }

    #[tokio::test]
    async fn test_visibility_publishes_and_reaches_ready() {
        let document = StaticDocument::new("let x;let x;");
        let linter = DocumentLinter::new(document.clone(), demo_manager());

        linter.editor_changed_visibility().await.unwrap();

        assert_eq!(linter.phase().await, LinterPhase::Ready);
        let diagnostics = document.diagnostics.lock().unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "redeclaration of variable: x");
    }

    #[tokio::test]
    async fn test_dispose_before_any_op_spawns_no_worker() {
        let manager = demo_manager();
        let linter = DocumentLinter::new(StaticDocument::new("let x;"), manager.clone());

        linter.dispose().await;

        assert_eq!(linter.phase().await, LinterPhase::Disposed);
        assert_eq!(manager.processes_ever_created(), 0);
        assert_eq!(
            linter.editor_changed_visibility().await,
            Err(LinterError::Disposed)
        );
        assert_eq!(manager.processes_ever_created(), 0);
    }

    #[tokio::test]
    async fn test_dispose_is_idempotent() {
        let document = StaticDocument::new("let x;let x;");
        let linter = DocumentLinter::new(document.clone(), demo_manager());

        linter.editor_changed_visibility().await.unwrap();
        linter.dispose().await;
        linter.dispose().await;

        assert_eq!(linter.phase().await, LinterPhase::Disposed);
        assert!(document.diagnostics.lock().unwrap().is_empty());
    }
}
