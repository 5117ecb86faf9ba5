//! Engine interface consumed across the worker boundary.
//!
//! This module provides the `LintEngine` trait which abstracts the worker
//! runtime, allowing different backends: an out-of-process native engine in
//! production, or the in-process [`DemoEngine`](crate::DemoEngine) in tests.

use std::fmt;

use async_trait::async_trait;

use crate::{Diagnostic, ProcessCrashed, TextChange};

/// Token by which a worker identifies one engine-side document.
///
/// Only meaningful to the worker that issued it; after that worker crashes
/// the token is garbage and must be discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineDocId(u64);

impl EngineDocId {
    /// Creates a document id. Engine implementations call this when they
    /// materialize a document; orchestration code only receives ids.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for EngineDocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// One linting engine instance, hosted by a worker.
///
/// Every operation is a suspension point and may fail with
/// [`ProcessCrashed`]. Implementations hold the engine-side documents; the
/// caller only holds [`EngineDocId`] tokens.
#[async_trait]
pub trait LintEngine: Send + Sync {
    /// Creates an engine-side document initialized to `text`.
    async fn create_document(&self, text: &str) -> Result<EngineDocId, ProcessCrashed>;

    /// Incrementally mutates the engine-side text.
    async fn apply_change(
        &self,
        doc: EngineDocId,
        change: &TextChange,
    ) -> Result<(), ProcessCrashed>;

    /// Returns diagnostics for the current engine-side text.
    async fn lint(&self, doc: EngineDocId) -> Result<Vec<Diagnostic>, ProcessCrashed>;

    /// Releases engine resources for the document.
    async fn destroy_document(&self, doc: EngineDocId) -> Result<(), ProcessCrashed>;
}

/// Provisions a fresh engine instance for a new worker.
///
/// Called by the process manager on first use and after every observed
/// crash. Each launch produces an engine with no memory of its
/// predecessors.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Launches a fresh engine instance.
    async fn launch(&self) -> Result<Box<dyn LintEngine>, ProcessCrashed>;
}
