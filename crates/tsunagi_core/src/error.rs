//! Orchestrator error types.

use thiserror::Error;

/// Errors surfaced to callers of [`DocumentLinter`](crate::DocumentLinter).
///
/// A worker crash that recovery fully absorbs is never surfaced; the
/// operation resolves successfully once a lint lands on a fresh worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinterError {
    /// The engine crashed before the operation produced a lint and recovery
    /// could not immediately absorb it. The previously published
    /// diagnostics are untouched and the linter remains usable.
    #[error("linting engine crashed before producing diagnostics")]
    LintingCrashed,

    /// The linter was disposed while the operation was pending.
    #[error("document linter was disposed")]
    Disposed,
}
