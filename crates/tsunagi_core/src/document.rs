//! Editor-side document surface consumed by the linter.

use tsunagi_engine::Diagnostic;

/// The orchestrator's view of one open editor document.
///
/// The editor owns the canonical text. The linter reads it only when first
/// materializing an engine-side document or when recovering from a crash;
/// between those points the engine is driven purely by change lists, because
/// a later edit may already have mutated the editor text by the time an
/// earlier change is processed.
pub trait LinterDocument: Send + Sync {
    /// Current editor text, reflecting all edits applied so far.
    fn text(&self) -> String;

    /// Replaces the document's full diagnostic set.
    fn set_diagnostics(&self, diagnostics: Vec<Diagnostic>);

    /// Clears the document's diagnostic set.
    fn remove_diagnostics(&self);
}
