//! # tsunagi_core
//!
//! Per-document lint orchestration between an editor and a crash-prone
//! out-of-process lint engine.
//!
//! This crate provides:
//! - The [`DocumentLinter`] state machine: serialized edits, relint after
//!   each change, transparent recovery when the worker crashes
//! - The [`DocumentProcessManager`] registry sharing one worker across
//!   documents
//! - The [`ExhaustiveCoinFlips`] enumerator driving the fault-injection
//!   test harness
//!
//! ## Example
//!
//! ```rust,ignore
//! use tsunagi_core::{DocumentLinter, DocumentProcessManager};
//! use tsunagi_engine::DemoEngineLauncher;
//!
//! let manager = Arc::new(DocumentProcessManager::new(Box::new(DemoEngineLauncher)));
//! let linter = DocumentLinter::new(document, manager);
//!
//! linter.editor_changed_visibility().await?;
//! linter.text_changed(&changes).await?;
//! linter.dispose().await;
//! ```

mod config;
mod document;
mod error;
mod exhaustive;
mod linter;
mod manager;

pub use config::LinterOptions;
pub use document::LinterDocument;
pub use error::LinterError;
pub use exhaustive::ExhaustiveCoinFlips;
pub use linter::{DocumentLinter, LinterPhase};
pub use manager::DocumentProcessManager;
