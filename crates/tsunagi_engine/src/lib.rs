//! # tsunagi_engine
//!
//! Engine boundary for the tsunagi document linter.
//!
//! This crate provides:
//! - The wire types exchanged with a lint engine (diagnostics, text changes)
//! - The `LintEngine` trait an engine host implements
//! - The `WorkerHandle` wrapper with sticky crash semantics
//! - The fault-injection hook used by the test harness
//!
//! ## Architecture
//!
//! The engine proper runs out of process (a native library hosted in an
//! isolated runtime). This crate never talks to it directly; it defines the
//! seam. A [`WorkerHandle`] wraps one launched engine instance and funnels
//! every operation through a single failure mode, [`ProcessCrashed`]: the
//! first failing operation marks the handle, and every later operation on a
//! marked handle fails synchronously without reaching the engine.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tsunagi_engine::{DemoEngineLauncher, EngineLauncher, WorkerHandle, WorkerId};
//!
//! let engine = DemoEngineLauncher.launch().await?;
//! let worker = WorkerHandle::new(WorkerId::new(1), engine, injector);
//!
//! let doc = worker.create_document("let x;").await?;
//! let diagnostics = worker.lint(doc).await?;
//! ```

mod demo;
mod diagnostic;
mod engine;
mod error;
mod fault;
mod worker;

pub use demo::{DemoEngine, DemoEngineLauncher};
pub use diagnostic::{Diagnostic, Position, Range, Severity, TextChange};
pub use engine::{EngineDocId, EngineLauncher, LintEngine};
pub use error::ProcessCrashed;
pub use fault::{EngineOp, FaultInjector, NoFaults};
pub use worker::{WorkerHandle, WorkerId};
