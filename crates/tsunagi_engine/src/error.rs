//! Engine boundary error types.

use thiserror::Error;

/// The single failure mode of every engine operation.
///
/// The worker process hosting the engine died before the operation could
/// complete. The operation had no observable effect on the engine-side
/// document; whatever state the worker held is gone with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("lint engine worker process crashed")]
pub struct ProcessCrashed;
