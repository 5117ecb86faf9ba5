//! Worker registry shared by the per-document linters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use tokio::sync::Mutex;
use tracing::{debug, info};

use tsunagi_engine::{EngineLauncher, FaultInjector, NoFaults, ProcessCrashed, WorkerHandle, WorkerId};

/// Hands out a shared [`WorkerHandle`] to one or more document linters.
///
/// A worker is provisioned lazily on the first request and again after any
/// observed crash. The manager never returns a handle it has seen crash;
/// linters still holding a stale handle observe the crash on their next
/// call and run their own recovery.
pub struct DocumentProcessManager {
    launcher: Box<dyn EngineLauncher>,
    injector: Arc<dyn FaultInjector>,
    /// Ownership of the worker is in the linters; this reference only
    /// answers "what is the current healthy worker".
    current: Mutex<Weak<WorkerHandle>>,
    processes_ever_created: AtomicU64,
}

impl fmt::Debug for DocumentProcessManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentProcessManager")
            .field("processes_ever_created", &self.processes_ever_created())
            .finish_non_exhaustive()
    }
}

impl DocumentProcessManager {
    /// Creates a manager with no fault injection.
    pub fn new(launcher: Box<dyn EngineLauncher>) -> Self {
        Self::with_fault_injector(launcher, Arc::new(NoFaults))
    }

    /// Creates a manager whose workers consult `injector` at the start of
    /// every engine operation.
    pub fn with_fault_injector(
        launcher: Box<dyn EngineLauncher>,
        injector: Arc<dyn FaultInjector>,
    ) -> Self {
        Self {
            launcher,
            injector,
            current: Mutex::new(Weak::new()),
            processes_ever_created: AtomicU64::new(0),
        }
    }

    /// Returns the current healthy worker, provisioning a fresh one if the
    /// previous worker crashed or was dropped by its last holder.
    ///
    /// Concurrent callers receive the same handle while it stays healthy.
    pub async fn acquire_worker(&self) -> Result<Arc<WorkerHandle>, ProcessCrashed> {
        let mut current = self.current.lock().await;
        if let Some(worker) = current.upgrade()
            && !worker.is_crashed()
        {
            return Ok(worker);
        }

        let engine = self.launcher.launch().await?;
        let number = self.processes_ever_created.fetch_add(1, Ordering::SeqCst) + 1;
        let worker = Arc::new(WorkerHandle::new(
            WorkerId::new(number),
            engine,
            Arc::clone(&self.injector),
        ));
        info!("provisioned lint {}", worker.id());
        *current = Arc::downgrade(&worker);
        Ok(worker)
    }

    /// Records that `handle` crashed.
    ///
    /// The handle becomes permanently unusable and is never handed out
    /// again; the next [`acquire_worker`](Self::acquire_worker) provisions
    /// a replacement.
    pub async fn report_crashed(&self, handle: &Arc<WorkerHandle>) {
        handle.mark_crashed();
        let mut current = self.current.lock().await;
        if let Some(active) = current.upgrade()
            && Arc::ptr_eq(&active, handle)
        {
            *current = Weak::new();
        }
        debug!("{} reported crashed", handle.id());
    }

    /// Number of workers ever provisioned by this manager.
    ///
    /// Monotonically non-decreasing; stays at `1 + observed crashes` as
    /// long as some linter keeps each healthy worker alive.
    pub fn processes_ever_created(&self) -> u64 {
        self.processes_ever_created.load(Ordering::SeqCst)
    }
}
