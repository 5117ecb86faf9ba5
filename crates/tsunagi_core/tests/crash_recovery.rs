//! Crash recovery tests: absorbed crashes, surfaced crashes, worker
//! replacement accounting, and the exhaustive fault-injection harness.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tsunagi_core::{
    DocumentLinter, DocumentProcessManager, ExhaustiveCoinFlips, LinterError, LinterOptions,
};
use tsunagi_engine::{
    DemoEngineLauncher, EngineOp, FaultInjector, ProcessCrashed, WorkerId,
};

// Arc, Mutex, Diagnostic, Position, and TextChange come in with the shared
// helpers.
include!("common_mod.rs");

/// Crashes the next occurrence of one operation kind, once armed.
struct CrashNext {
    op: EngineOp,
    armed: AtomicBool,
}

impl CrashNext {
    fn armed(op: EngineOp) -> Arc<Self> {
        Arc::new(Self {
            op,
            armed: AtomicBool::new(true),
        })
    }

    fn disarmed(op: EngineOp) -> Arc<Self> {
        Arc::new(Self {
            op,
            armed: AtomicBool::new(false),
        })
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl FaultInjector for CrashNext {
    fn maybe_inject_fault(&self, _worker: WorkerId, op: EngineOp) -> Result<(), ProcessCrashed> {
        if op == self.op && self.armed.swap(false, Ordering::SeqCst) {
            return Err(ProcessCrashed);
        }
        Ok(())
    }
}

/// Crashes every engine operation unconditionally.
struct CrashAlways;

impl FaultInjector for CrashAlways {
    fn maybe_inject_fault(&self, _worker: WorkerId, _op: EngineOp) -> Result<(), ProcessCrashed> {
        Err(ProcessCrashed)
    }
}

/// Draws one enumerated coin flip per engine operation; `true` crashes.
struct CoinFlipInjector {
    flips: Arc<Mutex<ExhaustiveCoinFlips>>,
    injected: AtomicU64,
}

impl CoinFlipInjector {
    fn new(flips: Arc<Mutex<ExhaustiveCoinFlips>>) -> Arc<Self> {
        Arc::new(Self {
            flips,
            injected: AtomicU64::new(0),
        })
    }

    fn injected(&self) -> u64 {
        self.injected.load(Ordering::SeqCst)
    }
}

impl FaultInjector for CoinFlipInjector {
    fn maybe_inject_fault(&self, _worker: WorkerId, _op: EngineOp) -> Result<(), ProcessCrashed> {
        if self.flips.lock().unwrap().next_coin_flip() {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(ProcessCrashed);
        }
        Ok(())
    }
}

fn manager_with(injector: Arc<dyn FaultInjector>) -> Arc<DocumentProcessManager> {
    Arc::new(DocumentProcessManager::with_fault_injector(
        Box::new(DemoEngineLauncher),
        injector,
    ))
}

#[tokio::test]
async fn test_edit_crash_is_absorbed_on_a_fresh_worker() {
    let injector = CrashNext::disarmed(EngineOp::ApplyChange);
    let manager = manager_with(injector.clone());
    let document = FakeDocument::new("let x;let x;\n");
    let linter = DocumentLinter::new(document.clone(), manager.clone());

    linter.editor_changed_visibility().await.unwrap();
    assert_eq!(
        document.diagnostic_messages(),
        ["redeclaration of variable: x"]
    );

    injector.arm();
    let change = document.apply_change(TextChange::insert(Position::new(1, 0), "let y;let y;"));
    linter
        .text_changed(std::slice::from_ref(&change))
        .await
        .unwrap();

    // The crash is invisible to the caller; the fresh worker linted the
    // post-change text.
    assert_eq!(
        document.diagnostic_messages(),
        [
            "redeclaration of variable: x",
            "redeclaration of variable: y",
        ]
    );
    assert_eq!(manager.processes_ever_created(), 2);
}

#[tokio::test]
async fn test_recovery_does_not_reapply_changes_queued_behind_the_crash() {
    let injector = CrashNext::disarmed(EngineOp::ApplyChange);
    let manager = manager_with(injector.clone());
    let document = FakeDocument::new("let a;\n");
    let linter = DocumentLinter::new(document.clone(), manager.clone());

    linter.editor_changed_visibility().await.unwrap();
    assert!(document.diagnostics().is_empty());

    // The editor applies three edits back to back: every one is already in
    // its buffer before the first notification is polled.
    let changes = [
        document.apply_change(TextChange::insert(Position::new(1, 0), "let a;\n")),
        document.apply_change(TextChange::insert(Position::new(2, 0), "let b;\n")),
        document.apply_change(TextChange::insert(Position::new(3, 0), "let b;\n")),
    ];

    injector.arm();
    let (first, second, third) = tokio::join!(
        linter.text_changed(std::slice::from_ref(&changes[0])),
        linter.text_changed(std::slice::from_ref(&changes[1])),
        linter.text_changed(std::slice::from_ref(&changes[2])),
    );
    first.unwrap();
    second.unwrap();
    third.unwrap();

    // The first notification crashed and re-materialized from a text that
    // already contains all three edits. The queued notifications must not
    // submit their change lists on top of that snapshot: each edit lands
    // exactly once, so `b` is redeclared once, not twice.
    assert_eq!(
        document.diagnostic_messages(),
        [
            "redeclaration of variable: a",
            "redeclaration of variable: b",
        ]
    );
    assert_eq!(manager.processes_ever_created(), 2);
}

#[tokio::test]
async fn test_open_crash_is_surfaced_and_leaves_diagnostics_untouched() {
    let injector = CrashNext::disarmed(EngineOp::Lint);
    let manager = manager_with(injector.clone());
    let document = FakeDocument::new("let x;let x;");
    let linter = DocumentLinter::new(document.clone(), manager.clone());

    linter.editor_changed_visibility().await.unwrap();
    let published = document.diagnostics();
    assert_eq!(published.len(), 1);

    injector.arm();
    assert_eq!(
        linter.editor_changed_visibility().await,
        Err(LinterError::LintingCrashed)
    );
    assert_eq!(document.diagnostics(), published);

    // The linter stays usable: the next call recovers on a fresh worker.
    linter.editor_changed_visibility().await.unwrap();
    assert_eq!(document.diagnostics(), published);
    assert_eq!(manager.processes_ever_created(), 2);
}

#[tokio::test]
async fn test_crash_on_very_first_open_surfaces_with_no_diagnostics() {
    let injector = CrashNext::armed(EngineOp::CreateDocument);
    let manager = manager_with(injector);
    let document = FakeDocument::new("let x;let x;");
    let linter = DocumentLinter::new(document.clone(), manager);

    assert_eq!(
        linter.editor_changed_visibility().await,
        Err(LinterError::LintingCrashed)
    );
    assert!(document.diagnostics().is_empty());
}

#[tokio::test]
async fn test_recovery_cap_surfaces_after_repeated_crashes() {
    let manager = manager_with(Arc::new(CrashAlways));
    let document = FakeDocument::new("let x;");
    let linter = DocumentLinter::with_options(
        document.clone(),
        manager.clone(),
        LinterOptions::with_recovery_cap(3),
    );

    let change = document.apply_change(TextChange::insert(Position::new(0, 6), "let x;"));
    assert_eq!(
        linter.text_changed(std::slice::from_ref(&change)).await,
        Err(LinterError::LintingCrashed)
    );

    // One worker per attempt: the initial try plus three recoveries, each
    // on a fresh worker, each crashing at createDocument.
    assert_eq!(manager.processes_ever_created(), 4);
    assert!(document.diagnostics().is_empty());
}

#[tokio::test]
async fn test_crash_during_dispose_surfaces_as_disposed() {
    let manager = manager_with(Arc::new(CrashAlways));
    let document = FakeDocument::new("let x;");
    let linter = DocumentLinter::new(document.clone(), manager);

    let change = document.apply_change(TextChange::insert(Position::new(0, 6), "let x;"));
    let (edit_result, ()) = tokio::join!(
        linter.text_changed(std::slice::from_ref(&change)),
        linter.dispose(),
    );

    // The in-flight edit observes the crash after dispose has begun; it
    // settles disposed, not crashed, and stops retrying.
    assert_eq!(edit_result, Err(LinterError::Disposed));
}

#[tokio::test]
async fn test_per_document_crash_does_not_disturb_other_linters() {
    let injector = CrashNext::armed(EngineOp::Lint);
    let manager = manager_with(injector);
    let first_doc = FakeDocument::new("let x;let x;");
    let second_doc = FakeDocument::new("let y;let y;");
    let first = DocumentLinter::new(first_doc.clone(), manager.clone());
    let second = DocumentLinter::new(second_doc.clone(), manager.clone());

    // The first linter's lint is the first lint to reach the worker; the
    // injected crash rejects its open.
    assert_eq!(
        first.editor_changed_visibility().await,
        Err(LinterError::LintingCrashed)
    );
    assert!(first_doc.diagnostics().is_empty());

    second.editor_changed_visibility().await.unwrap();
    assert_eq!(
        second_doc.diagnostic_messages(),
        ["redeclaration of variable: y"]
    );
    assert_eq!(manager.processes_ever_created(), 2);
}

#[tokio::test]
async fn test_exhaustive_fault_injection_over_open_and_edit() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let x_redeclaration = "redeclaration of variable: x".to_string();
    let y_redeclaration = "redeclaration of variable: y".to_string();

    let flips = Arc::new(Mutex::new(ExhaustiveCoinFlips::new()));
    let mut laps = 0u32;
    let mut outcomes = HashSet::new();

    loop {
        let injector = CoinFlipInjector::new(Arc::clone(&flips));
        let manager = Arc::new(DocumentProcessManager::with_fault_injector(
            Box::new(DemoEngineLauncher),
            injector.clone(),
        ));
        let document = FakeDocument::new("let x;let x;\n");
        // Recovery is capped so that the schedule tree is finite: with an
        // unbounded retry every schedule eventually converges to a
        // successful lint and the depth-first enumeration never closes.
        let linter = DocumentLinter::with_options(
            document.clone(),
            Arc::clone(&manager),
            LinterOptions::with_recovery_cap(2),
        );

        let open_result = linter.editor_changed_visibility().await;
        match &open_result {
            Ok(()) => assert_eq!(document.diagnostic_messages(), [x_redeclaration.clone()]),
            Err(error) => {
                assert_eq!(*error, LinterError::LintingCrashed);
                assert!(document.diagnostics().is_empty());
            }
        }

        let change =
            document.apply_change(TextChange::insert(Position::new(1, 0), "let y;let y;"));
        let edit_result = linter.text_changed(std::slice::from_ref(&change)).await;

        // Admissible final states: nothing published (crashed on open and
        // the edit never linted), the open's lint only (crashed before the
        // edit linted), or full recovery.
        let messages = document.diagnostic_messages();
        let outcome = if messages.is_empty() {
            assert!(open_result.is_err() && edit_result.is_err());
            "none"
        } else if messages == [x_redeclaration.clone()] {
            assert!(open_result.is_ok() && edit_result.is_err());
            "open-only"
        } else if messages == [x_redeclaration.clone(), y_redeclaration.clone()] {
            assert!(edit_result.is_ok());
            "recovered"
        } else {
            panic!("inadmissible diagnostics after lap {laps}: {messages:?}");
        };
        outcomes.insert(outcome);

        // Workers are only ever replaced after a crash.
        assert!(manager.processes_ever_created() <= 1 + injector.injected());

        laps += 1;
        assert!(laps < 1_000, "schedule enumeration failed to terminate");
        let mut flips = flips.lock().unwrap();
        flips.lap();
        if flips.is_done() {
            break;
        }
    }

    // The enumeration explored the whole schedule tree and hit every
    // admissible outcome along the way.
    assert_eq!(laps, 45);
    assert_eq!(outcomes.len(), 3);
}
