//! Orchestrator configuration.

/// Tuning options for a [`DocumentLinter`](crate::DocumentLinter).
#[derive(Debug, Clone, Default)]
pub struct LinterOptions {
    /// Cap on consecutive crash recoveries within a single operation.
    ///
    /// `None` (the default) retries on fresh workers without bound; an
    /// operation only keeps retrying while replacement workers keep
    /// crashing. With a cap, the operation surfaces
    /// [`LinterError::LintingCrashed`](crate::LinterError::LintingCrashed)
    /// once the cap is exhausted.
    pub max_recovery_attempts: Option<u32>,
}

impl LinterOptions {
    /// Options with recovery capped at `attempts` consecutive crashes.
    pub fn with_recovery_cap(attempts: u32) -> Self {
        Self {
            max_recovery_attempts: Some(attempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_uncapped() {
        assert_eq!(LinterOptions::default().max_recovery_attempts, None);
    }

    #[test]
    fn test_with_recovery_cap() {
        assert_eq!(
            LinterOptions::with_recovery_cap(8).max_recovery_attempts,
            Some(8)
        );
    }
}
