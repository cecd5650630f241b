//! Runs active in this process
//!
//! Every run registers itself for its whole lifetime. The registration is a
//! drop guard, so a run whose task is aborted still disappears from the
//! registry; whatever it left `running` in the store is then an orphan.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use codescope_core::domain::analysis::{AnalysisId, CodebaseId};

use super::errors::OrchestratorError;

struct RunEntry {
    cancel: CancellationToken,
    /// Set once the run has claimed its codebase
    codebase: Option<CodebaseId>,
}

#[derive(Default)]
pub(crate) struct RunRegistry {
    runs: Mutex<HashMap<AnalysisId, RunEntry>>,
}

impl RunRegistry {
    /// Register a run; a second registration for the same analysis is refused.
    pub(crate) fn register(
        &self,
        analysis_id: AnalysisId,
        cancel: CancellationToken,
    ) -> Result<Registration<'_>, OrchestratorError> {
        let mut runs = self.lock();
        if runs.contains_key(&analysis_id) {
            return Err(OrchestratorError::AlreadyRunning(analysis_id));
        }
        runs.insert(
            analysis_id,
            RunEntry {
                cancel,
                codebase: None,
            },
        );
        Ok(Registration {
            registry: self,
            analysis_id,
        })
    }

    pub(crate) fn contains(&self, analysis_id: &AnalysisId) -> bool {
        self.lock().contains_key(analysis_id)
    }

    pub(crate) fn cancel_token(&self, analysis_id: &AnalysisId) -> Option<CancellationToken> {
        self.lock().get(analysis_id).map(|entry| entry.cancel.clone())
    }

    pub(crate) fn mark_holder(&self, analysis_id: &AnalysisId, codebase_id: CodebaseId) {
        if let Some(entry) = self.lock().get_mut(analysis_id) {
            entry.codebase = Some(codebase_id);
        }
    }

    /// Whether a live run in this process holds `codebase_id`
    pub(crate) fn holds(&self, codebase_id: &CodebaseId) -> bool {
        self.lock()
            .values()
            .any(|entry| entry.codebase.as_ref() == Some(codebase_id))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<AnalysisId, RunEntry>> {
        self.runs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes its run from the registry when dropped
pub(crate) struct Registration<'a> {
    registry: &'a RunRegistry,
    analysis_id: AnalysisId,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.analysis_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_is_exclusive_and_dropped() {
        let registry = RunRegistry::default();
        let id = AnalysisId::generate();

        let registration = registry.register(id, CancellationToken::new()).unwrap();
        assert!(registry.contains(&id));
        assert!(matches!(
            registry.register(id, CancellationToken::new()),
            Err(OrchestratorError::AlreadyRunning(dup)) if dup == id
        ));

        drop(registration);
        assert!(!registry.contains(&id));
        assert!(registry.register(id, CancellationToken::new()).is_ok());
    }

    #[test]
    fn test_holder_follows_registration() {
        let registry = RunRegistry::default();
        let id = AnalysisId::generate();
        let codebase = CodebaseId::generate();

        let registration = registry.register(id, CancellationToken::new()).unwrap();
        assert!(!registry.holds(&codebase));
        registry.mark_holder(&id, codebase);
        assert!(registry.holds(&codebase));

        drop(registration);
        assert!(!registry.holds(&codebase));
    }

    #[test]
    fn test_refused_registration_keeps_original_token() {
        let registry = RunRegistry::default();
        let id = AnalysisId::generate();
        let original = CancellationToken::new();

        let _registration = registry.register(id, original.clone()).unwrap();
        let _ = registry.register(id, CancellationToken::new());

        registry.cancel_token(&id).unwrap().cancel();
        assert!(original.is_cancelled());
    }
}
