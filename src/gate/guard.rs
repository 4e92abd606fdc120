//! Route guard for the settings area.
//!
//! Two states: locked renders a redirect to the settings entry point carrying
//! the requested path, unlocked renders the wrapped subtree. The guard only
//! reads the gate; the settings entry page owns "return to origin".

use super::{GateWatch, SettingsGate};
use crate::notify::{Notifier, Toast};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Where locked requests are sent to enter the settings password.
pub const SETTINGS_ENTRY_PATH: &str = "/settings";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    Redirect {
        to: String,
        /// Originally requested path, handed to the entry page.
        from: String,
    },
}

pub struct ProtectedRoute {
    gate: SettingsGate,
    notifier: Arc<dyn Notifier>,
    redirect_to: String,
    warned: AtomicBool,
}

impl std::fmt::Debug for ProtectedRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtectedRoute")
            .field("redirect_to", &self.redirect_to)
            .field("warned", &self.warned.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl ProtectedRoute {
    #[must_use]
    pub fn new(gate: SettingsGate, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            gate,
            notifier,
            redirect_to: SETTINGS_ENTRY_PATH.to_string(),
            warned: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_redirect(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = path.into();
        self
    }

    /// Decides what to render for `path` given the gate's current value.
    pub fn evaluate(&self, path: &str) -> GuardDecision {
        self.decide(self.gate.is_unlocked(), path)
    }

    fn decide(&self, unlocked: bool, path: &str) -> GuardDecision {
        if unlocked {
            return GuardDecision::Render;
        }

        // One warning per guard instance, however often it re-renders.
        if !self.warned.swap(true, Ordering::AcqRel) {
            self.notifier.notify(
                Toast::new(
                    "Restricted area",
                    "Enter the settings password to access this page.",
                )
                .destructive(),
            );
        }

        debug!(from = %path, to = %self.redirect_to, "settings locked, redirecting");
        GuardDecision::Redirect {
            to: self.redirect_to.clone(),
            from: path.to_string(),
        }
    }

    /// Renders the current decision for `path`, then re-renders on every gate
    /// change until the gate stops publishing.
    pub async fn run<F>(&self, path: &str, mut render: F)
    where
        F: FnMut(GuardDecision),
    {
        let mut watch: GateWatch = self.gate.watch();
        render(self.decide(watch.is_unlocked(), path));

        while let Some(unlocked) = watch.changed().await {
            render(self.decide(unlocked, path));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SettingsStore;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Toast>>);

    impl Notifier for Recorder {
        fn notify(&self, toast: Toast) {
            self.0.lock().unwrap().push(toast);
        }
    }

    fn setup() -> (SettingsGate, Arc<Recorder>, ProtectedRoute) {
        let gate = SettingsGate::new(SettingsStore::in_memory());
        let recorder = Arc::new(Recorder::default());
        let guard = ProtectedRoute::new(gate.clone(), recorder.clone());
        (gate, recorder, guard)
    }

    #[test]
    fn locked_redirects_with_origin() {
        let (_gate, _recorder, guard) = setup();
        assert_eq!(
            guard.evaluate("/settings/payments"),
            GuardDecision::Redirect {
                to: "/settings".to_string(),
                from: "/settings/payments".to_string(),
            }
        );
    }

    #[test]
    fn repeated_locked_renders_warn_once() {
        let (_gate, recorder, guard) = setup();

        let first = guard.evaluate("/settings/users");
        let second = guard.evaluate("/settings/users");

        assert_eq!(first, second);
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn each_guard_instance_has_its_own_latch() {
        let (gate, recorder, guard) = setup();
        let other = ProtectedRoute::new(gate, recorder.clone()).with_redirect("/unlock");

        guard.evaluate("/a");
        assert_eq!(
            other.evaluate("/b"),
            GuardDecision::Redirect {
                to: "/unlock".to_string(),
                from: "/b".to_string(),
            }
        );
        assert_eq!(recorder.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn unlocked_renders_without_warning() -> crate::Result<()> {
        let (gate, recorder, guard) = setup();
        gate.unlock()?;

        assert_eq!(guard.evaluate("/settings/users"), GuardDecision::Render);
        assert!(recorder.0.lock().unwrap().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn run_follows_gate_changes() -> crate::Result<()> {
        let (gate, recorder, guard) = setup();
        let guard = Arc::new(guard);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let task = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move {
                guard
                    .run("/settings/hours", move |decision| {
                        let _ = tx.send(decision);
                    })
                    .await;
            })
        };

        let wait = Duration::from_secs(1);
        assert!(matches!(
            timeout(wait, rx.recv()).await.ok().flatten(),
            Some(GuardDecision::Redirect { .. })
        ));

        gate.unlock()?;
        assert_eq!(
            timeout(wait, rx.recv()).await.ok().flatten(),
            Some(GuardDecision::Render)
        );

        gate.lock()?;
        assert!(matches!(
            timeout(wait, rx.recv()).await.ok().flatten(),
            Some(GuardDecision::Redirect { .. })
        ));

        // Relocking does not warn again.
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
        task.abort();
        Ok(())
    }
}
