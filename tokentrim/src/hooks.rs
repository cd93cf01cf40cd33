//! Caller-supplied collaborators: progress observer and install consent.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;

/// Receives short human-readable status lines during detection and install.
///
/// Purely observational. A panicking observer is caught and logged; it never
/// fails the operation that reported to it.
pub trait ProgressObserver: Send + Sync {
    fn report(&self, message: &str);
}

impl<F> ProgressObserver for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

pub(crate) fn notify(observer: Option<&dyn ProgressObserver>, message: &str) {
    tracing::debug!(progress = message);
    let Some(observer) = observer else {
        return;
    };
    if std::panic::catch_unwind(AssertUnwindSafe(|| observer.report(message))).is_err() {
        tracing::warn!(progress = message, "progress observer panicked; ignored");
    }
}

/// Asked once per `initialize` when the dependency is missing. Only `true`
/// lets the bridge run the installer.
#[async_trait]
pub trait InstallConsent: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Fixed answer, for non-interactive hosts (`--yes`) and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticConsent(pub bool);

#[async_trait]
impl InstallConsent for StaticConsent {
    async fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn closure_observer_receives_messages() {
        let seen = Mutex::new(Vec::new());
        let observer = |m: &str| seen.lock().unwrap().push(m.to_string());
        notify(Some(&observer), "Detecting Python...");
        notify(None, "dropped");
        assert_eq!(*seen.lock().unwrap(), vec!["Detecting Python...".to_string()]);
    }

    #[test]
    fn panicking_observer_is_contained() {
        let observer = |_: &str| panic!("observer bug");
        notify(Some(&observer), "Installing llmlingua...");
    }

    #[tokio::test]
    async fn static_consent_answers_fixed() {
        assert!(StaticConsent(true).confirm("install?").await);
        assert!(!StaticConsent(false).confirm("install?").await);
    }
}
