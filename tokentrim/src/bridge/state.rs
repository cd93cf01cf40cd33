//! Bridge lifecycle states and the transitions between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the bridge is in its lifecycle.
///
/// Written only by `Bridge::initialize`. `optimize` runs only in `Ready`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    /// `initialize` has not run yet.
    #[default]
    Uninitialized,
    /// Probing candidate interpreters.
    Detecting,
    /// Interpreter found, dependency missing; waiting on the consent hook.
    AwaitingInstallConsent,
    /// `pip install` is running.
    Installing,
    /// Interpreter cached and dependency importable.
    Ready,
    /// No interpreter, consent declined, or install failed. Terminal until the
    /// next `initialize`.
    Unavailable,
}

impl BridgeState {
    /// Whether `self -> next` is a legal step.
    ///
    /// Forward steps only, except that a settled bridge (`Ready` or
    /// `Unavailable`) may start over at `Detecting`.
    pub fn can_transition_to(self, next: BridgeState) -> bool {
        use BridgeState::*;
        matches!(
            (self, next),
            (Uninitialized, Detecting)
                | (Ready, Detecting)
                | (Unavailable, Detecting)
                | (Detecting, Ready)
                | (Detecting, Unavailable)
                | (Detecting, AwaitingInstallConsent)
                | (AwaitingInstallConsent, Installing)
                | (AwaitingInstallConsent, Unavailable)
                | (Installing, Ready)
                | (Installing, Unavailable)
        )
    }

    /// `Ready` or `Unavailable`: `initialize` has finished.
    pub fn is_settled(self) -> bool {
        matches!(self, BridgeState::Ready | BridgeState::Unavailable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BridgeState::Uninitialized => "uninitialized",
            BridgeState::Detecting => "detecting",
            BridgeState::AwaitingInstallConsent => "awaiting_install_consent",
            BridgeState::Installing => "installing",
            BridgeState::Ready => "ready",
            BridgeState::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
