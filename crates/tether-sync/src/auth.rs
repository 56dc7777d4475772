//! Escalation of repeated authorization failures during polling.

use tether_core::TransmissionResponse;

/// Consecutive unauthorized poll responses that flag the connection as lost.
pub(crate) const UNAUTHORIZED_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthTransition {
    Unchanged,
    Lost { consecutive: u32 },
    Restored,
}

#[derive(Debug, Default)]
pub(crate) struct AuthTracker {
    consecutive: u32,
}

impl AuthTracker {
    /// Feed one torrent-list outcome. `flagged` is the current connection-error
    /// flag; a transition is reported only when the flag should change.
    ///
    /// Transient failures neither extend nor break the unauthorized streak.
    pub(crate) const fn observe(
        &mut self,
        outcome: TransmissionResponse,
        flagged: bool,
    ) -> AuthTransition {
        match outcome {
            TransmissionResponse::Success => {
                self.consecutive = 0;
                if flagged {
                    AuthTransition::Restored
                } else {
                    AuthTransition::Unchanged
                }
            }
            TransmissionResponse::Unauthorized => {
                self.consecutive = self.consecutive.saturating_add(1);
                if !flagged && self.consecutive >= UNAUTHORIZED_THRESHOLD {
                    AuthTransition::Lost {
                        consecutive: self.consecutive,
                    }
                } else {
                    AuthTransition::Unchanged
                }
            }
            TransmissionResponse::ConfigError | TransmissionResponse::Failed => {
                AuthTransition::Unchanged
            }
        }
    }

    pub(crate) const fn reset(&mut self) {
        self.consecutive = 0;
    }
}
