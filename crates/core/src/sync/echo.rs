//! Pending-mutation token set used to suppress realtime self-echoes.

use std::collections::HashSet;
use std::sync::Mutex;

/// Tracks idempotency tokens of mutations this device has sent (or is about
/// to send) so the realtime feed consumer can skip notifications that merely
/// reflect our own writes.
///
/// This is a window-based heuristic, not a logical clock: the remote store
/// stays the arbiter of truth and a redundant apply is idempotent, so a
/// token released too early costs one wasted write, never divergence.
#[derive(Debug, Default)]
pub struct EchoSuppressor {
    pending: Mutex<HashSet<String>>,
}

impl EchoSuppressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_pending(&self, token: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(token.to_string());
        }
    }

    pub fn is_pending(&self, token: &str) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.contains(token))
            .unwrap_or(false)
    }

    pub fn clear_pending(&self, token: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.remove(token);
        }
    }

    /// Drop every tracked token. Called on logout.
    pub fn clear(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EchoSuppressor;

    #[test]
    fn marked_tokens_are_pending_until_cleared() {
        let echo = EchoSuppressor::new();
        echo.mark_pending("op-1");
        assert!(echo.is_pending("op-1"));
        assert!(!echo.is_pending("op-2"));

        echo.clear_pending("op-1");
        assert!(!echo.is_pending("op-1"));
    }

    #[test]
    fn clear_drops_all_tokens() {
        let echo = EchoSuppressor::new();
        echo.mark_pending("op-1");
        echo.mark_pending("op-2");
        echo.clear();
        assert!(!echo.is_pending("op-1"));
        assert!(!echo.is_pending("op-2"));
    }
}
