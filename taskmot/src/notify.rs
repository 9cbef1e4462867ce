//! Operator error notifications.
//!
//! Executor-reported error strings are surfaced to the operator, not returned
//! as call failures.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

/// Receives formatted operator error messages.
pub trait OperatorNotifier: Send + Sync {
    fn operator_error(&self, message: &str);
}

/// Logs operator errors through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl OperatorNotifier for TracingNotifier {
    fn operator_error(&self, message: &str) {
        error!(target: "operator", "{message}");
    }
}

/// Keeps every message in memory. Cloned handles share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct CollectingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Drain and return received messages.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl OperatorNotifier for CollectingNotifier {
    fn operator_error(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_notifier_shares_buffer() {
        let a = CollectingNotifier::new();
        let b = a.clone();
        b.operator_error("joint 0 following error");
        assert_eq!(a.messages(), vec!["joint 0 following error".to_string()]);
        assert_eq!(a.take().len(), 1);
        assert!(b.messages().is_empty());
    }
}
