#![forbid(unsafe_code)]

use std::sync::{Arc, Mutex};

/// Collecting channel for conditions an operator should see but that must
/// not fail the request that observed them (best-effort audit writes,
/// mostly). Cloning shares the underlying buffer.
#[derive(Debug, Clone, Default)]
pub struct OperatorLog {
    alerts: Arc<Mutex<Vec<String>>>,
}

impl OperatorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alert(&self, message: impl Into<String>) {
        let mut alerts = self
            .alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        alerts.push(message.into());
    }

    pub fn alert_count(&self) -> usize {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn drain(&self) -> Vec<String> {
        let mut alerts = self
            .alerts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        std::mem::take(&mut *alerts)
    }
}
