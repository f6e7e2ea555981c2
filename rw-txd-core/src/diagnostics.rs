//! Warning sink used for recoverable anomalies
//!
//! Codecs never fail on things like mismatched GS registers or over-long
//! texture names; they push a warning instead. A [`Diagnostics`] handle is
//! threaded through every codec call, logs each warning through `tracing`
//! and keeps a copy so callers can report them after a load.

use std::sync::{Arc, Mutex};

/// Receiver for warning messages. Must never block or fail.
pub trait WarningSink: Send + Sync {
    fn push_warning(&self, message: String);
}

/// Forwards warnings to `tracing::warn!`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingWarnings;

impl WarningSink for TracingWarnings {
    fn push_warning(&self, message: String) {
        tracing::warn!(target: "rw_txd", "{}", message);
    }
}

/// Stores warnings in memory
#[derive(Debug, Default)]
pub struct CollectingWarnings {
    messages: Mutex<Vec<String>>,
}

impl CollectingWarnings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the messages pushed so far
    pub fn messages(&self) -> Vec<String> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.messages().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        match self.messages.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl WarningSink for CollectingWarnings {
    fn push_warning(&self, message: String) {
        match self.messages.lock() {
            Ok(mut guard) => guard.push(message),
            Err(poisoned) => poisoned.into_inner().push(message),
        }
    }
}

/// Diagnostics handle passed into codecs
///
/// Cloning is cheap; clones share the recorded warnings and the forward sink.
#[derive(Clone)]
pub struct Diagnostics {
    recorded: Arc<CollectingWarnings>,
    forward: Option<Arc<dyn WarningSink>>,
    warning_level: u8,
    ignore_secure_warnings: bool,
}

impl std::fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Diagnostics")
            .field("warnings", &self.recorded.len())
            .field("warning_level", &self.warning_level)
            .field("ignore_secure_warnings", &self.ignore_secure_warnings)
            .finish()
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Diagnostics {
    /// Create a handle that logs through tracing and records warnings
    pub fn new(warning_level: u8) -> Self {
        Self {
            recorded: Arc::new(CollectingWarnings::new()),
            forward: None,
            warning_level,
            ignore_secure_warnings: false,
        }
    }

    /// Also forward every warning to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn WarningSink>) -> Self {
        self.forward = Some(sink);
        self
    }

    pub fn with_ignore_secure_warnings(mut self, ignore: bool) -> Self {
        self.ignore_secure_warnings = ignore;
        self
    }

    /// Engine warning level, 0 silences register checks
    pub fn warning_level(&self) -> u8 {
        self.warning_level
    }

    /// Whether checks with the given threshold should report
    pub fn reports_at(&self, threshold: u8) -> bool {
        self.warning_level >= threshold
    }

    pub fn push_warning(&self, message: impl Into<String>) {
        let message = message.into();
        TracingWarnings.push_warning(message.clone());
        if let Some(sink) = &self.forward {
            sink.push_warning(message.clone());
        }
        self.recorded.push_warning(message);
    }

    /// Warning about an unimportant conversion, such as a truncated name
    pub fn push_secure_warning(&self, message: impl Into<String>) {
        if !self.ignore_secure_warnings {
            self.push_warning(message);
        }
    }

    /// Warning only reported when the warning level reaches `threshold`
    pub fn push_leveled_warning(&self, threshold: u8, message: impl Into<String>) {
        if self.reports_at(threshold) {
            self.push_warning(message);
        }
    }

    pub fn warnings(&self) -> Vec<String> {
        self.recorded.messages()
    }

    pub fn warning_count(&self) -> usize {
        self.recorded.len()
    }

    pub fn clear(&self) {
        self.recorded.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingWarnings::new();
        sink.push_warning("first".to_string());
        sink.push_warning("second".to_string());
        assert_eq!(sink.messages(), vec!["first", "second"]);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[test]
    fn test_diagnostics_forward_and_record() {
        let forward = Arc::new(CollectingWarnings::new());
        let diag = Diagnostics::new(3).with_sink(forward.clone());
        let clone = diag.clone();

        clone.push_warning("register mismatch");
        assert_eq!(diag.warning_count(), 1);
        assert_eq!(forward.messages(), vec!["register mismatch"]);
    }

    #[test]
    fn test_leveled_warnings() {
        let diag = Diagnostics::new(1);
        diag.push_leveled_warning(3, "TEX0 mismatch");
        diag.push_leveled_warning(1, "MIPTBP1 mismatch");
        assert_eq!(diag.warnings(), vec!["MIPTBP1 mismatch"]);
    }

    #[test]
    fn test_secure_warnings_suppressed() {
        let diag = Diagnostics::new(3).with_ignore_secure_warnings(true);
        diag.push_secure_warning("name truncated");
        assert_eq!(diag.warning_count(), 0);
    }
}
