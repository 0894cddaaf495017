//! Error aggregation for one logical request

use std::fmt;
use tracing::error;

/// Append-only, ordered log of the errors a request ran into
#[derive(Debug, Clone, Default)]
pub struct ErrorLog {
    entries: Vec<String>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error. Empty messages are logged but not kept.
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("TIDAL: {}", message);
        if !message.is_empty() {
            self.entries.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

impl fmt::Display for ErrorLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.entries.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_order_and_joins() {
        let mut log = ErrorLog::new();
        log.push("first");
        log.push(String::from("second"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.to_string(), "first\nsecond");
    }

    #[test]
    fn test_skips_empty_messages() {
        let mut log = ErrorLog::new();
        log.push("");
        assert!(log.is_empty());
    }
}
