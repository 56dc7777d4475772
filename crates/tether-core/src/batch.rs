//! Aggregation of per-item failures in batch operations into one summary.

use serde::Serialize;

/// Number of individual failure lines kept in a summary.
pub const DEFAULT_BATCH_DETAIL_LIMIT: usize = 5;

/// Outcome tally for a batch of independent calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    total: usize,
    succeeded: usize,
    failed: usize,
    details: Vec<String>,
    detail_limit: usize,
}

impl Default for BatchSummary {
    fn default() -> Self {
        Self::with_limit(DEFAULT_BATCH_DETAIL_LIMIT)
    }
}

impl BatchSummary {
    /// Summary keeping at most `detail_limit` failure lines.
    #[must_use]
    pub const fn with_limit(detail_limit: usize) -> Self {
        Self {
            total: 0,
            succeeded: 0,
            failed: 0,
            details: Vec::new(),
            detail_limit,
        }
    }

    /// Count one success.
    pub const fn record_success(&mut self) {
        self.total += 1;
        self.succeeded += 1;
    }

    /// Count one failure, keeping its message while under the detail limit.
    pub fn record_failure(&mut self, label: &str, message: &str) {
        self.total += 1;
        self.failed += 1;
        if self.details.len() < self.detail_limit {
            self.details.push(format!("{label}: {message}"));
        }
    }

    /// Items processed.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.total
    }

    /// Items that succeeded.
    #[must_use]
    pub const fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Items that failed.
    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    /// Whether any item failed.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Kept failure lines.
    #[must_use]
    pub fn details(&self) -> &[String] {
        &self.details
    }

    /// One-line summary suitable for an alert title.
    #[must_use]
    pub fn brief(&self) -> String {
        if self.failed == 0 {
            format!("{} of {} succeeded", self.succeeded, self.total)
        } else {
            format!("{} of {} failed", self.failed, self.total)
        }
    }

    /// Multi-line detail listing the kept failures and how many were elided.
    #[must_use]
    pub fn detail(&self) -> String {
        let mut lines = self.details.clone();
        let hidden = self.failed.saturating_sub(self.details.len());
        if hidden > 0 {
            lines.push(format!("…and {hidden} more"));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_caps_detail_lines() {
        let mut summary = BatchSummary::with_limit(2);
        summary.record_success();
        for index in 0..4 {
            summary.record_failure(&format!("file-{index}.torrent"), "invalid metainfo");
        }
        assert_eq!(summary.total(), 5);
        assert_eq!(summary.failed(), 4);
        assert_eq!(summary.details().len(), 2);
        assert_eq!(summary.brief(), "4 of 5 failed");
        assert!(summary.detail().ends_with("…and 2 more"));
    }

    #[test]
    fn clean_batch_reports_success() {
        let mut summary = BatchSummary::default();
        summary.record_success();
        assert!(!summary.has_failures());
        assert_eq!(summary.brief(), "1 of 1 succeeded");
        assert!(summary.detail().is_empty());
    }
}
