//! Observability hook for pipeline stages
//!
//! Stages never reach for process-wide state to report progress; they
//! emit a [`StageReport`] to an optional observer handed to them at
//! construction.

use std::sync::Arc;
use std::sync::Mutex;

/// Summary emitted by a stage once it completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub rows_in: usize,
    pub rows_out: usize,
    pub columns_out: usize,
}

impl StageReport {
    pub fn rows_dropped(&self) -> usize {
        self.rows_in.saturating_sub(self.rows_out)
    }
}

pub trait StageObserver: Send + Sync {
    fn stage_completed(&self, report: &StageReport);
}

/// Shared observer handle
pub type ObserverHandle = Arc<dyn StageObserver>;

/// Forwards reports to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl StageObserver for TracingObserver {
    fn stage_completed(&self, report: &StageReport) {
        tracing::info!(
            stage = report.stage,
            rows_in = report.rows_in,
            rows_out = report.rows_out,
            dropped = report.rows_dropped(),
            columns = report.columns_out,
            "stage completed"
        );
    }
}

/// Keeps every report in memory, in emission order
#[derive(Debug, Default)]
pub struct RecordingObserver {
    reports: Mutex<Vec<StageReport>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<StageReport> {
        match self.reports.lock() {
            Ok(reports) => reports.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl StageObserver for RecordingObserver {
    fn stage_completed(&self, report: &StageReport) {
        match self.reports.lock() {
            Ok(mut reports) => reports.push(report.clone()),
            Err(poisoned) => poisoned.into_inner().push(report.clone()),
        }
    }
}

/// Send `report` to `observer` when one is attached.
pub(crate) fn notify(observer: Option<&ObserverHandle>, report: StageReport) {
    if let Some(observer) = observer {
        observer.stage_completed(&report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_observer_keeps_emission_order() {
        let observer = RecordingObserver::new();
        for (stage, rows_out) in [("preprocessing", 8), ("feature_engineering", 8)] {
            observer.stage_completed(&StageReport {
                stage,
                rows_in: 10,
                rows_out,
                columns_out: 3,
            });
        }

        let reports = observer.reports();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].stage, "preprocessing");
        assert_eq!(reports[0].rows_dropped(), 2);
    }
}
